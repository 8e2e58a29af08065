//! End-to-end evaluation tests

use std::any::Any;
use std::sync::{Arc, Mutex, RwLock};

use navex_ast::{Ast, AstBuilder, BinaryOp, DynamicSubscript, NodeId};
use navex_runtime::{
    ClassBuilder, ClassRegistry, CompileRequest, CompiledAccessor, ErrorKind, EvalContext, EvalResult,
    Evaluator, EvaluatorConfig, ExpressionCompiler, HostError, HostObject, MemberCache, MemberId,
    PropertyAccessor, Value,
};
use navex_stdlib::stdlib_registry;

// =============================================================================
// Fixtures
// =============================================================================

#[derive(Debug)]
struct Person {
    name: String,
    age: i32,
    address: RwLock<Value>,
}

impl HostObject for Person {
    fn type_name(&self) -> &str {
        "Person"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
struct Address {
    city: RwLock<Value>,
}

impl HostObject for Address {
    fn type_name(&self) -> &str {
        "Address"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn person(name: &str, age: i32, address: Value) -> Value {
    Value::object(Person {
        name: name.to_string(),
        age,
        address: RwLock::new(address),
    })
}

fn address(city: &str) -> Value {
    Value::object(Address {
        city: RwLock::new(Value::from(city)),
    })
}

fn people_registry() -> ClassRegistry {
    let mut registry = stdlib_registry();
    registry.register(
        ClassBuilder::<Person>::for_object("Person")
            .method("getName", 0, |p: &Person, _: &[Value]| Ok(Value::from(p.name.as_str())))
            .method("isAdult", 0, |p: &Person, _: &[Value]| Ok(Value::Boolean(p.age >= 18)))
            .method("getAddress", 0, |p: &Person, _: &[Value]| {
                Ok(p.address.read().unwrap().clone())
            })
            .method("setAddress", 1, |p: &Person, args: &[Value]| {
                *p.address.write().unwrap() = args[0].clone();
                Ok(Value::Null)
            })
            .method("greet", 1, |p: &Person, args: &[Value]| {
                Ok(Value::from(format!("{}, {}!", args[0], p.name)))
            })
            .field("age", |p: &Person| Value::Int(p.age))
            .constructor(2, |args: &[Value]| {
                let age = navex_runtime::ops::long_value(&args[1])
                    .map_err(|e| HostError::with_source("invalid age", e))?;
                Ok(person(&args[0].to_string(), age as i32, Value::Null))
            })
            .build(),
    );
    registry.register(
        ClassBuilder::<Address>::for_object("Address")
            .mutable_field(
                "city",
                |a: &Address| a.city.read().unwrap().clone(),
                |a: &Address, value: Value| {
                    *a.city.write().unwrap() = value;
                    Ok(())
                },
            )
            .build(),
    );
    registry
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn evaluator() -> Evaluator {
    init_tracing();
    Evaluator::new(Arc::new(people_registry()))
}

fn build(f: impl FnOnce(&mut AstBuilder) -> NodeId) -> Ast {
    let mut b = AstBuilder::new();
    let root = f(&mut b);
    b.finish(root).unwrap()
}

fn eval(ast: &Ast, root: Value) -> EvalResult<Value> {
    let mut ctx = EvalContext::new(root);
    evaluator().get_value(ast, &mut ctx)
}

fn alice() -> Value {
    person("Alice", 30, address("Oslo"))
}

// =============================================================================
// Operators
// =============================================================================

#[test]
fn test_arithmetic_promotion() {
    let root = Value::map_from([("a", Value::Int(2)), ("b", Value::Double(3.5))]);
    let ast = build(|b| {
        let items = vec![
            {
                let a = b.property("a");
                let bb = b.property("b");
                b.add(a, bb)
            },
            {
                let a = b.property("a");
                let bb = b.property("b");
                b.multiply(a, bb)
            },
            {
                let bb = b.property("b");
                let a = b.property("a");
                b.binary(BinaryOp::Subtract, bb, a)
            },
            {
                let a = b.property("a");
                let two = b.constant(2);
                b.binary(BinaryOp::Divide, a, two)
            },
            {
                let x = b.string("x");
                let a = b.property("a");
                b.add(x, a)
            },
            {
                let a = b.property("a");
                let two = b.constant(2.0);
                b.binary(BinaryOp::Eq, a, two)
            },
        ];
        b.list(items)
    });
    insta::assert_snapshot!(ast.to_string(), @r#"{ a + b, a * b, b - a, a / 2, "x" + a, a == 2.0 }"#);
    insta::assert_snapshot!(eval(&ast, root).unwrap().to_string(), @"[5.5, 7.0, 1.5, 1, x2, true]");
}

#[test]
fn test_integer_division_by_zero() {
    let ast = build(|b| {
        let one = b.constant(1);
        let zero = b.constant(0);
        b.binary(BinaryOp::Divide, one, zero)
    });
    let err = eval(&ast, Value::Null).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::DivisionByZero));
    insta::assert_snapshot!(err.to_string(), @"Division by zero (in `1 / 0`)");
}

// =============================================================================
// Collections
// =============================================================================

#[test]
fn test_dynamic_subscripts() {
    let numbers = Value::list((1..=5).map(|i| Value::Int(i * 10)).collect());
    let root = Value::map_from([("list", numbers), ("empty", Value::list(Vec::new()))]);

    let read = |target: &str, subscript: DynamicSubscript| {
        let ast = build(|b| {
            let list = b.property(target);
            let index = b.subscript(subscript);
            b.chain(vec![list, index])
        });
        eval(&ast, root.clone()).unwrap().to_string()
    };

    assert_eq!(read("list", DynamicSubscript::First), "10");
    assert_eq!(read("list", DynamicSubscript::Mid), "30");
    assert_eq!(read("list", DynamicSubscript::Last), "50");
    assert_eq!(read("list", DynamicSubscript::All), "[10, 20, 30, 40, 50]");
    assert_eq!(read("empty", DynamicSubscript::Last), "null");

    let length = build(|b| b.path(&["list", "length"]));
    assert_eq!(eval(&length, root).unwrap(), Value::Int(5));
}

#[test]
fn test_index_out_of_bounds() {
    let root = Value::map_from([("list", Value::list(vec![Value::Int(1)]))]);
    let ast = build(|b| {
        let list = b.property("list");
        let three = b.constant(3);
        let index = b.index(three);
        b.chain(vec![list, index])
    });
    let err = eval(&ast, root).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"Index out of bounds: 3 (length: 1) (in `[3]`)");
}

#[test]
fn test_map_index_assignment() {
    let root = Value::map_from([("values", Value::map(Default::default()))]);
    let ast = build(|b| {
        let values = b.property("values");
        let key = b.string("x");
        let index = b.index(key);
        b.chain(vec![values, index])
    });
    let eval = evaluator();
    let mut ctx = EvalContext::new(root.clone());

    eval.set_value(&ast, &mut ctx, Value::Int(7)).unwrap();
    assert_eq!(eval.get_value(&ast, &mut ctx).unwrap(), Value::Int(7));

    let dotted = build(|b| b.path(&["values", "x"]));
    assert_eq!(eval.get_value(&dotted, &mut ctx).unwrap(), Value::Int(7));
    insta::assert_snapshot!(root.to_string(), @"{values={x=7}}");
}

#[test]
fn test_map_cannot_key_itself() {
    let root = Value::map_from([("a", Value::Int(1))]);
    let ast = build(|b| {
        let this = b.root_ref();
        let key = b.root_ref();
        let index = b.index(key);
        b.chain(vec![this, index])
    });
    insta::assert_snapshot!(ast.to_string(), @"#root[#root]");
    let mut ctx = EvalContext::new(root.clone());

    let err = evaluator().set_value(&ast, &mut ctx, Value::Int(2)).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"Cannot convert Map to a key of itself (in `[#root]`)");
    assert_eq!(root.to_string(), "{a=1}");
}

#[test]
fn test_map_pseudo_properties() {
    let inner = Value::map_from([("size", Value::from("big")), ("a", Value::Int(1))]);
    let root = Value::map_from([("m", inner)]);

    let dotted = |name: &str| eval(&build(|b| b.path(&["m", name])), root.clone()).unwrap();
    assert_eq!(dotted("size"), Value::Int(2));
    assert_eq!(dotted("isEmpty"), Value::Boolean(false));
    assert_eq!(dotted("missing"), Value::Null);
    insta::assert_snapshot!(dotted("keys").to_string(), @"[size, a]");
    insta::assert_snapshot!(dotted("values").to_string(), @"[big, 1]");

    let indexed = build(|b| {
        let m = b.property("m");
        let key = b.string("size");
        let index = b.index(key);
        b.chain(vec![m, index])
    });
    assert_eq!(eval(&indexed, root).unwrap(), Value::from("big"));
}

#[test]
fn test_list_and_map_literals_serialize() {
    let ast = build(|b| {
        let name_key = b.string("name");
        let name = b.property("name");
        let tags_key = b.string("tags");
        let one = b.constant(1);
        let half = b.constant(2.5);
        let nothing = b.null();
        let tags = b.list(vec![one, half, nothing]);
        b.map(vec![(name_key, name), (tags_key, tags)])
    });
    let value = eval(&ast, alice()).unwrap();
    insta::assert_snapshot!(serde_json::to_string(&value).unwrap(), @r#"{"name":"Alice","tags":[1,2.5,null]}"#);
}

// =============================================================================
// Host objects
// =============================================================================

#[test]
fn test_null_intermediate() {
    let root = Value::map_from([("person", person("Bob", 12, Value::Null))]);
    let ast = build(|b| b.path(&["person", "address", "city"]));
    let eval = evaluator();
    let mut ctx = EvalContext::new(root);

    assert_eq!(eval.get_value(&ast, &mut ctx).unwrap(), Value::Null);

    let err = eval.set_value(&ast, &mut ctx, Value::from("Paris")).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NullTarget(_)));
    insta::assert_snapshot!(err.to_string(), @"Null target: `address` is null (in `person.address.city`)");
}

#[test]
fn test_set_through_chain() {
    let root = Value::map_from([("person", alice())]);
    let city = build(|b| b.path(&["person", "address", "city"]));
    let home = build(|b| b.path(&["person", "address"]));
    let eval = evaluator();
    let mut ctx = EvalContext::new(root);

    eval.set_value(&city, &mut ctx, Value::from("Paris")).unwrap();
    assert_eq!(eval.get_value(&city, &mut ctx).unwrap(), Value::from("Paris"));

    eval.set_value(&home, &mut ctx, address("Rome")).unwrap();
    assert_eq!(eval.get_value(&city, &mut ctx).unwrap(), Value::from("Rome"));
}

#[test]
fn test_read_only_field_is_not_writable() {
    let ast = build(|b| b.property("age"));
    let eval = evaluator();
    let mut ctx = EvalContext::new(alice());
    assert_eq!(eval.get_value(&ast, &mut ctx).unwrap(), Value::Int(30));

    let err = eval.set_value(&ast, &mut ctx, Value::Int(31)).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"No property 'age' on Person (in `age`)");
}

#[test]
fn test_method_calls() {
    let upper = build(|b| {
        let name = b.property("name");
        let call = b.method("toUpperCase", vec![]);
        b.chain(vec![name, call])
    });
    assert_eq!(eval(&upper, alice()).unwrap(), Value::from("ALICE"));

    let substring = build(|b| {
        let name = b.property("name");
        let one = b.constant(1);
        let three = b.constant(3);
        let call = b.method("substring", vec![one, three]);
        b.chain(vec![name, call])
    });
    assert_eq!(eval(&substring, alice()).unwrap(), Value::from("li"));

    let greet = build(|b| {
        let hello = b.string("Hello");
        b.method("greet", vec![hello])
    });
    assert_eq!(eval(&greet, alice()).unwrap(), Value::from("Hello, Alice!"));

    let missing = build(|b| b.method("fly", vec![]));
    let err = eval(&missing, alice()).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"No method Person.fly taking 0 argument(s) (in `fly()`)");
}

#[test]
fn test_statics_and_constructors() {
    let max = build(|b| {
        let two = b.constant(2);
        let half = b.constant(3.5);
        b.static_method("Math", "max", vec![two, half])
    });
    assert_eq!(eval(&max, Value::Null).unwrap(), Value::Double(3.5));

    let pi = build(|b| b.static_field("java.lang.Math", "PI"));
    assert_eq!(eval(&pi, Value::Null).unwrap(), Value::Double(std::f64::consts::PI));

    let adult = build(|b| {
        let name = b.string("Bob");
        let age = b.constant(40);
        let ctor = b.ctor("Person", vec![name, age]);
        let adult = b.property("adult");
        b.chain(vec![ctor, adult])
    });
    assert_eq!(eval(&adult, Value::Null).unwrap(), Value::Boolean(true));

    let unknown = build(|b| b.static_field("Nowhere", "X"));
    let err = eval(&unknown, Value::Null).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"Unknown class: Nowhere (in `@Nowhere@X`)");
}

#[test]
fn test_error_snapshot_records_chain_position() {
    let root = Value::map_from([("person", alice())]);
    let ast = build(|b| b.path(&["person", "salary"]));
    let err = eval(&ast, root).unwrap_err();

    let location = err.location().unwrap();
    assert_eq!(location.expression, "salary");
    assert_eq!(location.snapshot.chain_position, Some(1));
    assert_eq!(location.snapshot.current_accessor.as_deref(), Some("Person"));
    insta::assert_snapshot!(err.to_string(), @"No property 'salary' on Person (in `salary`)");
}

// =============================================================================
// Context and configuration
// =============================================================================

#[test]
fn test_custom_root_variable() {
    let ast = build(|b| {
        let top = b.var("top");
        let name = b.property("name");
        b.chain(vec![top, name])
    });
    init_tracing();
    let eval = Evaluator::new(Arc::new(people_registry()))
        .with_config(EvaluatorConfig::default().with_root_variable("top"));
    let mut ctx = EvalContext::new(alice());
    assert_eq!(eval.get_value(&ast, &mut ctx).unwrap(), Value::from("Alice"));
}

#[test]
fn test_ternary_and_logic() {
    let ast = build(|b| {
        let adult = b.property("adult");
        let yes = b.string("adult");
        let no = b.string("minor");
        b.test(adult, yes, no)
    });
    assert_eq!(eval(&ast, alice()).unwrap(), Value::from("adult"));
    assert_eq!(eval(&ast, person("Kid", 9, Value::Null)).unwrap(), Value::from("minor"));
}

#[test]
fn test_permission_policy() {
    init_tracing();
    let policy = Arc::new(|member: &MemberId| member.name.as_ref() != "getName");
    let cache = MemberCache::new(Arc::new(people_registry())).with_policy(policy);
    let eval = Evaluator::with_cache(Arc::new(cache));
    let mut ctx = EvalContext::new(alice());

    let age = build(|b| b.property("age"));
    assert_eq!(eval.get_value(&age, &mut ctx).unwrap(), Value::Int(30));

    let name = build(|b| b.property("name"));
    let err = eval.get_value(&name, &mut ctx).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::MemberAccessDenied(_)));
    insta::assert_snapshot!(err.to_string(), @"Access to invoke.Person.getName denied (in `name`)");
}

struct Shouting;

impl PropertyAccessor for Shouting {
    fn get_property(
        &self,
        _ctx: &mut EvalContext,
        _target: &Value,
        name: &Value,
        _indexed: bool,
    ) -> EvalResult<Value> {
        Ok(Value::from(name.to_string().to_uppercase()))
    }

    fn set_property(
        &self,
        _ctx: &mut EvalContext,
        _target: &Value,
        _name: &Value,
        _value: Value,
        _indexed: bool,
    ) -> EvalResult<()> {
        Ok(())
    }
}

#[test]
fn test_custom_accessor_takes_precedence() {
    let eval = evaluator();
    eval.set_property_accessor("Person", Arc::new(Shouting));
    let ast = build(|b| b.property("whatever"));
    let mut ctx = EvalContext::new(alice());
    assert_eq!(eval.get_value(&ast, &mut ctx).unwrap(), Value::from("WHATEVER"));
}

// =============================================================================
// Caching and concurrency
// =============================================================================

#[test]
fn test_resolution_is_idempotent() {
    let eval = evaluator();
    let ast = build(|b| b.path(&["address", "city"]));
    let mut ctx = EvalContext::new(alice());

    eval.get_value(&ast, &mut ctx).unwrap();
    let entries = eval.cache().entry_count();
    assert!(entries > 0);

    eval.get_value(&ast, &mut ctx).unwrap();
    assert_eq!(eval.cache().entry_count(), entries);

    eval.clear_cache(None);
    assert_eq!(eval.cache().entry_count(), 0);
    assert_eq!(eval.get_value(&ast, &mut ctx).unwrap(), Value::from("Oslo"));
}

#[test]
fn test_concurrent_evaluation() {
    let eval = Arc::new(evaluator());
    let ast = Arc::new(build(|b| {
        let name = b.property("name");
        let length = b.method("length", vec![]);
        b.chain(vec![name, length])
    }));

    std::thread::scope(|scope| {
        for i in 0..8 {
            let eval = Arc::clone(&eval);
            let ast = Arc::clone(&ast);
            scope.spawn(move || {
                let name = format!("worker-{}", i);
                let mut ctx = EvalContext::new(person(&name, 20, Value::Null));
                for _ in 0..100 {
                    let len = eval.get_value(&ast, &mut ctx).unwrap();
                    assert_eq!(len, Value::Int(name.len() as i32));
                }
            });
        }
    });
}

// =============================================================================
// Compilation
// =============================================================================

struct Fixed(Value);

impl CompiledAccessor for Fixed {
    fn get(&self, _ctx: &mut EvalContext, _root: &Value) -> EvalResult<Value> {
        Ok(self.0.clone())
    }

    fn set(&self, _ctx: &mut EvalContext, _root: &Value, _value: Value) -> EvalResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingBackend {
    seen: Mutex<Vec<String>>,
}

impl ExpressionCompiler for RecordingBackend {
    fn compile(&self, request: &CompileRequest<'_>) -> EvalResult<Arc<dyn CompiledAccessor>> {
        self.seen.lock().unwrap().push(format!(
            "{} :: {}",
            request.root_type,
            request.getter.code
        ));
        Ok(Arc::new(Fixed(Value::from("native"))))
    }
}

#[test]
fn test_compile_chain() {
    let backend = Arc::new(RecordingBackend::default());
    let eval = evaluator().with_compiler(backend.clone());
    let root = Value::map_from([("person", alice())]);
    let ast = Arc::new(build(|b| b.path(&["person", "address", "city"])));
    let mut ctx = EvalContext::new(root);

    let compiled = eval.compile(Arc::clone(&ast), &mut ctx).unwrap();
    assert!(compiled.is_native());
    insta::assert_snapshot!(compiled.getter_source().unwrap().code, @r#"$this.get("person").getAddress().city"#);
    insta::assert_snapshot!(compiled.setter_source().unwrap().code, @r#"$this.get("person").getAddress().city = $value"#);
    assert_eq!(
        compiled.getter_source().unwrap().result_type.as_ref().map(|t| t.as_str()),
        Some("String")
    );
    assert_eq!(compiled.get_value(&eval, &mut ctx).unwrap(), Value::from("native"));
    assert_eq!(backend.seen.lock().unwrap().len(), 1);
}

#[test]
fn test_compile_without_backend_interprets() {
    let eval = evaluator();
    let ast = Arc::new(build(|b| {
        let age = b.property("age");
        let one = b.constant(1);
        b.add(age, one)
    }));
    let mut ctx = EvalContext::new(alice());

    let compiled = eval.compile(ast, &mut ctx).unwrap();
    assert!(!compiled.is_native());
    assert!(compiled.setter_source().is_none());
    insta::assert_snapshot!(compiled.getter_source().unwrap().code, @"$this.age + 1");
    assert_eq!(compiled.get_value(&eval, &mut ctx).unwrap(), Value::Int(31));
}
