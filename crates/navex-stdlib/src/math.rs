//! Static Math class

use navex_runtime::ops::{self, NumericType};
use navex_runtime::{ClassBuilder, ClassRegistry, HostError, Value};

use crate::{get_arg, get_double_arg, invalid_arg};

pub fn register(registry: &mut ClassRegistry) {
    registry.register(
        ClassBuilder::for_value("Math")
            .static_method("abs", 1, math_abs)
            .static_method("max", 2, math_max)
            .static_method("min", 2, math_min)
            .static_method("pow", 2, math_pow)
            .static_method("sqrt", 1, math_sqrt)
            .static_method("floor", 1, math_floor)
            .static_method("ceil", 1, math_ceil)
            .static_method("round", 1, math_round)
            .static_field("PI", Value::Double(std::f64::consts::PI))
            .static_field("E", Value::Double(std::f64::consts::E))
            .build(),
    );
    registry.alias("java.lang.Math", "Math");
}

/// Absolute value, keeping the operand's type
fn math_abs(args: &[Value]) -> Result<Value, HostError> {
    let value = get_arg(args, 0)?;
    Ok(match value {
        Value::Byte(i) => Value::Byte(i.wrapping_abs()),
        Value::Short(i) => Value::Short(i.wrapping_abs()),
        Value::Int(i) => Value::Int(i.wrapping_abs()),
        Value::Long(i) => Value::Long(i.wrapping_abs()),
        Value::Float(n) => Value::Float(n.abs()),
        Value::Double(n) => Value::Double(n.abs()),
        Value::BigInteger(i) => Value::BigInteger(num_traits::Signed::abs(i)),
        Value::BigDecimal(d) => Value::BigDecimal(d.abs()),
        other => Value::Double(ops::double_value(other).map_err(invalid_arg)?.abs()),
    })
}

/// Larger of two numbers, at their promoted type
fn math_max(args: &[Value]) -> Result<Value, HostError> {
    extremum(args, std::cmp::Ordering::Greater)
}

fn math_min(args: &[Value]) -> Result<Value, HostError> {
    extremum(args, std::cmp::Ordering::Less)
}

fn extremum(args: &[Value], keep: std::cmp::Ordering) -> Result<Value, HostError> {
    let a = get_arg(args, 0)?;
    let b = get_arg(args, 1)?;
    let chosen = if ops::compare(b, a).map_err(invalid_arg)? == keep {
        b
    } else {
        a
    };
    let ty = ops::promote(NumericType::of(a), NumericType::of(b), false);
    // `0 + x` re-boxes at the promoted width
    let zero = match ty {
        NumericType::Float | NumericType::Double => ops::new_real(ty, 0.0),
        NumericType::NonNumeric => return Ok(chosen.clone()),
        _ => ops::new_integer(ty, 0),
    };
    ops::add(&zero, chosen).map_err(invalid_arg)
}

fn math_pow(args: &[Value]) -> Result<Value, HostError> {
    let base = get_double_arg(args, 0)?;
    let exponent = get_double_arg(args, 1)?;
    Ok(Value::Double(base.powf(exponent)))
}

fn math_sqrt(args: &[Value]) -> Result<Value, HostError> {
    Ok(Value::Double(get_double_arg(args, 0)?.sqrt()))
}

fn math_floor(args: &[Value]) -> Result<Value, HostError> {
    Ok(Value::Double(get_double_arg(args, 0)?.floor()))
}

fn math_ceil(args: &[Value]) -> Result<Value, HostError> {
    Ok(Value::Double(get_double_arg(args, 0)?.ceil()))
}

/// Round half up to a Long
fn math_round(args: &[Value]) -> Result<Value, HostError> {
    let n = get_double_arg(args, 0)?;
    Ok(Value::Long((n + 0.5).floor() as i64))
}
