//! Value coercion and the arithmetic, bitwise and comparison operators
//!
//! Binary numeric operators first pick a result type with [`promote`], convert
//! both operands to it, then compute. Integral results are re-boxed at the
//! promoted width, so `Int` arithmetic wraps like a 32-bit machine integer.

use std::cmp::Ordering;
use std::str::FromStr;

use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive, Zero};
use rust_decimal::Decimal;

use crate::error::{ErrorKind, EvalError, EvalResult};
use crate::value::Value;

// =============================================================================
// Numeric types
// =============================================================================

/// Numeric category of a value, in promotion order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NumericType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    BigInteger,
    Float,
    Double,
    BigDecimal,
    NonNumeric,
}

impl NumericType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Boolean(_) => NumericType::Boolean,
            Value::Byte(_) => NumericType::Byte,
            Value::Char(_) => NumericType::Char,
            Value::Short(_) => NumericType::Short,
            Value::Int(_) => NumericType::Int,
            Value::Long(_) => NumericType::Long,
            Value::BigInteger(_) => NumericType::BigInteger,
            Value::Float(_) => NumericType::Float,
            Value::Double(_) => NumericType::Double,
            Value::BigDecimal(_) => NumericType::BigDecimal,
            _ => NumericType::NonNumeric,
        }
    }

    /// Float, Double and BigDecimal
    pub fn is_real(self) -> bool {
        self >= NumericType::Float && self != NumericType::NonNumeric
    }
}

/// Result type of a binary operation on operands of types `t1` and `t2`.
///
/// With `can_be_non_numeric`, text or char operands make the result
/// non-numeric (string concatenation); otherwise non-numeric operands are
/// read as reals. Mixing a real with an integral type keeps the real type for
/// narrow integers, widens big integers to big decimals, and otherwise
/// widens to at least `Double`.
pub fn promote(t1: NumericType, t2: NumericType, can_be_non_numeric: bool) -> NumericType {
    use NumericType::*;

    if t1 == t2 {
        return t1;
    }
    if can_be_non_numeric && (t1 == NonNumeric || t2 == NonNumeric || t1 == Char || t2 == Char) {
        return NonNumeric;
    }
    if t1 == NonNumeric || t2 == NonNumeric {
        return Double;
    }

    let (real, other) = if t1.is_real() {
        (t1, t2)
    } else if t2.is_real() {
        (t2, t1)
    } else {
        return t1.max(t2);
    };

    if other.is_real() {
        real.max(other)
    } else if other < Int {
        real
    } else if other == BigInteger {
        BigDecimal
    } else {
        real.max(Double)
    }
}

fn numeric_type2(v1: &Value, v2: &Value, can_be_non_numeric: bool) -> NumericType {
    promote(NumericType::of(v1), NumericType::of(v2), can_be_non_numeric)
}

// =============================================================================
// Widening ranking (result-type hints for generated source)
// =============================================================================

/// Strict total order used to choose the result type of an expression from
/// the types of its operands. Text beats everything, arbitrary precision
/// beats floating point, floating point beats integral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Widening {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    BigInteger,
    BigDecimal,
    Text,
}

impl Widening {
    pub fn from_type_name(name: &str) -> Option<Self> {
        Some(match name {
            "Boolean" => Widening::Boolean,
            "Byte" => Widening::Byte,
            "Char" => Widening::Char,
            "Short" => Widening::Short,
            "Int" => Widening::Int,
            "Long" => Widening::Long,
            "Float" => Widening::Float,
            "Double" => Widening::Double,
            "BigInteger" => Widening::BigInteger,
            "BigDecimal" => Widening::BigDecimal,
            "String" => Widening::Text,
            _ => return None,
        })
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Widening::Boolean => "Boolean",
            Widening::Byte => "Byte",
            Widening::Char => "Char",
            Widening::Short => "Short",
            Widening::Int => "Int",
            Widening::Long => "Long",
            Widening::Float => "Float",
            Widening::Double => "Double",
            Widening::BigInteger => "BigInteger",
            Widening::BigDecimal => "BigDecimal",
            Widening::Text => "String",
        }
    }
}

/// Whether `candidate` should replace `current` as the widest type seen.
/// Ties keep the current (left) operand.
pub fn is_wider(candidate: &str, current: &str) -> bool {
    match (Widening::from_type_name(candidate), Widening::from_type_name(current)) {
        (Some(c), Some(cur)) => c > cur,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

// =============================================================================
// Conversions
// =============================================================================

/// Truthiness: null is false, numbers are true when non-zero, chars when not
/// NUL, text when not empty. Any other object is true.
pub fn boolean_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Boolean(b) => *b,
        Value::Char(c) => *c != '\0',
        Value::Byte(i) => *i != 0,
        Value::Short(i) => *i != 0,
        Value::Int(i) => *i != 0,
        Value::Long(i) => *i != 0,
        Value::Float(n) => *n != 0.0,
        Value::Double(n) => *n != 0.0,
        Value::BigInteger(i) => !i.is_zero(),
        Value::BigDecimal(d) => !d.is_zero(),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

pub fn string_value(value: &Value) -> String {
    value.to_string()
}

pub fn long_value(value: &Value) -> EvalResult<i64> {
    Ok(match value {
        Value::Null => 0,
        Value::Boolean(b) => i64::from(*b),
        Value::Char(c) => i64::from(u32::from(*c)),
        Value::Byte(i) => i64::from(*i),
        Value::Short(i) => i64::from(*i),
        Value::Int(i) => i64::from(*i),
        Value::Long(i) => *i,
        Value::Float(n) => *n as i64,
        Value::Double(n) => *n as i64,
        Value::BigInteger(i) => low_bits(i),
        Value::BigDecimal(d) => d.trunc().to_i128().map_or(0, |i| i as i64),
        other => parse_text(other, "Long", |s| s.parse::<i64>().ok())?,
    })
}

pub fn double_value(value: &Value) -> EvalResult<f64> {
    Ok(match value {
        Value::Null => 0.0,
        Value::Boolean(b) => f64::from(u8::from(*b)),
        Value::Char(c) => f64::from(u32::from(*c)),
        Value::Byte(i) => f64::from(*i),
        Value::Short(i) => f64::from(*i),
        Value::Int(i) => f64::from(*i),
        Value::Long(i) => *i as f64,
        Value::Float(n) => f64::from(*n),
        Value::Double(n) => *n,
        Value::BigInteger(i) => i.to_f64().unwrap_or(f64::NAN),
        Value::BigDecimal(d) => d.to_f64().unwrap_or(f64::NAN),
        other => parse_text(other, "Double", |s| s.parse::<f64>().ok())?,
    })
}

pub fn big_int_value(value: &Value) -> EvalResult<BigInt> {
    Ok(match value {
        Value::BigInteger(i) => i.clone(),
        Value::BigDecimal(d) => d
            .trunc()
            .to_i128()
            .map(BigInt::from)
            .ok_or_else(|| EvalError::coercion(d, "BigInteger"))?,
        Value::Float(n) => BigInt::from_f32(*n).ok_or_else(|| EvalError::coercion(n, "BigInteger"))?,
        Value::Double(n) => BigInt::from_f64(*n).ok_or_else(|| EvalError::coercion(n, "BigInteger"))?,
        Value::String(_) | Value::List(_) | Value::Map(_) | Value::Set(_) | Value::Object(_) | Value::Subscript(_) => {
            parse_text(value, "BigInteger", |s| BigInt::from_str(s).ok())?
        }
        other => BigInt::from(long_value(other)?),
    })
}

pub fn big_dec_value(value: &Value) -> EvalResult<Decimal> {
    Ok(match value {
        Value::BigDecimal(d) => *d,
        Value::BigInteger(i) => {
            Decimal::from_str(&i.to_string()).map_err(|_| EvalError::coercion(i, "BigDecimal"))?
        }
        Value::Float(_) | Value::Double(_) => {
            let n = double_value(value)?;
            Decimal::from_f64(n).ok_or_else(|| EvalError::coercion(n, "BigDecimal"))?
        }
        Value::String(_) | Value::List(_) | Value::Map(_) | Value::Set(_) | Value::Object(_) | Value::Subscript(_) => {
            parse_text(value, "BigDecimal", parse_decimal)?
        }
        other => Decimal::from(long_value(other)?),
    })
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Parse the string form of a value; blank text reads as zero
fn parse_text<T: Default>(
    value: &Value,
    target: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> EvalResult<T> {
    let text = string_value(value);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(T::default());
    }
    parse(trimmed).ok_or_else(|| EvalError::coercion(format!("{:?}", text), target))
}

/// Lowest 64 bits, two's complement
fn low_bits(i: &BigInt) -> i64 {
    let masked: BigInt = i & BigInt::from(u64::MAX);
    masked.to_u64().unwrap_or(0) as i64
}

/// Box an integral result at the given width
pub fn new_integer(ty: NumericType, value: i64) -> Value {
    match ty {
        NumericType::Boolean | NumericType::Char | NumericType::Int => Value::Int(value as i32),
        NumericType::Byte => Value::Byte(value as i8),
        NumericType::Short => Value::Short(value as i16),
        NumericType::Long => Value::Long(value),
        NumericType::Float => Value::Float(value as f32),
        NumericType::Double => Value::Double(value as f64),
        NumericType::BigDecimal => Value::BigDecimal(Decimal::from(value)),
        NumericType::BigInteger | NumericType::NonNumeric => Value::BigInteger(BigInt::from(value)),
    }
}

/// Box a real result; only `Float` keeps single precision
pub fn new_real(ty: NumericType, value: f64) -> Value {
    if ty == NumericType::Float {
        Value::Float(value as f32)
    } else {
        Value::Double(value)
    }
}

// =============================================================================
// Arithmetic
// =============================================================================

pub fn add(v1: &Value, v2: &Value) -> EvalResult<Value> {
    let ty = numeric_type2(v1, v2, true);
    match ty {
        NumericType::BigInteger => Ok(Value::BigInteger(big_int_value(v1)? + big_int_value(v2)?)),
        NumericType::BigDecimal => big_dec_value(v1)?
            .checked_add(big_dec_value(v2)?)
            .map(Value::BigDecimal)
            .ok_or_else(|| overflow(v1, "+", v2)),
        NumericType::Float | NumericType::Double => {
            Ok(new_real(ty, double_value(v1)? + double_value(v2)?))
        }
        NumericType::NonNumeric => {
            let t1 = NumericType::of(v1);
            let t2 = NumericType::of(v2);
            if (t1 != NumericType::NonNumeric && v2.is_null())
                || (t2 != NumericType::NonNumeric && v1.is_null())
            {
                return Err(EvalError::coercion("null", "a number"));
            }
            Ok(Value::from(format!("{}{}", v1, v2)))
        }
        _ => Ok(new_integer(ty, long_value(v1)?.wrapping_add(long_value(v2)?))),
    }
}

pub fn subtract(v1: &Value, v2: &Value) -> EvalResult<Value> {
    let ty = numeric_type2(v1, v2, false);
    match ty {
        NumericType::BigInteger => Ok(Value::BigInteger(big_int_value(v1)? - big_int_value(v2)?)),
        NumericType::BigDecimal => big_dec_value(v1)?
            .checked_sub(big_dec_value(v2)?)
            .map(Value::BigDecimal)
            .ok_or_else(|| overflow(v1, "-", v2)),
        NumericType::Float | NumericType::Double => {
            Ok(new_real(ty, double_value(v1)? - double_value(v2)?))
        }
        _ => Ok(new_integer(ty, long_value(v1)?.wrapping_sub(long_value(v2)?))),
    }
}

pub fn multiply(v1: &Value, v2: &Value) -> EvalResult<Value> {
    let ty = numeric_type2(v1, v2, false);
    match ty {
        NumericType::BigInteger => Ok(Value::BigInteger(big_int_value(v1)? * big_int_value(v2)?)),
        NumericType::BigDecimal => big_dec_value(v1)?
            .checked_mul(big_dec_value(v2)?)
            .map(Value::BigDecimal)
            .ok_or_else(|| overflow(v1, "*", v2)),
        NumericType::Float | NumericType::Double => {
            Ok(new_real(ty, double_value(v1)? * double_value(v2)?))
        }
        _ => Ok(new_integer(ty, long_value(v1)?.wrapping_mul(long_value(v2)?))),
    }
}

pub fn divide(v1: &Value, v2: &Value) -> EvalResult<Value> {
    let ty = numeric_type2(v1, v2, false);
    match ty {
        NumericType::BigInteger => {
            let divisor = big_int_value(v2)?;
            if divisor.is_zero() {
                return Err(ErrorKind::DivisionByZero.into());
            }
            Ok(Value::BigInteger(big_int_value(v1)? / divisor))
        }
        NumericType::BigDecimal => {
            let divisor = big_dec_value(v2)?;
            if divisor.is_zero() {
                return Err(ErrorKind::DivisionByZero.into());
            }
            big_dec_value(v1)?
                .checked_div(divisor)
                .map(Value::BigDecimal)
                .ok_or_else(|| overflow(v1, "/", v2))
        }
        NumericType::Float | NumericType::Double => {
            Ok(new_real(ty, double_value(v1)? / double_value(v2)?))
        }
        _ => {
            let divisor = long_value(v2)?;
            if divisor == 0 {
                return Err(ErrorKind::DivisionByZero.into());
            }
            Ok(new_integer(ty, long_value(v1)?.wrapping_div(divisor)))
        }
    }
}

pub fn remainder(v1: &Value, v2: &Value) -> EvalResult<Value> {
    let ty = numeric_type2(v1, v2, false);
    match ty {
        NumericType::BigInteger | NumericType::BigDecimal => {
            let divisor = big_int_value(v2)?;
            if divisor.is_zero() {
                return Err(ErrorKind::DivisionByZero.into());
            }
            Ok(Value::BigInteger(big_int_value(v1)? % divisor))
        }
        NumericType::Float | NumericType::Double => {
            Ok(new_real(ty, double_value(v1)? % double_value(v2)?))
        }
        _ => {
            let divisor = long_value(v2)?;
            if divisor == 0 {
                return Err(ErrorKind::DivisionByZero.into());
            }
            Ok(new_integer(ty, long_value(v1)?.wrapping_rem(divisor)))
        }
    }
}

pub fn negate(value: &Value) -> EvalResult<Value> {
    let ty = NumericType::of(value);
    match ty {
        NumericType::BigInteger => Ok(Value::BigInteger(-big_int_value(value)?)),
        NumericType::BigDecimal => Ok(Value::BigDecimal(-big_dec_value(value)?)),
        NumericType::Float | NumericType::Double => Ok(new_real(ty, -double_value(value)?)),
        _ => Ok(new_integer(ty, long_value(value)?.wrapping_neg())),
    }
}

fn overflow(v1: &Value, op: &str, v2: &Value) -> EvalError {
    ErrorKind::ArithmeticOverflow(format!("{} {} {}", v1, op, v2)).into()
}

// =============================================================================
// Bitwise
// =============================================================================

pub fn bit_negate(value: &Value) -> EvalResult<Value> {
    let ty = NumericType::of(value);
    match ty {
        NumericType::BigInteger | NumericType::BigDecimal => Ok(Value::BigInteger(!big_int_value(value)?)),
        _ => Ok(new_integer(ty, !long_value(value)?)),
    }
}

pub fn bit_and(v1: &Value, v2: &Value) -> EvalResult<Value> {
    bitwise(v1, v2, |a, b| a & b, |a, b| a & b)
}

pub fn bit_or(v1: &Value, v2: &Value) -> EvalResult<Value> {
    bitwise(v1, v2, |a, b| a | b, |a, b| a | b)
}

pub fn xor(v1: &Value, v2: &Value) -> EvalResult<Value> {
    bitwise(v1, v2, |a, b| a ^ b, |a, b| a ^ b)
}

fn bitwise(
    v1: &Value,
    v2: &Value,
    big: impl FnOnce(BigInt, BigInt) -> BigInt,
    long: impl FnOnce(i64, i64) -> i64,
) -> EvalResult<Value> {
    let ty = numeric_type2(v1, v2, false);
    match ty {
        NumericType::BigInteger | NumericType::BigDecimal => {
            Ok(Value::BigInteger(big(big_int_value(v1)?, big_int_value(v2)?)))
        }
        _ => Ok(new_integer(ty, long(long_value(v1)?, long_value(v2)?))),
    }
}

/// Shift distance, masked like a 64-bit machine shift
fn shift_distance(value: &Value) -> EvalResult<u32> {
    Ok((long_value(value)? & 0x3f) as u32)
}

pub fn shift_left(v1: &Value, v2: &Value) -> EvalResult<Value> {
    let ty = NumericType::of(v1);
    match ty {
        NumericType::BigInteger | NumericType::BigDecimal => {
            let n = long_value(v2)?;
            let big = big_int_value(v1)?;
            Ok(Value::BigInteger(if n >= 0 { big << n as usize } else { big >> n.unsigned_abs() as usize }))
        }
        _ => Ok(new_integer(ty, long_value(v1)?.wrapping_shl(shift_distance(v2)?))),
    }
}

pub fn shift_right(v1: &Value, v2: &Value) -> EvalResult<Value> {
    let ty = NumericType::of(v1);
    match ty {
        NumericType::BigInteger | NumericType::BigDecimal => {
            let n = long_value(v2)?;
            let big = big_int_value(v1)?;
            Ok(Value::BigInteger(if n >= 0 { big >> n as usize } else { big << n.unsigned_abs() as usize }))
        }
        _ => Ok(new_integer(ty, long_value(v1)?.wrapping_shr(shift_distance(v2)?))),
    }
}

pub fn unsigned_shift_right(v1: &Value, v2: &Value) -> EvalResult<Value> {
    let ty = NumericType::of(v1);
    match ty {
        NumericType::BigInteger | NumericType::BigDecimal => shift_right(v1, v2),
        _ if ty <= NumericType::Int => {
            let n = (long_value(v2)? & 0x1f) as u32;
            let shifted = (long_value(v1)? as i32 as u32).wrapping_shr(n);
            Ok(Value::Int(shifted as i32))
        }
        _ => {
            let shifted = (long_value(v1)? as u64).wrapping_shr(shift_distance(v2)?);
            Ok(new_integer(ty, shifted as i64))
        }
    }
}

// =============================================================================
// Comparison
// =============================================================================

/// Order two values with numeric conversion.
///
/// Values that are both non-numeric must be mutually comparable (two strings);
/// any other mix is read numerically and fails if a side cannot be.
pub fn compare(v1: &Value, v2: &Value) -> EvalResult<Ordering> {
    if v1.is_null() && v2.is_null() {
        return Ok(Ordering::Equal);
    }
    let t1 = NumericType::of(v1);
    let t2 = NumericType::of(v2);
    match promote(t1, t2, true) {
        NumericType::BigInteger => Ok(big_int_value(v1)?.cmp(&big_int_value(v2)?)),
        NumericType::BigDecimal => Ok(big_dec_value(v1)?.cmp(&big_dec_value(v2)?)),
        NumericType::NonNumeric if t1 == NumericType::NonNumeric && t2 == NumericType::NonNumeric => {
            match (v1, v2) {
                (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
                _ => Err(EvalError::coercion(
                    format!("{} and {}", v1.type_name(), v2.type_name()),
                    "comparable values",
                )),
            }
        }
        NumericType::NonNumeric | NumericType::Float | NumericType::Double => {
            Ok(compare_reals(double_value(v1)?, double_value(v2)?))
        }
        _ => Ok(long_value(v1)?.cmp(&long_value(v2)?)),
    }
}

/// NaN sorts after everything, as in a plain `a < b ? -1 : 1` comparison
fn compare_reals(a: f64, b: f64) -> Ordering {
    if a == b {
        Ordering::Equal
    } else if a < b {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// Null-safe, numeric-aware equality
pub fn equal(v1: &Value, v2: &Value) -> bool {
    match (v1, v2) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::List(a), Value::List(b)) => {
            if a.ptr_eq(b) {
                return true;
            }
            let (a, b) = (a.snapshot(), b.snapshot());
            a.len() == b.len() && a.iter().zip(&b).all(|(x, y)| equal(x, y))
        }
        _ if NumericType::of(v1) != NumericType::NonNumeric
            && NumericType::of(v2) != NumericType::NonNumeric =>
        {
            matches!(compare(v1, v2), Ok(Ordering::Equal))
        }
        _ => v1 == v2,
    }
}

pub fn less(v1: &Value, v2: &Value) -> EvalResult<bool> {
    Ok(compare(v1, v2)? == Ordering::Less)
}

pub fn greater(v1: &Value, v2: &Value) -> EvalResult<bool> {
    Ok(compare(v1, v2)? == Ordering::Greater)
}

/// Membership test. Lists and sets test their elements, maps their values;
/// any other value is a collection of itself.
pub fn contains(collection: &Value, value: &Value) -> EvalResult<bool> {
    Ok(match collection {
        Value::Null => false,
        Value::List(items) => items.read().iter().any(|item| equal(item, value)),
        Value::Set(items) => items.iter().any(|item| equal(item, value)),
        Value::Map(entries) => entries.read().values().any(|item| equal(item, value)),
        other => equal(other, value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER: [NumericType; 11] = [
        NumericType::Boolean,
        NumericType::Byte,
        NumericType::Char,
        NumericType::Short,
        NumericType::Int,
        NumericType::Long,
        NumericType::BigInteger,
        NumericType::Float,
        NumericType::Double,
        NumericType::BigDecimal,
        NumericType::NonNumeric,
    ];

    #[test]
    fn test_promote_is_symmetric() {
        for &a in &ORDER {
            for &b in &ORDER {
                for flag in [true, false] {
                    assert_eq!(promote(a, b, flag), promote(b, a, flag), "{:?} {:?}", a, b);
                }
            }
        }
    }

    #[test]
    fn test_promote_rules() {
        use NumericType::*;
        assert_eq!(promote(Int, Double, false), Double);
        assert_eq!(promote(Short, Float, false), Float);
        assert_eq!(promote(Long, Float, false), Double);
        assert_eq!(promote(BigInteger, Double, false), BigDecimal);
        assert_eq!(promote(Int, Long, false), Long);
        assert_eq!(promote(Int, NonNumeric, true), NonNumeric);
        assert_eq!(promote(Int, Char, true), NonNumeric);
        assert_eq!(promote(Int, NonNumeric, false), Double);
    }

    #[test]
    fn test_widening_is_strict_total_order() {
        let names = [
            "Boolean", "Byte", "Char", "Short", "Int", "Long", "Float", "Double", "BigInteger",
            "BigDecimal", "String",
        ];
        for (i, a) in names.iter().enumerate() {
            for (j, b) in names.iter().enumerate() {
                let forward = is_wider(a, b);
                let backward = is_wider(b, a);
                if i == j {
                    assert!(!forward && !backward);
                } else {
                    assert!(forward ^ backward, "{} vs {}", a, b);
                    assert_eq!(forward, i > j);
                }
            }
        }
        assert!(is_wider("String", "BigDecimal"));
        assert!(is_wider("BigInteger", "Double"));
        assert!(!is_wider("Person", "Int"));
    }

    #[test]
    fn test_boolean_value() {
        assert!(!boolean_value(&Value::Null));
        assert!(!boolean_value(&Value::Int(0)));
        assert!(boolean_value(&Value::Double(0.5)));
        assert!(!boolean_value(&Value::Char('\0')));
        assert!(!boolean_value(&Value::from("")));
        assert!(boolean_value(&Value::from("false")));
        assert!(boolean_value(&Value::list(vec![])));
    }

    #[test]
    fn test_add_mixed() {
        assert_eq!(add(&Value::Int(2), &Value::Double(3.5)).unwrap(), Value::Double(5.5));
        assert_eq!(add(&Value::Int(2), &Value::Long(3)).unwrap(), Value::Long(5));
        assert_eq!(add(&Value::from("a"), &Value::Int(1)).unwrap(), Value::from("a1"));
        assert_eq!(add(&Value::Null, &Value::Null).unwrap(), Value::from("nullnull"));
        assert_eq!(add(&Value::Null, &Value::from("x")).unwrap(), Value::from("nullx"));
        assert!(add(&Value::Int(1), &Value::Null).is_err());
    }

    #[test]
    fn test_int_arithmetic_wraps() {
        let result = add(&Value::Int(i32::MAX), &Value::Int(1)).unwrap();
        assert_eq!(result, Value::Int(i32::MIN));
        assert_eq!(multiply(&Value::Byte(100), &Value::Byte(2)).unwrap(), Value::Byte(-56));
    }

    #[test]
    fn test_division() {
        assert_eq!(divide(&Value::Int(7), &Value::Int(2)).unwrap(), Value::Int(3));
        assert_eq!(remainder(&Value::Int(-7), &Value::Int(2)).unwrap(), Value::Int(-1));
        assert!(matches!(
            divide(&Value::Int(1), &Value::Int(0)).unwrap_err().kind(),
            ErrorKind::DivisionByZero
        ));
        let inf = divide(&Value::Double(1.0), &Value::Int(0)).unwrap();
        assert_eq!(inf, Value::Double(f64::INFINITY));
    }

    #[test]
    fn test_multiply_null_is_zero() {
        assert_eq!(multiply(&Value::Null, &Value::Int(4)).unwrap(), Value::Double(0.0));
        assert_eq!(multiply(&Value::Long(3), &Value::Int(4)).unwrap(), Value::Long(12));
    }

    #[test]
    fn test_string_coercion() {
        assert_eq!(long_value(&Value::from(" 42 ")).unwrap(), 42);
        assert_eq!(long_value(&Value::from("")).unwrap(), 0);
        assert_eq!(double_value(&Value::from("2.5")).unwrap(), 2.5);
        let err = long_value(&Value::from("abc")).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::TypeCoercion { .. }));
        assert_eq!(big_dec_value(&Value::from("1.25")).unwrap(), Decimal::new(125, 2));
    }

    #[test]
    fn test_big_number_arithmetic() {
        let big = Value::BigInteger(BigInt::from(i64::MAX));
        let sum = add(&big, &Value::Int(1)).unwrap();
        assert_eq!(sum.to_string(), "9223372036854775808");
        let mixed = add(&big, &Value::Double(0.5)).unwrap();
        assert!(matches!(mixed, Value::BigDecimal(_)));
    }

    #[test]
    fn test_shifts() {
        assert_eq!(shift_left(&Value::Int(1), &Value::Int(4)).unwrap(), Value::Int(16));
        assert_eq!(shift_right(&Value::Int(-16), &Value::Int(2)).unwrap(), Value::Int(-4));
        assert_eq!(
            unsigned_shift_right(&Value::Int(-1), &Value::Int(28)).unwrap(),
            Value::Int(15)
        );
        assert_eq!(bit_negate(&Value::Int(0)).unwrap(), Value::Int(-1));
        assert_eq!(xor(&Value::Int(6), &Value::Int(3)).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare(&Value::Int(1), &Value::Double(1.5)).unwrap(), Ordering::Less);
        assert_eq!(compare(&Value::from("b"), &Value::from("a")).unwrap(), Ordering::Greater);
        assert_eq!(compare(&Value::from("5"), &Value::Int(3)).unwrap(), Ordering::Greater);
        assert!(compare(&Value::from("a"), &Value::list(vec![])).is_err());
        assert!(compare(&Value::from("abc"), &Value::Int(3)).is_err());
    }

    #[test]
    fn test_equal_is_numeric_aware() {
        assert!(equal(&Value::Int(1), &Value::Long(1)));
        assert!(equal(&Value::Int(1), &Value::Double(1.0)));
        assert!(!equal(&Value::Int(1), &Value::Null));
        assert!(equal(&Value::Null, &Value::Null));
        assert!(!equal(&Value::from("1"), &Value::Int(1)));
        assert!(equal(
            &Value::list(vec![Value::Int(1)]),
            &Value::list(vec![Value::Long(1)])
        ));
    }

    #[test]
    fn test_contains() {
        let list = Value::list(vec![Value::Int(1), Value::from("a")]);
        assert!(contains(&list, &Value::Long(1)).unwrap());
        assert!(!contains(&list, &Value::from("b")).unwrap());
        assert!(!contains(&Value::Null, &Value::Int(1)).unwrap());
    }
}
