//! Built-in unary/binary operators (spec §4.1.5).

use wfasm_value::bytecode::{BinaryOp, UnaryOp};
use wfasm_value::{Status, Value};

pub fn eval_unop(op: UnaryOp, v: Value) -> Result<Value, Status> {
    match (op, &v) {
        (UnaryOp::Minus, Value::Int64(n)) => Ok(Value::Int64(n.wrapping_neg())),
        (UnaryOp::Minus, Value::Double(n)) => Ok(Value::Double(-n)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Not, Value::Null) => Ok(Value::Bool(true)),
        _ => Err(Status::invalid_argument(format!(
            "unary {op:?} is not defined for a value of tag {}",
            v.tag()
        ))),
    }
}

pub fn eval_binop(op: BinaryOp, a: Value, b: Value) -> Result<Value, Status> {
    use BinaryOp::*;
    match op {
        Add | Sub | Mul | Div | Mod | Pow => eval_arith(op, a, b),
        And => Ok(Value::Bool(a.truthy() && b.truthy())),
        Or => Ok(Value::Bool(a.truthy() || b.truthy())),
        Eq => Ok(Value::Bool(a == b)),
        Lt | Le => eval_relational(op, a, b),
    }
}

fn type_mismatch(op: BinaryOp, a: &Value, b: &Value) -> Status {
    Status::invalid_argument(format!(
        "{op:?} requires matching operand types, got {} and {}",
        a.tag(),
        b.tag()
    ))
}

fn eval_arith(op: BinaryOp, a: Value, b: Value) -> Result<Value, Status> {
    use BinaryOp::*;
    match (&a, &b) {
        (Value::Int64(x), Value::Int64(y)) => int_arith(op, *x, *y).map(Value::Int64),
        (Value::Uint64(x), Value::Uint64(y)) => uint_arith(op, *x, *y).map(Value::Uint64),
        (Value::Double(x), Value::Double(y)) => Ok(Value::Double(double_arith(op, *x, *y))),
        (Value::String(x), Value::String(y)) if op == Add => {
            Ok(Value::string(format!("{x}{y}")))
        }
        (Value::String(_), Value::String(_)) => Err(Status::invalid_argument(format!(
            "STRING only supports ADD, not {op:?}"
        ))),
        _ => Err(type_mismatch(op, &a, &b)),
    }
}

fn int_arith(op: BinaryOp, x: i64, y: i64) -> Result<i64, Status> {
    use BinaryOp::*;
    match op {
        Add => Ok(x.wrapping_add(y)),
        Sub => Ok(x.wrapping_sub(y)),
        Mul => Ok(x.wrapping_mul(y)),
        Div => {
            if y == 0 {
                Err(Status::invalid_argument("integer division by zero"))
            } else {
                Ok(x.wrapping_div(y))
            }
        }
        Mod => {
            if y == 0 {
                Err(Status::invalid_argument("integer division by zero"))
            } else {
                Ok(x.wrapping_rem(y))
            }
        }
        Pow => {
            if y < 0 {
                Err(Status::invalid_argument("POW does not support a negative integer exponent"))
            } else {
                Ok(x.wrapping_pow(y.min(u32::MAX as i64) as u32))
            }
        }
        _ => unreachable!("int_arith called with non-arithmetic op"),
    }
}

fn uint_arith(op: BinaryOp, x: u64, y: u64) -> Result<u64, Status> {
    use BinaryOp::*;
    match op {
        Add => Ok(x.wrapping_add(y)),
        Sub => Ok(x.wrapping_sub(y)),
        Mul => Ok(x.wrapping_mul(y)),
        Div => {
            if y == 0 {
                Err(Status::invalid_argument("integer division by zero"))
            } else {
                Ok(x.wrapping_div(y))
            }
        }
        Mod => {
            if y == 0 {
                Err(Status::invalid_argument("integer division by zero"))
            } else {
                Ok(x.wrapping_rem(y))
            }
        }
        Pow => Ok(x.wrapping_pow(y.min(u32::MAX as u64) as u32)),
        _ => unreachable!("uint_arith called with non-arithmetic op"),
    }
}

fn double_arith(op: BinaryOp, x: f64, y: f64) -> f64 {
    use BinaryOp::*;
    match op {
        Add => x + y,
        Sub => x - y,
        Mul => x * y,
        Div => x / y,
        Mod => x % y,
        Pow => x.powf(y),
        _ => unreachable!("double_arith called with non-arithmetic op"),
    }
}

fn eval_relational(op: BinaryOp, a: Value, b: Value) -> Result<Value, Status> {
    let ordering = match (&a, &b) {
        (Value::Int64(x), Value::Int64(y)) => x.partial_cmp(y),
        (Value::Uint64(x), Value::Uint64(y)) => x.partial_cmp(y),
        (Value::Double(x), Value::Double(y)) => x.partial_cmp(y),
        (Value::String(x), Value::String(y)) => x.partial_cmp(y),
        _ => return Err(type_mismatch(op, &a, &b)),
    };
    let Some(ordering) = ordering else {
        // NaN comparisons: neither LT nor LE hold, per IEEE-754.
        return Ok(Value::Bool(false));
    };
    let result = match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        _ => unreachable!("eval_relational called with non-relational op"),
    };
    Ok(Value::Bool(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_wraps_on_overflow() {
        let r = eval_binop(BinaryOp::Add, Value::Int64(i64::MAX), Value::Int64(1)).unwrap();
        assert_eq!(r, Value::Int64(i64::MIN));
    }

    #[test]
    fn integer_division_by_zero_is_invalid_argument() {
        let err = eval_binop(BinaryOp::Div, Value::Int64(1), Value::Int64(0)).unwrap_err();
        assert_eq!(err.code, wfasm_value::StatusCode::InvalidArgument);
    }

    #[test]
    fn double_division_by_zero_follows_ieee754() {
        let r = eval_binop(BinaryOp::Div, Value::Double(1.0), Value::Double(0.0)).unwrap();
        assert_eq!(r, Value::Double(f64::INFINITY));
    }

    #[test]
    fn string_add_concatenates() {
        let r = eval_binop(BinaryOp::Add, Value::string("foo"), Value::string("bar")).unwrap();
        assert_eq!(r, Value::string("foobar"));
    }

    #[test]
    fn string_sub_is_invalid_argument() {
        assert!(eval_binop(BinaryOp::Sub, Value::string("a"), Value::string("b")).is_err());
    }

    #[test]
    fn and_or_are_truthiness_based() {
        assert_eq!(eval_binop(BinaryOp::And, Value::Int64(0), Value::Bool(true)).unwrap(), Value::Bool(true));
        assert_eq!(eval_binop(BinaryOp::Or, Value::Null, Value::Bool(false)).unwrap(), Value::Bool(false));
    }

    #[test]
    fn unop_not_null_is_true() {
        assert_eq!(eval_unop(UnaryOp::Not, Value::Null).unwrap(), Value::Bool(true));
    }
}
