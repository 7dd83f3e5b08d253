//! The closed set of built-in natives named by id (spec §4.1.6): `int64`,
//! `uint64`, `double`, `bool`, `string`, `len`. Each validates arity and
//! argument tag and returns either `{result}` or `{error}`.

use wfasm_value::{Status, Value};

use crate::config::{NativeFn, NativeOutcome};

/// Table of `(id, implementation)` pairs, consumed by
/// `StaticConfig::with_builtin_natives`.
pub const BUILTINS: &[(&str, NativeFn)] = &[
    ("int64", native_int64),
    ("uint64", native_uint64),
    ("double", native_double),
    ("bool", native_bool),
    ("string", native_string),
    ("len", native_len),
];

/// Natives the compiler's lowering emits CALLs to but which aren't part of
/// the closed §4.1.6 built-in set (see `native_collect_rest`).
pub const COMPILER_SUPPORT: &[(&str, NativeFn)] = &[(wfasm_value::REST_COLLECTOR_NATIVE_ID, native_collect_rest)];

fn unary_arity<'a>(name: &str, args: &'a [Value]) -> Result<&'a Value, Status> {
    match args {
        [v] => Ok(v),
        _ => Err(Status::invalid_argument(format!(
            "{name} expects exactly 1 argument, got {}",
            args.len()
        ))),
    }
}

fn outcome(r: Result<Value, Status>) -> NativeOutcome {
    match r {
        Ok(v) => NativeOutcome::Result(v),
        Err(s) => NativeOutcome::Error(s.into_value()),
    }
}

fn native_int64(args: &[Value]) -> NativeOutcome {
    outcome(unary_arity("int64", args).and_then(|v| match v {
        Value::Int64(n) => Ok(Value::Int64(*n)),
        Value::Uint64(n) => Ok(Value::Int64(*n as i64)),
        Value::Double(n) => Ok(Value::Int64(n.trunc() as i64)),
        other => Err(Status::invalid_argument(format!("int64() does not accept {}", other.tag()))),
    }))
}

fn native_uint64(args: &[Value]) -> NativeOutcome {
    outcome(unary_arity("uint64", args).and_then(|v| match v {
        Value::Int64(n) => Ok(Value::Uint64(*n as u64)),
        Value::Uint64(n) => Ok(Value::Uint64(*n)),
        Value::Double(n) => Ok(Value::Uint64(n.trunc() as u64)),
        other => Err(Status::invalid_argument(format!("uint64() does not accept {}", other.tag()))),
    }))
}

fn native_double(args: &[Value]) -> NativeOutcome {
    outcome(unary_arity("double", args).and_then(|v| match v {
        Value::Int64(n) => Ok(Value::Double(*n as f64)),
        Value::Uint64(n) => Ok(Value::Double(*n as f64)),
        Value::Double(n) => Ok(Value::Double(*n)),
        other => Err(Status::invalid_argument(format!("double() does not accept {}", other.tag()))),
    }))
}

fn native_bool(args: &[Value]) -> NativeOutcome {
    outcome(unary_arity("bool", args).map(|v| Value::Bool(v.truthy())))
}

fn native_string(args: &[Value]) -> NativeOutcome {
    outcome(unary_arity("string", args).map(|v| match v {
        Value::String(s) => Value::String(s.clone()),
        other => Value::string(other.to_string()),
    }))
}

fn native_len(args: &[Value]) -> NativeOutcome {
    outcome(unary_arity("len", args).and_then(|v| {
        v.len()
            .map(Value::Int64)
            .ok_or_else(|| Status::invalid_argument(format!("len() does not accept {}", v.tag())))
    }))
}

/// Backs `wfasm_value::REST_COLLECTOR_NATIVE_ID`: wraps however many
/// arguments the compiler's NORMALIZE_ARGS prologue calls it with into a
/// single LIST. Not part of the closed §4.1.6 built-in set; registered
/// separately via `StaticConfig::with_compiler_support_natives`.
fn native_collect_rest(args: &[Value]) -> NativeOutcome {
    NativeOutcome::Result(Value::list(args.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(f: NativeFn, args: &[Value]) -> NativeOutcome {
        f(args)
    }

    #[test]
    fn len_of_string_bytes_list_map() {
        assert!(matches!(call(native_len, &[Value::string("abc")]), NativeOutcome::Result(Value::Int64(3))));
        assert!(matches!(
            call(native_len, &[Value::list(vec![Value::Null])]),
            NativeOutcome::Result(Value::Int64(1))
        ));
        assert!(matches!(call(native_len, &[Value::Int64(5)]), NativeOutcome::Error(_)));
    }

    #[test]
    fn int64_cast_truncates_doubles() {
        assert!(matches!(call(native_int64, &[Value::Double(3.9)]), NativeOutcome::Result(Value::Int64(3))));
    }

    #[test]
    fn wrong_arity_is_invalid_argument() {
        assert!(matches!(call(native_len, &[]), NativeOutcome::Error(_)));
    }

    #[test]
    fn bool_cast_uses_truthiness() {
        assert!(matches!(call(native_bool, &[Value::Int64(0)]), NativeOutcome::Result(Value::Bool(true))));
        assert!(matches!(call(native_bool, &[Value::Null]), NativeOutcome::Result(Value::Bool(false))));
    }
}
