//! Closed error taxonomy (spec §7), mirroring RPC canonical status codes.

use std::fmt;

use crate::value::{MessageRecord, Value};

/// The closed set of fault codes a VM-observable error can carry.
///
/// Numeric values match the corresponding RPC canonical codes so that an
/// external wire codec can pass them through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(i32)]
pub enum StatusCode {
    Ok = 0,
    Unknown = 2,
    InvalidArgument = 3,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusCode::Ok => "OK",
            StatusCode::Unknown => "UNKNOWN",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::OutOfRange => "OUT_OF_RANGE",
            StatusCode::Unimplemented => "UNIMPLEMENTED",
            StatusCode::Internal => "INTERNAL",
        };
        f.write_str(s)
    }
}

/// A VM-observable fault: a `{code, message}` record, always carried as a
/// MESSAGE-tagged [`Value`] once it crosses into script-visible territory.
#[derive(Debug, Clone)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }

    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::new(StatusCode::OutOfRange, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unimplemented, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unknown, message)
    }

    /// Wraps this status as the MESSAGE-tagged value the VM throws.
    pub fn into_value(self) -> Value {
        Value::Message(std::rc::Rc::new(MessageRecord::Status {
            code: self.code,
            message: self.message,
        }))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for Status {}
