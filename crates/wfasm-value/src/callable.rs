//! The CALLABLE sub-variant set (spec §3): native, script function, or
//! closure (function plus bound arguments and captured upvalues).

use std::fmt;
use std::rc::Rc;

use crate::heap::HeapId;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Callable {
    /// A host-provided function, looked up by id via `Config::getNativeFunction`.
    Native(Rc<str>),
    /// A script-compiled function, addressed by its function id (the `fp`
    /// string frames carry).
    Function(Rc<str>),
    /// A function plus arguments bound at closure-creation time and upvalues
    /// captured from an enclosing frame's heap cells.
    Closure {
        id: Rc<str>,
        bound_args: Rc<[Value]>,
        upvalues: Rc<[HeapId]>,
    },
}

impl Callable {
    pub fn native(id: impl Into<Rc<str>>) -> Self {
        Callable::Native(id.into())
    }

    pub fn function(id: impl Into<Rc<str>>) -> Self {
        Callable::Function(id.into())
    }

    pub fn closure(id: impl Into<Rc<str>>, bound_args: Vec<Value>, upvalues: Vec<HeapId>) -> Self {
        Callable::Closure {
            id: id.into(),
            bound_args: bound_args.into(),
            upvalues: upvalues.into(),
        }
    }

    /// The function id this callable ultimately dispatches to, for NATIVE,
    /// FUNCTION, and CLOSURE alike.
    pub fn id(&self) -> &str {
        match self {
            Callable::Native(id) | Callable::Function(id) => id,
            Callable::Closure { id, .. } => id,
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native(id) => write!(f, "<native {id}>"),
            Callable::Function(id) => write!(f, "<fn {id}>"),
            Callable::Closure { id, bound_args, upvalues } => {
                write!(f, "<closure {id} bound={} upvalues={}>", bound_args.len(), upvalues.len())
            }
        }
    }
}
