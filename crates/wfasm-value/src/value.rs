//! The tagged `Value` union (spec §3) and its companion types.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::callable::Callable;
use crate::error::ValueError;
use crate::status::StatusCode;

/// Tag half of a `Value`'s `(Type, Payload)` pair. Kept as a standalone enum
/// so natives and the compiler can talk about "a value of this tag" without
/// constructing a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Null,
    Bool,
    Int64,
    Uint64,
    Double,
    String,
    Bytes,
    Enum,
    Message,
    Map,
    List,
    Type,
    Callable,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Type::Null => "NULL",
            Type::Bool => "BOOL",
            Type::Int64 => "INT64",
            Type::Uint64 => "UINT64",
            Type::Double => "DOUBLE",
            Type::String => "STRING",
            Type::Bytes => "BYTES",
            Type::Enum => "ENUM",
            Type::Message => "MESSAGE",
            Type::Map => "MAP",
            Type::List => "LIST",
            Type::Type => "TYPE",
            Type::Callable => "CALLABLE",
        };
        f.write_str(s)
    }
}

/// The restricted key domain a MAP may use: DOUBLE/BYTES/MESSAGE are
/// excluded (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum MapKey {
    Int64(i64),
    Uint64(u64),
    String(Rc<str>),
    Bool(bool),
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Int64(v) => write!(f, "{v}"),
            MapKey::Uint64(v) => write!(f, "{v}"),
            MapKey::String(v) => write!(f, "{v:?}"),
            MapKey::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Payload of a MESSAGE-tagged value. `Status` is the one concrete shape the
/// VM itself constructs (spec §7); everything else is opaque passthrough
/// data the VM never inspects (spec §3: "structured record opaquely
/// carried").
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum MessageRecord {
    Status { code: StatusCode, message: String },
    Opaque { type_name: String, payload: Vec<u8> },
}

/// A dynamically tagged value (spec §3).
///
/// MAP/LIST are reference-counted mutable handles (`Rc<RefCell<_>>`): the
/// design notes (spec §9) leave the choice between persistent
/// structural-sharing collections and ref-counted mutable handles to the
/// implementer; this crate picks the latter because the core opcode set
/// never mutates a MAP/LIST in place (there is no MAP/LIST opcode at all —
/// they only flow through PUSHK/locals/natives), so the simpler handle is
/// sufficient and the aliasing it implies is exactly "shared by structural
/// value semantics" as required.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    String(Rc<str>),
    Bytes(Rc<[u8]>),
    Enum(Rc<str>, i64),
    Message(Rc<MessageRecord>),
    Map(Rc<std::cell::RefCell<HashMap<MapKey, Value>>>),
    List(Rc<std::cell::RefCell<Vec<Value>>>),
    Type(Rc<str>),
    Callable(Callable),
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Value::String(s.into())
    }

    pub fn bytes(b: impl Into<Rc<[u8]>>) -> Self {
        Value::Bytes(b.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(std::cell::RefCell::new(items)))
    }

    pub fn map(entries: HashMap<MapKey, Value>) -> Self {
        Value::Map(Rc::new(std::cell::RefCell::new(entries)))
    }

    pub fn tag(&self) -> Type {
        match self {
            Value::Null => Type::Null,
            Value::Bool(_) => Type::Bool,
            Value::Int64(_) => Type::Int64,
            Value::Uint64(_) => Type::Uint64,
            Value::Double(_) => Type::Double,
            Value::String(_) => Type::String,
            Value::Bytes(_) => Type::Bytes,
            Value::Enum(..) => Type::Enum,
            Value::Message(_) => Type::Message,
            Value::Map(_) => Type::Map,
            Value::List(_) => Type::List,
            Value::Type(_) => Type::Type,
            Value::Callable(_) => Type::Callable,
        }
    }

    /// `truthy` per spec §4.1.2: only NULL and `BOOL(false)` are false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            _ => true,
        }
    }

    /// Length/size semantics for `len` (spec §4.1.6): STRING (code-unit
    /// length, i.e. UTF-8 byte count which equals Rust `str::len`), BYTES
    /// (byte length), LIST (element count), MAP (entry count).
    pub fn len(&self) -> Option<i64> {
        match self {
            Value::String(s) => Some(s.len() as i64),
            Value::Bytes(b) => Some(b.len() as i64),
            Value::List(l) => Some(l.borrow().len() as i64),
            Value::Map(m) => Some(m.borrow().len() as i64),
            _ => None,
        }
    }

    /// Converts this value into a MAP key, failing with [`ValueError`] if
    /// its tag is outside the allowed MapKey domain
    /// (INT64/UINT64/STRING/BOOL).
    pub fn as_map_key(&self) -> Result<MapKey, ValueError> {
        match self {
            Value::Int64(v) => Ok(MapKey::Int64(*v)),
            Value::Uint64(v) => Ok(MapKey::Uint64(*v)),
            Value::String(v) => Ok(MapKey::String(v.clone())),
            Value::Bool(v) => Ok(MapKey::Bool(*v)),
            _ => Err(ValueError::NotAMapKey { tag: self.tag() }),
        }
    }
}

/// Structural equality for every tag except MESSAGE, which compares by
/// identity (spec §8's literal round-trip property explicitly excludes it).
/// MAP/LIST compare by structural content of their current contents, which
/// is how `Rc<RefCell<_>>` equality already behaves once delegated.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Uint64(a), Value::Uint64(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Enum(a, ai), Value::Enum(b, bi)) => a == b && ai == bi,
            (Value::Message(a), Value::Message(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Uint64(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "bytes[{}]", b.len()),
            Value::Enum(name, ord) => write!(f, "{name}#{ord}"),
            Value::Message(m) => match m.as_ref() {
                MessageRecord::Status { code, message } => write!(f, "<status {code}: {message}>"),
                MessageRecord::Opaque { type_name, .. } => write!(f, "<message {type_name}>"),
            },
            Value::Map(m) => write!(f, "map[{}]", m.borrow().len()),
            Value::List(l) => {
                f.write_str("[")?;
                for (i, v) in l.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Value::Type(name) => write!(f, "<type {name}>"),
            Value::Callable(c) => write!(f, "{c}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_rules() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(Value::Bool(true).truthy());
        assert!(Value::Int64(0).truthy());
        assert!(Value::Uint64(0).truthy());
        assert!(Value::Double(0.0).truthy());
        assert!(Value::string("").truthy());
    }

    #[test]
    fn message_equality_is_identity() {
        let a = Value::Message(Rc::new(MessageRecord::Status {
            code: StatusCode::Internal,
            message: "x".into(),
        }));
        let b = Value::Message(Rc::new(MessageRecord::Status {
            code: StatusCode::Internal,
            message: "x".into(),
        }));
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
        let _ = b;
    }

    #[test]
    fn json_round_trip_preserves_structural_equality() {
        let map = Value::map(HashMap::from([(MapKey::String("a".into()), Value::Int64(1))]));
        let list = Value::list(vec![Value::Bool(true), map, Value::string("hi")]);
        let json = serde_json::to_string(&list).expect("serializes");
        let back: Value = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(list, back);
    }

    #[test]
    fn as_map_key_accepts_the_key_domain_and_rejects_the_rest() {
        assert_eq!(Value::Int64(5).as_map_key(), Ok(MapKey::Int64(5)));
        assert_eq!(Value::string("k").as_map_key(), Ok(MapKey::String("k".into())));
        assert_eq!(Value::Double(1.0).as_map_key(), Err(ValueError::NotAMapKey { tag: Type::Double }));
    }

    #[test]
    fn len_semantics() {
        assert_eq!(Value::string("hello").len(), Some(5));
        assert_eq!(Value::bytes(vec![1, 2, 3]).len(), Some(3));
        assert_eq!(Value::list(vec![Value::Null, Value::Null]).len(), Some(2));
        assert_eq!(Value::Int64(5).len(), None);
    }
}
