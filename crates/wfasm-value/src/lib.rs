//! wfasm-value — tagged value model, heap, and error taxonomy shared by the
//! WorkflowASM compiler and VM.
//!
//! This crate has no opinion about instruction dispatch or compilation; it
//! only defines the closed [`Value`] tag set (spec §3), the [`Heap`] that
//! back-references (upvalues, closures) dereference through, and the closed
//! [`StatusCode`] taxonomy that every VM-observable fault is drawn from
//! (spec §7).

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, unused_must_use)]

pub mod bytecode;
mod callable;
mod error;
mod heap;
mod status;
mod value;

pub use callable::Callable;
pub use error::ValueError;
pub use heap::{Heap, HeapId};
pub use status::{Status, StatusCode};
pub use value::{MapKey, MessageRecord, Type, Value};

/// Id of the native the compiler's NORMALIZE_ARGS lowering calls to collect
/// excess call arguments into a rest parameter's LIST (spec §4.4). Not one
/// of the closed §4.1.6 built-ins: it exists purely to give rest-parameter
/// collection a legal implementation using only the closed CALL opcode,
/// since no opcode builds a LIST from N stack values directly. An embedder
/// whose compiled functions use rest parameters must register a native
/// under this id (`wfasm_vm::natives::collect_rest` provides one).
pub const REST_COLLECTOR_NATIVE_ID: &str = "$collectRest";
