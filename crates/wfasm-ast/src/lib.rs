//! wfasm-ast — AST node kinds, `Path`/`Visitor` traversal, and the two
//! scoping/reference-resolution pre-passes that run ahead of code
//! generation (spec §4.3).
//!
//! [`resolve::analyze`] is the entry point: it builds the `Path` tree,
//! opens scopes, declares every binding, resolves every reference
//! identifier, and validates `@version` annotations on top-level functions,
//! all in one call.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, unused_must_use)]

pub mod ast;
pub mod diagnostics;
pub mod path;
pub mod resolve;
pub mod scope;
pub mod visitor;

pub use ast::{BinOp, Literal, Node, NodeRef, PropertyKey, RouteEntry, TemplatePart, UnOp};
pub use diagnostics::CompileError;
pub use path::Path;
pub use resolve::{analyze, Analysis};
pub use scope::{Binding, BindingKind, Scope};
pub use visitor::{walk, Visitor};
