//! Back-end error types. Unlike `wfasm_ast::CompileError`, these carry no
//! `Path` context of their own — by the time lowering runs, the front end
//! has already attached bindings to every reference, so a back-end failure
//! is either a pattern shape the lowering rules don't cover or a dangling
//! label, both host-side compiler bugs rather than script-author mistakes.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LowerError {
    /// A node kind the back end's lowering rules (spec §4.4) don't define,
    /// e.g. destructuring patterns or member-expression reads: the bullet
    /// list only covers Identifier declarator/assignment targets.
    #[error("{node_kind} lowering is not defined by the compiler back end: {detail}")]
    Unsupported { node_kind: &'static str, detail: String },
    #[error("path resolution produced no binding for an identifier the front end should have resolved")]
    MissingBinding,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssembleError {
    #[error("GOTO/LABEL reference to undefined label `{0}`")]
    UndefinedLabel(String),
    #[error("duplicate label `{0}` in the same function")]
    DuplicateLabel(String),
}
