//! wfasm-vm — the WorkflowASM VM runtime: `State`, `Frame`, the `Config`
//! dependency interface, instruction dispatch (`step`), and the built-in
//! operators/natives that close over the value model in `wfasm-value`.
//!
//! ## Modules
//! - [`state`] / [`frame`]: serializable VM state (spec §3).
//! - [`config`]: the `Config` trait the VM reads program content through,
//!   plus a map-backed `StaticConfig` reference implementation.
//! - [`interp`]: `step`, the call/return protocol, and running-status.
//! - [`ops`]: unary/binary operator evaluation.
//! - [`natives`]: the six built-in natives (`int64`, `uint64`, `double`,
//!   `bool`, `string`, `len`).

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, unused_must_use)]

pub mod config;
pub mod frame;
pub mod interp;
pub mod natives;
pub mod ops;
pub mod state;

pub use config::{Config, NativeFn, NativeOutcome, StaticConfig};
pub use frame::{Frame, FrameType};
pub use interp::{run_to_halt, running_status, step, RunningStatus, VmFault};
pub use state::{State, StateSnapshot, MAIN_FUNCTION_ID};

pub use wfasm_value as value;
