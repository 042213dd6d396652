//! Sprig Eval - the resumable execution engine.
//!
//! Walks a parsed [`sprig_ir::Program`] one reduction per
//! [`ExecState::step`] call, so a host can interleave script execution
//! with its own frame loop. Special forms (`define`, `if`, `begin`,
//! `lambda`) dispatch on parse-time node flags; everything else is an
//! application of an environment binding: a host-registered native
//! callback, a lambda, or a lazily coerced literal.
//!
//! ```
//! use sprig_eval::{EnvTarget, ExecState, StepResult};
//! use sprig_ir::Value;
//! use sprig_parse::parse;
//!
//! let program = parse("(define x 5) (+ x 1)").unwrap();
//! let mut exec = ExecState::new(&program, EnvTarget::Local).unwrap();
//! assert_eq!(exec.run(&program, 1000), StepResult::Done(Value::Int(6)));
//! ```

pub mod builtins;
mod env;
mod error;
mod exec;

pub use env::{EnvEntry, EnvFlags, EnvTable, EnvTarget, NativeCtx, NativeFn, SharedEnv};
pub use error::ExecError;
pub use exec::{ExecState, StepResult};
