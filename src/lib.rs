//! Run control for a hierarchy of data-acquisition applications.
//!
//! A [`engine::RunControl`] owns the current state, the status tree and the run
//! bookkeeping, and moves the ensemble between states one atomic command at a
//! time. [`orchestrator`] builds the composite sequences and the request loop on
//! top of it.

pub mod cli;
pub mod commands;
pub mod engine;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod run;
pub mod telemetry;
pub mod text_summary;
pub mod tree;

pub use commands::{Action, Command, Sequence};
pub use engine::RunControl;
pub use error::{RcError, RcResult};
pub use model::{Params, RcConfig, RunType, State};
