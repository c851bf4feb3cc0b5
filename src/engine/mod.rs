//! Generation pipeline and sandboxed execution engine.

pub mod context;
pub mod parser;
pub mod phase;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod runner;
pub mod types;

pub use phase::{Phase, PhaseRegistry};
pub use provider::{ModelBackend, OpenAiBackend};
