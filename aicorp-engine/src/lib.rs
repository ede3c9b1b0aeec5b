//! aicorp-engine: a simulated AI company.
//!
//! A population of concurrent workers (employees under managers under
//! department heads) executes work through a pluggable completion
//! capability, and a product pipeline turns ideas into launch plans:
//! - Organization: registry, assignment, auto-scaling, review loops
//! - Pipeline: idea → work packet → C-suite → board → execution plan
//! - Collaborators: completion, board, event sink, persistence

pub mod board;
pub mod company;
pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod llm;
pub mod memory;
pub mod model;
pub mod org;
pub mod persona;
pub mod pipeline;
pub mod seed;

pub use company::Company;
pub use config::Settings;
pub use error::{CompletionError, ConfigError, OrgError, PipelineError};
