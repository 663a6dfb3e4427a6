//! Skilltree - a skill-progression engine for learning platforms
//!
//! Skilltree tracks learners through a prerequisite graph of nodes, turns quiz
//! scores into stars, XP and gems, and keeps an append-only gem ledger.
//! Every mutation is a replayable transformation of learner state.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod progress;
pub mod rewards;
pub mod store;

pub use catalog::Catalog;
pub use config::Config;
pub use engine::{Engine, EngineSettings};
pub use error::{EngineError, Result};
pub use progress::{CompletionEvent, CompletionResult, NodeStatus, ProgressSet};
pub use rewards::XpContext;
pub use store::{FileRepository, LearnerRepository, LearnerState, MemoryRepository};
