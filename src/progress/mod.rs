//! Learner progress through the skill tree

pub mod completion;
pub mod model;
pub mod unlock;

pub use completion::{
    CompletionEvent, CompletionOutcome, CompletionResult, complete_node, start_node,
};
pub use model::{NodeStatus, ProgressRecord, ProgressSet, ProgressSummary};
pub use unlock::{propagate, propagate_from};
