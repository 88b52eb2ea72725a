//! Automation triggering and execution.
//!
//! [`AutomationMatcher`] turns an event into `pending` execution records and
//! worker notifications; [`ExecutionRunner`] drives one record through its
//! action nodes to `completed` or `failed`.

mod matcher;
mod runner;
pub mod template;

pub use matcher::{AutomationMatcher, MatchedAutomation};
pub use runner::ExecutionRunner;
