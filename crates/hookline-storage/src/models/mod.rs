//! SeaORM entities for the three dispatch tables.

pub mod automation;
pub mod subscription;
pub mod workflow_execution;
