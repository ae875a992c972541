// WellSleuth - app/mod.rs
//
// Application layer: batch orchestration and output writing.
// Dependencies: core, platform.

pub mod batch;
pub mod report;
