// WellSleuth - core/mod.rs
//
// Core business logic layer.
// Dependencies: util, plus pure data crates (serde, regex, chrono, csv).
// Must NOT depend on: platform or app.
//
// discovery is the one exception that touches the filesystem, and only
// for metadata.

pub mod discovery;
pub mod export;
pub mod mnemonic;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod qc;
pub mod signal;
