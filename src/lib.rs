// Public API - pipeline stages and the data types flowing between them
pub mod config;
pub mod enrich;
pub mod lookup;
pub mod report;
pub mod trace;

// CLI surface, consumed by the binary
pub mod cli;
