// Handler modules
pub mod build;

pub use build::{BuildSummary, OutputFile, handle_build};
