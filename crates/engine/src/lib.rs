pub mod config;
pub mod diagnostics;
pub mod ranker;
pub mod scoring;

pub use config::RankerFileConfig;
pub use diagnostics::{CycleReport, Diagnostic, Outcome};
pub use ranker::Ranker;
