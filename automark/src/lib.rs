//! Automated marking of student coursework.
//!
//! A cohort owns a corpus of tutor-authored test-definition files. Each definition carries a
//! small JSON header naming the student file(s) it exercises and how to build and run them.
//! For every student the [`Grader`] binds the corpus to that student's submission, runs each
//! test unit through the adapter for its kind (native compile-and-run, HDL
//! simulation/synthesis, interpreted script, lint) and collects a deterministic [`Report`].

mod batch;
pub mod cohort;
pub mod configuration;
mod error;
pub mod grader;
pub mod input;
pub mod report;

#[cfg(test)]
mod utils;

pub use batch::{Batch, BatchOptions, BatchSummary, StudentOutcome};
pub use cohort::{CohortContext, StudentContext};
pub use configuration::Configuration;
pub use error::{Error, Result};
pub use grader::Grader;
pub use grader::adapters::{Adapter, AdapterRegistry};
pub use grader::discovery::{Corpus, discover};
pub use grader::outcome::{AdapterError, ExecutionResult};
pub use grader::score::{Mode, Score};
pub use input::MatchMode;
pub use report::{Report, ReportEntry, Verdict, analyse_report};

use serde::Deserialize;
use serde::Serialize;

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LoggingMode {
    Silent,
    #[default]
    Normal,
    Verbose,
}

impl LoggingMode {
    pub fn level_filter(&self) -> log::LevelFilter {
        match self {
            LoggingMode::Silent => log::LevelFilter::Off,
            LoggingMode::Normal => log::LevelFilter::Info,
            LoggingMode::Verbose => log::LevelFilter::Debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_logging_modes_to_level_filters() {
        assert_eq!(LoggingMode::Silent.level_filter(), log::LevelFilter::Off);
        assert_eq!(LoggingMode::default().level_filter(), log::LevelFilter::Info);
        assert_eq!(LoggingMode::Verbose.level_filter(), log::LevelFilter::Debug);
    }
}
