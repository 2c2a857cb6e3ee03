//! Importing interaction files.
//!
//! A file goes through three steps. Its first lines are read into a
//! [`Sample`], from which column roles are guessed. The resulting
//! [`ImportConfig`] is adjusted as needed and handed to the [`Importer`],
//! which reads every data line, resolves both identifiers and merges the row
//! into the graph.

pub mod interpret;
pub use interpret::{Guess, Sample};

mod import_config;
pub use import_config::{
    ColumnRole, ColumnType, ImportConfig, ImportSettings, SettingsError, SystemSource,
};

mod importer;
pub use importer::{
    CancelFlag, FileOutcome, FileReport, ImportError, ImportEvent, ImportSummary, Importer,
    RowSkip, error_chain,
};

mod shared;
pub use shared::{GraphWriter, SharedGraph};

mod job;
pub use job::{ImportJob, count_data_rows};
