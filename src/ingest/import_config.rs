//! Per-file import settings.

use std::{
    fs::File,
    io::BufReader,
    ops::Range,
    path::{Path, PathBuf},
};

use serde::Serialize;
use tracing::debug;

use super::{
    ImportError,
    interpret::{Guess, Sample},
};
use crate::domain::{DataSourceCatalog, SystemCode};

/// Where the identifier system of a regulator or target comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum SystemSource {
    /// Each row names the system in this column.
    Column(usize),
    /// Every row uses this system.
    Fixed(SystemCode),
}

/// A column role, as named in settings errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// The regulator id column.
    RegulatorId,
    /// The regulator system-code column.
    RegulatorSystem,
    /// The target id column.
    TargetId,
    /// The target system-code column.
    TargetSystem,
    /// The publication-reference column.
    Reference,
}

impl std::fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::RegulatorId => "regulator id",
            Self::RegulatorSystem => "regulator system code",
            Self::TargetId => "target id",
            Self::TargetSystem => "target system code",
            Self::Reference => "reference",
        })
    }
}

/// What a column is used for during import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Regulator identifiers.
    RegulatorId,
    /// Target identifiers.
    TargetId,
    /// Publication references.
    Reference,
    /// Regulator system codes.
    RegulatorSystem,
    /// Target system codes.
    TargetSystem,
    /// Anything else; shown alongside each interaction.
    Other,
}

/// Settings that cannot be used for an import.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    /// The delimiter is empty.
    #[error("the delimiter must not be empty")]
    EmptyDelimiter,

    /// A role points past the widest sample line.
    #[error("{role} column {column} is out of range: the sample has {columns} columns")]
    ColumnOutOfRange {
        /// The offending role.
        role: ColumnRole,
        /// The configured column.
        column: usize,
        /// Columns in the sample.
        columns: usize,
    },
}

/// The column roles and row layout of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSettings {
    /// Cell delimiter.
    pub delimiter: String,
    /// First header line (zero-based).
    pub first_header_row: usize,
    /// First data line (zero-based); header lines end here.
    pub first_data_row: usize,
    /// Regulator id column.
    pub regulator_id_column: usize,
    /// Regulator identifier system.
    pub regulator_system: SystemSource,
    /// Target id column.
    pub target_id_column: usize,
    /// Target identifier system.
    pub target_system: SystemSource,
    /// Publication-reference column, if enabled.
    pub reference_column: Option<usize>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            delimiter: "\t".to_string(),
            first_header_row: 0,
            first_data_row: 1,
            regulator_id_column: 0,
            regulator_system: SystemSource::Column(0),
            target_id_column: 1,
            target_system: SystemSource::Column(0),
            reference_column: None,
        }
    }
}

impl ImportSettings {
    /// Header lines, as a half-open range. Empty when the file has no header.
    #[must_use]
    pub const fn header_rows(&self) -> Range<usize> {
        if self.first_data_row > self.first_header_row {
            self.first_header_row..self.first_data_row
        } else {
            self.first_data_row..self.first_data_row
        }
    }

    /// Whether line `row` is a header line.
    #[must_use]
    pub const fn is_header_row(&self, row: usize) -> bool {
        row >= self.first_header_row && row < self.first_data_row
    }

    /// Whether line `row` is a data line.
    #[must_use]
    pub const fn is_data_row(&self, row: usize) -> bool {
        row >= self.first_data_row
    }

    /// What `column` is used for. Id roles win over the reference, which
    /// wins over system-code columns.
    #[must_use]
    pub fn column_type(&self, column: usize) -> ColumnType {
        if column == self.regulator_id_column {
            ColumnType::RegulatorId
        } else if column == self.target_id_column {
            ColumnType::TargetId
        } else if self.reference_column == Some(column) {
            ColumnType::Reference
        } else if self.regulator_system == SystemSource::Column(column) {
            ColumnType::RegulatorSystem
        } else if self.target_system == SystemSource::Column(column) {
            ColumnType::TargetSystem
        } else {
            ColumnType::Other
        }
    }

    fn role_columns(&self) -> Vec<(ColumnRole, usize)> {
        let mut columns = vec![
            (ColumnRole::RegulatorId, self.regulator_id_column),
            (ColumnRole::TargetId, self.target_id_column),
        ];
        if let SystemSource::Column(column) = self.regulator_system {
            columns.push((ColumnRole::RegulatorSystem, column));
        }
        if let SystemSource::Column(column) = self.target_system {
            columns.push((ColumnRole::TargetSystem, column));
        }
        if let Some(column) = self.reference_column {
            columns.push((ColumnRole::Reference, column));
        }
        columns
    }
}

/// A file selected for import together with its sample and settings.
///
/// Settings are adjusted freely until the import starts; the importer only
/// reads them.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    path: PathBuf,
    sample: Sample,
    settings: ImportSettings,
}

impl ImportConfig {
    /// Opens `path` and reads up to `sample_lines` lines as the sample.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Io`] if the file cannot be read.
    pub fn open(path: &Path, delimiter: &str, sample_lines: usize) -> Result<Self, ImportError> {
        let io_error = |source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_error)?;
        let lines = Sample::read_lines(BufReader::new(file), sample_lines).map_err(io_error)?;
        debug!(path = %path.display(), lines = lines.len(), "read sample");
        Ok(Self::from_lines(path, lines, delimiter))
    }

    /// Builds a config from sample lines already in memory.
    #[must_use]
    pub fn from_lines(path: &Path, lines: Vec<String>, delimiter: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            sample: Sample::new(lines, delimiter),
            settings: ImportSettings {
                delimiter: delimiter.to_string(),
                ..ImportSettings::default()
            },
        }
    }

    /// The file to import.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The sample, split with the current delimiter.
    #[must_use]
    pub const fn sample(&self) -> &Sample {
        &self.sample
    }

    /// The current settings.
    #[must_use]
    pub const fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// Changes the delimiter and re-splits the sample.
    pub fn set_delimiter(&mut self, delimiter: &str) {
        delimiter.clone_into(&mut self.settings.delimiter);
        self.sample.split(delimiter);
    }

    /// Sets the first data line. Moves the header start up to it if needed.
    pub fn set_first_data_row(&mut self, row: usize) {
        self.settings.first_data_row = row;
        if self.settings.first_header_row > row {
            self.settings.first_header_row = row;
        }
    }

    /// Sets the first header line. Moves the data start past it if needed.
    pub fn set_first_header_row(&mut self, row: usize) {
        self.settings.first_header_row = row;
        if row > self.settings.first_data_row {
            self.settings.first_data_row = row + 1;
        }
    }

    /// Sets the regulator's id column and identifier system.
    pub fn set_regulator(&mut self, id_column: usize, system: SystemSource) {
        self.settings.regulator_id_column = id_column;
        self.settings.regulator_system = system;
    }

    /// Sets the target's id column and identifier system.
    pub fn set_target(&mut self, id_column: usize, system: SystemSource) {
        self.settings.target_id_column = id_column;
        self.settings.target_system = system;
    }

    /// Enables (or with `None`, disables) the reference column.
    pub const fn set_reference_column(&mut self, column: Option<usize>) {
        self.settings.reference_column = column;
    }

    /// Column names from the current header lines.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.sample.column_names(self.settings.header_rows())
    }

    /// What `column` is used for.
    #[must_use]
    pub fn column_type(&self, column: usize) -> ColumnType {
        self.settings.column_type(column)
    }

    /// Infers column roles from the sample.
    #[must_use]
    pub fn guess(&self, catalog: &DataSourceCatalog) -> Guess {
        self.sample.guess(self.settings.header_rows(), catalog)
    }

    /// Applies a guess to the settings.
    ///
    /// Columns named after an identifier system's full name take priority:
    /// the first becomes the regulator id column and the second the target
    /// id column, each with that fixed system. With fewer than two such
    /// columns the regulator id column becomes the guessed id column, and
    /// both roles take their system from the guessed system-code column or,
    /// failing that, the guessed fixed system. A guessed reference column is
    /// enabled.
    pub fn apply_guess(&mut self, guess: &Guess, catalog: &DataSourceCatalog) {
        let names = self.column_names();
        let mut named = 0;
        for (column, name) in names.iter().enumerate() {
            let Some(source) = catalog.by_full_name(name) else {
                continue;
            };
            named += 1;
            let system = SystemSource::Fixed(source.system_code().clone());
            match named {
                1 => self.set_regulator(column, system),
                2 => self.set_target(column, system),
                _ => {}
            }
        }

        if named < 2 {
            let system = guess
                .system_code_column
                .map(SystemSource::Column)
                .or_else(|| guess.data_source.clone().map(SystemSource::Fixed));
            if let Some(system) = system {
                self.settings.regulator_system = system.clone();
                self.settings.target_system = system;
            }
            self.settings.regulator_id_column = guess.id_column;
        }

        if guess.reference_column.is_some() {
            self.set_reference_column(guess.reference_column);
        }
        debug!(path = %self.path.display(), ?guess, settings = ?self.settings, "applied guess");
    }

    /// Checks that the settings can be used on this file.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] if the delimiter is empty or a role column
    /// lies beyond the widest sample line.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.settings.delimiter.is_empty() {
            return Err(SettingsError::EmptyDelimiter);
        }
        if self.sample.is_empty() {
            return Ok(());
        }
        let columns = self.sample.max_columns();
        for (role, column) in self.settings.role_columns() {
            if column >= columns {
                return Err(SettingsError::ColumnOutOfRange {
                    role,
                    column,
                    columns,
                });
            }
        }
        Ok(())
    }
}
