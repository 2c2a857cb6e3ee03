//! The build pass: reading interaction files into the graph.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use serde::Serialize;
use tracing::{debug, info, instrument, trace, warn};

use super::{
    import_config::{ColumnType, ImportConfig, ImportSettings, SettingsError, SystemSource},
    interpret::{column_label, lossy_lines, split_row},
    shared::SharedGraph,
};
use crate::{
    domain::{
        FileRef, FileStatus, InteractionGraph, MergeOutcome, MiscTable, ParsedRow, SystemCode,
        Xref,
    },
    mapping::{ConfigurationError, MappingError, Resolver},
};

/// A flag that asks a running import to stop at the next row.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counts for one imported file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    /// The file.
    pub path: PathBuf,
    /// Data lines read.
    pub rows_read: usize,
    /// Data lines skipped as malformed.
    pub rows_skipped: usize,
    /// Interactions created.
    pub created: usize,
    /// Rows merged into existing interactions.
    pub merged: usize,
    /// Whether every line was processed.
    pub status: FileStatus,
}

/// Progress of an import, in the order it happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportEvent {
    /// A file is about to be read.
    FileStarted {
        /// The file.
        path: PathBuf,
    },
    /// More data lines of the current file were read.
    Progress {
        /// The file.
        path: PathBuf,
        /// Data lines read from it so far.
        rows: usize,
    },
    /// A file was merged into the graph.
    FileFinished(FileReport),
    /// A file could not be imported; the graph does not contain any of it.
    FileFailed {
        /// The file.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },
}

/// Why a row was not imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSkip {
    /// The row has fewer cells than the widest sample line.
    Short,
    /// The regulator or target id cell is empty.
    EmptyId,
    /// A system-code cell does not hold a usable system code.
    InvalidSystem,
}

/// Errors that abort the import of a file.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// No identifier mapping is configured.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The file's settings cannot be used.
    #[error("invalid import settings for {}", path.display())]
    Settings {
        /// The file.
        path: PathBuf,
        /// The problem.
        #[source]
        source: SettingsError,
    },

    /// The file could not be read.
    #[error("failed to read {}", path.display())]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Identifier resolution failed part-way through the file.
    #[error("identifier mapping failed while importing {}", path.display())]
    Mapping {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: MappingError,
    },
}

/// The result of importing one file.
#[derive(Debug)]
pub struct FileOutcome {
    /// The settings the file was imported with.
    pub config: ImportConfig,
    /// The report, or why the file failed.
    pub result: Result<FileReport, ImportError>,
}

/// The result of importing a batch of files.
#[derive(Debug)]
pub struct ImportSummary {
    /// One outcome per file that was attempted, in order.
    pub files: Vec<FileOutcome>,
    /// Files never attempted because the import was cancelled.
    pub not_started: Vec<ImportConfig>,
    /// Whether the import was cancelled.
    pub cancelled: bool,
    /// Wall-clock time taken.
    pub elapsed: Duration,
}

impl ImportSummary {
    /// Reports of the files that were merged.
    pub fn reports(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter_map(|f| f.result.as_ref().ok())
    }

    /// The files that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &ImportError)> {
        self.files
            .iter()
            .filter_map(|f| f.result.as_ref().err().map(|e| (f.config.path(), e)))
    }
}

/// Reads interaction files into a graph.
#[derive(Debug, Clone)]
pub struct Importer<'a> {
    resolver: &'a Resolver,
    progress_interval: usize,
    cancel: CancelFlag,
}

impl<'a> Importer<'a> {
    /// Creates an importer that resolves identifiers through `resolver`.
    #[must_use]
    pub fn new(resolver: &'a Resolver) -> Self {
        Self {
            resolver,
            progress_interval: 50,
            cancel: CancelFlag::new(),
        }
    }

    /// Sets how many data lines pass between progress events.
    #[must_use]
    pub fn with_progress_interval(mut self, rows: usize) -> Self {
        self.progress_interval = rows.max(1);
        self
    }

    /// Uses `cancel` to stop the import.
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Imports `configs` one after the other into `shared`.
    ///
    /// Each file is built on a working copy and published when it is done,
    /// or when the import is cancelled part-way through it. A file that fails
    /// leaves the graph as it was, and the remaining files are still
    /// imported.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if no identifier mapping is configured.
    /// Nothing is imported in that case.
    pub fn import_all(
        &self,
        shared: &SharedGraph,
        configs: Vec<ImportConfig>,
        mut on_event: impl FnMut(ImportEvent),
    ) -> Result<ImportSummary, ConfigurationError> {
        self.resolver.ensure_configured()?;
        let started = Instant::now();
        let mut files = Vec::with_capacity(configs.len());
        let mut pending = configs.into_iter();

        for config in pending.by_ref() {
            let mut writer = shared.writer();
            let result = self.import_file(&mut writer, &config, &mut on_event);
            match &result {
                Ok(report) => {
                    writer.publish();
                    on_event(ImportEvent::FileFinished(report.clone()));
                }
                Err(error) => {
                    drop(writer);
                    warn!("{}", error_chain(error));
                    on_event(ImportEvent::FileFailed {
                        path: config.path().to_path_buf(),
                        message: error_chain(error),
                    });
                }
            }
            files.push(FileOutcome { config, result });
            if self.cancel.is_cancelled() {
                break;
            }
        }

        let not_started: Vec<_> = pending.collect();
        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            info!(skipped = not_started.len(), "import cancelled");
        }
        Ok(ImportSummary {
            files,
            not_started,
            cancelled,
            elapsed: started.elapsed(),
        })
    }

    /// Reads the file described by `config` and merges its rows into
    /// `graph`.
    ///
    /// Rows are merged strictly in file order. Malformed rows are skipped and
    /// counted. If cancellation is requested, the rows merged so far stay in
    /// the graph and the file is recorded as [`FileStatus::Partial`].
    ///
    /// # Errors
    ///
    /// Returns an error if no identifier mapping is configured, the settings
    /// are invalid, the file cannot be read, or identifier mapping fails. On
    /// error `graph` may hold some of the file's rows; callers working on a
    /// shared graph should discard it.
    #[instrument(skip_all, fields(path = %config.path().display()))]
    pub fn import_file(
        &self,
        graph: &mut InteractionGraph,
        config: &ImportConfig,
        on_event: &mut dyn FnMut(ImportEvent),
    ) -> Result<FileReport, ImportError> {
        self.resolver.ensure_configured()?;
        let path = config.path();
        config.validate().map_err(|source| ImportError::Settings {
            path: path.to_path_buf(),
            source,
        })?;

        let io_error = |source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        };
        let reader = BufReader::new(File::open(path).map_err(io_error)?);

        on_event(ImportEvent::FileStarted {
            path: path.to_path_buf(),
        });
        info!("importing");

        let layout = RowLayout::new(config);
        let file: FileRef = Arc::from(path);
        let mut report = FileReport {
            path: path.to_path_buf(),
            rows_read: 0,
            rows_skipped: 0,
            created: 0,
            merged: 0,
            status: FileStatus::Complete,
        };

        for (index, line) in lossy_lines(reader).enumerate() {
            if self.cancel.is_cancelled() {
                report.status = FileStatus::Partial;
                break;
            }
            let line = line.map_err(io_error)?;
            if !config.settings().is_data_row(index) {
                continue;
            }

            report.rows_read += 1;
            if report.rows_read % self.progress_interval == 0 {
                on_event(ImportEvent::Progress {
                    path: path.to_path_buf(),
                    rows: report.rows_read,
                });
            }

            let row = match layout.parse(&split_row(&line, &config.settings().delimiter)) {
                Ok(row) => row,
                Err(reason) => {
                    trace!(line = index + 1, ?reason, "skipping row");
                    report.rows_skipped += 1;
                    continue;
                }
            };

            graph.register_system(row.regulator.system());
            graph.register_system(row.target.system());
            let mapping_error = |source| ImportError::Mapping {
                path: path.to_path_buf(),
                source,
            };
            let regulators = self
                .resolver
                .resolve(&row.regulator, graph.used_systems())
                .map_err(mapping_error)?;
            let targets = self
                .resolver
                .resolve(&row.target, graph.used_systems())
                .map_err(mapping_error)?;

            match graph.merge(row, &file, &regulators, &targets) {
                MergeOutcome::Created(_) => report.created += 1,
                MergeOutcome::Merged(_) => report.merged += 1,
            }
        }

        graph.record_file(file, report.status);
        info!(
            rows = report.rows_read,
            skipped = report.rows_skipped,
            created = report.created,
            merged = report.merged,
            status = ?report.status,
            "imported"
        );
        Ok(report)
    }
}

/// Everything needed to turn the cells of a data line into a [`ParsedRow`].
#[derive(Debug)]
struct RowLayout<'c> {
    settings: &'c ImportSettings,
    min_cells: usize,
    names: Vec<String>,
}

impl<'c> RowLayout<'c> {
    fn new(config: &'c ImportConfig) -> Self {
        let layout = Self {
            settings: config.settings(),
            min_cells: config.sample().max_columns(),
            names: config.column_names(),
        };
        debug!(min_cells = layout.min_cells, columns = ?layout.names, "row layout");
        layout
    }

    fn parse(&self, cells: &[&str]) -> Result<ParsedRow, RowSkip> {
        if cells.len() < self.min_cells {
            return Err(RowSkip::Short);
        }
        let settings = self.settings;
        let regulator = xref(
            cells,
            settings.regulator_id_column,
            &settings.regulator_system,
        )?;
        let target = xref(cells, settings.target_id_column, &settings.target_system)?;

        let reference = settings
            .reference_column
            .and_then(|column| cells.get(column))
            .map(|cell| cell.trim().to_string())
            .filter(|cell| !cell.is_empty());

        let misc: MiscTable = (0..self.min_cells.max(self.names.len()))
            .filter(|&column| settings.column_type(column) == ColumnType::Other)
            .filter_map(|column| {
                let value = cells.get(column)?;
                let name = self
                    .names
                    .get(column)
                    .cloned()
                    .unwrap_or_else(|| column_label(column));
                Some((name, (*value).to_string()))
            })
            .collect();

        Ok(ParsedRow {
            regulator,
            target,
            reference,
            misc: (!misc.is_empty()).then_some(misc),
        })
    }
}

fn xref(cells: &[&str], id_column: usize, system: &SystemSource) -> Result<Xref, RowSkip> {
    let id = cells.get(id_column).map_or("", |cell| cell.trim());
    if id.is_empty() {
        return Err(RowSkip::EmptyId);
    }
    let system = match system {
        SystemSource::Fixed(code) => code.clone(),
        SystemSource::Column(column) => cells
            .get(*column)
            .and_then(|cell| SystemCode::new(cell.trim()).ok())
            .ok_or(RowSkip::InvalidSystem)?,
    };
    Xref::new(id, system).map_err(|_| RowSkip::EmptyId)
}

/// Formats `error` followed by each of its sources, separated by `: `.
#[must_use]
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
