use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
    sync::{Arc, mpsc},
    thread::{self, JoinHandle},
};

use rayon::prelude::*;
use tracing::debug;

use super::{
    CancelFlag, ImportConfig, ImportEvent, ImportSummary, Importer, shared::SharedGraph,
};
use crate::mapping::{ConfigurationError, Resolver};

/// An import running on a background thread.
///
/// Readers keep querying the [`SharedGraph`] while the job runs; they see
/// each file once it has been published.
#[derive(Debug)]
pub struct ImportJob {
    handle: JoinHandle<Result<ImportSummary, ConfigurationError>>,
    events: mpsc::Receiver<ImportEvent>,
    cancel: CancelFlag,
}

impl ImportJob {
    /// Starts importing `configs` into `shared`.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn spawn(
        shared: Arc<SharedGraph>,
        resolver: Resolver,
        configs: Vec<ImportConfig>,
        progress_interval: usize,
    ) -> io::Result<Self> {
        let (sender, events) = mpsc::channel();
        let cancel = CancelFlag::new();
        let flag = cancel.clone();

        let handle = thread::Builder::new()
            .name("regint-import".to_string())
            .spawn(move || {
                debug!(files = configs.len(), "import worker started");
                Importer::new(&resolver)
                    .with_progress_interval(progress_interval)
                    .with_cancel_flag(flag)
                    .import_all(&shared, configs, |event| {
                        // the receiver may have gone away; the import still completes
                        let _ = sender.send(event);
                    })
            })?;

        Ok(Self {
            handle,
            events,
            cancel,
        })
    }

    /// Asks the import to stop after the current row.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A handle that cancels this job, for use from other threads.
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Progress events. The channel closes when the import ends.
    #[must_use]
    pub const fn events(&self) -> &mpsc::Receiver<ImportEvent> {
        &self.events
    }

    /// Waits for the import to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if no identifier mapping is configured.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from the worker thread.
    pub fn join(self) -> Result<ImportSummary, ConfigurationError> {
        match self.handle.join() {
            Ok(result) => result,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
}

/// Counts the data rows of each file in parallel, to size progress
/// displays.
///
/// Lines before a file's first data row are not counted, matching the
/// [`ImportEvent::Progress`] row counts. A file that cannot be read counts
/// as empty; the import itself reports the failure.
#[must_use]
pub fn count_data_rows(configs: &[ImportConfig]) -> usize {
    configs
        .par_iter()
        .map(|config| match count_file_lines(config.path()) {
            Ok(lines) => lines.saturating_sub(config.settings().first_data_row),
            Err(error) => {
                debug!(path = %config.path().display(), %error, "cannot count lines");
                0
            }
        })
        .sum()
}

fn count_file_lines(path: &Path) -> io::Result<usize> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut count = 0;
    let mut line = Vec::new();
    while reader.read_until(b'\n', &mut line)? > 0 {
        count += 1;
        line.clear();
    }
    Ok(count)
}
