use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use regint::{
    Config, FileSelection, ImportConfig, ImportJob, Interaction, InteractionGraph, QueryResult,
    Resolver, SharedGraph, SortOrder, Xref, find_interactions,
    ingest::{FileReport, ImportEvent, ImportSummary, count_data_rows, error_chain},
};
use serde::Serialize;
use tracing::{info, instrument, warn};
use walkdir::WalkDir;

use super::{
    columns::ColumnArgs,
    terminal::{Colorize, is_narrow},
};

/// Command arguments for `regint query`.
#[derive(Debug, Parser)]
#[command(about = "Import interaction files and look up the partners of identifiers")]
pub struct Query {
    /// Interaction files, or directories to search for them.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Identifiers to look up, as CODE:ID (for example `L:7157`).
    #[arg(long, short, value_name = "CODE:ID")]
    lookup: Vec<Xref>,

    /// Only report interactions found in these files.
    #[arg(long, value_name = "FILE")]
    select: Vec<PathBuf>,

    /// Partner order (default: from the configuration).
    #[arg(long, value_enum)]
    sort: Option<SortArg>,

    /// File extensions to pick up when searching directories.
    #[arg(
        long,
        value_delimiter = ',',
        value_name = "EXT",
        default_value = "txt,tsv,tab,csv"
    )]
    extensions: Vec<String>,

    #[command(flatten)]
    columns: ColumnArgs,

    /// Output format (default: pretty).
    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,

    /// Hide the progress bar.
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum SortArg {
    Alphabetical,
    Occurrences,
}

impl From<SortArg> for SortOrder {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Alphabetical => Self::Alphabetical,
            SortArg::Occurrences => Self::Occurrences,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum FileEntry<'a> {
    Imported(&'a FileReport),
    Failed { path: &'a Path, error: String },
}

/// A file that could not be sampled, so it was never imported.
#[derive(Debug)]
struct Unreadable {
    path: PathBuf,
    error: String,
}

/// The outcome of sampling and importing every file.
#[derive(Debug)]
struct Imported {
    unreadable: Vec<Unreadable>,
    summary: ImportSummary,
    graph: Arc<InteractionGraph>,
}

#[derive(Debug, Serialize)]
struct Partner<'a> {
    xref: &'a Xref,
    files: Vec<&'a Path>,
    selected_files: usize,
    reference: Option<&'a str>,
    misc: Option<&'a [(String, String)]>,
}

#[derive(Debug, Serialize)]
struct Lookup<'a> {
    query: &'a Xref,
    found: bool,
    regulators: Vec<Partner<'a>>,
    targets: Vec<Partner<'a>>,
}

#[derive(Debug, Serialize)]
struct Output<'a> {
    files: Vec<FileEntry<'a>>,
    cancelled: bool,
    interactions: usize,
    lookups: Vec<Lookup<'a>>,
}

impl Query {
    #[instrument(level = "debug", skip(self, config))]
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let resolver =
            Resolver::from_config(config).context("failed to load identifier mappings")?;
        resolver.ensure_configured()?;
        let imported = self.import(config, &resolver)?;
        let graph = &imported.graph;

        let order = self.sort.map_or(config.sort, SortOrder::from);
        let selection = file_selection(&self.select);
        let mut lookups = Vec::with_capacity(self.lookup.len());
        for xref in &self.lookup {
            let result = find_interactions(graph, &resolver, xref, &selection)
                .with_context(|| format!("failed to look up {xref}"))?;
            lookups.push(lookup(xref, result.as_ref(), order, &selection));
        }

        match self.output {
            OutputFormat::Json => {
                let output = Output {
                    files: file_entries(&imported),
                    cancelled: imported.summary.cancelled,
                    interactions: graph.len(),
                    lookups,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Pretty => {
                output_summary(&imported);
                for found in &lookups {
                    println!();
                    output_lookup(found);
                }
            }
        }
        Ok(())
    }

    /// Samples every file and imports the readable ones on a background job.
    ///
    /// A file that cannot be sampled is reported and left out; the others
    /// are still imported.
    fn import(&self, config: &Config, resolver: &Resolver) -> anyhow::Result<Imported> {
        let catalog = config.catalog()?;
        let files = collect_files(&self.paths, &self.extensions)?;
        if files.is_empty() {
            anyhow::bail!("no interaction files found");
        }
        info!(files = files.len(), "sampling interaction files");
        let sampled: Vec<_> = files
            .par_iter()
            .map(|path| {
                self.columns
                    .prepare(path, config, &catalog)
                    .map(|(import, _)| import)
                    .map_err(|error| Unreadable {
                        path: path.clone(),
                        error: format!("{error:#}"),
                    })
            })
            .collect();
        let (configs, unreadable) = split_sampled(sampled);
        for file in &unreadable {
            warn!(path = %file.path.display(), error = %file.error, "skipping file");
        }

        let bar = self.progress_bar(count_data_rows(&configs))?;

        let shared = Arc::new(SharedGraph::new());
        let job = ImportJob::spawn(
            Arc::clone(&shared),
            resolver.clone(),
            configs,
            config.progress_interval,
        )
        .context("failed to start the import")?;
        track(&job, &bar);
        bar.finish_and_clear();
        let summary = job.join()?;

        Ok(Imported {
            unreadable,
            summary,
            graph: shared.snapshot(),
        })
    }

    fn progress_bar(&self, total: usize) -> anyhow::Result<ProgressBar> {
        if self.quiet {
            return Ok(ProgressBar::hidden());
        }
        let bar = ProgressBar::new(to_u64(total));
        bar.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} lines {wide_msg}")?
                .progress_chars("=> "),
        );
        Ok(bar)
    }
}

/// Follows the job's events until the import ends.
fn track(job: &ImportJob, bar: &ProgressBar) {
    // lines of the files already finished
    let mut done = 0;
    for event in job.events() {
        match event {
            ImportEvent::FileStarted { path } => bar.set_message(path.display().to_string()),
            ImportEvent::Progress { rows, .. } => bar.set_position(to_u64(done + rows)),
            ImportEvent::FileFinished(report) => {
                done += report.rows_read;
                bar.set_position(to_u64(done));
            }
            ImportEvent::FileFailed { path, message } => {
                bar.println(format!("⚠️  {}: {message}", path.display()).warning());
            }
        }
    }
}

fn to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

fn split_sampled(
    sampled: Vec<Result<ImportConfig, Unreadable>>,
) -> (Vec<ImportConfig>, Vec<Unreadable>) {
    let mut configs = Vec::with_capacity(sampled.len());
    let mut unreadable = Vec::new();
    for result in sampled {
        match result {
            Ok(config) => configs.push(config),
            Err(file) => unreadable.push(file),
        }
    }
    (configs, unreadable)
}

/// Resolves `.`, `..` and symlinks so that the same file named two ways
/// compares equal. Paths that do not exist are kept as given.
fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn file_selection(select: &[PathBuf]) -> FileSelection {
    if select.is_empty() {
        FileSelection::All
    } else {
        FileSelection::only(select.iter().map(|path| normalize(path)))
    }
}

/// Expands directories into the files below them with one of `extensions`.
///
/// Files named directly are always kept. Directory contents are sorted by
/// name so the import order is stable. Every path is normalized so that
/// `--select` matches it however the file is named.
fn collect_files(paths: &[PathBuf], extensions: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(normalize(path));
            continue;
        }
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry =
                entry.with_context(|| format!("failed to search {}", path.display()))?;
            let wanted = entry.path().extension().is_some_and(|ext| {
                extensions
                    .iter()
                    .any(|wanted| ext.eq_ignore_ascii_case(wanted.trim_start_matches('.')))
            });
            if entry.file_type().is_file() && wanted {
                files.push(normalize(entry.path()));
            }
        }
    }
    Ok(files)
}

fn partners<'a>(
    entries: Vec<(&'a Xref, &'a Interaction)>,
    selection: &FileSelection,
) -> Vec<Partner<'a>> {
    entries
        .into_iter()
        .map(|(xref, interaction)| Partner {
            xref,
            files: interaction.files().map(|file| &**file).collect(),
            selected_files: selection.count_in(interaction),
            reference: interaction.reference(),
            misc: interaction.misc(),
        })
        .collect()
}

fn lookup<'a>(
    query: &'a Xref,
    result: Option<&QueryResult<'a>>,
    order: SortOrder,
    selection: &FileSelection,
) -> Lookup<'a> {
    result.map_or_else(
        || Lookup {
            query,
            found: false,
            regulators: Vec::new(),
            targets: Vec::new(),
        },
        |result| Lookup {
            query,
            found: true,
            regulators: partners(result.sorted_regulators(order), selection),
            targets: partners(result.sorted_targets(order), selection),
        },
    )
}

fn file_entries(imported: &Imported) -> Vec<FileEntry<'_>> {
    let unreadable = imported.unreadable.iter().map(|file| FileEntry::Failed {
        path: &file.path,
        error: file.error.clone(),
    });
    let imported_files = imported
        .summary
        .files
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(report) => FileEntry::Imported(report),
            Err(error) => FileEntry::Failed {
                path: outcome.config.path(),
                error: error_chain(error),
            },
        });
    unreadable.chain(imported_files).collect()
}

fn output_summary(imported: &Imported) {
    let summary = &imported.summary;
    let interactions = imported.graph.len();
    for file in &imported.unreadable {
        println!("  {}", format!("⚠️  {}", file.error).warning());
    }
    for report in summary.reports() {
        let line = format!(
            "{}: {} rows, {} skipped, {} new, {} merged",
            report.path.display(),
            report.rows_read,
            report.rows_skipped,
            report.created,
            report.merged
        );
        println!("  {}", line.dim());
    }
    let failed = summary.failures().count() + imported.unreadable.len();
    let succeeded = summary.reports().count();
    let headline = format!(
        "Imported {succeeded} file(s) in {:.1?}: {interactions} interactions",
        summary.elapsed
    );
    if failed == 0 && !summary.cancelled {
        println!("{}", format!("✅ {headline}").success());
    } else {
        println!("{}", format!("⚠️  {headline}, {failed} failed").warning());
        if summary.cancelled {
            println!(
                "{}",
                format!("   cancelled; {} file(s) not started", summary.not_started.len()).warning()
            );
        }
    }
}

fn output_lookup(lookup: &Lookup<'_>) {
    let query = lookup.query.to_string();
    if !lookup.found {
        println!("{}", format!("{query}: not found").warning());
        return;
    }
    println!("{}", query.heading());
    output_partners("regulated by", &lookup.regulators);
    output_partners("regulates", &lookup.targets);
}

fn output_partners(label: &str, partners: &[Partner<'_>]) {
    println!("  {} ({})", label.info(), partners.len());
    let narrow = is_narrow();
    for partner in partners {
        let files = format!("{} file(s)", partner.selected_files);
        if narrow {
            println!("    {:<24} {}", partner.xref.to_string(), files.dim());
            continue;
        }
        let reference = partner
            .reference
            .map(|r| format!("ref {r}"))
            .unwrap_or_default();
        println!(
            "    {:<24} {:<12} {}",
            partner.xref.to_string(),
            files.dim(),
            reference.dim()
        );
    }
}
