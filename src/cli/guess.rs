use std::path::{Path, PathBuf};

use clap::Parser;
use regint::{
    Config, ImportConfig,
    domain::DataSourceCatalog,
    ingest::{
        ColumnType, Guess as ColumnGuess, ImportSettings, SystemSource, interpret::column_letters,
    },
};
use serde::Serialize;
use tracing::instrument;

use super::{
    columns::ColumnArgs,
    terminal::{Colorize, is_narrow},
};

/// Command arguments for `regint guess`.
#[derive(Debug, Parser)]
#[command(about = "Show how the columns of an interaction file would be read")]
pub struct Guess {
    /// The interaction file to inspect.
    file: PathBuf,

    #[command(flatten)]
    columns: ColumnArgs,

    /// Output format (default: pretty).
    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Serialize)]
struct ColumnReport<'a> {
    letter: String,
    name: &'a str,
    role: ColumnType,
    example: &'a str,
}

#[derive(Debug, Serialize)]
struct GuessReport<'a> {
    path: &'a Path,
    guess: &'a ColumnGuess,
    settings: &'a ImportSettings,
    columns: Vec<ColumnReport<'a>>,
    problem: Option<String>,
}

impl Guess {
    #[instrument(level = "debug", skip(self, config))]
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let catalog = config.catalog()?;
        let (import, guess) = self.columns.prepare(&self.file, config, &catalog)?;
        let names = import.column_names();
        let report = GuessReport {
            path: import.path(),
            guess: &guess,
            settings: import.settings(),
            columns: column_reports(&import, &names),
            problem: import.validate().err().map(|e| e.to_string()),
        };

        match self.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Pretty => output_pretty(&report, &catalog),
        }
        Ok(())
    }
}

fn column_reports<'a>(import: &'a ImportConfig, names: &'a [String]) -> Vec<ColumnReport<'a>> {
    let example_row = import.settings().first_data_row;
    names
        .iter()
        .enumerate()
        .map(|(column, name)| ColumnReport {
            letter: column_letters(column),
            name,
            role: import.column_type(column),
            example: import.sample().cell(example_row, column),
        })
        .collect()
}

fn role_label(role: ColumnType) -> &'static str {
    match role {
        ColumnType::RegulatorId => "regulator id",
        ColumnType::TargetId => "target id",
        ColumnType::Reference => "reference",
        ColumnType::RegulatorSystem => "regulator system",
        ColumnType::TargetSystem => "target system",
        ColumnType::Other => "-",
    }
}

fn system_label(system: &SystemSource, catalog: &DataSourceCatalog) -> String {
    match system {
        SystemSource::Column(column) => format!("from column {}", column_letters(*column)),
        SystemSource::Fixed(code) => catalog.get(code).map_or_else(
            || code.to_string(),
            |source| format!("{} ({code})", source.full_name()),
        ),
    }
}

fn output_pretty(report: &GuessReport<'_>, catalog: &DataSourceCatalog) {
    let settings = report.settings;
    println!("{}", report.path.display().to_string().heading());
    println!(
        "  delimiter {:?}, header lines {}..{}, data from line {}",
        settings.delimiter,
        settings.first_header_row,
        settings.first_data_row,
        settings.first_data_row
    );
    println!(
        "  regulators: column {}, {}",
        column_letters(settings.regulator_id_column),
        system_label(&settings.regulator_system, catalog)
    );
    println!(
        "  targets:    column {}, {}",
        column_letters(settings.target_id_column),
        system_label(&settings.target_system, catalog)
    );
    println!();

    let narrow = is_narrow();
    for column in &report.columns {
        let role = role_label(column.role);
        let role = if column.role == ColumnType::Other {
            role.dim()
        } else {
            role.info()
        };
        if narrow {
            println!("  {:<3} {:<20} {role}", column.letter, column.name);
        } else {
            println!(
                "  {:<3} {:<24} {:<18} {}",
                column.letter,
                column.name,
                role,
                column.example.dim()
            );
        }
    }

    if let Some(problem) = &report.problem {
        println!();
        println!("{}", format!("⚠️  {problem}").warning());
    }
}
