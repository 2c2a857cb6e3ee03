use std::path::{Path, PathBuf};

mod columns;
mod guess;
mod query;
mod terminal;

use anyhow::Context;
use clap::ArgAction;
use guess::Guess;
use query::Query;
use regint::{Config, domain::MapperSpec};
use tracing::instrument;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The path to the configuration file
    #[arg(short, long, default_value = "regint.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);
        self.command.run(&self.config)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(true)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Write a configuration file with a mapping table entry to fill in
    Init(Init),

    /// Show how the columns of an interaction file would be read
    Guess(Guess),

    /// Import interaction files and look up identifiers
    ///
    /// Every file is sampled to guess its columns, then all files are merged
    /// into one graph on a background thread. Rows naming the same entities
    /// under different identifier systems become one interaction.
    Query(Query),
}

impl Command {
    fn run(self, config_path: &Path) -> anyhow::Result<()> {
        let load = || {
            Config::load_or_default(config_path)
                .with_context(|| format!("failed to load {}", config_path.display()))
        };
        match self {
            Self::Init(command) => command.run(config_path)?,
            Self::Guess(command) => command.run(&load()?)?,
            Self::Query(command) => command.run(&load()?)?,
        }
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Init {
    /// The identifier mapping table the configuration should point at
    #[arg(long, default_value = "mapping.tsv")]
    mapping: PathBuf,

    /// Overwrite an existing configuration file
    #[arg(long)]
    force: bool,
}

impl Init {
    #[instrument]
    fn run(self, path: &Path) -> anyhow::Result<()> {
        if path.exists() && !self.force {
            anyhow::bail!(
                "{} already exists (use --force to overwrite)",
                path.display()
            );
        }

        let config = Config {
            mappers: vec![MapperSpec::Table {
                path: self.mapping,
                delimiter: "\t".to_string(),
            }],
            ..Config::default()
        };
        config
            .save(path)
            .with_context(|| format!("failed to write {}", path.display()))?;

        println!("Wrote {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn init_writes_a_loadable_config() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("regint.toml");

        Init {
            mapping: PathBuf::from("ids.tsv"),
            force: false,
        }
        .run(&path)
        .expect("init should succeed");

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.mappers,
            [MapperSpec::Table {
                path: tmp.path().join("ids.tsv"),
                delimiter: "\t".to_string(),
            }]
        );
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("regint.toml");
        std::fs::write(&path, "").unwrap();

        let init = Init {
            mapping: PathBuf::from("ids.tsv"),
            force: false,
        };
        assert!(init.run(&path).is_err());
    }
}
