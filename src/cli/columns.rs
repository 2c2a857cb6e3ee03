use std::path::Path;

use anyhow::Context;
use clap::Args;
use regint::{
    Config, ImportConfig, SystemCode,
    domain::DataSourceCatalog,
    ingest::{Guess, SystemSource},
};
use tracing::debug;

/// Overrides for the inferred column layout of interaction files.
///
/// Columns are named by their spreadsheet letters (`A`, `B`, …, `AA`), as
/// shown by `regint guess`.
#[derive(Debug, Clone, Default, Args)]
pub struct ColumnArgs {
    /// Cell delimiter: `tab`, `comma`, `semicolon`, `space` or a literal
    /// string.
    #[arg(long, short, value_parser = parse_delimiter)]
    delimiter: Option<String>,

    /// First header line (zero-based).
    #[arg(long, value_name = "ROW")]
    header_row: Option<usize>,

    /// First data line (zero-based).
    #[arg(long, value_name = "ROW")]
    data_row: Option<usize>,

    /// Column holding regulator identifiers.
    #[arg(long, value_name = "COLUMN", value_parser = parse_column)]
    regulator_column: Option<usize>,

    /// Identifier system of regulators: a system code such as `L`, or
    /// `col:COLUMN` for a column of system codes.
    #[arg(long, value_name = "SYSTEM", value_parser = parse_system)]
    regulator_system: Option<SystemSource>,

    /// Column holding target identifiers.
    #[arg(long, value_name = "COLUMN", value_parser = parse_column)]
    target_column: Option<usize>,

    /// Identifier system of targets: a system code such as `L`, or
    /// `col:COLUMN` for a column of system codes.
    #[arg(long, value_name = "SYSTEM", value_parser = parse_system)]
    target_system: Option<SystemSource>,

    /// Column holding publication references.
    #[arg(long, value_name = "COLUMN", value_parser = parse_column)]
    reference_column: Option<usize>,

    /// Ignore any guessed reference column.
    #[arg(long, conflicts_with = "reference_column")]
    no_reference: bool,
}

impl ColumnArgs {
    /// Opens `path`, guesses its layout and applies these overrides on top.
    pub fn prepare(
        &self,
        path: &Path,
        config: &Config,
        catalog: &DataSourceCatalog,
    ) -> anyhow::Result<(ImportConfig, Guess)> {
        let delimiter = self.delimiter.as_deref().unwrap_or(&config.delimiter);
        let mut import = ImportConfig::open(path, delimiter, config.sample_lines)
            .with_context(|| format!("failed to sample {}", path.display()))?;
        if let Some(row) = self.header_row {
            import.set_first_header_row(row);
        }
        if let Some(row) = self.data_row {
            import.set_first_data_row(row);
        }

        let guess = import.guess(catalog);
        import.apply_guess(&guess, catalog);
        self.apply(&mut import);
        debug!(path = %path.display(), settings = ?import.settings(), "prepared file");
        Ok((import, guess))
    }

    fn apply(&self, import: &mut ImportConfig) {
        let settings = import.settings().clone();
        if self.regulator_column.is_some() || self.regulator_system.is_some() {
            import.set_regulator(
                self.regulator_column
                    .unwrap_or(settings.regulator_id_column),
                self.regulator_system
                    .clone()
                    .unwrap_or(settings.regulator_system),
            );
        }
        if self.target_column.is_some() || self.target_system.is_some() {
            import.set_target(
                self.target_column.unwrap_or(settings.target_id_column),
                self.target_system.clone().unwrap_or(settings.target_system),
            );
        }
        if self.no_reference {
            import.set_reference_column(None);
        } else if self.reference_column.is_some() {
            import.set_reference_column(self.reference_column);
        }
    }
}

fn parse_delimiter(s: &str) -> Result<String, String> {
    match s.to_ascii_lowercase().as_str() {
        "" => Err("the delimiter must not be empty".to_string()),
        "tab" | "\\t" => Ok("\t".to_string()),
        "comma" => Ok(",".to_string()),
        "semicolon" => Ok(";".to_string()),
        "space" => Ok(" ".to_string()),
        _ => Ok(s.to_string()),
    }
}

/// Parses a spreadsheet column label (`A`, `b`, `AA`) into a zero-based
/// index.
fn parse_column(s: &str) -> Result<usize, String> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(format!("'{s}' is not a column letter (A, B, …, AA)"));
    }
    let mut index: usize = 0;
    for c in s.to_ascii_uppercase().bytes() {
        index = index
            .checked_mul(26)
            .and_then(|i| i.checked_add(usize::from(c - b'A') + 1))
            .ok_or_else(|| format!("column '{s}' is out of range"))?;
    }
    Ok(index - 1)
}

fn parse_system(s: &str) -> Result<SystemSource, String> {
    if let Some(column) = s.strip_prefix("col:") {
        return parse_column(column).map(SystemSource::Column);
    }
    SystemCode::new(s)
        .map(SystemSource::Fixed)
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use regint::ingest::interpret::column_letters;
    use test_case::test_case;

    use super::*;

    #[test_case("A", 0)]
    #[test_case("b", 1)]
    #[test_case("Z", 25)]
    #[test_case("AA", 26)]
    #[test_case("AZ", 51)]
    fn column_letters_parse(label: &str, index: usize) {
        assert_eq!(parse_column(label).unwrap(), index);
        assert_eq!(column_letters(index), label.to_ascii_uppercase());
    }

    #[test_case(""; "empty")]
    #[test_case("1"; "digit")]
    #[test_case("A1"; "mixed")]
    fn bad_column_labels_are_rejected(label: &str) {
        assert!(parse_column(label).is_err());
    }

    #[test_case("tab", "\t")]
    #[test_case("TAB", "\t")]
    #[test_case("comma", ",")]
    #[test_case("semicolon", ";")]
    #[test_case("|", "|")]
    #[test_case("::", "::")]
    fn delimiter_aliases(input: &str, expected: &str) {
        assert_eq!(parse_delimiter(input).unwrap(), expected);
    }

    #[test]
    fn empty_delimiter_is_rejected() {
        assert!(parse_delimiter("").is_err());
    }

    #[test]
    fn system_is_a_code_or_a_column() {
        assert_eq!(parse_system("col:C").unwrap(), SystemSource::Column(2));
        assert_eq!(
            parse_system("En").unwrap(),
            SystemSource::Fixed(SystemCode::new("En").unwrap())
        );
        assert!(parse_system("col:").is_err());
        assert!(parse_system("").is_err());
    }

    #[test]
    fn overrides_win_over_the_guess() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "Entrez Gene,Ensembl,PMID\n7157,ENSG00000141510,123\n").unwrap();
        let catalog = DataSourceCatalog::builtin();
        let args = ColumnArgs {
            delimiter: Some(",".to_string()),
            target_column: Some(0),
            no_reference: true,
            ..ColumnArgs::default()
        };

        let (import, guess) = args.prepare(&path, &Config::default(), &catalog).unwrap();

        assert_eq!(guess.reference_column, Some(2));
        let settings = import.settings();
        assert_eq!(settings.delimiter, ",");
        assert_eq!(settings.regulator_id_column, 0);
        assert_eq!(settings.target_id_column, 0);
        assert_eq!(
            settings.target_system,
            SystemSource::Fixed(SystemCode::new("En").unwrap())
        );
        assert_eq!(settings.reference_column, None);
    }

    #[test]
    fn header_and_data_rows_apply_before_guessing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "# exported\nRegulator\tTarget\n7157\t1026\n").unwrap();
        let args = ColumnArgs {
            header_row: Some(1),
            data_row: Some(2),
            ..ColumnArgs::default()
        };

        let (import, _) = args
            .prepare(&path, &Config::default(), &DataSourceCatalog::builtin())
            .unwrap();

        assert_eq!(import.column_names(), ["Regulator", "Target"]);
    }
}
