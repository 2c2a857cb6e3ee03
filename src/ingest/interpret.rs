//! Column inference from a text sample.
//!
//! A [`Sample`] is the first few lines of an interaction file split into
//! cells. From it we derive column names and a [`Guess`] of which columns
//! hold identifiers, system codes and publication references.

use std::{
    collections::HashSet,
    io::{self, BufRead},
    ops::Range,
    sync::LazyLock,
};

use regex::Regex;
use serde::Serialize;

use crate::domain::{DataSourceCatalog, SystemCode};

/// Minimum fraction of sample rows whose cell in a column must look like a
/// system code for the column to be taken as a system-code column.
pub const GOOD_GUESS_FRACTION: f64 = 0.9;

/// How many times more pattern hits the best identifier column needs than
/// the runner-up column before it is picked over column 0.
pub const OUTLIER_FACTOR: f64 = 2.0;

/// Column names (compared ignoring case) that mark a publication-reference
/// column.
pub const REFERENCE_COLUMN_NAMES: &[&str] = &["PMID", "PubMed", "PubMed ID"];

static SYSTEM_CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][a-z]?$").expect("system code pattern compiles")
});

/// Splits a line into cells on the literal `delimiter`.
///
/// Trailing empty cells are dropped, so a line made only of delimiters has
/// no cells. A line without the delimiter is a single cell.
#[must_use]
pub fn split_row<'a>(line: &'a str, delimiter: &str) -> Vec<&'a str> {
    if delimiter.is_empty() {
        return if line.is_empty() { Vec::new() } else { vec![line] };
    }
    let mut cells: Vec<&str> = line.split(delimiter).collect();
    while cells.last().is_some_and(|cell| cell.is_empty()) {
        cells.pop();
    }
    cells
}

/// The spreadsheet-style label of a zero-based column index: `A`, `B`, …,
/// `Z`, `AA`, `AB`, ….
#[must_use]
pub fn column_letters(index: usize) -> String {
    let mut letters = Vec::new();
    let mut remaining = index + 1;
    while remaining > 0 {
        remaining -= 1;
        let offset = u8::try_from(remaining % 26).unwrap_or_default();
        letters.push(char::from(b'A' + offset));
        remaining /= 26;
    }
    letters.iter().rev().collect()
}

/// The default name of a column: `Column A`, `Column B`, ….
#[must_use]
pub fn column_label(index: usize) -> String {
    format!("Column {}", column_letters(index))
}

/// What the interpreter inferred about a file's columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Guess {
    /// The column that holds per-row system codes, if there is one.
    pub system_code_column: Option<usize>,
    /// The column most likely to hold identifiers, or 0 when no column stands
    /// out.
    pub id_column: usize,
    /// The identifier system whose pattern matched most often.
    pub data_source: Option<SystemCode>,
    /// The column whose name marks it as a publication reference.
    pub reference_column: Option<usize>,
}

/// Iterates over the lines of `reader` like [`BufRead::lines`], but replaces
/// invalid UTF-8 with `U+FFFD` instead of failing.
///
/// Exports in legacy encodings carry such bytes in free-text columns.
pub fn lossy_lines<R: BufRead>(reader: R) -> LossyLines<R> {
    LossyLines {
        reader,
        buf: Vec::new(),
    }
}

/// Iterator returned by [`lossy_lines`].
#[derive(Debug)]
pub struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.ends_with(b"\n") {
                    self.buf.pop();
                    if self.buf.ends_with(b"\r") {
                        self.buf.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(error) => Some(Err(error)),
        }
    }
}

/// The leading lines of a file, split into cells.
#[derive(Debug, Clone)]
pub struct Sample {
    lines: Vec<String>,
    rows: Vec<Vec<String>>,
    max_columns: usize,
}

impl Sample {
    /// Reads up to `limit` lines from `reader`.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    pub fn read_lines(reader: impl BufRead, limit: usize) -> io::Result<Vec<String>> {
        lossy_lines(reader).take(limit).collect()
    }

    /// Splits `lines` on `delimiter`.
    #[must_use]
    pub fn new(lines: Vec<String>, delimiter: &str) -> Self {
        let mut sample = Self {
            lines,
            rows: Vec::new(),
            max_columns: 0,
        };
        sample.split(delimiter);
        sample
    }

    /// Re-splits the sample on a different delimiter.
    pub fn split(&mut self, delimiter: &str) {
        self.rows = self
            .lines
            .iter()
            .map(|line| {
                split_row(line, delimiter)
                    .into_iter()
                    .map(str::to_string)
                    .collect()
            })
            .collect();
        self.max_columns = self.rows.iter().map(Vec::len).max().unwrap_or(0);
    }

    /// Number of lines in the sample.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the sample has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The largest number of cells on any sample line.
    #[must_use]
    pub const fn max_columns(&self) -> usize {
        self.max_columns
    }

    /// The cells of one line.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[String]> {
        self.rows.get(row).map(Vec::as_slice)
    }

    /// One cell, or the empty string if the line is short.
    #[must_use]
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map_or("", String::as_str)
    }

    /// Column names built from the header lines in `header`.
    ///
    /// Each name is the space-joined, trimmed header cells of its column.
    /// Empty and repeated names are replaced by [`column_label`].
    #[must_use]
    pub fn column_names(&self, header: Range<usize>) -> Vec<String> {
        let mut names = vec![String::new(); self.max_columns];
        let end = header.end.min(self.rows.len());
        let start = header.start.min(end);
        for cells in &self.rows[start..end] {
            for (name, cell) in names.iter_mut().zip(cells) {
                let cell = cell.trim();
                if cell.is_empty() {
                    continue;
                }
                if !name.is_empty() {
                    name.push(' ');
                }
                name.push_str(cell);
            }
        }

        let mut seen = HashSet::new();
        for (index, name) in names.iter_mut().enumerate() {
            if name.is_empty() || seen.contains(name.as_str()) {
                *name = column_label(index);
            }
            seen.insert(name.clone());
        }
        names
    }

    /// Guesses column roles from the sample.
    ///
    /// Every sample line counts, header lines included. Column names (and so
    /// the reference column) come from the lines in `header`.
    #[must_use]
    pub fn guess(&self, header: Range<usize>, catalog: &DataSourceCatalog) -> Guess {
        let (id_column, data_source) = self.guess_id_column(catalog);
        Guess {
            system_code_column: self.guess_system_code_column(),
            id_column,
            data_source,
            reference_column: guess_reference_column(&self.column_names(header)),
        }
    }

    fn column_hits(&self, column: usize, matches: impl Fn(&str) -> bool) -> usize {
        self.rows
            .iter()
            .filter(|cells| cells.get(column).is_some_and(|cell| matches(cell)))
            .count()
    }

    fn guess_system_code_column(&self) -> Option<usize> {
        if self.rows.is_empty() {
            return None;
        }
        let mut best: Option<(usize, usize)> = None;
        for column in 0..self.max_columns {
            let hits = self.column_hits(column, |cell| SYSTEM_CODE_PATTERN.is_match(cell));
            if best.is_none_or(|(_, most)| hits > most) {
                best = Some((column, hits));
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let fraction = |hits: usize| hits as f64 / self.rows.len() as f64;
        best.filter(|&(_, hits)| fraction(hits) >= GOOD_GUESS_FRACTION)
            .map(|(column, _)| column)
    }

    /// The guessed id column and the data source that matched it best.
    fn guess_id_column(&self, catalog: &DataSourceCatalog) -> (usize, Option<SystemCode>) {
        // best hit count per column, with the first data source reaching it
        let per_column: Vec<(usize, Option<&SystemCode>)> = (0..self.max_columns)
            .map(|column| {
                catalog
                    .patterned()
                    .fold((0, None), |(most, code), source| {
                        let hits = self.column_hits(column, |cell| source.matches(cell));
                        if hits > most {
                            (hits, Some(source.system_code()))
                        } else {
                            (most, code)
                        }
                    })
            })
            .collect();

        let mut best_column = 0;
        let mut best_hits = 0;
        let mut best_code = None;
        for (column, &(hits, code)) in per_column.iter().enumerate() {
            if hits > best_hits {
                best_column = column;
                best_hits = hits;
                best_code = code;
            }
        }
        if best_hits == 0 {
            return (0, None);
        }

        let runner_up = per_column
            .iter()
            .enumerate()
            .filter(|(column, _)| *column != best_column)
            .map(|(_, (hits, _))| *hits)
            .max()
            .unwrap_or(0);

        #[allow(clippy::cast_precision_loss)]
        let is_outlier = best_hits as f64 > OUTLIER_FACTOR * runner_up as f64;
        let column = if is_outlier { best_column } else { 0 };
        (column, best_code.cloned())
    }
}

/// The last column whose name is in [`REFERENCE_COLUMN_NAMES`].
fn guess_reference_column(names: &[String]) -> Option<usize> {
    names.iter().rposition(|name| {
        REFERENCE_COLUMN_NAMES
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(name))
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use test_case::test_case;

    use super::*;

    fn lines(rows: impl IntoIterator<Item = String>) -> Vec<String> {
        rows.into_iter().collect()
    }

    #[test_case("a\tb\tc", &["a", "b", "c"]; "plain")]
    #[test_case("a\t\tc", &["a", "", "c"]; "inner empty kept")]
    #[test_case("a\tb\t\t", &["a", "b"]; "trailing empties dropped")]
    #[test_case("\t\t", &[]; "only delimiters")]
    #[test_case("abc", &["abc"]; "no delimiter")]
    #[test_case("", &[]; "empty line")]
    fn split_row_cases(line: &str, expected: &[&str]) {
        assert_eq!(split_row(line, "\t"), expected);
    }

    #[test]
    fn split_row_uses_literal_delimiter() {
        assert_eq!(split_row("a.b|c", "|"), ["a.b", "c"]);
        assert_eq!(split_row("a::b::c", "::"), ["a", "b", "c"]);
    }

    #[test_case(0 => "A")]
    #[test_case(1 => "B")]
    #[test_case(25 => "Z")]
    #[test_case(26 => "AA")]
    #[test_case(27 => "AB")]
    #[test_case(701 => "ZZ")]
    #[test_case(702 => "AAA")]
    fn letters(index: usize) -> String {
        column_letters(index)
    }

    #[test]
    fn sample_tracks_widest_row() {
        let sample = Sample::new(lines(["a\tb".into(), "a\tb\tc".into(), "a".into()]), "\t");
        assert_eq!(sample.max_columns(), 3);
        assert_eq!(sample.cell(2, 1), "");
        assert_eq!(sample.cell(1, 2), "c");
    }

    #[test]
    fn resplitting_changes_columns() {
        let mut sample = Sample::new(lines(["a,b,c".into()]), "\t");
        assert_eq!(sample.max_columns(), 1);
        sample.split(",");
        assert_eq!(sample.max_columns(), 3);
    }

    #[test]
    fn read_lines_stops_at_limit() {
        let text = (0..100).map(|i| format!("{i}\n")).collect::<String>();
        let read = Sample::read_lines(Cursor::new(text), 50).unwrap();
        assert_eq!(read.len(), 50);
        assert_eq!(read[49], "49");
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let bytes = b"1\t2\tok\r\n5\t6\tTNF-\xe1 binding\n7\t8".to_vec();
        let read = Sample::read_lines(Cursor::new(bytes), 50).unwrap();
        assert_eq!(read, ["1\t2\tok", "5\t6\tTNF-\u{FFFD} binding", "7\t8"]);
    }

    #[test]
    fn column_names_join_header_rows() {
        let sample = Sample::new(
            lines([
                "Regulator\tTarget\t\tPubMed".into(),
                "gene\tgene\t\tID".into(),
                "1\t2\tx\t123".into(),
            ]),
            "\t",
        );
        assert_eq!(
            sample.column_names(0..2),
            ["Regulator gene", "Target gene", "Column C", "PubMed ID"]
        );
    }

    #[test]
    fn no_header_gives_default_names() {
        let sample = Sample::new(lines(["1\t2".into()]), "\t");
        assert_eq!(sample.column_names(0..0), ["Column A", "Column B"]);
    }

    #[test]
    fn duplicate_names_are_replaced() {
        let sample = Sample::new(lines(["id\tid\tname".into()]), "\t");
        assert_eq!(sample.column_names(0..1), ["id", "Column B", "name"]);
    }

    fn system_code_sample(code_rows: usize, total: usize) -> Sample {
        let rows = (0..total).map(|i| {
            let code = if i < code_rows { "L" } else { "Entrez" };
            format!("{i}\t{code}")
        });
        Sample::new(lines(rows), "\t")
    }

    #[test]
    fn ninety_percent_code_column_is_found() {
        let sample = system_code_sample(45, 50);
        let guess = sample.guess(0..0, &DataSourceCatalog::builtin());
        assert_eq!(guess.system_code_column, Some(1));
    }

    #[test]
    fn eighty_eight_percent_code_column_is_rejected() {
        let sample = system_code_sample(44, 50);
        let guess = sample.guess(0..0, &DataSourceCatalog::builtin());
        assert_eq!(guess.system_code_column, None);
    }

    /// 50 rows; column 1 has `best` Ensembl ids, column 2 has `runner_up`.
    fn outlier_sample(best: usize, runner_up: usize) -> Sample {
        let rows = (0..50).map(|i| {
            let first = if i < best { "ENSG00000139618" } else { "x" };
            let second = if i < runner_up { "ENSG00000141510" } else { "y" };
            format!("row{i}\t{first}\t{second}")
        });
        Sample::new(lines(rows), "\t")
    }

    #[test]
    fn clear_outlier_column_is_picked() {
        let guess = outlier_sample(13, 6).guess(0..0, &DataSourceCatalog::builtin());
        assert_eq!(guess.id_column, 1);
        assert_eq!(guess.data_source.unwrap().as_str(), "En");
    }

    #[test]
    fn weak_outlier_falls_back_to_first_column() {
        let guess = outlier_sample(10, 6).guess(0..0, &DataSourceCatalog::builtin());
        assert_eq!(guess.id_column, 0);
        assert_eq!(guess.data_source.unwrap().as_str(), "En");
    }

    #[test]
    fn no_hits_means_no_data_source() {
        let sample = Sample::new(lines(["foo\tbar".into(), "baz\tqux".into()]), "\t");
        let guess = sample.guess(0..1, &DataSourceCatalog::builtin());
        assert_eq!(guess.id_column, 0);
        assert_eq!(guess.data_source, None);
    }

    #[test]
    fn last_reference_column_wins() {
        let sample = Sample::new(
            lines(["pmid\tgene\tPubMed ID\tnote".into(), "1\t2\t3\t4".into()]),
            "\t",
        );
        let guess = sample.guess(0..1, &DataSourceCatalog::builtin());
        assert_eq!(guess.reference_column, Some(2));
    }

    #[test]
    fn empty_sample_guesses_nothing() {
        let sample = Sample::new(Vec::new(), "\t");
        let guess = sample.guess(0..1, &DataSourceCatalog::builtin());
        assert_eq!(
            guess,
            Guess {
                system_code_column: None,
                id_column: 0,
                data_source: None,
                reference_column: None,
            }
        );
    }
}
