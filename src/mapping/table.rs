use std::{
    collections::{BTreeSet, HashMap},
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use tracing::debug;

use super::{IdMapper, MappingError};
use crate::domain::{SystemCode, Xref};

/// An identifier mapper backed by an equivalence table.
///
/// On disk the table is delimiter-separated text. The first non-comment line
/// names the identifier system of each column; every following line is one
/// entity, and a cell may list several ids separated by `,` or `;`. Lines
/// starting with `#` and blank lines are ignored.
///
/// ```text
/// L      En                 S
/// 672    ENSG00000012048    P38398
/// 7157   ENSG00000141510    P04637;Q53GA5
/// ```
#[derive(Debug, Clone)]
pub struct TableMapper {
    name: String,
    groups: Vec<Vec<Xref>>,
    index: HashMap<Xref, Vec<usize>>,
}

impl TableMapper {
    /// Builds a mapper from explicit groups of equivalent identifiers.
    pub fn from_groups<G>(groups: impl IntoIterator<Item = G>) -> Self
    where
        G: IntoIterator<Item = Xref>,
    {
        let mut mapper = Self {
            name: "table".to_string(),
            groups: Vec::new(),
            index: HashMap::new(),
        };
        for group in groups {
            mapper.add_group(group.into_iter().collect());
        }
        mapper
    }

    /// Loads a table from disk.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::Io`] if the file cannot be read and
    /// [`MappingError::Format`] if it is malformed.
    pub fn load(path: &Path, delimiter: &str) -> Result<Self, MappingError> {
        let file = File::open(path).map_err(|source| MappingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut mapper = Self::parse(BufReader::new(file), delimiter, path)?;
        mapper.name = path.display().to_string();
        debug!(
            path = %path.display(),
            groups = mapper.groups.len(),
            "loaded mapping table"
        );
        Ok(mapper)
    }

    /// Parses a table from `reader`. `origin` is used in error messages.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the table is malformed.
    pub fn parse(
        reader: impl BufRead,
        delimiter: &str,
        origin: &Path,
    ) -> Result<Self, MappingError> {
        let format_error = |line: usize, reason: String| MappingError::Format {
            path: origin.to_path_buf(),
            line,
            reason,
        };

        let mut mapper = Self::from_groups(Vec::<Vec<Xref>>::new());
        let mut systems: Option<Vec<SystemCode>> = None;

        for (index, line) in reader.lines().enumerate() {
            let number = index + 1;
            let line = line.map_err(|source| MappingError::Io {
                path: PathBuf::from(origin),
                source,
            })?;
            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.trim().is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some(columns) = &systems else {
                let header = trimmed
                    .split(delimiter)
                    .map(|code| SystemCode::new(code.trim()))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| format_error(number, e.to_string()))?;
                systems = Some(header);
                continue;
            };

            let cells: Vec<&str> = trimmed.split(delimiter).collect();
            if cells.len() > columns.len() {
                return Err(format_error(
                    number,
                    format!(
                        "{} cells but the header names {} systems",
                        cells.len(),
                        columns.len()
                    ),
                ));
            }

            let mut group = Vec::new();
            for (cell, system) in cells.iter().zip(columns) {
                for id in cell.split([',', ';']).map(str::trim).filter(|id| !id.is_empty()) {
                    let xref = Xref::new(id, system.clone())
                        .map_err(|e| format_error(number, e.to_string()))?;
                    group.push(xref);
                }
            }
            mapper.add_group(group);
        }

        Ok(mapper)
    }

    /// Number of entities (rows) in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether the table has no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn add_group(&mut self, group: Vec<Xref>) {
        if group.is_empty() {
            return;
        }
        let position = self.groups.len();
        for xref in &group {
            let entries = self.index.entry(xref.clone()).or_default();
            if entries.last() != Some(&position) {
                entries.push(position);
            }
        }
        self.groups.push(group);
    }
}

impl IdMapper for TableMapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn map_id(&self, xref: &Xref, systems: &[SystemCode]) -> Result<BTreeSet<Xref>, MappingError> {
        let Some(positions) = self.index.get(xref) else {
            return Ok(BTreeSet::new());
        };
        Ok(positions
            .iter()
            .flat_map(|&position| &self.groups[position])
            .filter(|member| systems.is_empty() || systems.contains(member.system()))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn xref(s: &str) -> Xref {
        s.parse().unwrap()
    }

    fn parse(text: &str) -> Result<TableMapper, MappingError> {
        TableMapper::parse(Cursor::new(text), "\t", Path::new("ids.tsv"))
    }

    #[test]
    fn rows_become_groups() {
        let mapper = parse(
            "# gene equivalences\nL\tEn\tS\n672\tENSG00000012048\tP38398\n\n7157\tENSG00000141510\tP04637;Q53GA5\n",
        )
        .unwrap();

        assert_eq!(mapper.len(), 2);
        let mapped = mapper.map_id(&xref("S:Q53GA5"), &[]).unwrap();
        assert!(mapped.contains(&xref("L:7157")));
        assert!(mapped.contains(&xref("S:P04637")));
        assert!(!mapped.contains(&xref("L:672")));
    }

    #[test]
    fn systems_restrict_results() {
        let mapper = parse("L\tEn\tS\n672\tENSG00000012048\tP38398\n").unwrap();
        let systems = [SystemCode::new("En").unwrap()];

        let mapped = mapper.map_id(&xref("L:672"), &systems).unwrap();

        assert_eq!(mapped.into_iter().collect::<Vec<_>>(), [xref("En:ENSG00000012048")]);
    }

    #[test]
    fn unknown_identifier_maps_to_nothing() {
        let mapper = parse("L\tEn\n672\tENSG00000012048\n").unwrap();
        assert!(mapper.map_id(&xref("L:1"), &[]).unwrap().is_empty());
    }

    #[test]
    fn short_rows_are_allowed() {
        let mapper = parse("L\tEn\tS\n672\n").unwrap();
        assert_eq!(mapper.len(), 1);
    }

    #[test]
    fn extra_cells_are_rejected() {
        let error = parse("L\tEn\n672\tENSG00000012048\tP38398\n").unwrap_err();
        assert!(matches!(error, MappingError::Format { line: 2, .. }));
    }

    #[test]
    fn invalid_header_is_rejected() {
        let error = parse("L\t\n").unwrap_err();
        assert!(matches!(error, MappingError::Format { line: 1, .. }));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let error = TableMapper::load(&dir.path().join("missing.tsv"), "\t").unwrap_err();
        assert!(matches!(error, MappingError::Io { .. }));
    }
}
