//! Identifier systems and the patterns their ids follow.
//!
//! The [`DataSourceCatalog`] is consulted by the column interpreter (which
//! counts pattern hits per column) and by guess application (which matches
//! column names against full names). A built-in set of common gene, protein
//! and metabolite systems is always present; the configuration file may add
//! further systems or override built-in ones by system code.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::xref::{InvalidSystemCodeError, SystemCode};

/// An identifier system: a namespace of gene/protein/metabolite ids.
#[derive(Debug, Clone)]
pub struct DataSource {
    system_code: SystemCode,
    full_name: String,
    pattern: Option<Regex>,
}

impl DataSource {
    /// Creates a data source.
    ///
    /// The pattern, if any, must match a whole cell; it is anchored here so
    /// callers can write it unanchored.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Pattern`] if the pattern is not a valid regular
    /// expression.
    pub fn new(
        system_code: SystemCode,
        full_name: impl Into<String>,
        pattern: Option<&str>,
    ) -> Result<Self, CatalogError> {
        let pattern = pattern
            .map(|p| {
                Regex::new(&format!("^(?:{p})$")).map_err(|source| CatalogError::Pattern {
                    system_code: system_code.clone(),
                    source,
                })
            })
            .transpose()?;
        Ok(Self {
            system_code,
            full_name: full_name.into(),
            pattern,
        })
    }

    /// The short system code.
    #[must_use]
    pub const fn system_code(&self) -> &SystemCode {
        &self.system_code
    }

    /// The human-readable name, e.g. `Entrez Gene`.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Whether `cell` looks like an id of this system.
    ///
    /// Systems without a pattern never match.
    #[must_use]
    pub fn matches(&self, cell: &str) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.is_match(cell))
    }

    /// Whether this system has an id pattern at all.
    #[must_use]
    pub const fn has_pattern(&self) -> bool {
        self.pattern.is_some()
    }
}

/// Serialized form of a data source in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceSpec {
    /// The short system code, e.g. `L`.
    pub system_code: String,
    /// The full name, e.g. `Entrez Gene`.
    pub full_name: String,
    /// Optional id pattern (whole-cell match).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// Errors building a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// A configured system code is malformed.
    #[error(transparent)]
    SystemCode(#[from] InvalidSystemCodeError),

    /// A configured id pattern does not compile.
    #[error("invalid id pattern for system '{system_code}'")]
    Pattern {
        /// The system whose pattern failed.
        system_code: SystemCode,
        /// The regex error.
        #[source]
        source: regex::Error,
    },
}

/// Built-in systems: (code, full name, pattern).
const BUILTIN: &[(&str, &str, Option<&str>)] = &[
    ("En", "Ensembl", Some(r"ENS[A-Z]*[FPGT]\d{11}")),
    ("L", "Entrez Gene", Some(r"\d+")),
    ("H", "HGNC", None),
    ("Hac", "HGNC Accession number", Some(r"HGNC:\d+")),
    (
        "S",
        "Uniprot-TrEMBL",
        Some(r"[A-NR-Z][0-9][A-Z][A-Z0-9]{2}[0-9]|[OPQ][0-9][A-Z0-9]{3}[0-9]"),
    ),
    (
        "Q",
        "RefSeq",
        Some(r"(?:NC|AC|NG|NT|NW|NZ|NM|NR|XM|XR|NP|AP|XP|YP|ZP)_\d+(?:\.\d+)?"),
    ),
    ("Mg", "MGI", Some(r"MGI:\d+")),
    ("R", "RGD", None),
    ("Z", "ZFIN", Some(r"ZDB-GENE-\d+-\d+")),
    ("F", "FlyBase", Some(r"FB\w{2}\d{7}")),
    ("W", "WormBase", Some(r"WBGene\d{8}")),
    ("D", "SGD", Some(r"S\d{9}")),
    ("X", "Affy", Some(r".+_at")),
    ("T", "GeneOntology", Some(r"GO:\d{7}")),
    ("Ce", "ChEBI", Some(r"CHEBI:\d+")),
    ("Ch", "HMDB", Some(r"HMDB\d+")),
    ("Wd", "Wikidata", Some(r"Q\d+")),
    ("Mb", "miRBase Sequence", Some(r"MI\d{7}")),
    ("Mbm", "miRBase mature sequence", Some(r"MIMAT\d{7}")),
];

/// The set of identifier systems known to the application.
///
/// Systems keep their insertion order, which is the order the column
/// interpreter visits them in (and therefore how ties are broken).
#[derive(Debug, Clone)]
pub struct DataSourceCatalog {
    sources: Vec<DataSource>,
}

impl DataSourceCatalog {
    /// An empty catalog.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// The catalog of built-in systems.
    ///
    /// # Panics
    ///
    /// Panics if a built-in entry is malformed, which is a programming error.
    #[must_use]
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        for (code, name, pattern) in BUILTIN {
            let code = SystemCode::new(*code).expect("built-in system code is valid");
            let source =
                DataSource::new(code, *name, *pattern).expect("built-in pattern compiles");
            catalog.insert(source);
        }
        catalog
    }

    /// Builds the built-in catalog extended (or overridden) by `specs`.
    ///
    /// # Errors
    ///
    /// Returns an error if a spec has a malformed system code or pattern.
    pub fn with_specs(specs: &[DataSourceSpec]) -> Result<Self, CatalogError> {
        let mut catalog = Self::builtin();
        for spec in specs {
            let code = SystemCode::new(spec.system_code.clone())?;
            catalog.insert(DataSource::new(
                code,
                spec.full_name.clone(),
                spec.pattern.as_deref(),
            )?);
        }
        Ok(catalog)
    }

    /// Inserts a data source, replacing any existing one with the same code
    /// in place.
    pub fn insert(&mut self, source: DataSource) {
        if let Some(existing) = self
            .sources
            .iter_mut()
            .find(|s| s.system_code == source.system_code)
        {
            *existing = source;
        } else {
            self.sources.push(source);
        }
    }

    /// Looks up a system by code.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&DataSource> {
        self.sources.iter().find(|s| s.system_code.as_str() == code)
    }

    /// Looks up a system by its full name, ignoring case.
    #[must_use]
    pub fn by_full_name(&self, name: &str) -> Option<&DataSource> {
        self.sources
            .iter()
            .find(|s| s.full_name.eq_ignore_ascii_case(name))
    }

    /// All systems, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &DataSource> {
        self.sources.iter()
    }

    /// Systems that carry an id pattern, in insertion order.
    pub fn patterned(&self) -> impl Iterator<Item = &DataSource> {
        self.sources.iter().filter(|s| s.has_pattern())
    }
}

impl Default for DataSourceCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
