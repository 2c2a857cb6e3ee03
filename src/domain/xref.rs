use std::{collections::BTreeSet, fmt, ops::Deref, str::FromStr};

use non_empty_string::NonEmptyString;
use serde::{Serialize, Serializer};

/// The short code naming an identifier system (for example `En` for Ensembl
/// or `L` for Entrez Gene).
///
/// A system code is non-empty and contains neither whitespace nor `:`, so
/// that an [`Xref`] can be written unambiguously as `CODE:ID`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SystemCode(NonEmptyString);

impl SystemCode {
    /// Creates a new `SystemCode` from a string.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSystemCodeError`] if the string is empty or contains
    /// whitespace or a colon.
    pub fn new(s: impl Into<String>) -> Result<Self, InvalidSystemCodeError> {
        let s = s.into();
        if s.chars().any(|c| c.is_whitespace() || c == ':') {
            return Err(InvalidSystemCodeError(s));
        }
        NonEmptyString::new(s)
            .map(Self)
            .map_err(InvalidSystemCodeError)
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<&str> for SystemCode {
    type Error = InvalidSystemCodeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for SystemCode {
    type Err = InvalidSystemCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for SystemCode {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Deref for SystemCode {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl fmt::Display for SystemCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SystemCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Error returned when a string is not a valid system code.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid system code '{0}': must be non-empty without whitespace or ':'")]
pub struct InvalidSystemCodeError(String);

/// A cross-reference to a gene or protein: an id within an identifier system.
///
/// Two `Xref`s are the same only when both the id and the system match.
/// Equivalence across systems is never structural; it is computed by the
/// [`Resolver`](crate::mapping::Resolver).
///
/// The textual form is `CODE:ID`. Only the first `:` separates the two, so ids
/// that contain colons themselves round-trip:
///
/// ```
/// use regint::Xref;
///
/// let xref: Xref = "Mg:MGI:97490".parse().unwrap();
/// assert_eq!(xref.system().as_str(), "Mg");
/// assert_eq!(xref.id(), "MGI:97490");
/// assert_eq!(xref.to_string(), "Mg:MGI:97490");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Xref {
    id: NonEmptyString,
    system: SystemCode,
}

impl Xref {
    /// Creates a cross-reference.
    ///
    /// # Errors
    ///
    /// Returns [`XrefError::EmptyId`] if `id` is empty.
    pub fn new(id: impl Into<String>, system: SystemCode) -> Result<Self, XrefError> {
        let id = NonEmptyString::new(id.into()).map_err(|_| XrefError::EmptyId)?;
        Ok(Self { id, system })
    }

    /// The identifier within its system.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// The identifier system.
    #[must_use]
    pub const fn system(&self) -> &SystemCode {
        &self.system
    }
}

impl fmt::Display for Xref {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.system, self.id)
    }
}

impl Serialize for Xref {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Errors that can occur when constructing or parsing an [`Xref`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum XrefError {
    /// The id component is empty.
    #[error("identifier must not be empty")]
    EmptyId,

    /// The text has no `CODE:` prefix.
    #[error("Invalid identifier '{0}': expected CODE:ID")]
    Syntax(String),

    /// The system code is malformed.
    #[error(transparent)]
    System(#[from] InvalidSystemCodeError),
}

impl FromStr for Xref {
    type Err = XrefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (code, id) = s
            .split_once(':')
            .ok_or_else(|| XrefError::Syntax(s.to_string()))?;
        Self::new(id, SystemCode::new(code)?)
    }
}

/// Every identifier known to denote the same entity as a queried one.
///
/// Computed on demand by the resolver and never cached. The queried
/// identifier is always a member. Members iterate in sorted order, which
/// makes "first member present in the graph" lookups deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquivalenceClass {
    members: BTreeSet<Xref>,
}

impl EquivalenceClass {
    /// Creates a class containing only `xref`.
    #[must_use]
    pub fn new(xref: Xref) -> Self {
        Self {
            members: BTreeSet::from([xref]),
        }
    }

    /// Whether `xref` belongs to this class.
    #[must_use]
    pub fn contains(&self, xref: &Xref) -> bool {
        self.members.contains(xref)
    }

    /// The members of the class in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &Xref> {
        self.members.iter()
    }

    /// The number of members (always at least one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always `false`; present for API symmetry with collections.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl Extend<Xref> for EquivalenceClass {
    fn extend<T: IntoIterator<Item = Xref>>(&mut self, iter: T) {
        self.members.extend(iter);
    }
}

impl<'a> IntoIterator for &'a EquivalenceClass {
    type Item = &'a Xref;
    type IntoIter = std::collections::btree_set::Iter<'a, Xref>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}
