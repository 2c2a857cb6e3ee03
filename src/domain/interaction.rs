use std::{path::Path, sync::Arc};

use nonempty::NonEmpty;

use crate::domain::Xref;

/// A reference to an imported interaction file.
///
/// Cheap to clone; every interaction read from a file shares the same
/// allocation.
pub type FileRef = Arc<Path>;

/// Index of an [`Interaction`] within its [`InteractionGraph`].
///
/// Adjacency lists store these rather than the records themselves, so the
/// regulator's list and the target's list point at one shared record.
///
/// [`InteractionGraph`]: crate::domain::InteractionGraph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InteractionId(pub(crate) usize);

/// Display-only values of the columns that play no role in the import,
/// as ordered (column name, cell value) pairs.
pub type MiscTable = Vec<(String, String)>;

/// A directed regulator → target relationship with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    regulator: Xref,
    target: Xref,
    files: NonEmpty<FileRef>,
    reference: Option<String>,
    misc: Option<MiscTable>,
}

impl Interaction {
    /// Creates an interaction first seen in `file`.
    #[must_use]
    pub fn new(regulator: Xref, target: Xref, file: FileRef) -> Self {
        Self {
            regulator,
            target,
            files: NonEmpty::new(file),
            reference: None,
            misc: None,
        }
    }

    /// Sets the publication reference, treating an empty string as absent.
    #[must_use]
    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference.filter(|r| !r.is_empty());
        self
    }

    /// Attaches the miscellaneous column table, unless it is empty.
    #[must_use]
    pub fn with_misc(mut self, misc: Option<MiscTable>) -> Self {
        self.misc = misc.filter(|m| !m.is_empty());
        self
    }

    /// The canonical regulator key.
    #[must_use]
    pub const fn regulator(&self) -> &Xref {
        &self.regulator
    }

    /// The canonical target key.
    #[must_use]
    pub const fn target(&self) -> &Xref {
        &self.target
    }

    /// Files this interaction was read from, in first-seen order.
    pub fn files(&self) -> impl Iterator<Item = &FileRef> {
        self.files.iter()
    }

    /// Number of distinct files supporting this interaction.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// The publication reference (e.g. a `PubMed` id), if known.
    #[must_use]
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// Values of non-role columns from the row that created this interaction.
    #[must_use]
    pub fn misc(&self) -> Option<&[(String, String)]> {
        self.misc.as_deref()
    }

    /// Records another supporting file. Returns `false` if it was already
    /// recorded.
    pub fn add_file(&mut self, file: &FileRef) -> bool {
        if self.files.iter().any(|f| f == file) {
            return false;
        }
        self.files.push(Arc::clone(file));
        true
    }

    /// Fills in the reference if none is recorded yet.
    pub fn fill_reference(&mut self, reference: Option<&str>) {
        if self.reference.is_none() {
            self.reference = reference.filter(|r| !r.is_empty()).map(str::to_string);
        }
    }
}
