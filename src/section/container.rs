//! Ordered section registry for one matrix axis
//!
//! Sections are registered lazily in strict order; the container keeps them
//! in insertion order plus a start-offset index that answers "which section
//! owns global index i" with an O(log n) floor lookup. Only the
//! most-recently-registered section on an axis may still grow, so start
//! offsets are final once the next section opens.

use std::collections::BTreeMap;

use crate::error::MatrixError;
use crate::section::base::SectionCore;

/// Seam shared by [`RowSection`](crate::RowSection) and
/// [`ColumnSection`](crate::ColumnSection) so one container type serves both
/// axes.
pub trait MatrixSection {
    type Kind: Copy + PartialEq;

    /// Creates an empty section at the given start offset and registry
    /// position.
    fn open(kind: Self::Kind, start: usize, position: usize) -> Self;

    fn section_kind(&self) -> Self::Kind;

    /// Display name of the section's category.
    fn name(&self) -> &'static str;

    fn core(&self) -> &SectionCore;

    fn core_mut(&mut self) -> &mut SectionCore;
}

/// Ordered registry of the sections on one axis.
#[derive(Debug, Clone)]
pub struct SectionContainer<S> {
    sections: Vec<S>,
    /// Section start offset to storage position, for floor lookups.
    by_start: BTreeMap<usize, usize>,
}

impl<S: MatrixSection> SectionContainer<S> {
    pub fn new() -> Self {
        Self {
            sections: Vec::new(),
            by_start: BTreeMap::new(),
        }
    }

    /// Re-activates the section for `kind`, creating it at the end of the
    /// axis on first reference. Returns its registry position.
    pub fn open(&mut self, kind: S::Kind) -> usize {
        if let Some(position) = self.position_of(kind) {
            return position;
        }
        let position = self.sections.len();
        let start = self.total_indexes();
        // A section superseded while still empty shares its start with the
        // new one; the insert replaces its floor entry. The empty section
        // owns no indices, so it has nothing for section_owning to resolve.
        self.by_start.insert(start, position);
        self.sections.push(S::open(kind, start, position));
        position
    }

    pub fn position_of(&self, kind: S::Kind) -> Option<usize> {
        self.sections
            .iter()
            .position(|s| s.section_kind() == kind)
    }

    pub fn find(&self, kind: S::Kind) -> Option<&S> {
        self.position_of(kind).map(|p| &self.sections[p])
    }

    pub fn get(&self, position: usize) -> Option<&S> {
        self.sections.get(position)
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut S> {
        self.sections.get_mut(position)
    }

    /// Checks that a current-section position really belongs to this
    /// container, via the section's own stored registration position rather
    /// than identity alone.
    pub fn validate_position(&self, position: usize) -> Result<&S, MatrixError> {
        match self.sections.get(position) {
            Some(section) if section.core().position() == position => Ok(section),
            _ => Err(MatrixError::ForeignSection { position }),
        }
    }

    /// Mutable access guarded by the same stored-position check as
    /// [`SectionContainer::validate_position`].
    pub fn validate_position_mut(&mut self, position: usize) -> Result<&mut S, MatrixError> {
        match self.sections.get_mut(position) {
            Some(section) if section.core().position() == position => Ok(section),
            _ => Err(MatrixError::ForeignSection { position }),
        }
    }

    /// True when `position` names the newest section, the only one still
    /// accepting new entry IDs.
    pub fn is_newest(&self, position: usize) -> bool {
        position + 1 == self.sections.len()
    }

    /// Total dense indices assigned across all sections on this axis.
    pub fn total_indexes(&self) -> usize {
        match self.sections.last() {
            Some(last) => last.core().start() + last.core().index_count(),
            None => 0,
        }
    }

    /// Resolves a global index to the section owning it. Indexes beyond the
    /// last section's range clamp to the last section; `None` only when the
    /// container is empty.
    pub fn section_owning(&self, index: usize) -> Option<&S> {
        self.by_start
            .range(..=index)
            .next_back()
            .map(|(_, &position)| &self.sections[position])
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, S> {
        self.sections.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, S> {
        self.sections.iter_mut()
    }

    /// Rebuilds a container from deserialized sections, which must already
    /// carry correct start offsets and positions.
    pub(crate) fn from_sections(sections: Vec<S>) -> Self {
        let by_start = sections
            .iter()
            .enumerate()
            .map(|(position, s)| (s.core().start(), position))
            .collect();
        Self { sections, by_start }
    }

    /// Estimated resident bytes, heap included, summed over all sections.
    pub fn memory_estimate(&self, per_section: impl Fn(&S) -> usize) -> usize {
        std::mem::size_of::<Self>()
            + self.by_start.len() * 2 * std::mem::size_of::<usize>()
            + self.sections.iter().map(per_section).sum::<usize>()
    }
}
