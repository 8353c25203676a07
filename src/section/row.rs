//! Row sections: observation and regularization row categories
//!
//! A row section maps domain row IDs (wide integers: event/site/phase keyed
//! tags) onto a contiguous block of dense matrix row indices, in first-use
//! order. Row statistics differ from column statistics in one important way:
//! a row's aggregate hit count and weight are only known once the whole row
//! has been assembled, so they are buffered in a [`RowAccumulator`] and
//! flushed exactly once when the orchestrator seals the row.

use std::collections::HashMap;

use crate::section::base::SectionCore;
use crate::section::container::MatrixSection;

/// Semantic category of a block of matrix rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKind {
    /// Primary travel-time observation rows.
    PrimaryObservation,
    /// Secondary (layered) observation rows.
    SecondaryObservation,
    /// Damping regularization rows.
    Damping,
    /// Smoothing regularization rows.
    Smoothing,
}

impl RowKind {
    /// Display name, also the name stored in the persisted section file.
    pub fn name(&self) -> &'static str {
        match self {
            RowKind::PrimaryObservation => "primary observations",
            RowKind::SecondaryObservation => "secondary observations",
            RowKind::Damping => "damping",
            RowKind::Smoothing => "smoothing",
        }
    }

    /// Regularization rows are appended after all observation rows and are
    /// excluded from the observation count.
    pub fn is_regularization(&self) -> bool {
        matches!(self, RowKind::Damping | RowKind::Smoothing)
    }

    /// Inverse of [`RowKind::name`], used when reading a section file.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "primary observations" => Some(RowKind::PrimaryObservation),
            "secondary observations" => Some(RowKind::SecondaryObservation),
            "damping" => Some(RowKind::Damping),
            "smoothing" => Some(RowKind::Smoothing),
            _ => None,
        }
    }
}

/// Buffered per-row bookkeeping for the row currently being assembled.
///
/// The orchestrator pushes every appended `(column index, value)` pair here
/// and flushes the accumulated hit count and weight into the owning row
/// section when the row is committed. Making the buffer an explicit value
/// keeps the flush-once contract visible instead of hiding it in section
/// state.
#[derive(Debug, Default)]
pub struct RowAccumulator {
    entries: Vec<(usize, f64)>,
    hits: u32,
    weight: f64,
}

impl RowAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers one pending `(global column index, value)` entry.
    pub fn push(&mut self, col: usize, value: f64) {
        self.entries.push((col, value));
        self.hits += 1;
        self.weight += value;
    }

    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drains the buffered entries and resets the hit bookkeeping.
    pub fn take(&mut self) -> Vec<(usize, f64)> {
        self.hits = 0;
        self.weight = 0.0;
        std::mem::take(&mut self.entries)
    }
}

/// One contiguous block of matrix rows belonging to a single [`RowKind`].
#[derive(Debug, Clone)]
pub struct RowSection {
    kind: RowKind,
    core: SectionCore,
    /// Entry IDs in assignment order; position + section start = global index.
    ids: Vec<i64>,
    index_of: HashMap<i64, usize>,
}

impl RowSection {
    pub fn kind(&self) -> RowKind {
        self.kind
    }

    /// Registers a row ID, assigning the next dense index on first use.
    /// Returns the global row index and whether the ID was new.
    pub fn register_row(&mut self, id: i64) -> (usize, bool) {
        if let Some(&local) = self.index_of.get(&id) {
            return (self.core.global(local), false);
        }
        let local = self.core.next_index();
        self.ids.push(id);
        self.index_of.insert(id, local);
        (self.core.global(local), true)
    }

    /// Global row index for a registered ID; `None` when never registered,
    /// which is distinguishable from a valid index of zero.
    pub fn lookup(&self, id: i64) -> Option<usize> {
        self.index_of.get(&id).map(|&local| self.core.global(local))
    }

    /// Entry IDs in assignment order.
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub(crate) fn from_parts(kind: RowKind, core: SectionCore, ids: Vec<i64>) -> Self {
        assert_eq!(core.index_count(), ids.len(), "ids must match index count");
        let index_of = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        Self {
            kind,
            core,
            ids,
            index_of,
        }
    }

    /// Estimated resident bytes, heap included.
    pub fn memory_estimate(&self) -> usize {
        std::mem::size_of::<Self>() - std::mem::size_of::<SectionCore>()
            + self.core.memory_estimate()
            + self.ids.capacity() * std::mem::size_of::<i64>()
            + self.index_of.capacity() * (std::mem::size_of::<i64>() + std::mem::size_of::<usize>())
    }
}

impl MatrixSection for RowSection {
    type Kind = RowKind;

    fn open(kind: RowKind, start: usize, position: usize) -> Self {
        Self {
            kind,
            core: SectionCore::new(start, position),
            ids: Vec::new(),
            index_of: HashMap::new(),
        }
    }

    fn section_kind(&self) -> RowKind {
        self.kind
    }

    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn core(&self) -> &SectionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SectionCore {
        &mut self.core
    }
}
