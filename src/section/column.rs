//! Column sections: unknown categories of the inversion
//!
//! A column section maps domain column IDs (narrow integers: grid-node, site,
//! or event identifiers) onto a contiguous block of dense matrix column
//! indices. Unlike rows, a column's statistics are independent of whatever
//! row is being assembled at the time, so registration folds the value into
//! the statistics and hit bookkeeping immediately.

use std::collections::HashMap;

use crate::section::base::SectionCore;
use crate::section::container::MatrixSection;

/// Semantic category of a block of matrix columns (unknowns).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// Slowness unknowns, one per grid node.
    GridNode,
    /// Site (station) term unknowns.
    SiteTerm,
    /// Event (origin) term unknowns.
    EventTerm,
}

impl ColumnKind {
    /// Display name, also the name stored in the persisted section file.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnKind::GridNode => "grid nodes",
            ColumnKind::SiteTerm => "site terms",
            ColumnKind::EventTerm => "event terms",
        }
    }

    /// Inverse of [`ColumnKind::name`], used when reading a section file.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "grid nodes" => Some(ColumnKind::GridNode),
            "site terms" => Some(ColumnKind::SiteTerm),
            "event terms" => Some(ColumnKind::EventTerm),
            _ => None,
        }
    }
}

/// One contiguous block of matrix columns belonging to a single
/// [`ColumnKind`].
#[derive(Debug, Clone)]
pub struct ColumnSection {
    kind: ColumnKind,
    core: SectionCore,
    /// Entry IDs in assignment order; position + section start = global index.
    ids: Vec<i32>,
    index_of: HashMap<i32, usize>,
}

impl ColumnSection {
    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    /// Registers one nonzero entry against a column ID, assigning the next
    /// dense index on first use. Statistics and hit bookkeeping are updated
    /// immediately. Returns the global column index.
    pub fn register_column(&mut self, id: i32, value: f64) -> usize {
        let local = match self.index_of.get(&id) {
            Some(&local) => local,
            None => {
                let local = self.core.next_index();
                self.ids.push(id);
                self.index_of.insert(id, local);
                local
            }
        };
        self.core.observe(value);
        self.core.record_hits(local, 1, value);
        self.core.global(local)
    }

    /// Global column index for a registered ID; `None` when never
    /// registered, which is distinguishable from a valid index of zero.
    pub fn lookup(&self, id: i32) -> Option<usize> {
        self.index_of.get(&id).map(|&local| self.core.global(local))
    }

    /// Entry IDs in assignment order.
    pub fn ids(&self) -> &[i32] {
        &self.ids
    }

    pub(crate) fn from_parts(kind: ColumnKind, core: SectionCore, ids: Vec<i32>) -> Self {
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
            + self.ids.capacity() * std::mem::size_of::<i32>()
            + self.index_of.capacity() * (std::mem::size_of::<i32>() + std::mem::size_of::<usize>())
    }
}

impl MatrixSection for ColumnSection {
    type Kind = ColumnKind;

    fn open(kind: ColumnKind, start: usize, position: usize) -> Self {
        Self {
            kind,
            core: SectionCore::new(start, position),
            ids: Vec::new(),
            index_of: HashMap::new(),
        }
    }

    fn section_kind(&self) -> ColumnKind {
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
