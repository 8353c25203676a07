//! Shared per-section bookkeeping
//!
//! `SectionCore` carries everything the row and column sections have in
//! common: the global start offset of the section's contiguous index range,
//! its registration position inside the owning container, the number of dense
//! indices assigned so far, running statistics, and per-local-index hit
//! counts and hit weights.

use crate::section::stats::SectionStats;

#[derive(Debug, Clone)]
pub struct SectionCore {
    /// Global matrix index of this section's first entry.
    start: usize,
    /// Position of this section inside its container's registry.
    position: usize,
    stats: SectionStats,
    /// Number of nonzero entries recorded against each local index.
    hit_count: Vec<u32>,
    /// Summed value of the entries recorded against each local index.
    hit_weight: Vec<f64>,
}

impl SectionCore {
    pub fn new(start: usize, position: usize) -> Self {
        Self {
            start,
            position,
            stats: SectionStats::new(),
            hit_count: Vec::new(),
            hit_weight: Vec::new(),
        }
    }

    /// Reconstructs a core from persisted fields. The index count is implied
    /// by the hit-list lengths.
    pub(crate) fn from_parts(
        start: usize,
        position: usize,
        stats: SectionStats,
        hit_count: Vec<u32>,
        hit_weight: Vec<f64>,
    ) -> Self {
        assert_eq!(
            hit_count.len(),
            hit_weight.len(),
            "hit_count and hit_weight must be parallel"
        );
        Self {
            start,
            position,
            stats,
            hit_count,
            hit_weight,
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of dense indices assigned within this section.
    pub fn index_count(&self) -> usize {
        self.hit_count.len()
    }

    /// Global index of this section's last entry; `None` while empty.
    pub fn end(&self) -> Option<usize> {
        match self.index_count() {
            0 => None,
            n => Some(self.start + n - 1),
        }
    }

    /// Assigns the next free local index.
    pub fn next_index(&mut self) -> usize {
        let local = self.hit_count.len();
        self.hit_count.push(0);
        self.hit_weight.push(0.0);
        local
    }

    /// Converts a local index to its global matrix index.
    pub fn global(&self, local: usize) -> usize {
        debug_assert!(local < self.index_count());
        self.start + local
    }

    pub fn stats(&self) -> &SectionStats {
        &self.stats
    }

    /// Folds one inserted value into this section's running statistics.
    pub fn observe(&mut self, value: f64) {
        self.stats.observe(value);
    }

    /// Records `hits` nonzero entries with summed value `weight` against one
    /// local index.
    pub fn record_hits(&mut self, local: usize, hits: u32, weight: f64) {
        self.hit_count[local] += hits;
        self.hit_weight[local] += weight;
    }

    pub fn hit_count(&self) -> &[u32] {
        &self.hit_count
    }

    pub fn hit_weight(&self) -> &[f64] {
        &self.hit_weight
    }

    /// Zeroes statistics and hit lists without discarding the index range or
    /// the entry-ID mappings held by the owning section.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
        self.hit_count.fill(0);
        self.hit_weight.fill(0.0);
    }

    /// Normalization coefficient for this section: the root-mean-square of
    /// the observed values per assigned index, `sqrt(sum_sq / index_count)`.
    /// Zero while the section is empty.
    pub fn rms_norm(&self) -> f64 {
        match self.index_count() {
            0 => 0.0,
            n => (self.stats.sum_sq() / n as f64).sqrt(),
        }
    }

    /// Estimated resident bytes of this core, heap included.
    pub fn memory_estimate(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.hit_count.capacity() * std::mem::size_of::<u32>()
            + self.hit_weight.capacity() * std::mem::size_of::<f64>()
    }
}
