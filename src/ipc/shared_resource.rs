use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::{ParameterUpdate, SimulationParameters};
use crate::engine::SampleRecord;
use crate::error::ConfigurationError;

// ============================================================================
// PARAMETER STORE - single point of atomic exchange for the parameter set
// ============================================================================

/// Holds the current parameters as an immutable `Arc` snapshot. Writers build a
/// new snapshot and swap it in; readers clone the `Arc` and never see a
/// partially-applied update.
#[derive(Clone)]
pub struct ParameterStore {
    current: Arc<RwLock<Arc<SimulationParameters>>>,
}

impl ParameterStore {
    pub fn new(params: SimulationParameters) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(params))),
        }
    }

    pub fn snapshot(&self) -> Arc<SimulationParameters> {
        self.current.read().clone()
    }

    pub fn replace(&self, params: SimulationParameters) {
        *self.current.write() = Arc::new(params);
    }

    /// Merges `update` into the current snapshot. The merged set is validated
    /// first; on error the store is left untouched. An empty update keeps the
    /// existing snapshot (same `Arc`).
    pub fn merge(
        &self,
        update: &ParameterUpdate,
    ) -> Result<Arc<SimulationParameters>, ConfigurationError> {
        if update.is_empty() {
            return Ok(self.snapshot());
        }
        let mut current = self.current.write();
        let merged = update.apply_to(&current);
        merged.validate()?;
        *current = Arc::new(merged);
        Ok(current.clone())
    }
}

// ============================================================================
// SAMPLE HISTORY - bounded ring of recent records for the presentation layer
// ============================================================================

#[derive(Clone)]
pub struct SampleHistory {
    entries: Arc<RwLock<VecDeque<SampleRecord>>>,
    max_size: usize,
}

impl SampleHistory {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(max_size))),
            max_size,
        }
    }

    pub fn push(&self, record: SampleRecord) {
        let mut log = self.entries.write();
        log.push_back(record);
        if log.len() > self.max_size {
            log.pop_front();
        }
    }

    pub fn latest(&self) -> Option<SampleRecord> {
        self.entries.read().back().cloned()
    }

    /// Up to `n` most recent records, oldest first.
    pub fn recent(&self, n: usize) -> Vec<SampleRecord> {
        let log = self.entries.read();
        let skip = log.len().saturating_sub(n);
        log.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
