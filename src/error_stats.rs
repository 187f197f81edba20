use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

/// Process-wide error counters, shared between the cloud client and any
/// background workers. Cheap to clone; all clones share one map.
#[derive(Clone, Default)]
pub struct ErrorStats {
    counters: Arc<Mutex<BTreeMap<String, u64>>>,
}

impl ErrorStats {
    pub fn record(&self, kind: &str) {
        let mut counters = self.counters.lock().unwrap();
        *counters.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters.lock().unwrap().clone()
    }
}
