use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::debug;

use crate::error::{PipelineError, Result};

// Process-wide registry of pipeline names with a run in flight.
static ACTIVE_RUNS: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Advisory mutual-exclusion lock keyed by pipeline name.
///
/// Acquired before landing and held until the run completes or fails;
/// releasing happens on drop so an early return or panic unwinds the lock
/// with the run. Guarantees at-most-one in-flight run per logical pipeline.
pub struct RunLock {
    pipeline_name: String,
}

impl RunLock {
    pub fn acquire(pipeline_name: &str) -> Result<Self> {
        let mut active = ACTIVE_RUNS.lock().unwrap();
        if !active.insert(pipeline_name.to_string()) {
            return Err(PipelineError::RunInFlight(pipeline_name.to_string()));
        }
        debug!("Acquired run lock for {}", pipeline_name);
        Ok(Self {
            pipeline_name: pipeline_name.to_string(),
        })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let mut active = ACTIVE_RUNS.lock().unwrap();
        active.remove(&self.pipeline_name);
        debug!("Released run lock for {}", self.pipeline_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_held() {
        let lock = RunLock::acquire("lock_test_pipeline").unwrap();
        let second = RunLock::acquire("lock_test_pipeline");
        assert!(matches!(second, Err(PipelineError::RunInFlight(_))));
        drop(lock);

        // Released on drop; re-acquire succeeds
        let third = RunLock::acquire("lock_test_pipeline");
        assert!(third.is_ok());
    }

    #[test]
    fn distinct_pipelines_do_not_contend() {
        let _a = RunLock::acquire("lock_test_a").unwrap();
        let b = RunLock::acquire("lock_test_b");
        assert!(b.is_ok());
    }
}
