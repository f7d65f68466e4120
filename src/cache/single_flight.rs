//! Single-flight coordination: when several callers ask for the same cache
//! key at once, only one of them actually runs the underlying detection;
//! the rest block on its result.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use once_cell::sync::OnceCell;

use crate::error::{CoreError, CoreResult};
use crate::model::DetectionResult;

use super::CacheKey;

enum Slot {
    InFlight,
    Done(Result<DetectionResult, String>),
}

struct Entry {
    state: Mutex<Slot>,
    ready: Condvar,
}

/// Keyed coordinator: the first caller for a key becomes the leader and
/// actually invokes `compute`; every other concurrent caller for the same
/// key blocks until the leader publishes a result, then receives a clone of
/// it — at most one underlying detection runs per key at a time.
pub struct SingleFlight {
    entries: Mutex<HashMap<CacheKey, Arc<Entry>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        SingleFlight {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn global() -> &'static SingleFlight {
        static INSTANCE: OnceCell<SingleFlight> = OnceCell::new();
        INSTANCE.get_or_init(SingleFlight::new)
    }

    /// Runs `compute` for `key`, or waits for a concurrent in-flight call
    /// for the same key and returns its result instead.
    pub fn run(&self, key: &CacheKey, compute: impl FnOnce() -> CoreResult<DetectionResult>) -> CoreResult<DetectionResult> {
        let entry = {
            let mut entries = self.entries.lock().unwrap();
            if let Some(existing) = entries.get(key) {
                Arc::clone(existing)
            } else {
                let entry = Arc::new(Entry {
                    state: Mutex::new(Slot::InFlight),
                    ready: Condvar::new(),
                });
                entries.insert(key.clone(), Arc::clone(&entry));
                return self.lead(key, entry, compute);
            }
        };
        self.follow(&entry)
    }

    fn lead(
        &self,
        key: &CacheKey,
        entry: Arc<Entry>,
        compute: impl FnOnce() -> CoreResult<DetectionResult>,
    ) -> CoreResult<DetectionResult> {
        let result = compute();
        {
            let mut state = entry.state.lock().unwrap();
            *state = Slot::Done(result.as_ref().map(Clone::clone).map_err(|e| e.to_string()));
            entry.ready.notify_all();
        }
        self.entries.lock().unwrap().remove(key);
        result
    }

    fn follow(&self, entry: &Entry) -> CoreResult<DetectionResult> {
        let mut state = entry.state.lock().unwrap();
        while matches!(*state, Slot::InFlight) {
            state = entry.ready.wait(state).unwrap();
        }
        match &*state {
            Slot::Done(Ok(result)) => Ok(result.clone()),
            Slot::Done(Err(message)) => Err(CoreError::Processing {
                detector: "single_flight".to_string(),
                message: message.clone(),
                frame_index: None,
            }),
            Slot::InFlight => unreachable!("loop only exits once Done"),
        }
    }
}

impl Default for SingleFlight {
    fn default() -> Self {
        SingleFlight::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    fn key() -> CacheKey {
        super::super::CacheKey::compute(
            &super::super::VideoFingerprint {
                path: PathBuf::from("clip.mp4"),
                size_bytes: 1,
                modified_unix_nanos: 1,
            },
            "frame_difference",
            &crate::config::DetectorConfig::default(),
        )
    }

    #[test]
    fn concurrent_callers_share_one_computation() {
        let flight = Arc::new(SingleFlight::new());
        let k = key();
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let flight = Arc::clone(&flight);
                let k = k.clone();
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    flight.run(&k, || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(30));
                        Ok(DetectionResult {
                            boundaries: vec![],
                            algorithm: "frame_difference".to_string(),
                            processing_time_sec: 0.0,
                            frame_count: 10,
                            scores: vec![],
                            metadata: Default::default(),
                        })
                    })
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
