//! Per-interaction rate limiting, keyed by `{nodeId}-{interactionId}`.
//!
//! Throttle is leading-edge: the first trigger in a window runs, the rest
//! are dropped. Debounce delays every trigger by its window and only the
//! last one of a burst survives; earlier ones resolve as skipped.
//!
//! Throttle entries whose window has passed are dropped on every admitted
//! trigger, so the table only holds keys that are currently throttling.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Default)]
pub(crate) struct Gate {
    /// key → (admitted at, window)
    throttled: Mutex<HashMap<String, (Instant, Duration)>>,
    debounced: Mutex<HashMap<String, u64>>,
}

impl Gate {
    pub(crate) fn throttle(&self, key: &str, window: Duration) -> bool {
        let now = Instant::now();
        let mut last = self.throttled.lock();
        if let Some((at, _)) = last.get(key)
            && now.duration_since(*at) < window
        {
            return false;
        }
        last.retain(|_, (at, window)| now.duration_since(*at) < *window);
        last.insert(key.to_string(), (now, window));
        true
    }

    #[cfg(test)]
    pub(crate) fn throttled_len(&self) -> usize {
        self.throttled.lock().len()
    }

    /// Wait out the window; `true` if no later trigger superseded this one.
    pub(crate) async fn debounce(&self, key: &str, window: Duration) -> bool {
        let generation = {
            let mut generations = self.debounced.lock();
            let slot = generations.entry(key.to_string()).or_insert(0);
            *slot += 1;
            *slot
        };
        tokio::time::sleep(window).await;
        let mut generations = self.debounced.lock();
        if generations.get(key) == Some(&generation) {
            generations.remove(key);
            true
        } else {
            false
        }
    }
}
