// Per-key cooldown gate used to throttle face events and notifications.
//
// One entry per distinct key (identity name or alert class). Entries are never
// expired: key cardinality is bounded by the roster plus a few alert classes.

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Per-key cooldown gate.
///
/// `try_fire` holds the shard lock for its key while it reads and writes the
/// last-fire instant, so two racing fires for the same key never both succeed.
pub struct CooldownGate {
    last_fired: DashMap<String, Instant>,
}

impl CooldownGate {
    pub fn new() -> Self {
        Self {
            last_fired: DashMap::new(),
        }
    }

    /// Check whether an event for `key` may fire at `now`, recording `now` if so.
    ///
    /// Returns true if there is no prior record or at least `window` has
    /// elapsed since it. A `now` older than the stored instant is treated as
    /// inside the window and never moves the entry backwards.
    pub fn try_fire(&self, key: &str, window: Duration, now: Instant) -> bool {
        match self.last_fired.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
            dashmap::mapref::entry::Entry::Occupied(mut slot) => {
                let elapsed = now.checked_duration_since(*slot.get());
                match elapsed {
                    Some(elapsed) if elapsed >= window => {
                        slot.insert(now);
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    /// Convenience wrapper over `try_fire` using the current instant.
    pub fn try_fire_now(&self, key: &str, window: Duration) -> bool {
        self.try_fire(key, window, Instant::now())
    }

    /// Last recorded fire instant for `key`, if any.
    pub fn last_fired(&self, key: &str) -> Option<Instant> {
        self.last_fired.get(key).map(|entry| *entry.value())
    }
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    const WINDOW: Duration = Duration::from_secs(5);

    #[test]
    fn test_first_fire_allowed() {
        let gate = CooldownGate::new();
        assert!(gate.try_fire("Hana", WINDOW, Instant::now()));
    }

    #[test]
    fn test_second_fire_inside_window_blocked() {
        let gate = CooldownGate::new();
        let t1 = Instant::now();
        assert!(gate.try_fire("Hana", WINDOW, t1));
        assert!(!gate.try_fire("Hana", WINDOW, t1 + Duration::from_secs(4)));
        // Blocked fire must not refresh the record
        assert_eq!(gate.last_fired("Hana"), Some(t1));
    }

    #[test]
    fn test_fire_at_exact_window_allowed() {
        let gate = CooldownGate::new();
        let t1 = Instant::now();
        assert!(gate.try_fire("Hana", WINDOW, t1));
        assert!(gate.try_fire("Hana", WINDOW, t1 + WINDOW));
        assert_eq!(gate.last_fired("Hana"), Some(t1 + WINDOW));
    }

    #[test]
    fn test_keys_are_independent() {
        let gate = CooldownGate::new();
        let t1 = Instant::now();
        assert!(gate.try_fire("Hana", WINDOW, t1));
        assert!(gate.try_fire("Unknown", WINDOW, t1));
        assert!(!gate.try_fire("Hana", WINDOW, t1 + Duration::from_secs(1)));
    }

    #[test]
    fn test_earlier_instant_never_moves_entry_backwards() {
        let gate = CooldownGate::new();
        let t1 = Instant::now() + Duration::from_secs(60);
        assert!(gate.try_fire("vibration", WINDOW, t1));
        assert!(!gate.try_fire("vibration", WINDOW, t1 - Duration::from_secs(30)));
        assert_eq!(gate.last_fired("vibration"), Some(t1));
    }

    #[test]
    fn test_concurrent_fires_for_same_key_linearized() {
        let gate = Arc::new(CooldownGate::new());
        let barrier = Arc::new(Barrier::new(8));
        let wins = Arc::new(AtomicUsize::new(0));
        let now = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let barrier = Arc::clone(&barrier);
                let wins = Arc::clone(&wins);
                thread::spawn(move || {
                    barrier.wait();
                    if gate.try_fire("Menna", WINDOW, now) {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(wins.load(Ordering::SeqCst), 1);
    }
}
