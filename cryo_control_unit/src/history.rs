//! Measurement history ring.
//!
//! A one-second-resolution ring of recent samples, capped at
//! [`HISTORY_CAPACITY`] entries (ten minutes). New observers replay this
//! ring on connect so they see recent history without waiting for it to
//! accumulate live.

use std::collections::VecDeque;

use cryo_common::consts::HISTORY_CAPACITY;

/// One per-second history slot. `has_data` distinguishes a slot that was
/// actually written (e.g. a live ADC sample) from one pushed purely to
/// keep the one-entry-per-second invariant while the ADC was down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryEntry {
    pub time: u64,
    pub values: [f64; 3],
    pub has_data: bool,
}

/// Fixed-capacity, one-second-resolution ring of recent samples.
pub struct HistoryRing {
    entries: VecDeque<HistoryEntry>,
    history_time: Option<u64>,
}

impl HistoryRing {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(HISTORY_CAPACITY),
            history_time: None,
        }
    }

    pub fn history_time(&self) -> Option<u64> {
        self.history_time
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Advance the ring to the current wall-clock second (ceiling of
    /// `now_ms / 1000`), pushing an empty entry per elapsed second and
    /// evicting from the tail past capacity, then optionally write
    /// `values` into `[offset..offset+values.len())` of the now-current
    /// head entry. Returns the current second.
    pub fn add(&mut self, now_ms: u64, offset: usize, values: Option<&[f64]>) -> u64 {
        let t = now_ms.div_ceil(1000);

        match self.history_time {
            None => {
                self.entries.push_back(HistoryEntry {
                    time: t,
                    values: [0.0; 3],
                    has_data: false,
                });
                self.history_time = Some(t);
            }
            Some(last) if t > last => {
                for tick in (last + 1)..=t {
                    self.entries.push_back(HistoryEntry {
                        time: tick,
                        values: [0.0; 3],
                        has_data: false,
                    });
                    if self.entries.len() > HISTORY_CAPACITY {
                        self.entries.pop_front();
                    }
                }
                self.history_time = Some(t);
            }
            _ => {}
        }

        if let Some(vals) = values {
            if let Some(head) = self.entries.back_mut() {
                for (i, v) in vals.iter().enumerate() {
                    if let Some(slot) = head.values.get_mut(offset + i) {
                        *slot = *v;
                    }
                }
                head.has_data = true;
            }
        }

        t
    }

    /// Replay filled entries newest-first, as `(seq, values)` pairs ready
    /// to become `B <seq> v0 v1 v2` observer messages.
    pub fn replay(&self) -> Vec<(u64, [f64; 3])> {
        self.entries
            .iter()
            .rev()
            .filter(|e| e.has_data)
            .map(|e| (e.time % HISTORY_CAPACITY as u64, e.values))
            .collect()
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_add_creates_single_entry() {
        let mut ring = HistoryRing::new();
        let t = ring.add(1_500, 0, Some(&[1.0, 2.0, 3.0]));
        assert_eq!(t, 2);
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.history_time(), Some(2));
    }

    #[test]
    fn advancing_seconds_pushes_empty_entries_between() {
        let mut ring = HistoryRing::new();
        ring.add(1_000, 0, Some(&[1.0, 0.0, 0.0]));
        ring.add(4_000, 0, Some(&[4.0, 0.0, 0.0]));
        assert_eq!(ring.len(), 4);
        let replay = ring.replay();
        assert_eq!(replay.len(), 2); // only the two written entries
    }

    #[test]
    fn evicts_from_tail_past_capacity() {
        let mut ring = HistoryRing::new();
        for s in 0..(HISTORY_CAPACITY + 10) {
            ring.add((s as u64) * 1000, 0, None);
        }
        assert_eq!(ring.len(), HISTORY_CAPACITY);
    }

    #[test]
    fn repeated_add_within_same_second_merges_into_head() {
        let mut ring = HistoryRing::new();
        ring.add(1_000, 0, Some(&[1.0, 0.0, 0.0]));
        ring.add(1_500, 1, Some(&[2.0]));
        assert_eq!(ring.len(), 1);
        let replay = ring.replay();
        assert_eq!(replay[0].1, [1.0, 2.0, 0.0]);
    }

    #[test]
    fn replay_is_newest_first_and_skips_empty_entries() {
        let mut ring = HistoryRing::new();
        ring.add(1_000, 0, Some(&[1.0, 0.0, 0.0]));
        ring.add(2_000, 0, None);
        ring.add(3_000, 0, Some(&[3.0, 0.0, 0.0]));
        let replay = ring.replay();
        assert_eq!(replay.len(), 2);
        assert_eq!(replay[0].1[0], 3.0);
        assert_eq!(replay[1].1[0], 1.0);
    }

    #[test]
    fn seq_is_consistent_modulo_capacity() {
        let mut ring = HistoryRing::new();
        for s in 0..5 {
            ring.add((s as u64) * 1000, 0, Some(&[s as f64, 0.0, 0.0]));
        }
        for (seq, _) in ring.replay() {
            assert!((seq as usize) < HISTORY_CAPACITY);
        }
    }
}
