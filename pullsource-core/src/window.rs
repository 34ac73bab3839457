//! ConfirmationWindow tracks the positions delivered by one poll cycle, in send order, and which of
//! them the host has acknowledged. Acknowledgements arrive in any order and from any thread, but
//! the committed offset may only move over a contiguous acknowledged prefix: an unacknowledged
//! record in front of acknowledged ones holds the watermark back, so a restart re-delivers it.
//!
//! ```text
//!   positions   P1   P2   P3   P4
//!   confirmed   x    x    .    x
//!                    ^    ^
//!                    |    next pending
//!                    last confirmed (committed)
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use crate::offset::Position;

/// Result of [ConfirmationWindow::low_watermark].
#[derive(Debug, Clone, PartialEq)]
pub struct Watermark {
    confirmed: Position,
    next_pending: Option<Position>,
}

impl Watermark {
    /// Last position of the acknowledged prefix. Everything up to and including it was appended
    /// by the host.
    pub fn confirmed(&self) -> &Position {
        &self.confirmed
    }

    /// Position immediately after the acknowledged prefix, `None` once the whole window is
    /// acknowledged.
    pub fn next_pending(&self) -> Option<&Position> {
        self.next_pending.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.next_pending.is_none()
    }
}

#[derive(Debug, Default)]
pub struct ConfirmationWindow {
    positions: Vec<Position>,
    confirmed: Vec<AtomicBool>,
    slots: HashMap<Position, usize>,
}

impl ConfirmationWindow {
    /// Creates a window over `positions` in send order. A repeated position keeps its first slot,
    /// two records sharing a position cannot be told apart when acknowledged.
    pub fn new(positions: impl IntoIterator<Item = Position>) -> Self {
        let mut window = ConfirmationWindow::default();
        for position in positions {
            if window.slots.contains_key(&position) {
                warn!(?position, "Duplicate position in confirmation window, ignoring");
                continue;
            }
            window.slots.insert(position.clone(), window.positions.len());
            window.positions.push(position);
            window.confirmed.push(AtomicBool::new(false));
        }
        window
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Marks `position` as acknowledged. Positions outside of this window (e.g., a late ack for a
    /// window that was already replaced) are ignored. Returns whether the position was found.
    pub fn confirm(&self, position: &Position) -> bool {
        let Some(slot) = self.slots.get(position) else {
            return false;
        };
        if let Some(flag) = self.confirmed.get(*slot) {
            flag.store(true, Ordering::Release);
            return true;
        }
        false
    }

    /// Scans from the first position and stops at the first unacknowledged one. `None` when the
    /// window is empty or its first position is not acknowledged yet.
    pub fn low_watermark(&self) -> Option<Watermark> {
        let prefix = self
            .confirmed
            .iter()
            .take_while(|flag| flag.load(Ordering::Acquire))
            .count();
        if prefix == 0 {
            return None;
        }
        Some(Watermark {
            confirmed: self.positions.get(prefix - 1)?.clone(),
            next_pending: self.positions.get(prefix).cloned(),
        })
    }

    /// Number of acknowledged positions, contiguous or not.
    pub fn confirmed_count(&self) -> usize {
        self.confirmed
            .iter()
            .filter(|flag| flag.load(Ordering::Acquire))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::offset::{KEY, OffsetMap, OffsetValue};

    fn pos(key: &str) -> Position {
        let mut map = OffsetMap::new();
        map.insert(KEY.to_string(), OffsetValue::from(key));
        Position::new(map)
    }

    fn window(keys: &[&str]) -> ConfirmationWindow {
        ConfirmationWindow::new(keys.iter().map(|k| pos(k)))
    }

    #[test]
    fn test_empty_window_has_no_watermark() {
        let window = ConfirmationWindow::new(vec![]);
        assert!(window.is_empty());
        assert_eq!(window.low_watermark(), None);
        assert!(!window.confirm(&pos("p1")));
        assert_eq!(window.low_watermark(), None);
    }

    #[test]
    fn test_out_of_order_acks_advance_only_the_prefix() {
        let window = window(&["p1", "p2", "p3"]);
        assert_eq!(window.low_watermark(), None);

        window.confirm(&pos("p2"));
        assert_eq!(window.low_watermark(), None, "p1 is still pending");

        window.confirm(&pos("p1"));
        let watermark = window.low_watermark().unwrap();
        assert_eq!(watermark.confirmed(), &pos("p2"));
        assert_eq!(watermark.next_pending(), Some(&pos("p3")));

        window.confirm(&pos("p3"));
        let watermark = window.low_watermark().unwrap();
        assert_eq!(watermark.confirmed(), &pos("p3"));
        assert!(watermark.is_complete());
    }

    #[test]
    fn test_gap_blocks_later_acks() {
        let window = window(&["p1", "p2", "p3", "p4", "p5"]);
        for key in ["p1", "p3", "p4", "p5"] {
            window.confirm(&pos(key));
        }
        let watermark = window.low_watermark().unwrap();
        assert_eq!(watermark.confirmed(), &pos("p1"));
        assert_eq!(watermark.next_pending(), Some(&pos("p2")));
        assert_eq!(window.confirmed_count(), 4);
    }

    #[test]
    fn test_stale_ack_is_ignored() {
        let window = window(&["p1", "p2"]);
        window.confirm(&pos("p1"));
        let before = window.low_watermark();

        assert!(!window.confirm(&pos("from-previous-window")));
        assert_eq!(window.low_watermark(), before);
    }

    #[test]
    fn test_confirm_matches_regardless_of_stamp() {
        let window = ConfirmationWindow::new(vec![pos("p1").stamped(6)]);
        assert!(window.confirm(&pos("p1").stamped(7)));
        let watermark = window.low_watermark().unwrap();
        assert_eq!(watermark.confirmed().index(), Some(6));
    }

    #[test]
    fn test_duplicate_positions_collapse() {
        let window = window(&["p1", "p1", "p2"]);
        assert_eq!(window.len(), 2);
        window.confirm(&pos("p1"));
        window.confirm(&pos("p2"));
        assert!(window.low_watermark().unwrap().is_complete());
    }

    #[test]
    fn test_watermark_is_first_unconfirmed_for_every_ack_order() {
        let keys = ["p1", "p2", "p3", "p4"];
        // every subset, applied in both directions
        for mask in 0u32..(1 << keys.len()) {
            let acked: Vec<usize> = (0..keys.len()).filter(|i| mask & (1 << i) != 0).collect();
            for order in [acked.clone(), acked.iter().rev().copied().collect()] {
                let window = window(&keys);
                for i in &order {
                    window.confirm(&pos(keys[*i]));
                }
                let first_pending = (0..keys.len()).find(|i| mask & (1 << i) == 0);
                let watermark = window.low_watermark();
                match first_pending {
                    Some(0) => assert_eq!(watermark, None, "mask {mask:#b}"),
                    Some(i) => {
                        let watermark = watermark.unwrap();
                        assert_eq!(watermark.confirmed(), &pos(keys[i - 1]));
                        assert_eq!(watermark.next_pending(), Some(&pos(keys[i])));
                    }
                    None => assert!(watermark.unwrap().is_complete()),
                }
            }
        }
    }

    #[test]
    fn test_concurrent_confirms() {
        let keys: Vec<String> = (0..256).map(|i| format!("p{i:03}")).collect();
        let window = Arc::new(ConfirmationWindow::new(keys.iter().map(|k| pos(k))));

        std::thread::scope(|scope| {
            for chunk in keys.chunks(32) {
                let window = Arc::clone(&window);
                scope.spawn(move || {
                    for key in chunk.iter().rev() {
                        window.confirm(&pos(key));
                    }
                });
            }
        });

        let watermark = window.low_watermark().unwrap();
        assert!(watermark.is_complete());
        assert_eq!(watermark.confirmed(), &pos("p255"));
    }
}
