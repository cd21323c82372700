//! Sliding-window majority vote over raw per-frame labels.

use std::collections::VecDeque;

use crate::gestures::GestureLabel;

pub const DEFAULT_WINDOW: usize = 5;
pub const DEFAULT_MIN_VOTES: usize = 2;

/// Owns the label history of one recognizer session.
///
/// The window is a strict FIFO: once full, every push evicts the oldest
/// entry. Nothing else mutates it.
#[derive(Debug, Clone)]
pub struct TemporalSmoother {
    history: VecDeque<GestureLabel>,
    capacity: usize,
    min_votes: usize,
}

impl Default for TemporalSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_MIN_VOTES)
    }
}

impl TemporalSmoother {
    pub fn new(capacity: usize, min_votes: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity + 1),
            capacity,
            min_votes,
        }
    }

    pub fn push(&mut self, label: GestureLabel) {
        self.history.push_back(label);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
    }

    /// Most frequent label in the window, if it has at least `min_votes`.
    ///
    /// Ties go to the label whose first occurrence in the window is earliest.
    pub fn vote(&self) -> GestureLabel {
        // (label, count) in first-occurrence order
        let mut counts: Vec<(GestureLabel, usize)> = Vec::with_capacity(4);
        for label in &self.history {
            match counts.iter_mut().find(|(l, _)| l == label) {
                Some((_, n)) => *n += 1,
                None => counts.push((*label, 1)),
            }
        }

        let mut best: Option<(GestureLabel, usize)> = None;
        for (label, n) in counts {
            if best.is_none_or(|(_, m)| n > m) {
                best = Some((label, n));
            }
        }

        match best {
            Some((label, n)) if n >= self.min_votes => label,
            _ => GestureLabel::Unknown,
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn history(&self) -> impl Iterator<Item = GestureLabel> + '_ {
        self.history.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use GestureLabel::*;

    fn fed(labels: &[GestureLabel]) -> TemporalSmoother {
        let mut s = TemporalSmoother::default();
        for l in labels {
            s.push(*l);
        }
        s
    }

    #[test]
    fn empty_history_is_unknown() {
        assert_eq!(TemporalSmoother::default().vote(), Unknown);
    }

    #[test]
    fn single_vote_is_not_trusted() {
        assert_eq!(fed(&[MoveForward]).vote(), Unknown);
        assert_eq!(fed(&[Stop, MoveForward, MoveBackward]).vote(), Unknown);
    }

    #[test]
    fn two_votes_win() {
        assert_eq!(
            fed(&[MoveForward, MoveForward, Unknown, Stop, Unknown]).vote(),
            MoveForward
        );
    }

    #[test]
    fn unknown_can_win_the_vote() {
        assert_eq!(
            fed(&[Stop, MoveForward, MoveBackward, Unknown, Unknown]).vote(),
            Unknown
        );
    }

    #[test]
    fn tie_goes_to_earliest_first_occurrence() {
        assert_eq!(fed(&[Stop, MoveForward, MoveForward, Stop]).vote(), Stop);
        assert_eq!(fed(&[MoveBackward, Stop, Stop, MoveBackward]).vote(), MoveBackward);
    }

    #[test]
    fn sixth_push_evicts_the_first() {
        let s = fed(&[MoveForward, MoveForward, Stop, Stop, MoveBackward, MoveBackward]);
        assert_eq!(s.len(), 5);
        assert_eq!(
            s.history().collect::<Vec<_>>(),
            vec![MoveForward, Stop, Stop, MoveBackward, MoveBackward]
        );
        // Stop and MoveBackward tie at 2; Stop appears first in the window
        assert_eq!(s.vote(), Stop);
    }

    #[test]
    fn window_forgets_old_majority() {
        let mut s = fed(&[MoveForward; 5]);
        assert_eq!(s.vote(), MoveForward);
        for _ in 0..4 {
            s.push(Stop);
        }
        assert_eq!(s.vote(), Stop);
        s.push(Stop);
        assert!(s.history().all(|l| l == Stop));
    }

    #[test]
    fn min_votes_is_respected() {
        let mut s = TemporalSmoother::new(5, 3);
        s.push(Stop);
        s.push(Stop);
        assert_eq!(s.vote(), Unknown);
        s.push(Stop);
        assert_eq!(s.vote(), Stop);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut s = TemporalSmoother::new(0, 1);
        s.push(Stop);
        s.push(MoveForward);
        assert_eq!(s.capacity(), 1);
        assert_eq!(s.vote(), MoveForward);
    }
}
