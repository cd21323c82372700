//! Single-slot, latest-value-wins hand-off between the recognition
//! producer and whatever control loop reads it.
//!
//! There is no queue and no back-pressure: every `set` overwrites the slot,
//! readers never block, and a reader may see the same value many times or
//! miss values written between two reads. Before the first `set`, `get`
//! returns `None`.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::gestures::GestureLabel;

const EMPTY: u8 = u8::MAX;

#[derive(Debug)]
pub struct Mailbox {
    slot: AtomicU8,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    pub const fn new() -> Self {
        Self {
            slot: AtomicU8::new(EMPTY),
        }
    }

    pub fn set(&self, label: GestureLabel) {
        self.slot.store(encode(label), Ordering::Release);
    }

    pub fn get(&self) -> Option<GestureLabel> {
        decode(self.slot.load(Ordering::Acquire))
    }
}

fn encode(label: GestureLabel) -> u8 {
    match label {
        GestureLabel::MoveForward => 0,
        GestureLabel::MoveBackward => 1,
        GestureLabel::Stop => 2,
        GestureLabel::Unknown => 3,
    }
}

fn decode(v: u8) -> Option<GestureLabel> {
    match v {
        0 => Some(GestureLabel::MoveForward),
        1 => Some(GestureLabel::MoveBackward),
        2 => Some(GestureLabel::Stop),
        3 => Some(GestureLabel::Unknown),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn empty_until_first_write() {
        let m = Mailbox::new();
        assert_eq!(m.get(), None);
        m.set(GestureLabel::Unknown);
        assert_eq!(m.get(), Some(GestureLabel::Unknown));
    }

    #[test]
    fn last_write_wins() {
        let m = Mailbox::new();
        m.set(GestureLabel::Stop);
        m.set(GestureLabel::MoveBackward);
        m.set(GestureLabel::MoveForward);
        assert_eq!(m.get(), Some(GestureLabel::MoveForward));
        // reads do not consume
        assert_eq!(m.get(), Some(GestureLabel::MoveForward));
    }

    #[test]
    fn shared_across_threads() {
        let m = Arc::new(Mailbox::new());
        let w = m.clone();
        thread::spawn(move || {
            for _ in 0..100 {
                w.set(GestureLabel::MoveBackward);
            }
            w.set(GestureLabel::Stop);
        })
        .join()
        .unwrap();
        assert_eq!(m.get(), Some(GestureLabel::Stop));
    }
}
