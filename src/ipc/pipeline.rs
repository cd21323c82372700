use anyhow::Result;
use log::{info, warn};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering},
};

use crate::config::Profile;
use crate::mailbox::Mailbox;
use crate::pose::Frame;
use crate::recognizer::GestureRecognizer;
use crate::source::{LandmarkSource, SourceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    Starting,
    Running,
    Stopped,
    Failed,
}

impl ProducerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Running,
            2 => Self::Stopped,
            3 => Self::Failed,
            _ => Self::Starting,
        }
    }
}

/// Counters the producer publishes for `status`.
#[derive(Debug, Default)]
pub struct ProducerStats {
    state: AtomicU8,
    frames: AtomicU64,
    dropped: AtomicU64,
}

impl ProducerStats {
    pub fn state(&self) -> ProducerState {
        ProducerState::from_u8(self.state.load(Ordering::Relaxed))
    }

    pub fn set_state(&self, s: ProducerState) {
        self.state.store(s as u8, Ordering::Relaxed);
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "state": self.state().as_str(),
            "frames": self.frames(),
            "dropped": self.dropped(),
        })
    }
}

/// Producer loop: read a frame, classify, smooth, publish.
///
/// Runs until `stop` is observed at the top of an iteration, the source
/// reaches end of stream, or reading fails outright. Malformed or
/// undecodable frames and bad hands count as "no hand" for that frame.
pub fn run_pipeline(
    mut source: LandmarkSource,
    mut recognizer: GestureRecognizer,
    profile: Arc<Mutex<Profile>>,
    mailbox: Arc<Mailbox>,
    stats: Arc<ProducerStats>,
    stop: Arc<AtomicBool>,
) -> Result<()> {
    stats.set_state(ProducerState::Running);
    info!("gesture producer running");

    let mut last = None;
    while !stop.load(Ordering::Relaxed) {
        // pick up threshold changes from reloads
        if let Ok(p) = profile.lock() {
            if p.thresholds != *recognizer.thresholds() {
                recognizer.set_thresholds(p.thresholds.clone());
                info!("producer: thresholds updated");
            }
        }

        let frame = match source.next_frame() {
            Ok(Some(f)) => f,
            Ok(None) => {
                info!("landmark source closed");
                break;
            }
            Err(SourceError::Malformed(e)) => {
                warn!("skipping malformed frame: {e}");
                stats.dropped.fetch_add(1, Ordering::Relaxed);
                Frame::empty()
            }
            Err(e) => {
                stats.set_state(ProducerState::Failed);
                return Err(e.into());
            }
        };

        let pose = match frame.first_pose() {
            Ok(p) => p,
            Err(e) => {
                warn!("ignoring hand: {e}");
                stats.dropped.fetch_add(1, Ordering::Relaxed);
                None
            }
        };

        let label = recognizer.process(pose.as_ref());
        mailbox.set(label);
        stats.frames.fetch_add(1, Ordering::Relaxed);

        if last != Some(label) {
            info!("gesture: {label}");
            last = Some(label);
        }
    }

    stats.set_state(ProducerState::Stopped);
    Ok(())
}
