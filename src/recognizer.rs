//! Per-frame façade: classify, smooth, report.

use std::fmt;

use log::debug;

use crate::config::{Smoothing, Thresholds};
use crate::gestures::{FingerAngles, GestureLabel, PoseClassifier};
use crate::pose::Pose;
use crate::smoother::TemporalSmoother;

/// What happened on one frame, for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// `None` when the frame had no hand.
    pub angles: Option<FingerAngles>,
    pub raw: GestureLabel,
    pub stable: GestureLabel,
}

impl fmt::Display for FrameReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.angles {
            Some(a) => write!(f, "{a} | ")?,
            None => f.write_str("no hand | ")?,
        }
        write!(f, "raw: {} | Gesture: {}", self.raw, self.stable)
    }
}

/// Receives a report after every processed frame.
pub trait FrameObserver: Send {
    fn on_frame(&mut self, report: &FrameReport);
}

/// Writes each report to the `log` facade at debug level.
#[derive(Debug, Default)]
pub struct LogObserver;

impl FrameObserver for LogObserver {
    fn on_frame(&mut self, report: &FrameReport) {
        debug!("{report}");
    }
}

pub struct GestureRecognizer {
    classifier: PoseClassifier,
    smoother: TemporalSmoother,
    observer: Option<Box<dyn FrameObserver>>,
}

impl Default for GestureRecognizer {
    fn default() -> Self {
        Self::new(Thresholds::default(), &Smoothing::default())
    }
}

impl GestureRecognizer {
    pub fn new(th: Thresholds, smoothing: &Smoothing) -> Self {
        Self {
            classifier: PoseClassifier::new(th),
            smoother: TemporalSmoother::new(smoothing.window, smoothing.min_votes),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn FrameObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Swap classifier thresholds; the label history is kept.
    pub fn set_thresholds(&mut self, th: Thresholds) {
        self.classifier.set_thresholds(th);
    }

    pub fn thresholds(&self) -> &Thresholds {
        self.classifier.thresholds()
    }

    /// Run one frame through the classifier and the smoother.
    pub fn process(&mut self, pose: Option<&Pose>) -> GestureLabel {
        self.process_report(pose).stable
    }

    pub fn process_report(&mut self, pose: Option<&Pose>) -> FrameReport {
        let (angles, raw) = match pose {
            Some(p) => {
                let angles = FingerAngles::of(p);
                (Some(angles), self.classifier.classify_with(p, &angles))
            }
            None => (None, GestureLabel::Unknown),
        };

        self.smoother.push(raw);
        let stable = self.smoother.vote();

        let report = FrameReport {
            angles,
            raw,
            stable,
        };
        if let Some(obs) = self.observer.as_mut() {
            obs.on_frame(&report);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::gestures::synth::{open_palm, pointing};

    struct Collect(Arc<Mutex<Vec<FrameReport>>>);

    impl FrameObserver for Collect {
        fn on_frame(&mut self, report: &FrameReport) {
            self.0.lock().unwrap().push(*report);
        }
    }

    #[test]
    fn needs_two_frames_to_commit() {
        let mut r = GestureRecognizer::default();
        let p = pointing(0.05);
        assert_eq!(r.process(Some(&p)), GestureLabel::Unknown);
        assert_eq!(r.process(Some(&p)), GestureLabel::MoveForward);
    }

    #[test]
    fn single_dropout_keeps_stable_label() {
        let mut r = GestureRecognizer::default();
        let palm = open_palm();
        r.process(Some(&palm));
        r.process(Some(&palm));
        r.process(Some(&palm));
        // one missing hand and one misread do not flip the output
        assert_eq!(r.process(None), GestureLabel::Stop);
        assert_eq!(r.process(Some(&pointing(-0.05))), GestureLabel::Stop);
    }

    #[test]
    fn recognizers_are_independent() {
        let mut a = GestureRecognizer::default();
        let mut b = GestureRecognizer::default();
        let fwd = pointing(0.05);
        let back = pointing(-0.05);
        a.process(Some(&fwd));
        b.process(Some(&back));
        assert_eq!(a.process(Some(&fwd)), GestureLabel::MoveForward);
        assert_eq!(b.process(Some(&back)), GestureLabel::MoveBackward);
    }

    #[test]
    fn observer_sees_every_frame() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut r = GestureRecognizer::default().with_observer(Box::new(Collect(seen.clone())));
        let palm = open_palm();
        r.process(None);
        r.process(Some(&palm));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].angles, None);
        assert_eq!(seen[0].raw, GestureLabel::Unknown);
        assert_eq!(seen[1].raw, GestureLabel::Stop);
        assert!(seen[1].angles.is_some_and(|a| a.index > 150.0));
        assert!(seen[1].to_string().ends_with("Gesture: Unknown"));
    }

    #[test]
    fn rethresholding_keeps_history() {
        let mut r = GestureRecognizer::default();
        let p = pointing(0.05);
        r.process(Some(&p));
        r.set_thresholds(Thresholds {
            direction_dead_zone: 0.01,
            ..Thresholds::default()
        });
        assert_eq!(r.process(Some(&p)), GestureLabel::MoveForward);
    }
}
