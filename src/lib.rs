//! Hand-gesture recognition: landmark frames in, a stable drive command out.
//!
//! The engine is [`recognizer::GestureRecognizer`], built from
//! [`gestures::PoseClassifier`] and [`smoother::TemporalSmoother`]. Its output
//! is published through a [`mailbox::Mailbox`] and read by a controller via
//! [`control::ControlState`]. The `ipc` module wraps all of this in a daemon.

pub mod actions;
pub mod cli;
pub mod config;
pub mod control;
pub mod geometry;
pub mod gestures;
pub mod ipc;
pub mod logging;
pub mod mailbox;
pub mod pose;
pub mod recognizer;
pub mod smoother;
pub mod source;
