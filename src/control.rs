//! Consumer side of the mailbox: turns whatever was read into a command
//! that is always actionable.

use std::fmt;

use crate::gestures::GestureLabel;

/// What the controller acts on. Never "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    MoveForward,
    MoveBackward,
    Stop,
}

impl Command {
    pub fn from_label(label: GestureLabel) -> Option<Self> {
        match label {
            GestureLabel::MoveForward => Some(Self::MoveForward),
            GestureLabel::MoveBackward => Some(Self::MoveBackward),
            GestureLabel::Stop => Some(Self::Stop),
            GestureLabel::Unknown => None,
        }
    }

    pub fn label(self) -> GestureLabel {
        match self {
            Self::MoveForward => GestureLabel::MoveForward,
            Self::MoveBackward => GestureLabel::MoveBackward,
            Self::Stop => GestureLabel::Stop,
        }
    }

    /// Key used in profile `[bindings]`.
    pub fn binding_key(self) -> &'static str {
        match self {
            Self::MoveForward => "move_forward",
            Self::MoveBackward => "move_backward",
            Self::Stop => "stop",
        }
    }

    /// CLI spelling: `forward`, `backward`, `stop`.
    pub fn from_cli(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "forward" | "move_forward" => Some(Self::MoveForward),
            "backward" | "move_backward" => Some(Self::MoveBackward),
            "stop" => Some(Self::Stop),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label().as_str())
    }
}

/// Remembers the last actionable value seen on the mailbox.
#[derive(Debug, Clone)]
pub struct ControlState {
    last: Command,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            last: Command::Stop,
        }
    }
}

impl ControlState {
    /// Feed one read of the mailbox. `None` means nothing could be read
    /// (empty slot, producer gone). Anything outside the three actionable
    /// labels keeps the previous command.
    pub fn observe(&mut self, raw: Option<&str>) -> Command {
        if let Some(cmd) = raw
            .and_then(|s| s.parse::<GestureLabel>().ok())
            .and_then(Command::from_label)
        {
            self.last = cmd;
        }
        self.last
    }

    pub fn observe_label(&mut self, label: Option<GestureLabel>) -> Command {
        self.observe(label.map(|l| l.as_str()))
    }

    pub fn current(&self) -> Command {
        self.last
    }
}
