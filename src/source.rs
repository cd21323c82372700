//! Landmark frame sources: stdin, a file/FIFO, or a spawned estimator.
//!
//! Every source speaks the same line protocol: one JSON [`Frame`] per line.

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::PathBuf,
    process::{Child, Command, Stdio},
    sync::{Arc, Mutex},
};

use log::info;
use thiserror::Error;

use crate::config::Estimator;
use crate::pose::Frame;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no landmark source configured (set [estimator].command or pass --source)")]
    NotConfigured,
    #[error("failed to open landmark source {}: {err}", .path.display())]
    Open { path: PathBuf, err: io::Error },
    #[error("failed to spawn estimator {prog:?}: {err}")]
    Spawn { prog: String, err: io::Error },
    #[error("estimator has no stdout")]
    NoStdout,
    #[error("read failed: {0}")]
    Read(#[from] io::Error),
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Stdin,
    Path(PathBuf),
    Command(Vec<String>),
}

impl SourceSpec {
    /// `-` is stdin, anything else a path.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            Self::Stdin
        } else {
            Self::Path(PathBuf::from(arg))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Stdin => "stdin".to_string(),
            Self::Path(p) => p.display().to_string(),
            Self::Command(argv) => argv.join(" "),
        }
    }
}

/// Shared handle to a spawned estimator so another thread can kill it,
/// which unblocks a pending read.
pub type ChildHandle = Arc<Mutex<Option<Child>>>;

pub struct LandmarkSource {
    reader: Box<dyn BufRead + Send>,
    child: ChildHandle,
    line: Vec<u8>,
}

impl LandmarkSource {
    pub fn open(spec: &SourceSpec, est: &Estimator) -> Result<Self, SourceError> {
        match spec {
            SourceSpec::Stdin => Ok(Self::from_reader(BufReader::new(io::stdin()))),
            SourceSpec::Path(path) => {
                let f = File::open(path).map_err(|err| SourceError::Open {
                    path: path.clone(),
                    err,
                })?;
                Ok(Self::from_reader(BufReader::new(f)))
            }
            SourceSpec::Command(argv) => Self::spawn(argv, est),
        }
    }

    pub fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            child: Arc::new(Mutex::new(None)),
            line: Vec::new(),
        }
    }

    fn spawn(argv: &[String], est: &Estimator) -> Result<Self, SourceError> {
        let (prog, args) = argv.split_first().ok_or(SourceError::NotConfigured)?;
        let mut child = Command::new(prog)
            .args(args)
            .env(
                "GESTURECTL_MIN_DETECTION_CONFIDENCE",
                est.min_detection_confidence.to_string(),
            )
            .env(
                "GESTURECTL_MIN_TRACKING_CONFIDENCE",
                est.min_tracking_confidence.to_string(),
            )
            .env("GESTURECTL_MAX_NUM_HANDS", est.max_num_hands.to_string())
            .env(
                "GESTURECTL_STATIC_IMAGE_MODE",
                if est.static_image_mode { "1" } else { "0" },
            )
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|err| SourceError::Spawn {
                prog: prog.clone(),
                err,
            })?;
        let stdout = child.stdout.take().ok_or(SourceError::NoStdout)?;
        info!("estimator started: {} (pid={})", argv.join(" "), child.id());

        Ok(Self {
            reader: Box::new(BufReader::new(stdout)),
            child: Arc::new(Mutex::new(Some(child))),
            line: Vec::new(),
        })
    }

    pub fn child_handle(&self) -> ChildHandle {
        self.child.clone()
    }

    /// Block until the next frame.
    ///
    /// `Ok(None)` is end of stream. A malformed line, invalid UTF-8
    /// included, is returned as [`SourceError::Malformed`] and the source
    /// stays usable; blank lines are skipped. `Read` means the stream
    /// itself failed.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        loop {
            self.line.clear();
            if self.reader.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(None);
            }
            if self.line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(Some(serde_json::from_slice(&self.line)?));
        }
    }
}

/// Kill a spawned estimator, if any. Safe to call more than once.
pub fn kill_child(handle: &ChildHandle) {
    if let Ok(mut guard) = handle.lock() {
        if let Some(mut child) = guard.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for LandmarkSource {
    fn drop(&mut self) {
        kill_child(&self.child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn hand() -> String {
        let lm = vec![[0.5, 0.5, 0.0]; 21];
        serde_json::json!({ "hands": [lm] }).to_string()
    }

    #[test]
    fn reads_frames_until_eof() {
        let text = format!("{}\n\n{{\"hands\": []}}\n", hand());
        let mut src = LandmarkSource::from_reader(Cursor::new(text));
        let f1 = src.next_frame().unwrap().unwrap();
        assert_eq!(f1.hands.len(), 1);
        let f2 = src.next_frame().unwrap().unwrap();
        assert!(f2.hands.is_empty());
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn malformed_line_is_recoverable() {
        let text = format!("not json\n{}\n", hand());
        let mut src = LandmarkSource::from_reader(Cursor::new(text));
        assert!(matches!(src.next_frame(), Err(SourceError::Malformed(_))));
        assert!(src.next_frame().unwrap().is_some());
    }

    #[test]
    fn invalid_utf8_line_is_malformed() {
        let mut bytes = b"\xff\xfe garbage\n".to_vec();
        bytes.extend_from_slice(hand().as_bytes());
        bytes.push(b'\n');
        let mut src = LandmarkSource::from_reader(Cursor::new(bytes));
        assert!(matches!(src.next_frame(), Err(SourceError::Malformed(_))));
        assert_eq!(src.next_frame().unwrap().unwrap().hands.len(), 1);
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn directory_fails_to_read() {
        let spec = SourceSpec::Path(std::env::temp_dir());
        // some platforms refuse to open a directory at all
        if let Ok(mut src) = LandmarkSource::open(&spec, &Estimator::default()) {
            assert!(matches!(src.next_frame(), Err(SourceError::Read(_))));
        }
    }

    #[test]
    fn empty_command_is_not_configured() {
        let spec = SourceSpec::Command(Vec::new());
        assert!(matches!(
            LandmarkSource::open(&spec, &Estimator::default()),
            Err(SourceError::NotConfigured)
        ));
    }

    #[test]
    fn missing_file_fails_to_open() {
        let spec = SourceSpec::from_arg("/nonexistent/gesturectl/frames.jsonl");
        assert!(matches!(
            LandmarkSource::open(&spec, &Estimator::default()),
            Err(SourceError::Open { .. })
        ));
    }

    #[test]
    fn dash_is_stdin() {
        assert_eq!(SourceSpec::from_arg("-"), SourceSpec::Stdin);
    }
}
