use anyhow::{Result, anyhow};
use log::{error, info, warn};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use signal_hook::consts::{SIGINT, SIGTERM};
use std::{
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Sender},
    },
    thread,
    time::Duration,
};

use super::pipeline::{ProducerState, ProducerStats, run_pipeline};
use super::runtime::socket_path;
use crate::config::{DaemonConfigState, Profile};
use crate::mailbox::Mailbox;
use crate::recognizer::{GestureRecognizer, LogObserver};
use crate::source::{ChildHandle, LandmarkSource, SourceSpec, kill_child};

#[derive(Debug, Clone, Default)]
pub struct DaemonOptions {
    /// Overrides `[estimator].command` when set.
    pub source: Option<SourceSpec>,
    pub debug: bool,
}

pub fn run_daemon(opts: DaemonOptions) -> Result<()> {
    // socket
    let sock = socket_path()?;
    if sock.exists() {
        if UnixStream::connect(&sock).is_ok() {
            return Err(anyhow!(
                "gesturectl daemon already running (socket {})",
                sock.display()
            ));
        }
        let _ = std::fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("daemon: listening on {}", sock.display());

    // stop on SIGINT/SIGTERM
    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, stop.clone())?;
    signal_hook::flag::register(SIGTERM, stop.clone())?;

    // state
    let mut state = DaemonState::new(&opts)?;
    info!("daemon: active profile '{}'", state.cfg.active_name);

    // channels
    let (tx_req, rx_req) = mpsc::channel::<IpcMsg>();

    // producer thread
    let mut gesture_thread = GestureThread::start(&state, &opts, stop.clone());

    // profile hot reload
    let _watcher = match watch_profiles(&state.cfg.profiles_dir, tx_req.clone()) {
        Ok(w) => Some(w),
        Err(e) => {
            warn!("profile watching disabled: {e}");
            None
        }
    };

    // accept loop
    listener.set_nonblocking(true)?;
    while !stop.load(Ordering::Relaxed) {
        if let Ok((stream, _)) = listener.accept() {
            let tx = tx_req.clone();
            let st_snapshot = state.clone_shallow();
            thread::spawn(move || {
                if let Err(e) = handle_client(stream, st_snapshot, tx) {
                    error!("ipc client error: {e}");
                }
            });
        }

        let mut reload = false;
        while let Ok(msg) = rx_req.try_recv() {
            match msg {
                IpcMsg::Reload => reload = true,
                IpcMsg::ProfileChanged(paths) => {
                    if paths.iter().any(|p| p == &state.cfg.active_path()) {
                        reload = true;
                    }
                }
                IpcMsg::UseProfile(name) => {
                    if let Err(e) = state.cfg.set_active(&name) {
                        error!("use profile failed: {e}");
                    } else {
                        gesture_thread.update_profile(state.cfg.profile.clone());
                        info!("switched active profile to {}", state.cfg.active_name);
                    }
                }
                IpcMsg::Shutdown => stop.store(true, Ordering::Relaxed),
            }
        }
        if reload {
            if let Err(e) = state.cfg.reload() {
                error!("reload failed, keeping last good profile: {e}");
            } else {
                gesture_thread.update_profile(state.cfg.profile.clone());
                info!("profile reloaded");
            }
        }

        thread::sleep(Duration::from_millis(5));
    }

    info!("daemon: shutting down");
    gesture_thread.stop();
    let _ = std::fs::remove_file(&sock);
    Ok(())
}

fn handle_client(mut stream: UnixStream, st: DaemonState, tx_req: Sender<IpcMsg>) -> Result<()> {
    stream.set_nonblocking(false)?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }
    let req: serde_json::Value = serde_json::from_str(&line)?;
    let op = req.get("op").and_then(|v| v.as_str()).unwrap_or("");

    let resp = match op {
        "status" => serde_json::json!({"ok": true, "data": {
            "active_profile": st.cfg.active_name,
            "socket": socket_path().ok(),
            "source": st.source.as_ref().map(|s| s.describe()),
            "producer": st.stats.to_json(),
            "label": st.mailbox.get().map(|l| l.as_str()),
        }}),
        "label" => serde_json::json!({"ok": true, "data": {
            "label": st.mailbox.get().map(|l| l.as_str()),
        }}),
        "reload" => {
            let _ = tx_req.send(IpcMsg::Reload);
            serde_json::json!({"ok": true, "data": {"active_profile": st.cfg.active_name}})
        }
        "use" => {
            let name = req.get("profile").and_then(|v| v.as_str()).unwrap_or("");
            if name.is_empty() {
                serde_json::json!({"ok": false, "error": "missing profile name"})
            } else {
                let _ = tx_req.send(IpcMsg::UseProfile(name.to_string()));
                serde_json::json!({"ok": true, "data": {"active_profile": name}})
            }
        }
        "list" => {
            let list = st.cfg.list_profiles();
            serde_json::json!({"ok": true, "data": {"profiles": list, "active": st.cfg.active_name}})
        }
        "doctor" => {
            let report = st.cfg.doctor_report();
            serde_json::json!({"ok": true, "data": report})
        }
        "shutdown" => {
            let _ = tx_req.send(IpcMsg::Shutdown);
            serde_json::json!({"ok": true, "data": "shutting down"})
        }
        _ => serde_json::json!({"ok": false, "error": format!("unknown op: {op}")}),
    };

    writeln!(stream, "{}", resp)?;
    Ok(())
}

struct DaemonState {
    cfg: DaemonConfigState,
    source: Option<SourceSpec>,
    mailbox: Arc<Mailbox>,
    stats: Arc<ProducerStats>,
}

impl DaemonState {
    fn new(opts: &DaemonOptions) -> Result<Self> {
        let cfg = DaemonConfigState::load_or_install_default()?;
        let source = opts.source.clone().or_else(|| {
            let cmd = &cfg.profile.estimator.command;
            (!cmd.is_empty()).then(|| SourceSpec::Command(cmd.clone()))
        });
        Ok(Self {
            cfg,
            source,
            mailbox: Arc::new(Mailbox::new()),
            stats: Arc::new(ProducerStats::default()),
        })
    }

    fn clone_shallow(&self) -> Self {
        Self {
            cfg: self.cfg.clone(),
            source: self.source.clone(),
            mailbox: self.mailbox.clone(),
            stats: self.stats.clone(),
        }
    }
}

enum IpcMsg {
    Reload,
    ProfileChanged(Vec<PathBuf>),
    UseProfile(String),
    Shutdown,
}

fn watch_profiles(dir: &Path, tx: Sender<IpcMsg>) -> notify::Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(ev) if ev.kind.is_modify() || ev.kind.is_create() => {
                let _ = tx.send(IpcMsg::ProfileChanged(ev.paths));
            }
            Ok(_) => {}
            Err(e) => warn!("profile watch error: {e}"),
        }
    })?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Owns the producer thread and the handles needed to stop it.
struct GestureThread {
    profile: Arc<Mutex<Profile>>,
    child: Option<ChildHandle>,
    handle: Option<thread::JoinHandle<()>>,
}

impl GestureThread {
    /// Open the landmark source and spawn the producer. A source that
    /// cannot be opened is reported once; the daemon keeps running
    /// without a producer.
    fn start(state: &DaemonState, opts: &DaemonOptions, stop: Arc<AtomicBool>) -> Self {
        let profile = state.cfg.profile.clone();
        let profile_arc = Arc::new(Mutex::new(profile.clone()));

        let Some(spec) = state.source.as_ref() else {
            error!("no landmark source configured; set [estimator].command or pass --source");
            state.stats.set_state(ProducerState::Failed);
            return Self::idle(profile_arc);
        };
        let source = match LandmarkSource::open(spec, &profile.estimator) {
            Ok(s) => s,
            Err(e) => {
                error!("gesture producer not started: {e}");
                state.stats.set_state(ProducerState::Failed);
                return Self::idle(profile_arc);
            }
        };
        info!("landmark source: {}", spec.describe());

        let mut recognizer = GestureRecognizer::new(profile.thresholds.clone(), &profile.smoothing);
        if opts.debug {
            recognizer = recognizer.with_observer(Box::new(LogObserver));
        }

        let child = source.child_handle();
        let prof_clone = profile_arc.clone();
        let mailbox = state.mailbox.clone();
        let stats = state.stats.clone();
        let spawned = thread::Builder::new()
            .name("gesture-producer".into())
            .spawn(move || {
                if let Err(e) = run_pipeline(source, recognizer, prof_clone, mailbox, stats, stop) {
                    error!("gesture pipeline failed: {e}");
                }
            });

        match spawned {
            Ok(handle) => Self {
                profile: profile_arc,
                child: Some(child),
                handle: Some(handle),
            },
            Err(e) => {
                error!("failed to spawn producer thread: {e}");
                state.stats.set_state(ProducerState::Failed);
                kill_child(&child);
                Self::idle(profile_arc)
            }
        }
    }

    fn idle(profile: Arc<Mutex<Profile>>) -> Self {
        Self {
            profile,
            child: None,
            handle: None,
        }
    }

    fn update_profile(&mut self, new_profile: Profile) {
        if let Ok(mut p) = self.profile.lock() {
            if p.smoothing != new_profile.smoothing || p.estimator != new_profile.estimator {
                warn!("smoothing/estimator changes take effect after a daemon restart");
            }
            *p = new_profile;
        }
    }

    /// The stop flag is already set; kill the estimator so a blocked read
    /// returns, then wait for the loop to exit. A stdin/file source may
    /// stay blocked in read; that thread is left to die with the process.
    fn stop(&mut self) {
        let Some(child) = self.child.take() else {
            return;
        };
        let spawned = child.lock().map(|c| c.is_some()).unwrap_or(false);
        kill_child(&child);
        if spawned {
            if let Some(h) = self.handle.take() {
                let _ = h.join();
            }
        }
    }
}

// client helper
pub fn client_request(req: serde_json::Value) -> Result<serde_json::Value> {
    let sock = socket_path()?;
    if !sock.exists() {
        return Err(anyhow!(
            "gesturectl daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(sock)?;
    stream.set_read_timeout(Some(Duration::from_millis(500)))?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: serde_json::Value = serde_json::from_str(&resp)?;
    Ok(v)
}
