use anyhow::Result;
use log::{error, info, warn};
use signal_hook::consts::{SIGINT, SIGTERM};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use super::dispatch::dispatch_command;
use super::server::client_request;
use crate::actions::KeySink;
use crate::config::{DaemonConfigState, Profile};
use crate::control::{Command, ControlState};

#[derive(Debug, Clone)]
pub struct FollowOptions {
    pub tick: Duration,
    /// Drive the profile's key bindings, not just print commands.
    pub emit: bool,
}

impl Default for FollowOptions {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(16),
            emit: false,
        }
    }
}

/// Consumer control loop. Polls the daemon's mailbox once per tick and
/// never waits for a fresh value; an unreachable daemon reads as "nothing
/// new" and the last actionable command stays in force.
pub fn run_follow(opts: FollowOptions) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, stop.clone())?;
    signal_hook::flag::register(SIGTERM, stop.clone())?;

    let profile = if opts.emit {
        Some(DaemonConfigState::load_or_install_default()?.profile)
    } else {
        None
    };
    let mut sink = if opts.emit {
        KeySink::new().unwrap_or_else(|e| {
            warn!("virtual keyboard unavailable ({e}); not emitting keys");
            KeySink::noop()
        })
    } else {
        KeySink::noop()
    };

    let mut control = ControlState::default();
    let mut current = control.current();
    announce(current, profile.as_ref(), &mut sink);
    let mut reachable = true;

    while !stop.load(Ordering::Relaxed) {
        let raw = match client_request(serde_json::json!({"op": "label"})) {
            Ok(v) => {
                if !reachable {
                    info!("daemon reachable again");
                    reachable = true;
                }
                v.pointer("/data/label")
                    .and_then(|l| l.as_str())
                    .map(str::to_string)
            }
            Err(e) => {
                if reachable {
                    warn!("cannot read gesture label ({e}); holding last command");
                    reachable = false;
                }
                None
            }
        };

        let cmd = control.observe(raw.as_deref());
        if cmd != current {
            announce(cmd, profile.as_ref(), &mut sink);
            current = cmd;
        }

        thread::sleep(opts.tick);
    }

    sink.release_all()
}

fn announce(cmd: Command, profile: Option<&Profile>, sink: &mut KeySink) {
    println!("{cmd}");
    if let Some(p) = profile {
        if let Err(e) = dispatch_command(cmd, p, sink) {
            error!("dispatch failed: {e}");
        }
    }
}
