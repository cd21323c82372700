use anyhow::{Result, anyhow};
use log::warn;
use pico_args::Arguments;
use std::{
    env,
    io::{self, Write},
    process::Command as Process,
    time::Duration,
};

use crate::actions::KeySink;
use crate::config::{DaemonConfigState, Estimator, Profile, default_profile_text};
use crate::control::Command;
use crate::ipc::{self, DaemonOptions, FollowOptions};
use crate::recognizer::{GestureRecognizer, LogObserver};
use crate::pose::Frame;
use crate::source::{LandmarkSource, SourceError, SourceSpec};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    // Options shared by several subcommands; must be taken before free args
    let debug = pargs.contains("--debug");
    let emit = pargs.contains("--emit");
    let source: Option<String> = pargs.opt_value_from_str("--source")?;
    let tick_ms: Option<u64> = pargs.opt_value_from_str("--tick-ms")?;

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        return ipc::run_daemon(DaemonOptions {
            source: source.as_deref().map(SourceSpec::from_arg),
            debug,
        });
    }

    // Flags-based help (-h/--help)
    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("start") => {
            if source.as_deref() == Some("-") {
                return Err(anyhow!(
                    "a background daemon cannot read stdin; use `gesturectl run --source -`"
                ));
            }
            let exe = env::current_exe()?;
            let mut cmd = Process::new(exe);
            cmd.arg("--daemon");
            if debug {
                cmd.arg("--debug");
            }
            if let Some(s) = &source {
                let abs = std::path::absolute(s)?;
                cmd.arg("--source").arg(abs);
            }
            let child = cmd.spawn()?;
            println!("gesturectl: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("run") => ipc::run_daemon(DaemonOptions {
            source: source.as_deref().map(SourceSpec::from_arg),
            debug,
        }),

        Some("stop") => {
            let r = ipc::client_request(serde_json::json!({"op":"shutdown"}))?;
            print_response(&r);
            Ok(())
        }

        Some("status") => {
            let r = ipc::client_request(serde_json::json!({"op":"status"}))?;
            print_response(&r);
            Ok(())
        }

        Some("label") => {
            let r = ipc::client_request(serde_json::json!({"op":"label"}))?;
            let label = r.pointer("/data/label").and_then(|v| v.as_str());
            println!("{}", label.unwrap_or("(none)"));
            Ok(())
        }

        Some("reload") => {
            let r = ipc::client_request(serde_json::json!({"op":"reload"}))?;
            print_response(&r);
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: gesturectl use <profile_name>"))?;
            let r = ipc::client_request(serde_json::json!({"op":"use","profile":name}))?;
            print_response(&r);
            Ok(())
        }

        Some("list") => {
            let r = ipc::client_request(serde_json::json!({"op":"list"}))?;
            print_response(&r);
            Ok(())
        }

        Some("doctor") => {
            let r = ipc::client_request(serde_json::json!({"op":"doctor"}))?;
            print_response(&r);
            Ok(())
        }

        Some("classify") => {
            let input: Option<String> = pargs.opt_free_from_str()?;
            let spec = SourceSpec::from_arg(input.as_deref().or(source.as_deref()).unwrap_or("-"));
            classify(&spec, debug)
        }

        Some("follow") => {
            let mut opts = FollowOptions {
                emit,
                ..FollowOptions::default()
            };
            if let Some(ms) = tick_ms {
                if ms == 0 {
                    return Err(anyhow!("--tick-ms must be positive"));
                }
                opts.tick = Duration::from_millis(ms);
            }
            ipc::run_follow(opts)
        }

        Some("emit") => {
            // usage:
            //   gesturectl emit forward
            //   gesturectl emit stop
            let what: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: gesturectl emit <forward|backward|stop>"))?;
            let cmd = Command::from_cli(&what)
                .ok_or_else(|| anyhow!("unknown command: {what} (forward|backward|stop)"))?;
            let profile = DaemonConfigState::load_or_install_default()?.profile;
            match ipc::binding_chord(&profile, cmd)? {
                Some(chord) => {
                    let mut sink = KeySink::new()?;
                    sink.tap(chord)?;
                    println!("ok: {cmd} -> key {chord}");
                }
                None => println!("ok: {cmd} is not bound to any key"),
            }
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

/// Offline run of one recognizer over a landmark stream.
fn classify(spec: &SourceSpec, debug: bool) -> Result<()> {
    let profile = match DaemonConfigState::load_or_install_default() {
        Ok(cfg) => cfg.profile,
        Err(e) => {
            warn!("using built-in default profile: {e}");
            Profile::parse(default_profile_text())?
        }
    };
    let mut source = LandmarkSource::open(spec, &Estimator::default())?;
    let mut recognizer = GestureRecognizer::new(profile.thresholds.clone(), &profile.smoothing);
    if debug {
        recognizer = recognizer.with_observer(Box::new(LogObserver));
    }
    classify_stream(&mut source, &mut recognizer, &mut io::stdout().lock())?;
    Ok(())
}

/// Write "n\traw -> stable" per frame until end of stream. Malformed
/// frames and bad hands classify as "no hand"; a failing read ends the run.
fn classify_stream(
    source: &mut LandmarkSource,
    recognizer: &mut GestureRecognizer,
    out: &mut impl Write,
) -> Result<u64> {
    let mut n: u64 = 0;
    loop {
        let frame = match source.next_frame() {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(SourceError::Malformed(e)) => {
                warn!("frame {n}: malformed frame: {e}");
                Frame::empty()
            }
            Err(e) => return Err(anyhow!("frame {n}: {e}")),
        };
        let pose = frame.first_pose().unwrap_or_else(|e| {
            warn!("frame {n}: {e}");
            None
        });
        let report = recognizer.process_report(pose.as_ref());
        writeln!(out, "{n}\t{} -> {}", report.raw, report.stable)?;
        n += 1;
    }
    Ok(n)
}

fn print_help() {
    println!(
        r#"gesturectl — hand-gesture control daemon

USAGE:
  gesturectl help [command]                 Show general or command-specific help
  gesturectl start [--source <path>]        Start the daemon in the background
  gesturectl run [--source <path|->]        Run the daemon in the foreground
  gesturectl stop                           Stop the daemon
  gesturectl status                         Show daemon and producer state
  gesturectl label                          Print the current smoothed gesture
  gesturectl reload                         Reload active profile
  gesturectl use <name>                     Switch active profile
  gesturectl list                           List profiles
  gesturectl doctor                         Diagnose permissions and estimator
  gesturectl classify [<path|->]            Classify a landmark stream offline
  gesturectl follow [--tick-ms N] [--emit]  Follow the gesture as a controller
  gesturectl emit <forward|backward|stop>   Tap the key bound to a command

FLAGS:
  --debug                                   Log per-frame finger angles

TIPS:
  - Landmark frames are JSON lines: {{"hands": [[[x, y, z], ... 21 joints]]}}
  - Profiles: ~/.config/gesturectl/profiles
  - Active profile pointer: ~/.config/gesturectl/active
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!(
            "usage: gesturectl start [--source <path>] [--debug]\nStarts the background daemon; without --source it runs [estimator].command."
        ),
        "run" => println!(
            "usage: gesturectl run [--source <path|->] [--debug]\nRuns the daemon in the foreground. Ctrl-C stops it."
        ),
        "stop" => println!("usage: gesturectl stop\nStops the running daemon."),
        "status" => println!(
            "usage: gesturectl status\nShows active profile, landmark source, producer state, frame counters and current label."
        ),
        "label" => println!(
            "usage: gesturectl label\nPrints the latest smoothed label, or (none) before the first frame."
        ),
        "reload" => println!(
            "usage: gesturectl reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: gesturectl use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => {
            println!("usage: gesturectl list\nLists available profiles; marks the active one.")
        }
        "doctor" => println!(
            "usage: gesturectl doctor\nChecks uinput permissions and the configured estimator."
        ),
        "classify" => println!(
            "usage: gesturectl classify [<path|->] [--debug]\nPrints 'raw -> smoothed' for every frame of a landmark stream."
        ),
        "follow" => println!(
            "usage: gesturectl follow [--tick-ms N] [--emit]\nPolls the daemon every N ms (default 16) and prints the effective command.\nUnknown or missing labels keep the last command; it starts as Stop.\nWith --emit, holds the keys bound to the current command."
        ),
        "emit" => println!(
            "usage: gesturectl emit <forward|backward|stop>\nTaps the key chord bound to the command in the active profile."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};

    /// Reader whose every read fails, like a directory opened as a file.
    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("is a directory"))
        }
    }

    #[test]
    fn classify_stops_on_read_error() {
        let mut source = LandmarkSource::from_reader(BufReader::new(Broken));
        let mut out = Vec::new();
        let res = classify_stream(&mut source, &mut GestureRecognizer::default(), &mut out);
        assert!(res.is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn classify_keeps_going_past_malformed_lines() {
        let text = "{broken\n{\"hands\": []}\n";
        let mut source = LandmarkSource::from_reader(Cursor::new(text));
        let mut out = Vec::new();
        let n = classify_stream(&mut source, &mut GestureRecognizer::default(), &mut out).unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "0\tUnknown -> Unknown\n1\tUnknown -> Unknown\n"
        );
    }
}
