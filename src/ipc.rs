//! Daemon side: producer thread, control socket and the follow loop.

mod dispatch;
mod follow;
mod pipeline;
mod runtime;
mod server;

pub use dispatch::{binding_chord, dispatch_command};
pub use follow::{FollowOptions, run_follow};
pub use pipeline::{ProducerState, ProducerStats, run_pipeline};
pub use server::{DaemonOptions, client_request, run_daemon};
