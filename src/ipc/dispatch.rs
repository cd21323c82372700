use anyhow::{Result, anyhow};

use crate::actions::KeySink;
use crate::config::Profile;
use crate::control::Command;

/// The key chord bound to `cmd`, or `None` when the binding is `none`.
pub fn binding_chord(profile: &Profile, cmd: Command) -> Result<Option<&str>> {
    let Some(action) = profile.binding(cmd) else {
        return Ok(None);
    };
    match action.strip_prefix("key:") {
        Some(rest) => Ok(Some(rest.trim())),
        None => Err(anyhow!(
            "unknown action mapping for {} -> '{}'",
            cmd.binding_key(),
            action
        )),
    }
}

/// Make the sink hold whatever `cmd` is bound to, releasing anything else.
pub fn dispatch_command(cmd: Command, profile: &Profile, sink: &mut KeySink) -> Result<()> {
    let chord = binding_chord(profile, cmd)?;
    sink.hold(chord)
}
