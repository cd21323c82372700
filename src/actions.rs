//! Virtual keyboard driven by the current control command.

use anyhow::{Result, anyhow};
use log::{info, warn};

/// Keys that bindings may name. Registered on the virtual device up front.
const KEY_TOKENS: &[&str] = &[
    "CTRL", "ALT", "SHIFT", "SUPER", "TAB", "SPACE", "ENTER", "ESC", "UP", "DOWN", "LEFT",
    "RIGHT", "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q",
    "R", "S", "T", "U", "V", "W", "X", "Y", "Z",
];

/// Something that can press and release key tokens.
trait KeyDevice {
    fn key(&mut self, tok: &str, pressed: bool) -> Result<()>;
    fn sync(&mut self) -> Result<()>;
}

/// Holds the keys of one chord down until told otherwise.
///
/// `held` only lists keys the device has actually been told to press, so a
/// failed release can be retried later.
pub struct KeySink {
    held: Vec<String>,
    dev: Option<Box<dyn KeyDevice>>,
}

impl KeySink {
    pub fn new() -> Result<Self> {
        #[cfg(target_os = "linux")]
        {
            let dev = LinuxUinput::create()?;
            return Ok(Self::with_device(Box::new(dev)));
        }
        #[allow(unreachable_code)]
        {
            warn!("uinput not available; running in NO-OP mode");
            Ok(Self::noop())
        }
    }

    pub fn noop() -> Self {
        Self {
            held: Vec::new(),
            dev: None,
        }
    }

    fn with_device(dev: Box<dyn KeyDevice>) -> Self {
        Self {
            held: Vec::new(),
            dev: Some(dev),
        }
    }

    pub fn held(&self) -> &[String] {
        &self.held
    }

    /// Make `chord` the held chord: release whatever was held, press the
    /// new keys. `None` releases everything. Holding the same chord again
    /// is a no-op. If pressing fails partway the pressed keys are released
    /// again and nothing is held.
    pub fn hold(&mut self, chord: Option<&str>) -> Result<()> {
        let next = match chord {
            Some(c) => parse_chord(c)?,
            None => Vec::new(),
        };
        if next == self.held {
            return Ok(());
        }
        self.release_all()?;
        if let Err(e) = self.press(&next) {
            if let Err(re) = self.release(&next) {
                warn!("failed to roll back partial chord: {re}");
                self.held = next;
            }
            return Err(e);
        }
        self.held = next;
        Ok(())
    }

    /// Press and release a chord like "CTRL+D" or a single "SPACE".
    pub fn tap(&mut self, chord: &str) -> Result<()> {
        let keys = parse_chord(chord)?;
        let pressed = self.press(&keys);
        let released = self.release(&keys);
        pressed.and(released)
    }

    /// Release the held chord. On error the chord stays recorded as held.
    pub fn release_all(&mut self) -> Result<()> {
        let held = std::mem::take(&mut self.held);
        if let Err(e) = self.release(&held) {
            self.held = held;
            return Err(e);
        }
        Ok(())
    }

    fn press(&mut self, keys: &[String]) -> Result<()> {
        let Some(dev) = self.dev.as_mut() else {
            return Ok(());
        };
        for k in keys {
            dev.key(k, true)?;
        }
        dev.sync()
    }

    /// Attempts every key even if one fails, so as few keys as possible
    /// stay down.
    fn release(&mut self, keys: &[String]) -> Result<()> {
        let Some(dev) = self.dev.as_mut() else {
            return Ok(());
        };
        let mut res = Ok(());
        for k in keys.iter().rev() {
            if let Err(e) = dev.key(k, false) {
                res = Err(e);
            }
        }
        res.and(dev.sync())
    }
}

impl Drop for KeySink {
    fn drop(&mut self) {
        if let Err(e) = self.release_all() {
            warn!("failed to release held keys: {e}");
        }
    }
}

/// Split "ctrl + d" into ["CTRL", "D"], rejecting tokens we cannot emit.
pub fn parse_chord(chord: &str) -> Result<Vec<String>> {
    let keys: Vec<String> = chord
        .split('+')
        .map(|s| canonical(&s.trim().to_ascii_uppercase()).to_string())
        .collect();
    for k in &keys {
        if !KEY_TOKENS.contains(&k.as_str()) {
            return Err(anyhow!("unsupported key token: {k:?}"));
        }
    }
    Ok(keys)
}

fn canonical(tok: &str) -> &str {
    match tok {
        "CONTROL" => "CTRL",
        "META" | "WIN" => "SUPER",
        "RETURN" => "ENTER",
        "ESCAPE" => "ESC",
        other => other,
    }
}

#[cfg(target_os = "linux")]
fn map_key(tok: &str) -> Result<uinput::event::keyboard::Key> {
    use uinput::event::keyboard::Key as K;
    let k = match tok {
        "CTRL" => K::LeftControl,
        "ALT" => K::LeftAlt,
        "SHIFT" => K::LeftShift,
        "SUPER" => K::LeftMeta,
        "TAB" => K::Tab,
        "SPACE" => K::Space,
        "ENTER" => K::Enter,
        "ESC" => K::Esc,
        "UP" => K::Up,
        "DOWN" => K::Down,
        "LEFT" => K::Left,
        "RIGHT" => K::Right,
        "A" => K::A,
        "B" => K::B,
        "C" => K::C,
        "D" => K::D,
        "E" => K::E,
        "F" => K::F,
        "G" => K::G,
        "H" => K::H,
        "I" => K::I,
        "J" => K::J,
        "K" => K::K,
        "L" => K::L,
        "M" => K::M,
        "N" => K::N,
        "O" => K::O,
        "P" => K::P,
        "Q" => K::Q,
        "R" => K::R,
        "S" => K::S,
        "T" => K::T,
        "U" => K::U,
        "V" => K::V,
        "W" => K::W,
        "X" => K::X,
        "Y" => K::Y,
        "Z" => K::Z,
        other => return Err(anyhow!("unsupported key token: {other}")),
    };
    Ok(k)
}

#[cfg(target_os = "linux")]
struct LinuxUinput {
    dev: uinput::device::Device,
}

#[cfg(target_os = "linux")]
impl LinuxUinput {
    fn create() -> Result<Self> {
        let mut builder = uinput::default()?.name("Gesturectl Virtual Keyboard")?;
        for tok in KEY_TOKENS {
            builder = builder.event(map_key(tok)?)?;
        }
        let dev = builder.create()?;

        info!("uinput: created virtual keyboard");
        Ok(Self { dev })
    }
}

#[cfg(target_os = "linux")]
impl KeyDevice for LinuxUinput {
    fn key(&mut self, tok: &str, pressed: bool) -> Result<()> {
        self.dev.send(map_key(tok)?, i32::from(pressed))?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.dev.synchronize()?;
        Ok(())
    }
}
