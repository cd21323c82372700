use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::{info, warn};
use serde::Deserialize;
use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::actions::parse_chord;
use crate::control::Command;
use crate::smoother::{DEFAULT_MIN_VOTES, DEFAULT_WINDOW};

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

/// Shape-detector thresholds. Angles are DIP bend angles in degrees,
/// distances are in normalized image units.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Thresholds {
    pub extended_deg: f32,
    pub curled_deg: f32,
    pub thumb_spread: f32,
    pub direction_dead_zone: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            extended_deg: 150.0,
            curled_deg: 130.0,
            thumb_spread: 0.1,
            direction_dead_zone: 0.02,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Smoothing {
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_min_votes")]
    pub min_votes: usize,
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}
fn default_min_votes() -> usize {
    DEFAULT_MIN_VOTES
}

impl Default for Smoothing {
    fn default() -> Self {
        Self {
            window: default_window(),
            min_votes: default_min_votes(),
        }
    }
}

/// How to reach the external landmark producer. These values are handed to
/// the estimator, never interpreted here.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Estimator {
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default = "default_confidence")]
    pub min_detection_confidence: f32,
    #[serde(default = "default_confidence")]
    pub min_tracking_confidence: f32,
    #[serde(default = "default_max_hands")]
    pub max_num_hands: u32,
    #[serde(default)]
    pub static_image_mode: bool,
}

fn default_confidence() -> f32 {
    0.7
}
fn default_max_hands() -> u32 {
    1
}

impl Default for Estimator {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            min_detection_confidence: default_confidence(),
            min_tracking_confidence: default_confidence(),
            max_num_hands: default_max_hands(),
            static_image_mode: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    pub thresholds: Thresholds,
    #[serde(default)]
    pub smoothing: Smoothing,
    #[serde(default)]
    pub estimator: Estimator,
    #[serde(default)]
    pub bindings: HashMap<String, String>,
}

impl Profile {
    /// Parse and validate profile text.
    pub fn parse(txt: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(txt)?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    /// Binding for a command; `none`, missing and empty all mean "no action".
    pub fn binding(&self, cmd: Command) -> Option<&str> {
        self.bindings
            .get(cmd.binding_key())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty() && *s != "none")
    }
}

#[derive(Debug, Clone)]
pub struct DaemonConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("gesturectl"))
}

pub fn profiles_dir() -> Result<PathBuf> {
    Ok(config_dir()?.join("profiles"))
}

fn active_ptr_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("active"))
}

pub fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl DaemonConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        let cfgdir = config_dir()?;
        let profdir = profiles_dir()?;
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = active_ptr_path()?;
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = match Self::load_profile(&profdir, &active_name) {
            Ok(p) => p,
            Err(e) if active_name != "default" => {
                warn!("active profile '{active_name}' unusable ({e}); falling back to default");
                return Self::fallback_default(cfgdir, profdir, active_ptr);
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    fn fallback_default(cfgdir: PathBuf, profdir: PathBuf, active_ptr: PathBuf) -> Result<Self> {
        let profile = Self::load_profile(&profdir, "default")?;
        Ok(Self {
            active_name: "default".to_string(),
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    /// Re-read the active profile. On error the last good profile stays.
    pub fn reload(&mut self) -> Result<()> {
        self.profile = Self::load_profile(&self.profiles_dir, &self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        let profile = Self::load_profile(&self.profiles_dir, name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn active_path(&self) -> PathBuf {
        self.profiles_dir.join(format!("{}.toml", self.active_name))
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    fn load_profile(dir: &Path, name: &str) -> Result<Profile> {
        let path = dir.join(format!("{name}.toml"));
        let txt = fs::read_to_string(&path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        Profile::parse(&txt).map_err(|e| anyhow!("failed to load {}: {e}", path.display()))
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let uinput_ok = Path::new("/dev/uinput").exists();
        let in_input_group = check_in_input_group();
        let est = &self.profile.estimator;
        let estimator_found = est.command.first().map(|prog| program_on_path(prog));
        serde_json::json!({
            "uinput_present": uinput_ok,
            "input_group_member": in_input_group,
            "config_dir": self.config_dir,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "estimator": {
                "command": est.command,
                "found": estimator_found,
                "min_detection_confidence": est.min_detection_confidence,
                "min_tracking_confidence": est.min_tracking_confidence,
                "max_num_hands": est.max_num_hands,
                "static_image_mode": est.static_image_mode,
            },
            "hints": {
                "udev_rule": "/etc/udev/rules.d/80-uinput.rules",
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input",
                "estimator": "set [estimator].command to a program printing one JSON landmark frame per line"
            }
        })
    }
}

fn validate_profile(p: &Profile) -> Result<()> {
    let th = &p.thresholds;
    for (name, v) in [("extended_deg", th.extended_deg), ("curled_deg", th.curled_deg)] {
        if !(v > 0.0 && v < 180.0) {
            return Err(anyhow!("thresholds.{name} must be in (0,180) degrees"));
        }
    }
    if th.curled_deg > th.extended_deg {
        return Err(anyhow!(
            "thresholds.curled_deg must not exceed thresholds.extended_deg"
        ));
    }
    if !(0.0..1.0).contains(&th.thumb_spread) {
        return Err(anyhow!(
            "thresholds.thumb_spread must be in [0,1) normalized units"
        ));
    }
    if !(0.0..1.0).contains(&th.direction_dead_zone) {
        return Err(anyhow!(
            "thresholds.direction_dead_zone must be in [0,1) normalized units"
        ));
    }

    let sm = &p.smoothing;
    if sm.window == 0 {
        return Err(anyhow!("smoothing.window must be at least 1"));
    }
    if sm.min_votes == 0 || sm.min_votes > sm.window {
        return Err(anyhow!("smoothing.min_votes must be in 1..=window"));
    }

    let est = &p.estimator;
    for (name, v) in [
        ("min_detection_confidence", est.min_detection_confidence),
        ("min_tracking_confidence", est.min_tracking_confidence),
    ] {
        if !(0.0..=1.0).contains(&v) {
            return Err(anyhow!("estimator.{name} must be in [0,1]"));
        }
    }
    if est.max_num_hands == 0 {
        return Err(anyhow!("estimator.max_num_hands must be at least 1"));
    }

    const KEYS: [&str; 3] = ["move_forward", "move_backward", "stop"];
    for (k, v) in &p.bindings {
        if !KEYS.contains(&k.as_str()) {
            return Err(anyhow!(
                "unknown binding '{}' (expected one of {})",
                k,
                KEYS.join(", ")
            ));
        }
        let v = v.trim();
        if v == "none" {
            continue;
        }
        let Some(chord) = v.strip_prefix("key:") else {
            return Err(anyhow!("binding '{}' has invalid action '{}'", k, v));
        };
        parse_chord(chord)
            .map_err(|e| anyhow!("binding '{}' has invalid chord '{}': {e}", k, chord))?;
    }
    Ok(())
}

fn program_on_path(prog: &str) -> bool {
    if prog.contains('/') {
        return Path::new(prog).exists();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|d| d.join(prog).is_file()))
        .unwrap_or(false)
}

fn check_in_input_group() -> bool {
    if let Ok(s) = fs::read_to_string("/etc/group") {
        let user = whoami::username();
        for line in s.lines() {
            if line.starts_with("input:") {
                if line
                    .split(':')
                    .nth(3)
                    .unwrap_or("")
                    .split(',')
                    .any(|u| u == user)
                {
                    return true;
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with(section: &str) -> String {
        format!("[meta]\nname = \"t\"\n\n{section}")
    }

    const TH: &str = "[thresholds]\nextended_deg = 150.0\ncurled_deg = 130.0\nthumb_spread = 0.1\ndirection_dead_zone = 0.02\n";

    #[test]
    fn default_profile_matches_builtin_defaults() {
        let p = Profile::parse(default_profile_text()).unwrap();
        assert_eq!(p.thresholds, Thresholds::default());
        assert_eq!(p.smoothing, Smoothing::default());
        assert_eq!(p.estimator.min_detection_confidence, 0.7);
        assert_eq!(p.estimator.min_tracking_confidence, 0.7);
        assert_eq!(p.estimator.max_num_hands, 1);
        assert!(!p.estimator.static_image_mode);
        assert_eq!(p.binding(Command::MoveForward), Some("key:D"));
        assert_eq!(p.binding(Command::Stop), None);
    }

    #[test]
    fn optional_sections_default() {
        let p = Profile::parse(&with(TH)).unwrap();
        assert_eq!(p.smoothing.window, 5);
        assert_eq!(p.smoothing.min_votes, 2);
        assert!(p.estimator.command.is_empty());
        assert!(p.bindings.is_empty());
    }

    #[test]
    fn rejects_inverted_angles() {
        let txt = with(
            "[thresholds]\nextended_deg = 120.0\ncurled_deg = 130.0\nthumb_spread = 0.1\ndirection_dead_zone = 0.02\n",
        );
        assert!(Profile::parse(&txt).is_err());
    }

    #[test]
    fn rejects_bad_smoothing() {
        let txt = with(&format!("{TH}\n[smoothing]\nwindow = 3\nmin_votes = 4\n"));
        assert!(Profile::parse(&txt).is_err());
        let txt = with(&format!("{TH}\n[smoothing]\nwindow = 0\n"));
        assert!(Profile::parse(&txt).is_err());
    }

    #[test]
    fn rejects_unknown_binding() {
        let txt = with(&format!("{TH}\n[bindings]\njump = \"key:SPACE\"\n"));
        assert!(Profile::parse(&txt).is_err());
        let txt = with(&format!("{TH}\n[bindings]\nstop = \"mouse:left\"\n"));
        assert!(Profile::parse(&txt).is_err());
        let txt = with(&format!("{TH}\n[bindings]\nstop = \"key:\"\n"));
        assert!(Profile::parse(&txt).is_err());
    }

    #[test]
    fn rejects_unemittable_chords() {
        let txt = with(&format!("{TH}\n[bindings]\nmove_forward = \"key:F13\"\n"));
        assert!(Profile::parse(&txt).is_err());
        let txt = with(&format!("{TH}\n[bindings]\nmove_forward = \"key:CTRL+HYPER\"\n"));
        assert!(Profile::parse(&txt).is_err());
        let txt = with(&format!("{TH}\n[bindings]\nmove_forward = \"key:ctrl + w\"\n"));
        assert!(Profile::parse(&txt).is_ok());
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let txt = with(&format!(
            "{TH}\n[estimator]\nmin_detection_confidence = 1.5\n"
        ));
        assert!(Profile::parse(&txt).is_err());
    }
}
