// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::path::Path;

use clap::ValueEnum;
use framelink_present::VsyncMode;
use framelink_vk::RenderSettings;
use serde::Deserialize;
use tracing::{debug, warn};

pub const DEFAULT_PATH: &str = "framelink.toml";

#[derive(Debug, Deserialize, Default)]
pub struct AppCfg {
    #[serde(default)]
    pub window: WindowCfg,
    #[serde(default)]
    pub render: RenderCfg,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WindowCfg {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RenderCfg {
    #[serde(default = "default_clear")]
    pub clear_color: [f32; 4],
    #[serde(default)]
    pub vsync_mode: VsyncCfg,
    #[serde(default = "default_validation")]
    pub validation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum VsyncCfg {
    Fifo,
    #[default]
    Mailbox,
}

impl From<VsyncCfg> for VsyncMode {
    fn from(v: VsyncCfg) -> Self {
        match v {
            VsyncCfg::Fifo => VsyncMode::Fifo,
            VsyncCfg::Mailbox => VsyncMode::Mailbox,
        }
    }
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: default_title(),
            width: default_width(),
            height: default_height(),
        }
    }
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            clear_color: default_clear(),
            vsync_mode: VsyncCfg::Mailbox,
            validation: default_validation(),
        }
    }
}

impl RenderCfg {
    pub fn settings(&self) -> RenderSettings {
        RenderSettings {
            clear_color: self.clear_color,
            vsync: self.vsync_mode.into(),
            validation: self.validation,
        }
    }
}

fn default_title() -> String {
    "framelink".to_owned()
}
fn default_width() -> u32 {
    800
}
fn default_height() -> u32 {
    600
}
fn default_clear() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}
fn default_validation() -> bool {
    true
}

/// Missing file means defaults. A malformed file is reported and also falls
/// back to defaults.
pub fn load_cfg(path: &Path) -> AppCfg {
    match fs::read_to_string(path) {
        Ok(s) => parse_cfg(&s).unwrap_or_else(|e| {
            warn!("{}: {e}; using defaults", path.display());
            AppCfg::default()
        }),
        Err(_) => {
            debug!("{} not found, using defaults", path.display());
            AppCfg::default()
        }
    }
}

pub fn parse_cfg(s: &str) -> Result<AppCfg, toml::de::Error> {
    toml::from_str::<AppCfg>(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = parse_cfg("").unwrap();
        assert_eq!(cfg.window.title, "framelink");
        assert_eq!((cfg.window.width, cfg.window.height), (800, 600));
        assert_eq!(cfg.render.clear_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(cfg.render.vsync_mode, VsyncCfg::Mailbox);
        assert!(cfg.render.validation);
    }

    #[test]
    fn sections_override_fields_independently() {
        let cfg = parse_cfg(
            r#"
            [window]
            title = "demo"

            [render]
            vsync_mode = "fifo"
            clear_color = [0.1, 0.2, 0.3, 1.0]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.window.title, "demo");
        assert_eq!(cfg.window.width, 800);
        assert_eq!(cfg.render.vsync_mode, VsyncCfg::Fifo);
        assert_eq!(cfg.render.clear_color, [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(cfg.render.settings().vsync, VsyncMode::Fifo);
    }

    #[test]
    fn unknown_vsync_mode_is_rejected() {
        assert!(parse_cfg("[render]\nvsync_mode = \"immediate\"").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = load_cfg(Path::new("/nonexistent/framelink.toml"));
        assert_eq!(cfg.render.vsync_mode, VsyncCfg::Mailbox);
    }
}
