use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EmulationMode {
    #[default]
    Auto,
    ForceDmg,
    ForceCgb,
}

impl EmulationMode {
    /// Color mode to run in, given what the cartridge header asks for.
    pub fn resolve(self, cart_cgb: bool) -> bool {
        match self {
            Self::Auto => cart_cgb,
            Self::ForceDmg => false,
            Self::ForceCgb => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub emulation_mode: EmulationMode,
    /// Frames to run when `--frames` is not given.
    pub frames: usize,
    /// Write battery RAM and the RTC after the run.
    pub save_on_exit: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            emulation_mode: EmulationMode::Auto,
            frames: 60,
            save_on_exit: true,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("dotboy").join("cli.toml");
        }
    }

    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("dotboy").join("cli.toml");
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("dotboy")
            .join("cli.toml");
    }

    PathBuf::from("cli.toml")
}

/// Read the config at `path`. A missing file gives the defaults silently;
/// an unparsable one logs a warning first.
pub fn load_from_file(path: &Path) -> CliConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return CliConfig::default(),
    };

    match toml::from_str::<CliConfig>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                "Failed to parse config {}: {e}; using defaults",
                path.display()
            );
            CliConfig::default()
        }
    }
}
