use log::warn;
use serde::{Deserialize, Serialize};
use sm83_core::{BootMode, CpuConfig, DmgRevision};
use std::path::{Path, PathBuf};

const DEFAULT_MAX_CYCLES: u64 = 50_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BootSetting {
    #[default]
    SkipBootRom,
    PowerOn,
}

impl From<BootSetting> for BootMode {
    fn from(setting: BootSetting) -> Self {
        match setting {
            BootSetting::SkipBootRom => BootMode::SkipBootRom,
            BootSetting::PowerOn => BootMode::PowerOn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RevisionSetting {
    Rev0,
    RevA,
    RevB,
    #[default]
    RevC,
}

impl From<RevisionSetting> for DmgRevision {
    fn from(setting: RevisionSetting) -> Self {
        match setting {
            RevisionSetting::Rev0 => DmgRevision::Rev0,
            RevisionSetting::RevA => DmgRevision::RevA,
            RevisionSetting::RevB => DmgRevision::RevB,
            RevisionSetting::RevC => DmgRevision::RevC,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RunnerConfig {
    /// Where the program image is copied in the address space.
    pub load_address: u16,
    /// PC override applied after reset.
    pub entry_point: Option<u16>,
    pub boot_mode: BootSetting,
    pub revision: RevisionSetting,
    /// Machine-cycle budget for one run.
    pub max_cycles: u64,
    /// Finish once the CPU halts with IME clear and nothing pending.
    pub stop_on_halt: bool,
    /// Log every executed instruction at trace level.
    pub trace: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            load_address: 0x0000,
            entry_point: None,
            boot_mode: BootSetting::default(),
            revision: RevisionSetting::default(),
            max_cycles: DEFAULT_MAX_CYCLES,
            stop_on_halt: true,
            trace: false,
        }
    }
}

impl RunnerConfig {
    /// Log filter used when `RUST_LOG` is unset.
    pub fn default_log_filter(&self, debug: bool) -> &'static str {
        if self.trace {
            "trace"
        } else if debug {
            "debug"
        } else {
            "info"
        }
    }

    pub fn cpu_config(&self) -> CpuConfig {
        CpuConfig {
            boot: self.boot_mode.into(),
            revision: self.revision.into(),
            ..CpuConfig::default()
        }
    }
}

pub fn default_config_path() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("sm83emu").join("runner.toml");
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("sm83emu")
            .join("runner.toml");
    }

    PathBuf::from("runner.toml")
}

/// Read a config file. `Ok(None)` means there is no file to read.
pub fn try_load_from_file(path: &Path) -> Result<Option<RunnerConfig>, toml::de::Error> {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return Ok(None),
    };
    toml::from_str::<RunnerConfig>(&text).map(Some)
}

pub fn load_from_file(path: &Path) -> RunnerConfig {
    match try_load_from_file(path) {
        Ok(cfg) => cfg.unwrap_or_default(),
        Err(e) => {
            warn!(
                "Failed to parse runner config {}: {e}; using defaults",
                path.display()
            );
            RunnerConfig::default()
        }
    }
}

pub fn save_to_file(path: &Path, cfg: &RunnerConfig) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let text = toml::to_string_pretty(cfg).map_err(std::io::Error::other)?;
    std::fs::write(path, text)
}

/// Parse an address given as `0x`-prefixed hex, `$`-prefixed hex or decimal.
pub fn parse_address(text: &str) -> Result<u16, String> {
    let text = text.trim();
    let parsed = if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .or_else(|| text.strip_prefix('$'))
    {
        u16::from_str_radix(hex, 16)
    } else {
        text.parse::<u16>()
    };
    parsed.map_err(|e| format!("invalid address {text:?}: {e}"))
}
