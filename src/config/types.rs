use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Serial line settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Fixed port (e.g., "/dev/ttyUSB0"). Skips discovery when set.
    #[serde(default)]
    pub port: Option<String>,
    /// Line speed (default: 115200).
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Read timeout in milliseconds (default: 100).
    #[serde(default = "default_serial_timeout")]
    pub timeout_ms: u64,
    /// Substrings that rank a discovered port first, in priority order.
    #[serde(default = "default_preferred_markers")]
    pub preferred_markers: Vec<String>,
    /// First reconnect delay in milliseconds; doubles per attempt (default: 250).
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

/// Serial-over-TCP settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Endpoint such as "socket://192.168.1.20:4000". Takes precedence over serial.
    #[serde(default)]
    pub url: Option<String>,
    /// Connection timeout in milliseconds (default: 3000).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Read timeout in milliseconds (default: 100).
    #[serde(default = "default_network_read_timeout")]
    pub read_timeout_ms: u64,
}

/// Per-session behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lock file shared with other programs that need the port.
    #[serde(default = "default_lock_path")]
    pub lock_path: PathBuf,
    /// Existing directory for session logs. No log when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Input history file. Defaults to the platform data directory.
    #[serde(default)]
    pub history_path: Option<PathBuf>,
    /// Disable input history entirely.
    #[serde(default)]
    pub history_disabled: bool,
    /// Append a newline to every interactive line.
    #[serde(default)]
    pub newline_on_submit: bool,
    /// Show received control characters as escape text.
    #[serde(default)]
    pub show_control_chars: bool,
    /// Diagnostics format: "terse" or "verbose".
    #[serde(default)]
    pub log_style: LogStyle,
}

/// Piped input pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Pause after each line in milliseconds (default: 500).
    #[serde(default = "default_batch_delay")]
    pub delay_ms: u64,
    /// Wait for a device line containing this text instead of pausing.
    #[serde(default)]
    pub confirm: Option<String>,
    /// Give up waiting for a confirmation after this many milliseconds.
    #[serde(default)]
    pub confirm_timeout_ms: Option<u64>,
}

/// Diagnostics presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStyle {
    #[default]
    Terse,
    Verbose,
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_serial_timeout() -> u64 {
    100
}

fn default_preferred_markers() -> Vec<String> {
    vec!["USB".to_string(), "ACM".to_string()]
}

fn default_reconnect_delay() -> u64 {
    250
}

fn default_connect_timeout() -> u64 {
    3000
}

fn default_network_read_timeout() -> u64 {
    100
}

fn default_lock_path() -> PathBuf {
    std::env::temp_dir().join("serterm.lock")
}

fn default_batch_delay() -> u64 {
    500
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
            timeout_ms: default_serial_timeout(),
            preferred_markers: default_preferred_markers(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            url: None,
            connect_timeout_ms: default_connect_timeout(),
            read_timeout_ms: default_network_read_timeout(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lock_path: default_lock_path(),
            log_dir: None,
            history_path: None,
            history_disabled: false,
            newline_on_submit: false,
            show_control_chars: false,
            log_style: LogStyle::default(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_batch_delay(),
            confirm: None,
            confirm_timeout_ms: None,
        }
    }
}
