use std::path::PathBuf;
use std::time::Duration;

use crate::config::types::{Config, LogStyle};
use crate::input::{FlowControl, History};
use crate::transport::{NetworkSettings, SerialSettings};

/// What the session connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Serial-over-TCP endpoint.
    Network(String),
    /// A single named serial port.
    Serial(String),
    /// Whatever `serialport` reports, ranked by preferred markers.
    Discover,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Interactive,
    Batch(FlowControl),
}

/// Everything a session needs, resolved from the config file and the
/// command line.
#[derive(Debug, Clone)]
pub struct Settings {
    pub target: Target,
    pub serial: SerialSettings,
    pub preferred_markers: Vec<String>,
    pub network: NetworkSettings,
    pub lock_path: PathBuf,
    pub log_dir: Option<PathBuf>,
    /// `None` disables history.
    pub history_path: Option<PathBuf>,
    pub newline_on_submit: bool,
    pub show_control: bool,
    pub log_style: LogStyle,
    pub input: InputMode,
}

impl Settings {
    /// Resolve a validated config. `batch` selects the piped input flow.
    pub fn from_config(config: &Config, batch: bool) -> Self {
        let target = match (&config.network.url, &config.serial.port) {
            (Some(url), _) => Target::Network(url.clone()),
            (None, Some(port)) => Target::Serial(port.clone()),
            (None, None) => Target::Discover,
        };

        let history_path = if config.session.history_disabled {
            None
        } else {
            Some(
                config
                    .session
                    .history_path
                    .clone()
                    .unwrap_or_else(History::default_path),
            )
        };

        let input = if batch {
            InputMode::Batch(flow_control(config))
        } else {
            InputMode::Interactive
        };

        Self {
            target,
            serial: SerialSettings {
                baud_rate: config.serial.baud_rate,
                timeout: Duration::from_millis(config.serial.timeout_ms),
                reconnect_delay: Duration::from_millis(config.serial.reconnect_delay_ms),
            },
            preferred_markers: config.serial.preferred_markers.clone(),
            network: NetworkSettings {
                connect_timeout: Duration::from_millis(config.network.connect_timeout_ms),
                read_timeout: Duration::from_millis(config.network.read_timeout_ms),
            },
            lock_path: config.session.lock_path.clone(),
            log_dir: config.session.log_dir.clone(),
            history_path,
            newline_on_submit: config.session.newline_on_submit,
            show_control: config.session.show_control_chars,
            log_style: config.session.log_style,
            input,
        }
    }
}

fn flow_control(config: &Config) -> FlowControl {
    match &config.batch.confirm {
        Some(token) => FlowControl::Confirm {
            token: token.clone(),
            timeout: config.batch.confirm_timeout_ms.map(Duration::from_millis),
        },
        None => FlowControl::Delay(Duration::from_millis(config.batch.delay_ms)),
    }
}
