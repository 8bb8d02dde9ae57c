use std::path::PathBuf;

use clap::Parser;

use crate::config::{Config, LogStyle};

/// Line-oriented terminal for serial devices and serial-over-TCP bridges.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "serterm")]
#[command(version)]
#[command(about = "Line-oriented terminal for serial devices", long_about = None)]
pub struct Cli {
    /// Serial port to use instead of discovering one
    #[arg(short, long, value_name = "PORT", conflicts_with = "url")]
    pub port: Option<String>,

    /// Serial-over-TCP endpoint, e.g. socket://192.168.1.20:4000
    #[arg(short, long, value_name = "URL")]
    pub url: Option<String>,

    /// Baud rate
    #[arg(short, long, value_name = "RATE")]
    pub baud: Option<u32>,

    /// Read timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Existing directory for the session log
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Lock file that keeps the transport closed while it exists
    #[arg(long, value_name = "FILE")]
    pub lock_file: Option<PathBuf>,

    /// Append a newline to every line typed
    #[arg(short, long)]
    pub newline: bool,

    /// Show received control characters as escape sequences
    #[arg(long)]
    pub show_control: bool,

    /// Send stdin line by line even when it is a terminal
    #[arg(long)]
    pub batch: bool,

    /// Pause after each batch line, in milliseconds
    #[arg(long, value_name = "MS", conflicts_with = "wait_for")]
    pub delay: Option<u64>,

    /// Wait for a device line containing TEXT after each batch line
    #[arg(long, value_name = "TEXT")]
    pub wait_for: Option<String>,

    /// Stop waiting for --wait-for after this many milliseconds
    #[arg(long, value_name = "MS", requires = "wait_for")]
    pub confirm_timeout: Option<u64>,

    /// Timestamped diagnostics with targets and thread names
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to a custom config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Do not record input history
    #[arg(long)]
    pub no_history: bool,

    /// Print the ranked serial ports and exit
    #[arg(long)]
    pub list_ports: bool,
}

impl Cli {
    /// Flags take precedence over the config file.
    pub fn overlay(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.network.url = Some(url.clone());
            config.serial.port = None;
        }
        if let Some(port) = &self.port {
            config.serial.port = Some(port.clone());
            config.network.url = None;
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if let Some(timeout) = self.timeout {
            config.serial.timeout_ms = timeout;
            config.network.read_timeout_ms = timeout;
        }
        if let Some(dir) = &self.log_dir {
            config.session.log_dir = Some(dir.clone());
        }
        if let Some(lock) = &self.lock_file {
            config.session.lock_path = lock.clone();
        }
        if self.newline {
            config.session.newline_on_submit = true;
        }
        if self.show_control {
            config.session.show_control_chars = true;
        }
        if let Some(delay) = self.delay {
            config.batch.delay_ms = delay;
            config.batch.confirm = None;
        }
        if let Some(token) = &self.wait_for {
            config.batch.confirm = Some(token.clone());
        }
        if let Some(timeout) = self.confirm_timeout {
            config.batch.confirm_timeout_ms = Some(timeout);
        }
        if self.verbose {
            config.session.log_style = LogStyle::Verbose;
        }
        if self.no_history {
            config.session.history_disabled = true;
        }
    }

    /// Piped stdin always runs in batch mode.
    pub fn batch_mode(&self, stdin_is_terminal: bool) -> bool {
        self.batch || !stdin_is_terminal
    }
}
