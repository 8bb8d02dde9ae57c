pub mod loader;
pub mod settings;
pub mod types;

pub use loader::ConfigError;
pub use settings::{InputMode, Settings, Target};
pub use types::{BatchConfig, Config, LogStyle, NetworkConfig, SerialConfig, SessionConfig};
