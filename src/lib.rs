pub mod cli;
pub mod config;
pub mod control;
pub mod display;
pub mod input;
pub mod lock;
pub mod logging;
pub mod manager;
pub mod queue;
pub mod reader;
pub mod session;
pub mod session_log;
pub mod shutdown;
pub mod signals;
pub mod transport;
