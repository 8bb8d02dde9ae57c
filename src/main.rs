use std::io::{self, BufReader, IsTerminal};

use anyhow::{Context, Result};
use clap::Parser;

use serterm::cli::Cli;
use serterm::config::{Config, Settings};
use serterm::display::TerminalDisplay;
use serterm::logging::init_tracing;
use serterm::session::{self, SessionIo};
use serterm::transport::discover_candidates;

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    cli.overlay(&mut config);
    config.validate()?;

    let settings = Settings::from_config(&config, cli.batch_mode(io::stdin().is_terminal()));

    if cli.list_ports {
        let ports = discover_candidates(&settings.preferred_markers)
            .context("Cannot enumerate serial ports")?;
        if ports.is_empty() {
            eprintln!("No serial ports found");
        }
        for port in ports {
            println!("{}", port);
        }
        return Ok(());
    }

    init_tracing(settings.log_style);

    let transport = session::build_transport(&settings).context("Cannot set up transport")?;
    let io = SessionIo {
        input: BufReader::new(io::stdin()),
        received: TerminalDisplay::stdout(settings.show_control),
        echo: TerminalDisplay::stdout(settings.show_control),
    };
    session::run(&settings, transport, io)
}
