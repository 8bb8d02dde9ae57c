use std::io::{self, IsTerminal, Stdout, Write};

use crossterm::queue;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

use crate::control;

const CONTROL_COLOR: Color = Color::DarkYellow;
const ECHO_COLOR: Color = Color::Cyan;

/// Where received units and local echoes end up.
pub trait DisplaySink: Send {
    /// Show one unit received from the device.
    fn show(&mut self, unit: char);

    /// Show a message that was just queued for sending.
    fn echo(&mut self, sent: &str);
}

pub struct TerminalDisplay<W: Write = Stdout> {
    out: W,
    show_control: bool,
    color: bool,
}

impl TerminalDisplay<Stdout> {
    /// Display on stdout, colored only when stdout is a terminal.
    pub fn stdout(show_control: bool) -> Self {
        let color = io::stdout().is_terminal();
        Self::new(io::stdout(), show_control, color)
    }
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W, show_control: bool, color: bool) -> Self {
        Self {
            out,
            show_control,
            color,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    fn styled(&mut self, text: &str, color: Color) -> io::Result<()> {
        if self.color {
            queue!(self.out, SetForegroundColor(color), Print(text), ResetColor)
        } else {
            self.out.write_all(text.as_bytes())
        }
    }

    fn write_unit(&mut self, unit: char) -> io::Result<()> {
        match control::escape_for(unit) {
            Some(escape) if self.show_control => self.styled(escape, CONTROL_COLOR)?,
            _ => {
                let mut buf = [0u8; 4];
                self.out.write_all(unit.encode_utf8(&mut buf).as_bytes())?;
            }
        }
        self.out.flush()
    }

    fn write_echo(&mut self, sent: &str) -> io::Result<()> {
        let mut plain = String::new();
        for unit in sent.chars() {
            match control::escape_for(unit) {
                Some(escape) => {
                    if !plain.is_empty() {
                        self.styled(&plain, ECHO_COLOR)?;
                        plain.clear();
                    }
                    self.styled(escape, CONTROL_COLOR)?;
                }
                None => plain.push(unit),
            }
        }
        if !plain.is_empty() {
            self.styled(&plain, ECHO_COLOR)?;
        }
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

impl<W: Write + Send> DisplaySink for TerminalDisplay<W> {
    fn show(&mut self, unit: char) {
        if let Err(err) = self.write_unit(unit) {
            tracing::debug!(error = %err, "display write failed");
        }
    }

    fn echo(&mut self, sent: &str) {
        if let Err(err) = self.write_echo(sent) {
            tracing::debug!(error = %err, "echo write failed");
        }
    }
}
