use std::io::{self, Write};

use chronos::CalendarEntry;

pub const USAGE: &str = "Usage: chronos [--help]

Lists the Google calendars visible to the authorized account.
credentials.json (and optionally chronos.toml) are read from the
directory holding the executable; the token cache is written there too.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CliMode {
    List,
    Help,
}

/// Anything other than `--help` is returned as ignored; the listing runs regardless.
pub fn parse_cli_mode<I>(args: I) -> (CliMode, Vec<String>)
where
    I: IntoIterator<Item = String>,
{
    let mut mode = CliMode::List;
    let mut ignored = Vec::new();

    for arg in args {
        match arg.as_str() {
            "--help" | "-h" => mode = CliMode::Help,
            _ => ignored.push(arg),
        }
    }

    (mode, ignored)
}

pub fn print_calendars<W: Write>(out: &mut W, calendars: &[CalendarEntry]) -> io::Result<()> {
    writeln!(out, "List calendars")?;
    for calendar in calendars {
        let json = serde_json::to_string_pretty(calendar).map_err(io::Error::other)?;
        writeln!(out, "{}", json)?;
    }
    Ok(())
}
