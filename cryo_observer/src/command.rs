//! Inbound operator commands.
//!
//! Grammar is `cmd` or `cmd:arg`, case-insensitive on the command word,
//! one command per line. `avrN` (axis embedded in the command word, e.g.
//! `avr1:512`) is the one exception, matching the `mN`/`cN` per-axis
//! notation used on the controller wire protocol. Authorization is by
//! remote address against the configured allow-list, checked by the
//! caller before dispatch — this module only parses.

/// Argument to the `active` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveArg {
    On,
    Off,
    /// Force one tick of motion even within the hysteresis band.
    Start,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundCommand {
    /// List available commands.
    Help,
    /// Turn the control law on/off/start, or query current state with no arg.
    Active(Option<ActiveArg>),
    /// Dump current calibration tables.
    Cal,
    /// List connected controllers and observers.
    List,
    /// Free-text line to append to the operator log.
    Log(String),
    /// Set or query this observer's display name.
    Name(Option<String>),
    /// Toggle or query verbose live streaming.
    Verbose(Option<bool>),
    /// Identify self (echoes remote address / name).
    Who,
    /// Raw ADC channel readout request for one axis (`avrN:raw`).
    Avr { axis: u8, raw: String },
    /// Anything that didn't parse as a known command.
    Unknown(String),
}

fn parse_bool_arg(arg: &str) -> Option<bool> {
    match arg {
        "1" | "on" | "true" => Some(true),
        "0" | "off" | "false" => Some(false),
        _ => None,
    }
}

fn parse_active_arg(arg: &str) -> Option<ActiveArg> {
    match arg {
        "1" | "on" | "true" => Some(ActiveArg::On),
        "0" | "off" | "false" => Some(ActiveArg::Off),
        "start" => Some(ActiveArg::Start),
        _ => None,
    }
}

impl InboundCommand {
    pub fn parse(line: &str) -> InboundCommand {
        let line = line.trim();
        let (cmd, arg) = match line.split_once(':') {
            Some((c, a)) => (c, Some(a)),
            None => (line, None),
        };
        let cmd_lower = cmd.to_ascii_lowercase();

        if let Some(axis_str) = cmd_lower.strip_prefix("avr") {
            return match axis_str.parse::<u8>() {
                Ok(axis) => InboundCommand::Avr {
                    axis,
                    raw: arg.unwrap_or("").trim().to_string(),
                },
                Err(_) => InboundCommand::Unknown(line.to_string()),
            };
        }

        match cmd_lower.as_str() {
            "help" => InboundCommand::Help,
            "active" => InboundCommand::Active(arg.and_then(parse_active_arg)),
            "cal" => InboundCommand::Cal,
            "list" => InboundCommand::List,
            "log" => InboundCommand::Log(arg.unwrap_or("").to_string()),
            "name" => InboundCommand::Name(arg.map(|a| a.to_string())),
            "verbose" => InboundCommand::Verbose(arg.and_then(parse_bool_arg)),
            "who" => InboundCommand::Who,
            _ => InboundCommand::Unknown(line.to_string()),
        }
    }
}
