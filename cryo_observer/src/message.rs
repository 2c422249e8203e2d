//! Outbound observer messages.
//!
//! Each variant renders to exactly one ASCII line per the dashboard wire
//! protocol. The wire format is deliberately terse (single-letter tags)
//! to match what the browser-side dashboard parses.

use cryo_common::consts::NUM_AXES;

/// One sample of live ADC-derived values, when the ADC is actually up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveSample {
    pub damper_position: [f64; NUM_AXES],
    pub stage_position: [f64; NUM_AXES],
    pub air_pressure: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// Operator console text, appended to the log pane.
    Console(String),
    /// Whether the control law is actively driving motors.
    Active(bool),
    /// Current commanded speed per axis.
    Speeds([i32; NUM_AXES]),
    /// One replayed history entry.
    Historical { seq: u64, values: [f64; NUM_AXES] },
    /// One live tick, `None` when the ADC has no current sample.
    Live { t: u64, sample: Option<LiveSample> },
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl OutboundMessage {
    pub fn to_line(&self) -> String {
        match self {
            OutboundMessage::Console(text) => format!("C {}<br/>", escape_html(text)),
            OutboundMessage::Active(active) => format!("D {}", if *active { 1 } else { 0 }),
            OutboundMessage::Speeds(speeds) => {
                format!("E {} {} {}", speeds[0], speeds[1], speeds[2])
            }
            OutboundMessage::Historical { seq, values } => format!(
                "B {} {} {} {}",
                seq, values[0], values[1], values[2]
            ),
            OutboundMessage::Live { t, sample: None } => format!("F {} -", t),
            OutboundMessage::Live {
                t,
                sample: Some(s),
            } => format!(
                "F {} {} {} {} {} {} {} {}",
                t,
                s.damper_position[0],
                s.damper_position[1],
                s.damper_position[2],
                s.stage_position[0],
                s.stage_position[1],
                s.stage_position[2],
                s.air_pressure
            ),
        }
    }
}
