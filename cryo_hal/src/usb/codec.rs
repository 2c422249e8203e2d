//! USB bulk ASCII line protocol.
//!
//! Requests are one or more `ID.CMD [ARG…]` items joined by `;` and
//! terminated by `\n`. Responses are one or more lines of the form
//! `ID.OK RESP…` / `ID.BAD RESP…`, separated by `\n` and possibly
//! NUL-terminated within a packet. A response line with no leading `ID.`
//! is a continuation of the previous `e.` (operator echo) response.

/// Outcome reported by a device for one response item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Ok,
    Bad,
}

/// One parsed response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine {
    pub id: char,
    pub status: ResponseStatus,
    pub body: String,
}

/// Builds a single request packet from an ordered list of `(id, command)`
/// items, e.g. `[('f', "m0;m1;m2"), ('g', "pa0-5")]` ->
/// `"f.m0;m1;m2;g.pa0-5\n"`.
pub fn encode_request(items: &[(char, &str)]) -> Vec<u8> {
    let mut out = String::new();
    for (i, (id, cmd)) in items.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        out.push(*id);
        out.push('.');
        out.push_str(cmd);
    }
    out.push('\n');
    out.into_bytes()
}

/// Parses a raw response packet into its constituent lines.
///
/// Tolerates NUL-termination within the packet, blank lines, and
/// multi-line `e.` responses (continuation lines carry no `ID.` prefix and
/// are appended to the most recent `e` response's body, newline-joined).
/// Continuation lines with no preceding `e` response, and lines that match
/// neither shape, are silently dropped — this covers the truncated
/// responses a controller may emit immediately after power-up.
pub fn parse_responses(data: &[u8]) -> Vec<ResponseLine> {
    let text = String::from_utf8_lossy(data);
    let mut lines: Vec<ResponseLine> = Vec::new();

    for raw_line in text.split('\n') {
        let line = match raw_line.find('\0') {
            Some(idx) => &raw_line[..idx],
            None => raw_line,
        };
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        match parse_header(line) {
            Some((id, status, rest)) => lines.push(ResponseLine {
                id,
                status,
                body: rest.to_string(),
            }),
            None => {
                if let Some(last) = lines.iter_mut().rev().find(|l| l.id == 'e') {
                    if !last.body.is_empty() {
                        last.body.push('\n');
                    }
                    last.body.push_str(line);
                }
            }
        }
    }

    lines
}

fn parse_header(line: &str) -> Option<(char, ResponseStatus, &str)> {
    let mut chars = line.char_indices();
    let (_, id) = chars.next()?;
    let (dot_idx, dot) = chars.next()?;
    if dot != '.' {
        return None;
    }
    let rest = &line[dot_idx + 1..];
    if let Some(body) = rest.strip_prefix("OK") {
        Some((id, ResponseStatus::Ok, body.trim_start()))
    } else if let Some(body) = rest.strip_prefix("BAD") {
        Some((id, ResponseStatus::Bad, body.trim_start()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_single_item_request() {
        assert_eq!(encode_request(&[('a', "ser")]), b"a.ser\n");
    }

    #[test]
    fn encodes_multi_item_request() {
        assert_eq!(
            encode_request(&[('a', "ser"), ('b', "ver")]),
            b"a.ser;b.ver\n"
        );
    }

    #[test]
    fn parses_single_ok_response() {
        let lines = parse_responses(b"a.OK 12345\n");
        assert_eq!(
            lines,
            vec![ResponseLine {
                id: 'a',
                status: ResponseStatus::Ok,
                body: "12345".to_string(),
            }]
        );
    }

    #[test]
    fn parses_bad_response() {
        let lines = parse_responses(b"c.BAD unknown pin\n");
        assert_eq!(lines[0].status, ResponseStatus::Bad);
        assert_eq!(lines[0].body, "unknown pin");
    }

    #[test]
    fn parses_multiple_lines_in_one_packet() {
        let lines = parse_responses(b"a.OK X1\nb.OK v2.1\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].id, 'a');
        assert_eq!(lines[1].id, 'b');
    }

    #[test]
    fn strips_nul_termination() {
        let lines = parse_responses(b"a.OK X1\0\0\0");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].body, "X1");
    }

    #[test]
    fn ignores_blank_lines() {
        let lines = parse_responses(b"\n\na.OK X1\n\n");
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn continuation_line_merges_into_prior_e_response() {
        let lines = parse_responses(b"e.OK first line\nsecond line\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].id, 'e');
        assert_eq!(lines[0].body, "first line\nsecond line");
    }

    #[test]
    fn continuation_with_no_prior_e_response_is_dropped() {
        let lines = parse_responses(b"stray continuation\na.OK X1\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].id, 'a');
    }

    #[test]
    fn continuation_does_not_attach_to_non_e_response() {
        let lines = parse_responses(b"a.OK X1\nstray\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].body, "X1");
    }
}
