use serde::Deserialize;
use tracing::warn;

/// Marker prefixing meaningful lines on the chat response stream.
const DATA_PREFIX: &str = "data:";

/// One classified record from the chat response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment of assistant text to append.
    Token(String),
    /// The request or response was withheld by the safety layer.
    Blocked(String),
    /// Backend-signaled error.
    Error(String),
    /// Stream logically complete.
    Done,
}

impl StreamEvent {
    /// Whether this record terminates the stream; no further records
    /// are consumed after it.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Token(_))
    }
}

#[derive(Deserialize)]
struct Record {
    #[serde(default)]
    blocked: bool,
    #[serde(default)]
    guardtrail: bool,
    message: Option<String>,
    error: Option<String>,
    token: Option<String>,
    #[serde(default)]
    done: bool,
}

/// Classify one line of the response body.
///
/// Lines without the `data:` marker carry no payload and yield `None`.
/// A marked line with a malformed payload is logged and skipped; a bad
/// record must not abort the stream.
pub fn parse_record(line: &str) -> Option<StreamEvent> {
    let line = line.trim();
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();

    let record: Record = match serde_json::from_str(payload) {
        Ok(record) => record,
        Err(err) => {
            warn!(%err, "skipping malformed stream record");
            return None;
        }
    };

    if record.blocked && record.guardtrail {
        let message = record
            .message
            .unwrap_or_else(|| "Blocked by the content safety layer".to_string());
        return Some(StreamEvent::Blocked(message));
    }

    if let Some(error) = record.error {
        return Some(StreamEvent::Error(error));
    }

    if let Some(token) = record.token {
        return Some(StreamEvent::Token(token));
    }

    if record.done {
        return Some(StreamEvent::Done);
    }

    None
}

/// Reassembles newline-delimited records from arbitrary byte chunks.
///
/// The response body arrives in chunks that need not align with record
/// boundaries; a partial trailing line is held until its newline shows up.
#[derive(Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    /// Append a chunk and drain every complete line it finished.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..pos]).into_owned());
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_record() {
        let event = parse_record(r#"data: {"token":"Hel"}"#);
        assert_eq!(event, Some(StreamEvent::Token("Hel".to_string())));
    }

    #[test]
    fn test_parse_done_record() {
        let event = parse_record(r#"data: {"done":true}"#);
        assert_eq!(event, Some(StreamEvent::Done));
    }

    #[test]
    fn test_parse_error_record() {
        let event = parse_record(r#"data: {"error":"model not loaded"}"#);
        assert_eq!(event, Some(StreamEvent::Error("model not loaded".to_string())));
    }

    #[test]
    fn test_parse_blocked_record() {
        let event =
            parse_record(r#"data: {"blocked":true,"guardtrail":true,"message":"Not allowed"}"#);
        assert_eq!(event, Some(StreamEvent::Blocked("Not allowed".to_string())));
    }

    #[test]
    fn test_blocked_requires_guardtrail_marker() {
        // "blocked" alone is not a policy rejection shape
        let event = parse_record(r#"data: {"blocked":true}"#);
        assert_eq!(event, None);
    }

    #[test]
    fn test_malformed_payload_is_skipped() {
        assert_eq!(parse_record("data: {not json"), None);
        // and a later valid record still parses
        let event = parse_record(r#"data: {"token":"ok"}"#);
        assert_eq!(event, Some(StreamEvent::Token("ok".to_string())));
    }

    #[test]
    fn test_unmarked_lines_are_ignored() {
        assert_eq!(parse_record(""), None);
        assert_eq!(parse_record(": keepalive"), None);
        assert_eq!(parse_record(r#"{"token":"no marker"}"#), None);
    }

    #[test]
    fn test_empty_payload_is_none() {
        assert_eq!(parse_record(r#"data: {}"#), None);
    }

    #[test]
    fn test_terminal_classification() {
        assert!(!StreamEvent::Token("x".into()).is_terminal());
        assert!(StreamEvent::Blocked("x".into()).is_terminal());
        assert!(StreamEvent::Error("x".into()).is_terminal());
        assert!(StreamEvent::Done.is_terminal());
    }

    #[test]
    fn test_line_buffer_splits_chunks() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(b"data: {\"tok").is_empty());
        let lines = buf.push(b"en\":\"Hi\"}\n\ndata: {\"done\":true}\n");
        assert_eq!(
            lines,
            vec![
                r#"data: {"token":"Hi"}"#.to_string(),
                String::new(),
                r#"data: {"done":true}"#.to_string(),
            ]
        );
    }

    #[test]
    fn test_line_buffer_holds_partial_line() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(b"data: {\"done\":true}").is_empty());
        let lines = buf.push(b"\n");
        assert_eq!(lines, vec![r#"data: {"done":true}"#.to_string()]);
    }

    #[test]
    fn test_records_reassemble_across_boundaries() {
        let mut buf = LineBuffer::default();
        let mut events = Vec::new();
        for chunk in [&b"data: {\"token\":\"He"[..], b"llo\"}\ndata: {\"do", b"ne\":true}\n"] {
            for line in buf.push(chunk) {
                if let Some(event) = parse_record(&line) {
                    events.push(event);
                }
            }
        }
        assert_eq!(
            events,
            vec![StreamEvent::Token("Hello".to_string()), StreamEvent::Done]
        );
    }
}
