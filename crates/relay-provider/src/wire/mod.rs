//! Wire-format translation for the two common API shapes, plus the schema
//! helpers they share with the Bedrock adapter.

pub mod anthropic;
pub mod openai;
pub mod schema;

/// One server-sent-events line, classified.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Frame {
    /// Payload of a `data:` line (or a bare line without a field name).
    Data(String),
    /// Name from an `event:` line.
    Event(String),
    /// Blank line or comment.
    Empty,
}

/// Classify a chunk. When a chunk carries several lines, the last `data:`
/// line wins over any `event:` line.
pub(crate) fn frame(chunk: &[u8]) -> Frame {
    let text = String::from_utf8_lossy(chunk);
    let mut event = None;
    let mut data = None;

    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(name) = line.strip_prefix("event:") {
            event = Some(name.trim().to_string());
        } else if let Some(payload) = line.strip_prefix("data:") {
            data = Some(payload.trim_start().to_string());
        } else {
            data = Some(line.to_string());
        }
    }

    match (data, event) {
        (Some(data), _) => Frame::Data(data),
        (None, Some(event)) => Frame::Event(event),
        (None, None) => Frame::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_data_prefix() {
        assert_eq!(frame(b"data: {\"a\":1}"), Frame::Data("{\"a\":1}".to_string()));
        assert_eq!(frame(b"data:[DONE]\n"), Frame::Data("[DONE]".to_string()));
    }

    #[test]
    fn test_frame_event_and_comment() {
        assert_eq!(frame(b"event: ping"), Frame::Event("ping".to_string()));
        assert_eq!(frame(b": keep-alive"), Frame::Empty);
        assert_eq!(frame(b"   \n"), Frame::Empty);
    }

    #[test]
    fn test_frame_multi_line_prefers_data() {
        let chunk = b"event: content_block_delta\ndata: {\"x\":1}\n\n";
        assert_eq!(frame(chunk), Frame::Data("{\"x\":1}".to_string()));
    }

    #[test]
    fn test_frame_bare_json() {
        assert_eq!(frame(b"{\"x\":1}"), Frame::Data("{\"x\":1}".to_string()));
    }
}
