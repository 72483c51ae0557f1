//! HTTP transport and chunk framing for streamed responses.

use anyhow::{bail, Context};
use futures::{Stream, StreamExt};
use relay_provider::{decode_stream, OutboundRequest, Provider, StreamChunk};
use serde_json::{json, Value};
use std::time::Duration;

const EVENT_STREAM_CONTENT_TYPE: &str = "application/vnd.amazon.eventstream";
const PRELUDE_LEN: usize = 12;
const CRC_LEN: usize = 4;

/// Sends prepared requests.
pub struct Transport {
    client: reqwest::Client,
}

impl Transport {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    /// Send `request` and return the raw response.
    pub async fn send(&self, request: OutboundRequest) -> anyhow::Result<reqwest::Response> {
        tracing::debug!(method = %request.method, url = %request.url, bytes = request.body.len(), "Sending request");
        let response = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .with_context(|| format!("request to {} failed", request.url))?;
        tracing::debug!(status = %response.status(), "Received response");
        Ok(response)
    }
}

/// What happened over the course of one streamed response.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub tokens: usize,
    pub skipped: usize,
    pub ended: bool,
}

/// Frame `bytes`, decode every frame with `provider`, and hand each token to
/// `on_token` as it arrives. Stops at the end marker.
pub async fn stream_tokens<S, B, E>(
    provider: &dyn Provider,
    mut bytes: S,
    framer: &mut Framer,
    mut on_token: impl FnMut(&str),
) -> anyhow::Result<StreamSummary>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut summary = StreamSummary::default();

    while let Some(chunk) = bytes.next().await {
        let frames = framer.push(chunk?.as_ref())?;
        if decode_frames(provider, frames, &mut summary, &mut on_token)? {
            return Ok(summary);
        }
    }
    let rest = framer.finish()?;
    decode_frames(provider, rest, &mut summary, &mut on_token)?;
    Ok(summary)
}

fn decode_frames(
    provider: &dyn Provider,
    frames: Vec<Vec<u8>>,
    summary: &mut StreamSummary,
    on_token: &mut impl FnMut(&str),
) -> anyhow::Result<bool> {
    for result in decode_stream(provider, frames) {
        match result? {
            StreamChunk::Token(token) => {
                summary.tokens += 1;
                on_token(&token);
            }
            StreamChunk::Last(token) => {
                summary.tokens += 1;
                summary.ended = true;
                on_token(&token);
                return Ok(true);
            }
            StreamChunk::Skip => summary.skipped += 1,
            StreamChunk::End => {
                summary.ended = true;
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Splits network chunks into the units a provider decodes one at a time.
pub enum Framer {
    /// Newline-delimited (server-sent events, JSON lines).
    Lines(Vec<u8>),
    /// Binary event-stream messages; each payload becomes one frame.
    EventStream(Vec<u8>),
}

impl Framer {
    pub fn lines() -> Self {
        Framer::Lines(Vec::new())
    }

    pub fn event_stream() -> Self {
        Framer::EventStream(Vec::new())
    }

    /// Pick a framer from the response `Content-Type`.
    pub fn for_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.starts_with(EVENT_STREAM_CONTENT_TYPE) => Self::event_stream(),
            _ => Self::lines(),
        }
    }

    /// Buffer `bytes` and return every frame completed by them. Partial
    /// frames stay buffered until the next call.
    pub fn push(&mut self, bytes: &[u8]) -> anyhow::Result<Vec<Vec<u8>>> {
        match self {
            Framer::Lines(buffer) => {
                buffer.extend_from_slice(bytes);
                let mut frames = Vec::new();
                while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    if let Some(line) = non_blank(&line) {
                        frames.push(line);
                    }
                }
                Ok(frames)
            }
            Framer::EventStream(buffer) => {
                buffer.extend_from_slice(bytes);
                let mut frames = Vec::new();
                while let Some(message) = take_message(buffer)? {
                    frames.push(event_payload(&message)?);
                }
                Ok(frames)
            }
        }
    }

    /// Flush whatever is left once the body is exhausted.
    pub fn finish(&mut self) -> anyhow::Result<Vec<Vec<u8>>> {
        match self {
            Framer::Lines(buffer) => {
                let rest = std::mem::take(buffer);
                Ok(non_blank(&rest).into_iter().collect())
            }
            Framer::EventStream(buffer) if buffer.is_empty() => Ok(Vec::new()),
            Framer::EventStream(buffer) => {
                bail!("event stream ended inside a message ({} bytes left)", buffer.len())
            }
        }
    }
}

fn non_blank(line: &[u8]) -> Option<Vec<u8>> {
    let text = String::from_utf8_lossy(line);
    let trimmed = text.trim_end_matches(['\r', '\n']);
    if trimmed.trim().is_empty() {
        None
    } else {
        Some(trimmed.as_bytes().to_vec())
    }
}

/// Remove one complete message from the front of `buffer`.
///
/// Layout: total length (u32), headers length (u32), prelude CRC, headers,
/// payload, message CRC. Checksums are not verified.
fn take_message(buffer: &mut Vec<u8>) -> anyhow::Result<Option<Vec<u8>>> {
    if buffer.len() < PRELUDE_LEN {
        return Ok(None);
    }
    let total = read_u32(&buffer[0..4]) as usize;
    let headers_len = read_u32(&buffer[4..8]) as usize;
    if total < PRELUDE_LEN + headers_len + CRC_LEN {
        bail!("invalid event-stream prelude: total {total}, headers {headers_len}");
    }
    if buffer.len() < total {
        return Ok(None);
    }
    Ok(Some(buffer.drain(..total).collect()))
}

/// Payload of one event-stream message. Exception messages are rewrapped as
/// `{"<type>": <payload>}` so the adapter reports them as API errors.
fn event_payload(message: &[u8]) -> anyhow::Result<Vec<u8>> {
    let headers_len = read_u32(&message[4..8]) as usize;
    let headers = parse_headers(&message[PRELUDE_LEN..PRELUDE_LEN + headers_len])?;
    let payload = &message[PRELUDE_LEN + headers_len..message.len() - CRC_LEN];

    let header = |name: &str| {
        headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    };
    match header(":message-type") {
        Some("exception") | Some("error") => {
            let kind = header(":exception-type")
                .or_else(|| header(":error-code"))
                .unwrap_or("unknownException");
            let detail: Value = serde_json::from_slice(payload)
                .unwrap_or_else(|_| json!({"message": String::from_utf8_lossy(payload)}));
            let kind = if kind.ends_with("Exception") {
                kind.to_string()
            } else {
                format!("{kind}Exception")
            };
            Ok(serde_json::to_vec(&json!({ kind: detail }))?)
        }
        _ => Ok(payload.to_vec()),
    }
}

/// String-valued headers; other value types are skipped.
fn parse_headers(mut raw: &[u8]) -> anyhow::Result<Vec<(String, String)>> {
    let mut headers = Vec::new();
    while !raw.is_empty() {
        let name_len = raw[0] as usize;
        let name = raw
            .get(1..1 + name_len)
            .context("truncated event-stream header name")?;
        let name = String::from_utf8_lossy(name).into_owned();
        raw = &raw[1 + name_len..];

        let value_type = *raw.first().context("missing event-stream header type")?;
        raw = &raw[1..];
        let fixed = match value_type {
            0 | 1 => Some(0),
            2 => Some(1),
            3 => Some(2),
            4 => Some(4),
            5 | 8 => Some(8),
            9 => Some(16),
            6 | 7 => None,
            other => bail!("unknown event-stream header type {other}"),
        };
        let consumed = match fixed {
            Some(len) => len,
            None => {
                let len_bytes = raw.get(..2).context("truncated event-stream header")?;
                let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
                let value = raw
                    .get(2..2 + len)
                    .context("truncated event-stream header value")?;
                if value_type == 7 {
                    headers.push((name, String::from_utf8_lossy(value).into_owned()));
                }
                2 + len
            }
        };
        if raw.len() < consumed {
            bail!("truncated event-stream header value");
        }
        raw = &raw[consumed..];
    }
    Ok(headers)
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
