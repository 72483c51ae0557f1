//! Streaming decode results and the lazy per-chunk decode sequence.

use crate::error::ProviderError;
use crate::traits::Provider;

/// Result of decoding one streaming chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// Generated text.
    Token(String),
    /// Final generated text; the stream is complete after it.
    Last(String),
    /// Nothing to emit for this chunk; keep reading.
    Skip,
    /// The stream is complete.
    End,
}

impl StreamChunk {
    pub fn token(&self) -> Option<&str> {
        match self {
            StreamChunk::Token(text) | StreamChunk::Last(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, StreamChunk::End | StreamChunk::Last(_))
    }
}

/// Lazily decodes caller-supplied chunks, one at a time.
///
/// Every decode result is yielded, including skips and errors. The sequence
/// is fused after [`StreamChunk::End`]: chunks after the end marker are never
/// decoded.
pub struct DecodeStream<'a, I> {
    provider: &'a dyn Provider,
    chunks: I,
    finished: bool,
}

/// Decode `chunks` with `provider`.
pub fn decode_stream<'a, I>(provider: &'a dyn Provider, chunks: I) -> DecodeStream<'a, I::IntoIter>
where
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    DecodeStream {
        provider,
        chunks: chunks.into_iter(),
        finished: false,
    }
}

impl<'a, I> DecodeStream<'a, I>
where
    I: Iterator,
    I::Item: AsRef<[u8]>,
{
    /// Only the generated text, skipping `Skip` results.
    pub fn tokens(self) -> impl Iterator<Item = Result<String, ProviderError>> + 'a
    where
        I: 'a,
    {
        self.filter_map(|result| match result {
            Ok(StreamChunk::Token(text) | StreamChunk::Last(text)) => Some(Ok(text)),
            Ok(StreamChunk::Skip | StreamChunk::End) => None,
            Err(e) => Some(Err(e)),
        })
    }

    /// Concatenate all tokens, stopping at the first error.
    pub fn collect_text(self) -> Result<String, ProviderError>
    where
        I: 'a,
    {
        self.tokens().collect()
    }
}

impl<I> Iterator for DecodeStream<'_, I>
where
    I: Iterator,
    I::Item: AsRef<[u8]>,
{
    type Item = Result<StreamChunk, ProviderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let chunk = self.chunks.next()?;
        let result = self.provider.parse_stream_response(chunk.as_ref());
        match &result {
            Ok(chunk) if chunk.is_end() => self.finished = true,
            Ok(StreamChunk::Skip) => tracing::trace!("stream chunk skipped"),
            _ => {}
        }
        Some(result)
    }
}

impl<I> std::iter::FusedIterator for DecodeStream<'_, I>
where
    I: std::iter::FusedIterator,
    I::Item: AsRef<[u8]>,
{
}
