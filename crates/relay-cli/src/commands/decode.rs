use crate::transport::Framer;
use anyhow::Context;
use relay_core::Session;
use relay_provider::{decode_stream, StreamChunk};
use std::io::Read;
use std::path::Path;

pub fn run(
    session: &Session,
    provider: Option<&str>,
    model: Option<&str>,
    stream: bool,
    file: Option<&Path>,
) -> anyhow::Result<()> {
    let provider = super::offline_provider(session, provider, model)?;
    let input = read_input(file)?;

    if !stream {
        let text = provider.parse_response(&input)?;
        super::print_text(&text);
        return Ok(());
    }

    let mut framer = Framer::lines();
    let mut frames = framer.push(&input)?;
    frames.extend(framer.finish()?);

    let mut text = String::new();
    let mut skipped = 0;
    let mut ended = false;
    for result in decode_stream(provider.as_ref(), frames) {
        match result? {
            StreamChunk::Token(token) => text.push_str(&token),
            StreamChunk::Skip => skipped += 1,
            StreamChunk::Last(token) => {
                text.push_str(&token);
                ended = true;
            }
            StreamChunk::End => ended = true,
        }
    }
    tracing::debug!(skipped, ended, "Decoded stream transcript");

    super::print_text(&text);
    Ok(())
}

fn read_input(file: Option<&Path>) -> anyhow::Result<Vec<u8>> {
    match file {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
        }
        None => {
            let mut input = Vec::new();
            std::io::stdin().read_to_end(&mut input)?;
            Ok(input)
        }
    }
}
