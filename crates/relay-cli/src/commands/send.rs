use crate::cli::RequestArgs;
use crate::transport::{stream_tokens, Framer, Transport};
use anyhow::bail;
use relay_core::{validate_output, RelayError, Session, DEFAULT_VALIDATION_RETRIES};
use relay_provider::{prepare, Provider, ProviderError, Request};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::io::Write;

pub async fn run(
    session: &Session,
    provider: Option<&str>,
    model: Option<&str>,
    args: &RequestArgs,
) -> anyhow::Result<()> {
    let provider = session.provider(provider, model)?;
    let request = super::build_request(args)?;
    let transport = Transport::new()?;

    if request.schema.is_none() && request.options.stream() {
        return stream(provider.as_ref(), &request, &transport).await;
    }

    let attempts = if request.schema.is_some() {
        DEFAULT_VALIDATION_RETRIES
    } else {
        1
    };
    let body = prepare(provider.as_ref(), &request)?;

    let mut attempt = 1;
    loop {
        match send_once(provider.as_ref(), &transport, body.clone(), request.schema.as_ref()).await
        {
            Ok(text) => {
                super::print_text(&text);
                return Ok(());
            }
            Err(e) if attempt < attempts && is_retryable(&e) => {
                tracing::warn!(attempt, error = %e, "Retrying request");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn send_once(
    provider: &dyn Provider,
    transport: &Transport,
    body: Vec<u8>,
    schema: Option<&Value>,
) -> anyhow::Result<String> {
    // Signed requests carry a timestamp, so each attempt is assembled afresh.
    let outbound = provider.outbound(body, false)?;
    let response = transport.send(outbound).await?;
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        // Vendor error payloads keep their message and stay retryable.
        return Err(match provider.parse_response(&body) {
            Err(e @ ProviderError::ApiError(_)) => {
                anyhow::Error::new(e).context(format!("HTTP {status}"))
            }
            _ => anyhow::anyhow!("HTTP {status}: {}", String::from_utf8_lossy(&body)),
        });
    }
    let text = provider.parse_response(&body)?;
    if let Some(schema) = schema {
        validate_output(&text, schema)?;
    }
    Ok(text)
}

async fn stream(
    provider: &dyn Provider,
    request: &Request,
    transport: &Transport,
) -> anyhow::Result<()> {
    let body = provider.prepare_stream_request(request)?;
    let response = transport.send(provider.outbound(body, true)?).await?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        bail!("HTTP {status}: {text}");
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let mut framer = Framer::for_content_type(content_type.as_deref());

    let mut stdout = std::io::stdout();
    let summary = stream_tokens(
        provider,
        Box::pin(response.bytes_stream()),
        &mut framer,
        |token| {
            let _ = write!(stdout, "{token}");
            let _ = stdout.flush();
        },
    )
    .await?;
    println!();

    if !summary.ended {
        tracing::warn!("Stream closed before the end marker");
    }
    tracing::debug!(tokens = summary.tokens, skipped = summary.skipped, "Stream finished");
    Ok(())
}

fn is_retryable(err: &anyhow::Error) -> bool {
    if let Some(e) = err.downcast_ref::<RelayError>() {
        return e.is_retryable();
    }
    err.downcast_ref::<ProviderError>()
        .is_some_and(ProviderError::is_retryable)
}
