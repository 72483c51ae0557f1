use crate::cli::RequestArgs;
use relay_core::credentials;
use relay_core::{RelayError, Session};
use relay_provider::{prepare, OutboundRequest, ProviderError};
use reqwest::Method;
use serde_json::Value;
use std::fmt::Write;

pub fn run(
    session: &Session,
    provider: Option<&str>,
    model: Option<&str>,
    args: &RequestArgs,
) -> anyhow::Result<()> {
    let name = provider.unwrap_or(session.config().provider.as_str());
    let kind = session.credential_kind(name);
    let credential = match credentials::resolve(name, kind, session.config()) {
        Ok(credential) => credential,
        Err(e @ (RelayError::MissingApiKey { .. } | RelayError::MissingAwsCredentials(_))) => {
            tracing::warn!(error = %e, "Showing request without credentials");
            credentials::placeholder(kind, session.config())
        }
        Err(e) => return Err(e.into()),
    };
    let provider = session.provider_with(name, model, credential)?;

    let request = super::build_request(args)?;
    let body = prepare(provider.as_ref(), &request)?;
    let streaming = request.schema.is_none() && request.options.stream();

    let outbound = match provider.outbound(body.clone(), streaming) {
        Ok(outbound) => outbound,
        Err(ProviderError::MissingCredentials(reason)) => {
            tracing::warn!(%reason, "Request left unsigned");
            OutboundRequest {
                method: Method::POST,
                url: if streaming {
                    provider.stream_endpoint()
                } else {
                    provider.endpoint()
                },
                headers: provider.headers()?,
                body,
            }
        }
        Err(e) => return Err(e.into()),
    };

    print!("{}", render(&outbound)?);
    Ok(())
}

/// Human-readable request: request line, headers (sensitive values
/// redacted), blank line, pretty-printed body.
pub fn render(request: &OutboundRequest) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "{} {}", request.method, request.url)?;
    for (name, value) in &request.headers {
        let shown = if value.is_sensitive() {
            "<redacted>"
        } else {
            value.to_str().unwrap_or("<binary>")
        };
        writeln!(out, "{name}: {shown}")?;
    }
    writeln!(out)?;
    match serde_json::from_slice::<Value>(&request.body) {
        Ok(json) => writeln!(out, "{}", serde_json::to_string_pretty(&json)?)?,
        Err(_) => writeln!(out, "{}", String::from_utf8_lossy(&request.body))?,
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_provider::{Credential, Registry, Request};
    use reqwest::header::HeaderMap;

    #[test]
    fn test_render_redacts_auth() {
        let registry = Registry::with_builtins();
        let provider = registry
            .get("openai", Credential::api_key("sk-secret"), "gpt-4o", HeaderMap::new())
            .unwrap();
        let body = provider.prepare_request(&Request::prompt("Hello")).unwrap();
        let rendered = render(&provider.outbound(body, false).unwrap()).unwrap();

        assert!(rendered.starts_with("POST https://api.openai.com/v1/chat/completions\n"));
        assert!(rendered.contains("authorization: <redacted>"));
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("\"model\": \"gpt-4o\""));
    }
}
