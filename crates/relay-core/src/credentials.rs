//! Credential resolution: process environment first, then the config file.

use crate::config::Config;
use crate::error::RelayError;
use relay_provider::{AwsCredentials, Credential, ProviderConfig, WireFormat};
use secrecy::SecretString;

const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
const AWS_REGION: &str = "AWS_REGION";
const AWS_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
const FALLBACK_REGION: &str = "us-east-1";

/// What kind of credential a provider needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    None,
    ApiKey,
    Aws,
}

impl CredentialKind {
    /// Derive the kind from a provider's registered configuration. Providers
    /// without a config are assumed to take an API key.
    pub fn for_config(config: Option<&ProviderConfig>) -> Self {
        match config {
            Some(config) if config.wire_format == WireFormat::Custom => CredentialKind::Aws,
            Some(config) if config.auth_header.is_empty() => CredentialKind::None,
            _ => CredentialKind::ApiKey,
        }
    }
}

/// `{PROVIDER}_API_KEY`, with dashes mapped to underscores.
pub fn api_key_env_var(provider: &str) -> String {
    format!("{}_API_KEY", provider.to_uppercase().replace('-', "_"))
}

/// Non-empty value of an environment variable.
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Resolve a credential for `provider` against the process environment.
pub fn resolve(
    provider: &str,
    kind: CredentialKind,
    config: &Config,
) -> Result<Credential, RelayError> {
    resolve_with(provider, kind, config, env_lookup)
}

/// Resolve a credential using `env` for variable lookups.
pub fn resolve_with(
    provider: &str,
    kind: CredentialKind,
    config: &Config,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Credential, RelayError> {
    match kind {
        CredentialKind::None => Ok(Credential::None),
        CredentialKind::ApiKey => {
            let env_var = api_key_env_var(provider);
            env(&env_var)
                .or_else(|| config.api_keys.get(provider).filter(|k| !k.is_empty()).cloned())
                .map(Credential::api_key)
                .ok_or_else(|| RelayError::MissingApiKey {
                    provider: provider.to_string(),
                    env_var,
                })
        }
        CredentialKind::Aws => resolve_aws(config, env).map(Credential::Aws),
    }
}

/// Credential that lets an adapter be built without real key material, for
/// parsing saved responses or previewing requests. Requests from such an
/// adapter carry no auth and cannot be signed.
pub fn placeholder(kind: CredentialKind, config: &Config) -> Credential {
    match kind {
        CredentialKind::None | CredentialKind::ApiKey => Credential::None,
        CredentialKind::Aws => Credential::Aws(AwsCredentials {
            access_key_id: String::new(),
            secret_access_key: SecretString::from(String::new()),
            session_token: None,
            region: resolve_region(config, env_lookup),
        }),
    }
}

fn resolve_aws(
    config: &Config,
    env: impl Fn(&str) -> Option<String>,
) -> Result<AwsCredentials, RelayError> {
    let aws = &config.aws;
    let from = |var: &str, fallback: &Option<String>| {
        env(var).or_else(|| fallback.clone().filter(|v| !v.is_empty()))
    };

    let access_key_id = from(AWS_ACCESS_KEY_ID, &aws.access_key_id).ok_or_else(|| {
        RelayError::MissingAwsCredentials(format!(
            "set {AWS_ACCESS_KEY_ID} or aws.access_key_id"
        ))
    })?;
    let secret_access_key = from(AWS_SECRET_ACCESS_KEY, &aws.secret_access_key).ok_or_else(|| {
        RelayError::MissingAwsCredentials(format!(
            "set {AWS_SECRET_ACCESS_KEY} or aws.secret_access_key"
        ))
    })?;
    let session_token = from(AWS_SESSION_TOKEN, &aws.session_token);

    Ok(AwsCredentials {
        access_key_id,
        secret_access_key: SecretString::from(secret_access_key),
        session_token: session_token.map(SecretString::from),
        region: resolve_region(config, &env),
    })
}

fn resolve_region(config: &Config, env: impl Fn(&str) -> Option<String>) -> String {
    env(AWS_REGION)
        .or_else(|| env(AWS_DEFAULT_REGION))
        .or_else(|| config.aws.region.clone().filter(|r| !r.is_empty()))
        .unwrap_or_else(|| {
            tracing::debug!(region = FALLBACK_REGION, "No AWS region configured");
            FALLBACK_REGION.to_string()
        })
}
