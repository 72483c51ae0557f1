//! AWS Signature Version 4 request signing.
//!
//! The signing key is derived through a fixed four-step HMAC-SHA256 chain
//! (date, region, service, request type) and the final signature covers a
//! canonical form of the request restricted to [`SIGNED_HEADERS`].

use crate::error::ProviderError;
use crate::types::{AwsCredentials, OutboundRequest};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use http::header::{HeaderName, HeaderValue, AUTHORIZATION, HOST};
use http::{HeaderMap, Method};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const REQUEST_TYPE: &str = "aws4_request";
const KEY_PREFIX: &str = "AWS4";

pub const X_AMZ_DATE: &str = "x-amz-date";
pub const X_AMZ_CONTENT_SHA256: &str = "x-amz-content-sha256";
pub const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";

/// Headers eligible for signing, in canonical (sorted) order.
pub const SIGNED_HEADERS: &[&str] = &[
    "content-type",
    "host",
    X_AMZ_CONTENT_SHA256,
    X_AMZ_DATE,
    X_AMZ_SECURITY_TOKEN,
];

/// RFC 3986 unreserved characters stay literal; everything else is encoded.
const URI_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Signs outbound requests for one service with one set of credentials.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: AwsCredentials,
    service: String,
}

impl RequestSigner {
    pub fn new(credentials: AwsCredentials, service: impl Into<String>) -> Self {
        Self {
            credentials,
            service: service.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.credentials.region
    }

    /// Attach `Host`, `X-Amz-Date`, `X-Amz-Content-Sha256`, the optional
    /// session token and `Authorization` to `request`.
    ///
    /// Fails with `MissingCredentials` before touching any header when key
    /// material is absent.
    pub fn sign(
        &self,
        request: &mut OutboundRequest,
        now: DateTime<Utc>,
    ) -> Result<(), ProviderError> {
        self.check_credentials()?;

        let url = Url::parse(&request.url)
            .map_err(|e| ProviderError::InvalidConfig(format!("invalid URL '{}': {e}", request.url)))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(ProviderError::InvalidConfig(format!(
                    "URL '{}' has no host",
                    request.url
                )))
            }
        };

        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let payload_hash = sha256_hex(&request.body);

        let headers = &mut request.headers;
        headers.insert(HOST, HeaderValue::from_str(&host)?);
        headers.insert(
            HeaderName::from_static(X_AMZ_DATE),
            HeaderValue::from_str(&amz_date)?,
        );
        headers.insert(
            HeaderName::from_static(X_AMZ_CONTENT_SHA256),
            HeaderValue::from_str(&payload_hash)?,
        );
        if let Some(token) = &self.credentials.session_token {
            let mut value = HeaderValue::from_str(token.expose_secret())?;
            value.set_sensitive(true);
            headers.insert(HeaderName::from_static(X_AMZ_SECURITY_TOKEN), value);
        }

        let authorization = self.authorization(
            &request.method,
            url.path(),
            url.query(),
            &request.headers,
            &payload_hash,
            now,
        )?;
        let mut value = HeaderValue::from_str(&authorization)?;
        value.set_sensitive(true);
        request.headers.insert(AUTHORIZATION, value);

        tracing::trace!(service = %self.service, region = %self.credentials.region, "signed request");
        Ok(())
    }

    /// The `Authorization` header value for an already-populated header map.
    pub fn authorization(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
        headers: &HeaderMap,
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<String, ProviderError> {
        self.check_credentials()?;

        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!(
            "{date}/{}/{}/{REQUEST_TYPE}",
            self.credentials.region, self.service
        );

        let (canonical, signed_headers) =
            canonical_request(method, path, query, headers, payload_hash)?;
        let to_sign = string_to_sign(&amz_date, &scope, &canonical);

        let key = signing_key(
            self.credentials.secret_access_key.expose_secret(),
            &date,
            &self.credentials.region,
            &self.service,
        );
        let signature = hex::encode(hmac(&key, to_sign.as_bytes()));

        Ok(format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.credentials.access_key_id
        ))
    }

    fn check_credentials(&self) -> Result<(), ProviderError> {
        if self.credentials.access_key_id.trim().is_empty() {
            return Err(ProviderError::MissingCredentials(
                "access key id is empty".to_string(),
            ));
        }
        if self.credentials.secret_access_key.expose_secret().trim().is_empty() {
            return Err(ProviderError::MissingCredentials(
                "secret access key is empty".to_string(),
            ));
        }
        if self.credentials.region.trim().is_empty() {
            return Err(ProviderError::MissingCredentials(
                "region is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Derive the signing key: date, region, service, then request type.
pub fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("{KEY_PREFIX}{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, REQUEST_TYPE.as_bytes())
}

/// Canonical request text and the `;`-joined signed header names.
pub fn canonical_request(
    method: &Method,
    path: &str,
    query: Option<&str>,
    headers: &HeaderMap,
    payload_hash: &str,
) -> Result<(String, String), ProviderError> {
    let mut canonical_headers = String::new();
    let mut signed = Vec::new();

    for name in SIGNED_HEADERS {
        let values = headers
            .get_all(*name)
            .iter()
            .map(|v| {
                v.to_str()
                    .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
                    .map_err(|e| ProviderError::InvalidHeader(format!("{name}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if values.is_empty() {
            continue;
        }
        canonical_headers.push_str(name);
        canonical_headers.push(':');
        canonical_headers.push_str(&values.join(","));
        canonical_headers.push('\n');
        signed.push(*name);
    }
    let signed_headers = signed.join(";");

    let canonical = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method.as_str(),
        canonical_uri(path),
        canonical_query(query),
        canonical_headers,
        signed_headers,
        payload_hash
    );
    Ok((canonical, signed_headers))
}

fn string_to_sign(amz_date: &str, scope: &str, canonical_request: &str) -> String {
    format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    )
}

/// Each path segment is encoded again, so an already-encoded `%3A` becomes `%253A`.
fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

fn canonical_query(query: Option<&str>) -> String {
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return String::new();
    };
    let mut pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (uri_encode(&k), uri_encode(&v)))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

pub(crate) fn uri_encode(input: &str) -> String {
    utf8_percent_encode(input, URI_ENCODE).to_string()
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use secrecy::SecretString;

    const EXAMPLE_SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    fn credentials(region: &str) -> AwsCredentials {
        AwsCredentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: SecretString::from(EXAMPLE_SECRET.to_string()),
            session_token: None,
            region: region.to_string(),
        }
    }

    fn outbound(body: &str) -> OutboundRequest {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        OutboundRequest {
            method: Method::POST,
            url: "https://bedrock-runtime.us-east-1.amazonaws.com/model/anthropic.claude-v2%3A1/invoke"
                .to_string(),
            headers,
            body: body.as_bytes().to_vec(),
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_signing_key_matches_documented_example() {
        let key = signing_key(EXAMPLE_SECRET, "20120215", "us-east-1", "iam");
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_get_vanilla_signature() {
        let signer = RequestSigner::new(credentials("us-east-1"), "service");
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("example.amazonaws.com"));
        headers.insert(X_AMZ_DATE, HeaderValue::from_static("20150830T123600Z"));
        let now = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();

        let auth = signer
            .authorization(&Method::GET, "/", None, &headers, &sha256_hex(b""), now)
            .unwrap();
        assert_eq!(
            auth,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
    }

    #[test]
    fn test_sign_is_deterministic() {
        let signer = RequestSigner::new(credentials("us-east-1"), "bedrock");
        let mut a = outbound(r#"{"prompt":"hi"}"#);
        let mut b = outbound(r#"{"prompt":"hi"}"#);
        signer.sign(&mut a, fixed_time()).unwrap();
        signer.sign(&mut b, fixed_time()).unwrap();
        assert_eq!(a.headers.get(AUTHORIZATION), b.headers.get(AUTHORIZATION));
    }

    #[test]
    fn test_payload_change_changes_signature() {
        let signer = RequestSigner::new(credentials("us-east-1"), "bedrock");
        let mut a = outbound(r#"{"prompt":"hi"}"#);
        let mut b = outbound(r#"{"prompt":"bye"}"#);
        signer.sign(&mut a, fixed_time()).unwrap();
        signer.sign(&mut b, fixed_time()).unwrap();
        assert_ne!(a.headers.get(AUTHORIZATION), b.headers.get(AUTHORIZATION));
    }

    #[test]
    fn test_region_change_changes_signature() {
        let mut a = outbound("{}");
        let mut b = outbound("{}");
        RequestSigner::new(credentials("us-east-1"), "bedrock")
            .sign(&mut a, fixed_time())
            .unwrap();
        RequestSigner::new(credentials("us-west-2"), "bedrock")
            .sign(&mut b, fixed_time())
            .unwrap();
        assert_ne!(a.headers.get(AUTHORIZATION), b.headers.get(AUTHORIZATION));
    }

    #[test]
    fn test_sign_adds_expected_headers() {
        let mut creds = credentials("us-east-1");
        creds.session_token = Some(SecretString::from("session-token".to_string()));
        let signer = RequestSigner::new(creds, "bedrock");
        let mut req = outbound("{}");
        signer.sign(&mut req, fixed_time()).unwrap();

        assert_eq!(
            req.headers.get(HOST).unwrap(),
            "bedrock-runtime.us-east-1.amazonaws.com"
        );
        assert_eq!(req.headers.get(X_AMZ_DATE).unwrap(), "20240501T123000Z");
        assert_eq!(req.headers.get(X_AMZ_CONTENT_SHA256).unwrap(), &sha256_hex(b"{}"));
        assert_eq!(req.headers.get(X_AMZ_SECURITY_TOKEN).unwrap(), "session-token");

        let auth = req.headers.get(AUTHORIZATION).unwrap().to_str().unwrap();
        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240501/us-east-1/bedrock/aws4_request"
        ));
        assert!(auth.contains(
            "SignedHeaders=content-type;host;x-amz-content-sha256;x-amz-date;x-amz-security-token"
        ));
    }

    #[test]
    fn test_missing_secret_fails_closed() {
        let mut creds = credentials("us-east-1");
        creds.secret_access_key = SecretString::from(String::new());
        let signer = RequestSigner::new(creds, "bedrock");
        let mut req = outbound("{}");

        let err = signer.sign(&mut req, fixed_time()).unwrap_err();
        assert!(matches!(err, ProviderError::MissingCredentials(_)));
        assert!(req.headers.get(AUTHORIZATION).is_none());
        assert!(req.headers.get(X_AMZ_DATE).is_none());
    }

    #[test]
    fn test_canonical_uri_double_encodes_segments() {
        assert_eq!(
            canonical_uri("/model/anthropic.claude-v2%3A1/invoke"),
            "/model/anthropic.claude-v2%253A1/invoke"
        );
        assert_eq!(canonical_uri(""), "/");
        assert_eq!(canonical_uri("/"), "/");
    }

    #[test]
    fn test_canonical_query_is_sorted() {
        assert_eq!(canonical_query(Some("b=2&a=1&a=0")), "a=0&a=1&b=2");
        assert_eq!(canonical_query(Some("k=a b")), "k=a%20b");
        assert_eq!(canonical_query(None), "");
    }

    #[test]
    fn test_canonical_headers_trim_values() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("  example.com  "));
        headers.insert("x-unsigned", HeaderValue::from_static("ignored"));
        let (canonical, signed) =
            canonical_request(&Method::POST, "/", None, &headers, "abc").unwrap();
        assert_eq!(signed, "host");
        assert_eq!(canonical, "POST\n/\n\nhost:example.com\n\nhost\nabc");
    }
}
