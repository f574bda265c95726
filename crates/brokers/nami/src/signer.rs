use hmac::{Hmac, Mac};
use namibot_core::{Credentials, ExchangeError};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_API_KEY: &str = "x-api-key";
pub const HEADER_API_SIGN: &str = "x-api-sign";
pub const HEADER_API_TIMESTAMP: &str = "x-api-timestamp";

/// Hex HMAC-SHA256 of `timestamp ‖ METHOD ‖ path ‖ body`.
///
/// `body` is the exact request body for writes, or a canonical query string
/// (see [`canonical_query`]) for signed reads. Empty when there is neither.
pub fn sign(
    secret: &str,
    timestamp: &str,
    method: &str,
    path: &str,
    body: &str,
) -> Result<String, ExchangeError> {
    let message = format!("{}{}{}{}", timestamp, method.to_ascii_uppercase(), path, body);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::Signing(format!("Invalid API secret: {}", e)))?;
    mac.update(message.as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Parameters sorted by key, percent-encoded, joined as `k=v&k=v`.
pub fn canonical_query(params: &[(&str, &str)]) -> String {
    let mut sorted: Vec<_> = params.to_vec();
    sorted.sort();
    sorted
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Current Unix time in milliseconds, as the exchange expects it.
pub fn timestamp_millis() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}

/// The authentication headers for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub api_key: String,
    pub signature: String,
    pub timestamp: String,
}

impl SignedHeaders {
    pub fn to_header_map(&self) -> Result<reqwest::header::HeaderMap, ExchangeError> {
        use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

        let value = |s: &str| {
            HeaderValue::from_str(s)
                .map_err(|e| ExchangeError::Signing(format!("Invalid header value: {}", e)))
        };

        let mut headers = HeaderMap::new();
        headers.insert(HEADER_API_KEY, value(&self.api_key)?);
        headers.insert(HEADER_API_SIGN, value(&self.signature)?);
        headers.insert(HEADER_API_TIMESTAMP, value(&self.timestamp)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

/// Signs outbound requests with a fixed set of credentials.
#[derive(Debug, Clone)]
pub struct Signer {
    credentials: Credentials,
}

impl Signer {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Sign with a fresh timestamp. Call once per request; the exchange rejects stale timestamps.
    pub fn sign_request(
        &self,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<SignedHeaders, ExchangeError> {
        self.sign_request_at(&timestamp_millis(), method, path, body)
    }

    pub fn sign_request_at(
        &self,
        timestamp: &str,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<SignedHeaders, ExchangeError> {
        let signature = sign(&self.credentials.api_secret, timestamp, method, path, body)?;
        Ok(SignedHeaders {
            api_key: self.credentials.api_key.clone(),
            signature,
            timestamp: timestamp.to_string(),
        })
    }
}
