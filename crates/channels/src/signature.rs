//! Timestamped HMAC-SHA256 webhook signatures.
//!
//! A signed request carries two headers: a unix timestamp in seconds and a
//! signature of the form `v1=<hex>`, where the hex digest is
//! `HMAC-SHA256(secret, "<timestamp>.<raw body>")`.
//!
//! In [`SignatureMode::Dual`] a signature header equal to the bare secret is
//! also accepted, for senders that have not moved to HMAC yet.

use std::str::FromStr;

use chrono::Utc;
use hmac::{Hmac, Mac};
use http::HeaderMap;
use sha2::Sha256;
use tracing::warn;

use crate::config::non_empty_var;
use crate::error::ChannelError;

type HmacSha256 = Hmac<Sha256>;

/// Default tolerated clock difference, in seconds.
pub const DEFAULT_MAX_SKEW_SECS: i64 = 300;

const SIGNATURE_PREFIX: &str = "v1=";

/// Which signatures are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureMode {
    /// Only the timestamped HMAC.
    Strict,
    /// The timestamped HMAC or the legacy bare secret.
    #[default]
    Dual,
}

impl SignatureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureMode::Strict => "strict",
            SignatureMode::Dual => "dual",
        }
    }
}

impl FromStr for SignatureMode {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(SignatureMode::Strict),
            "dual" => Ok(SignatureMode::Dual),
            other => Err(ChannelError::Config(format!("unknown signature mode: {}", other))),
        }
    }
}

/// Header names carrying the signature and its timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureHeaders {
    pub signature: &'static str,
    pub timestamp: &'static str,
}

/// Headers sent by Kapso.
pub const KAPSO_SIGNATURE_HEADERS: SignatureHeaders = SignatureHeaders {
    signature: "x-kapso-signature",
    timestamp: "x-kapso-timestamp",
};

/// Headers expected on the inbound-email endpoint.
pub const EMAIL_SIGNATURE_HEADERS: SignatureHeaders = SignatureHeaders {
    signature: "x-email-signature",
    timestamp: "x-email-timestamp",
};

/// Verifier settings.
#[derive(Debug, Clone)]
pub struct SignatureConfig {
    /// Shared secret. `None` disables verification.
    pub secret: Option<String>,
    pub mode: SignatureMode,
    pub max_skew_secs: i64,
    pub headers: SignatureHeaders,
}

impl SignatureConfig {
    pub fn new(secret: impl Into<String>, headers: SignatureHeaders) -> Self {
        Self {
            secret: Some(secret.into()),
            mode: SignatureMode::default(),
            max_skew_secs: DEFAULT_MAX_SKEW_SECS,
            headers,
        }
    }

    /// A configuration that accepts every request.
    pub fn disabled(headers: SignatureHeaders) -> Self {
        Self {
            secret: None,
            mode: SignatureMode::default(),
            max_skew_secs: DEFAULT_MAX_SKEW_SECS,
            headers,
        }
    }

    pub fn with_mode(mut self, mode: SignatureMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_skew_secs(mut self, secs: i64) -> Self {
        self.max_skew_secs = secs;
        self
    }

    /// Read `KAPSO_WEBHOOK_SECRET`, `KAPSO_WEBHOOK_SIGNATURE_MODE` and
    /// `WEBHOOK_MAX_SKEW_SECS`.
    pub fn kapso_from_env() -> Result<Self, ChannelError> {
        let mut config = match non_empty_var("KAPSO_WEBHOOK_SECRET") {
            Some(secret) => Self::new(secret, KAPSO_SIGNATURE_HEADERS),
            None => Self::disabled(KAPSO_SIGNATURE_HEADERS),
        };
        if let Some(mode) = non_empty_var("KAPSO_WEBHOOK_SIGNATURE_MODE") {
            config.mode = mode.parse()?;
        }
        config.max_skew_secs = skew_from_env()?;
        Ok(config)
    }

    /// Read `EMAIL_WEBHOOK_SECRET` and `WEBHOOK_MAX_SKEW_SECS`. The email
    /// endpoint only accepts the timestamped HMAC.
    pub fn email_from_env() -> Result<Self, ChannelError> {
        let config = match non_empty_var("EMAIL_WEBHOOK_SECRET") {
            Some(secret) => Self::new(secret, EMAIL_SIGNATURE_HEADERS),
            None => Self::disabled(EMAIL_SIGNATURE_HEADERS),
        };
        Ok(config
            .with_mode(SignatureMode::Strict)
            .with_max_skew_secs(skew_from_env()?))
    }
}

fn skew_from_env() -> Result<i64, ChannelError> {
    match non_empty_var("WEBHOOK_MAX_SKEW_SECS") {
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| ChannelError::Config(format!("WEBHOOK_MAX_SKEW_SECS must be a positive integer: {}", raw))),
        None => Ok(DEFAULT_MAX_SKEW_SECS),
    }
}

/// Outcome of a signature check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// No secret configured.
    Unconfigured,
    /// A fresh, matching HMAC.
    Valid,
    /// The bare secret, accepted in dual mode.
    Legacy,
    Rejected(RejectReason),
}

impl SignatureCheck {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, SignatureCheck::Rejected(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingSignature,
    MissingTimestamp,
    InvalidTimestamp,
    StaleTimestamp,
    Mismatch,
}

/// Checks webhook signatures against a shared secret.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    config: SignatureConfig,
}

impl SignatureVerifier {
    pub fn new(config: SignatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignatureConfig {
        &self.config
    }

    pub fn mode(&self) -> SignatureMode {
        self.config.mode
    }

    /// Whether the request is authentic. Never errors; a malformed request is
    /// simply not verified.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> bool {
        match self.check(headers, body) {
            SignatureCheck::Rejected(reason) => {
                warn!(
                    reason = ?reason,
                    signature_mode = self.config.mode.as_str(),
                    "webhook.signature_rejected"
                );
                false
            }
            _ => true,
        }
    }

    /// Check against the current time.
    pub fn check(&self, headers: &HeaderMap, body: &[u8]) -> SignatureCheck {
        self.check_at(headers, body, Utc::now().timestamp())
    }

    /// Check against an explicit unix time in seconds.
    pub fn check_at(&self, headers: &HeaderMap, body: &[u8], now_secs: i64) -> SignatureCheck {
        let Some(secret) = self.config.secret.as_deref() else {
            return SignatureCheck::Unconfigured;
        };

        let Some(provided) = header_str(headers, self.config.headers.signature) else {
            return SignatureCheck::Rejected(RejectReason::MissingSignature);
        };

        if self.config.mode == SignatureMode::Dual && constant_time_eq(provided.as_bytes(), secret.as_bytes()) {
            return SignatureCheck::Legacy;
        }

        let Some(raw_timestamp) = header_str(headers, self.config.headers.timestamp) else {
            return SignatureCheck::Rejected(RejectReason::MissingTimestamp);
        };
        let timestamp = match raw_timestamp.trim().parse::<i64>() {
            Ok(ts) if ts > 0 => ts,
            _ => return SignatureCheck::Rejected(RejectReason::InvalidTimestamp),
        };
        if (now_secs - timestamp).abs() > self.config.max_skew_secs {
            return SignatureCheck::Rejected(RejectReason::StaleTimestamp);
        }

        let Some(expected) = provided
            .trim()
            .strip_prefix(SIGNATURE_PREFIX)
            .and_then(|h| hex::decode(h).ok())
        else {
            return SignatureCheck::Rejected(RejectReason::Mismatch);
        };

        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return SignatureCheck::Rejected(RejectReason::Mismatch);
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);

        if mac.verify_slice(&expected).is_ok() {
            SignatureCheck::Valid
        } else {
            SignatureCheck::Rejected(RejectReason::Mismatch)
        }
    }
}

/// Compute the `v1=<hex>` signature for a body.
pub fn sign(secret: &str, timestamp: i64, body: &[u8]) -> String {
    // HMAC accepts keys of any length.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    const NOW: i64 = 1_771_581_600;

    fn headers(signature: &str, timestamp: Option<&str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert("x-kapso-signature", HeaderValue::from_str(signature).unwrap());
        if let Some(ts) = timestamp {
            map.insert("x-kapso-timestamp", HeaderValue::from_str(ts).unwrap());
        }
        map
    }

    fn verifier(mode: SignatureMode) -> SignatureVerifier {
        SignatureVerifier::new(SignatureConfig::new("topsecret", KAPSO_SIGNATURE_HEADERS).with_mode(mode))
    }

    #[test]
    fn test_valid_hmac() {
        let body = br#"{"id":"evt_1","from":"51999999999","text":"hola"}"#;
        let signature = sign("topsecret", NOW, body);
        assert!(signature.starts_with("v1="));

        let check = verifier(SignatureMode::Strict).check_at(&headers(&signature, Some(&NOW.to_string())), body, NOW);
        assert_eq!(check, SignatureCheck::Valid);
    }

    #[test]
    fn test_skew_window() {
        let body = b"{}";
        let old = NOW - 3600;
        let signature = sign("topsecret", old, body);
        let check = verifier(SignatureMode::Strict).check_at(&headers(&signature, Some(&old.to_string())), body, NOW);
        assert_eq!(check, SignatureCheck::Rejected(RejectReason::StaleTimestamp));

        let edge = NOW - DEFAULT_MAX_SKEW_SECS;
        let signature = sign("topsecret", edge, body);
        let check = verifier(SignatureMode::Strict).check_at(&headers(&signature, Some(&edge.to_string())), body, NOW);
        assert_eq!(check, SignatureCheck::Valid);
    }

    #[test]
    fn test_rejects_bad_timestamps() {
        let v = verifier(SignatureMode::Strict);
        let signature = sign("topsecret", NOW, b"{}");
        assert_eq!(
            v.check_at(&headers(&signature, None), b"{}", NOW),
            SignatureCheck::Rejected(RejectReason::MissingTimestamp)
        );
        assert_eq!(
            v.check_at(&headers(&signature, Some("0")), b"{}", NOW),
            SignatureCheck::Rejected(RejectReason::InvalidTimestamp)
        );
        assert_eq!(
            v.check_at(&headers(&signature, Some("-5")), b"{}", NOW),
            SignatureCheck::Rejected(RejectReason::InvalidTimestamp)
        );
        assert_eq!(
            v.check_at(&headers(&signature, Some("soon")), b"{}", NOW),
            SignatureCheck::Rejected(RejectReason::InvalidTimestamp)
        );
    }

    #[test]
    fn test_rejects_mismatch_and_tampering() {
        let v = verifier(SignatureMode::Strict);
        let ts = NOW.to_string();
        assert_eq!(
            v.check_at(&headers("v1=deadbeef", Some(&ts)), b"{}", NOW),
            SignatureCheck::Rejected(RejectReason::Mismatch)
        );

        let signature = sign("topsecret", NOW, b"{\"amount\":10}");
        assert_eq!(
            v.check_at(&headers(&signature, Some(&ts)), b"{\"amount\":99}", NOW),
            SignatureCheck::Rejected(RejectReason::Mismatch)
        );

        let wrong_key = sign("othersecret", NOW, b"{}");
        assert!(!v.check_at(&headers(&wrong_key, Some(&ts)), b"{}", NOW).is_accepted());
    }

    #[test]
    fn test_legacy_secret_only_in_dual_mode() {
        assert_eq!(
            verifier(SignatureMode::Dual).check_at(&headers("topsecret", None), b"{}", NOW),
            SignatureCheck::Legacy
        );
        assert!(!verifier(SignatureMode::Strict)
            .check_at(&headers("topsecret", Some(&NOW.to_string())), b"{}", NOW)
            .is_accepted());
    }

    #[test]
    fn test_no_secret_passes() {
        let v = SignatureVerifier::new(SignatureConfig::disabled(KAPSO_SIGNATURE_HEADERS));
        assert_eq!(v.check(&HeaderMap::new(), b"anything"), SignatureCheck::Unconfigured);
        assert!(v.verify(&HeaderMap::new(), b"anything"));
    }

    #[test]
    fn test_missing_signature_header() {
        let v = verifier(SignatureMode::Dual);
        assert_eq!(
            v.check_at(&HeaderMap::new(), b"{}", NOW),
            SignatureCheck::Rejected(RejectReason::MissingSignature)
        );
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("STRICT".parse::<SignatureMode>().unwrap(), SignatureMode::Strict);
        assert_eq!(" dual ".parse::<SignatureMode>().unwrap(), SignatureMode::Dual);
        assert!("loose".parse::<SignatureMode>().is_err());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
