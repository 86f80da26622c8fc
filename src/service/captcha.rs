//! Turnstile CAPTCHA verification client
//!
//! Verifies tokens against the Cloudflare Turnstile siteverify endpoint.
//! Only consulted when a secret is configured.

use std::env;
use std::time::Duration;

use serde::Deserialize;

use crate::upstream::build_client;

const SITEVERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";
const ENV_SITEVERIFY_URL: &str = "SECSCORE_TURNSTILE_VERIFY_URL";

const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum CaptchaError {
    /// The verifier rejected the token; carries the upstream error codes.
    #[error("CAPTCHA verification failed: {0:?}")]
    Rejected(Vec<String>),

    #[error("CAPTCHA verifier unreachable: {0}")]
    Upstream(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    success: bool,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

pub struct CaptchaVerifier {
    client: reqwest::Client,
    verify_url: String,
    secret: String,
}

impl CaptchaVerifier {
    pub fn new(secret: String) -> Self {
        let verify_url =
            env::var(ENV_SITEVERIFY_URL).unwrap_or_else(|_| SITEVERIFY_URL.to_string());

        Self {
            client: build_client(VERIFY_TIMEOUT),
            verify_url,
            secret,
        }
    }

    /// Verify a token. `remote_ip` is forwarded when known.
    pub async fn verify(&self, token: &str, remote_ip: Option<&str>) -> Result<(), CaptchaError> {
        let mut form = vec![
            ("secret", self.secret.as_str()),
            ("response", token),
        ];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let response: SiteverifyResponse = self
            .client
            .post(&self.verify_url)
            .form(&form)
            .send()
            .await?
            .json()
            .await?;

        if response.success {
            Ok(())
        } else {
            tracing::debug!(codes = ?response.error_codes, "Turnstile rejected token");
            Err(CaptchaError::Rejected(response.error_codes))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_siteverify_payloads() {
        let ok: SiteverifyResponse =
            serde_json::from_str(r#"{"success": true, "challenge_ts": "2024-05-01T00:00:00Z"}"#)
                .unwrap();
        assert!(ok.success);
        assert!(ok.error_codes.is_empty());

        let rejected: SiteverifyResponse = serde_json::from_str(
            r#"{"success": false, "error-codes": ["invalid-input-response", "timeout-or-duplicate"]}"#,
        )
        .unwrap();
        assert!(!rejected.success);
        assert_eq!(rejected.error_codes.len(), 2);
    }
}
