//! Credential handling with secure memory.
//!
//! Uses the `secrecy` crate so API keys never land in a log line or a
//! `Debug` impl.

use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

/// A secret string that is never logged or displayed.
pub struct SecretString(SecretBox<str>);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().as_str())))
    }

    /// Expose the secret value. Only call this at the point of use
    /// (e.g. building a request header).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.expose().to_string())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Credentials for one model provider (LLM, embedding, rerank, or NLI
/// endpoint).
#[derive(Clone)]
pub struct ProviderCredentials {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: Option<String>,
}

impl ProviderCredentials {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key),
            model: model.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_not_in_debug_or_display() {
        let secret = SecretString::new("sk-super-secret-key");
        assert!(!format!("{:?}", secret).contains("sk-super"));
        assert!(!format!("{}", secret).contains("sk-super"));
    }

    #[test]
    fn expose_returns_raw_value() {
        let secret = SecretString::new("sk-super-secret-key");
        assert_eq!(secret.expose(), "sk-super-secret-key");
    }

    #[test]
    fn provider_credentials_debug_redacts_key() {
        let creds = ProviderCredentials::new("sk-secret", "embed-v1");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("embed-v1"));
    }
}
