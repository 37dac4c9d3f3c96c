use crate::error::CoreError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Display;

/// Length of every short code, in characters.
pub const CODE_LENGTH: usize = 8;

/// A short code identifying a stored URL.
///
/// Codes are derived from the original URL: the first eight characters of the
/// URL-safe base64 encoding of its SHA-256 digest. The same URL always yields
/// the same code, which lets backends answer "insert if absent, else return
/// the existing record" without a prior lookup.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortCode(String);

impl ShortCode {
    /// Derives the short code for `original_url`.
    ///
    /// This is a total function: any string, including the empty one, maps to
    /// a code. Truncation to eight characters means unrelated URLs can collide;
    /// backends detect that case and report it instead of overwriting.
    ///
    /// # Examples
    ///
    /// ```
    /// use snip_core::ShortCode;
    ///
    /// let a = ShortCode::derive("https://example.com");
    /// let b = ShortCode::derive("https://example.com");
    /// assert_eq!(a, b);
    /// assert_eq!(a.as_str().len(), 8);
    /// ```
    pub fn derive(original_url: &str) -> Self {
        let digest = Sha256::digest(original_url.as_bytes());
        let mut encoded = URL_SAFE_NO_PAD.encode(digest);
        encoded.truncate(CODE_LENGTH);
        Self(encoded)
    }

    /// Parses a caller-supplied code.
    ///
    /// Valid codes are exactly eight characters of `[A-Za-z0-9_-]`.
    pub fn new(code: impl Into<String>) -> std::result::Result<Self, CoreError> {
        let code = code.into();
        Self::validate(&code)?;
        Ok(Self(code))
    }

    /// Creates a `ShortCode` without validation.
    ///
    /// Use this only for codes read back from a trusted store.
    pub fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Generates the full shortened URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(code: &str) -> std::result::Result<(), CoreError> {
        if code.len() != CODE_LENGTH {
            return Err(CoreError::InvalidShortCode(format!(
                "length must be {}, got {}",
                CODE_LENGTH,
                code.len()
            )));
        }

        if !code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CoreError::InvalidShortCode(format!(
                "must contain only url-safe base64 characters: '{}'",
                code
            )));
        }

        Ok(())
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ShortCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
