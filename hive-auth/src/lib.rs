//! Credentials and payload signing for Hive.
//!
//! Every payload pushed to the ingestion endpoint carries an HMAC-SHA-256 signature over its exact
//! bytes, keyed with the account's [`SecretKey`]. The endpoint identifies the account through the
//! [`PublicKey`] that travels next to the signature in the query string.
//!
//! ```
//! use hive_auth::{PublicKey, SecretKey};
//!
//! let public_key: PublicKey = "PUBLIC_KEY".parse().unwrap();
//! let secret_key: SecretKey = "SECRET_KEY".parse().unwrap();
//!
//! let signature = secret_key.sign(b"d.service=api,m.requests=1.000000\n");
//! assert!(secret_key.verify(b"d.service=api,m.requests=1.000000\n", &signature));
//! # let _ = public_key;
//! ```

#![warn(missing_docs)]

use std::fmt;
use std::str::FromStr;

use data_encoding::BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Raised if a key could not be parsed.
#[derive(Debug, Eq, Hash, PartialEq, thiserror::Error)]
pub enum KeyParseError {
    /// The key was empty or consisted only of whitespace.
    #[error("key must not be empty")]
    Empty,
}

/// Parses a key from a string.
///
/// The key is kept byte for byte, since signatures are computed over the raw secret. A key
/// consisting only of whitespace is rejected.
fn parse_key(s: &str) -> Result<String, KeyParseError> {
    if s.trim().is_empty() {
        return Err(KeyParseError::Empty);
    }

    Ok(s.to_owned())
}

/// The public identifier of an account on the ingestion endpoint.
///
/// The public key is sent in clear text along with every request.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct PublicKey(String);

impl PublicKey {
    /// Returns the string representation of the key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PublicKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_key(s).map(Self)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey(\"{self}\")")
    }
}

hive_common::impl_str_serde!(PublicKey, "a public key");

/// The shared secret used to sign payloads.
///
/// The secret never leaves the process. Its `Debug` output is redacted so it does not end up in
/// logs when a configuration is printed.
#[derive(Clone, Eq, PartialEq)]
pub struct SecretKey(String);

impl SecretKey {
    /// Creates an Hmac instance keyed with this secret.
    fn mac(&self) -> Hmac<Sha256> {
        Hmac::new_from_slice(self.0.as_bytes()).expect("HMAC takes variable keys")
    }

    /// Signs the given payload bytes.
    pub fn sign(&self, data: &[u8]) -> Signature {
        let mut mac = self.mac();
        mac.update(data);
        Signature(BASE64.encode(&mac.finalize().into_bytes()))
    }

    /// Verifies a signature created by [`sign`](Self::sign) over the same bytes.
    ///
    /// The comparison of the MAC runs in constant time.
    pub fn verify(&self, data: &[u8], signature: &Signature) -> bool {
        let Ok(code) = BASE64.decode(signature.as_str().as_bytes()) else {
            return false;
        };

        let mut mac = self.mac();
        mac.update(data);
        mac.verify_slice(&code).is_ok()
    }
}

impl FromStr for SecretKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_key(s).map(Self)
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(\"[redacted]\")")
    }
}

hive_common::impl_str_serde!(SecretKey, "a secret key");

/// A standard base64 encoded HMAC-SHA-256 signature.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Signature(String);

impl Signature {
    /// Returns the string representation of the signature.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Signature {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Signature {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &[u8] =
        b"d.api=PublishMetric,d.location=Dublin,d.service=GoGo,m.NumOfSuccess=20.000000\n";

    #[test]
    fn test_sign_known_payload() {
        let secret: SecretKey = "SECRET_KEY".parse().unwrap();
        let signature = secret.sign(PAYLOAD);
        assert_eq!(
            signature.as_str(),
            "XWiMy4zU9zBdWAZj0vaD4OCVdOmnt4N4YjetxFBxJy4="
        );
    }

    #[test]
    fn test_sign_is_deterministic() {
        let secret: SecretKey = "SECRET_KEY".parse().unwrap();
        assert_eq!(secret.sign(PAYLOAD), secret.sign(PAYLOAD));
    }

    #[test]
    fn test_verify() {
        let secret: SecretKey = "SECRET_KEY".parse().unwrap();
        let signature = secret.sign(PAYLOAD);

        assert!(secret.verify(PAYLOAD, &signature));
        assert!(!secret.verify(b"tampered\n", &signature));
        assert!(!secret.verify(PAYLOAD, &Signature::from("not base64!")));

        let other: SecretKey = "OTHER_KEY".parse().unwrap();
        assert!(!other.verify(PAYLOAD, &signature));
    }

    #[test]
    fn test_parse_keys() {
        assert_eq!(
            " PUBLIC_KEY ".parse::<PublicKey>().unwrap().as_str(),
            " PUBLIC_KEY "
        );
        assert_eq!("".parse::<PublicKey>(), Err(KeyParseError::Empty));
        assert!("   ".parse::<SecretKey>().is_err());
    }

    #[test]
    fn test_sign_uses_raw_secret() {
        let padded: SecretKey = " SECRET_KEY ".parse().unwrap();
        let secret: SecretKey = "SECRET_KEY".parse().unwrap();
        assert_ne!(padded.sign(PAYLOAD), secret.sign(PAYLOAD));
    }

    #[test]
    fn test_secret_key_redacted() {
        let secret: SecretKey = "SECRET_KEY".parse().unwrap();
        assert_eq!(format!("{secret:?}"), "SecretKey(\"[redacted]\")");
    }

    #[test]
    fn test_key_serde() {
        let key: PublicKey = serde_json::from_str("\"PUBLIC_KEY\"").unwrap();
        assert_eq!(key.as_str(), "PUBLIC_KEY");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"PUBLIC_KEY\"");
        assert!(serde_json::from_str::<SecretKey>("\"\"").is_err());
    }
}
