//! `WWW-Authenticate` challenge message.

use crate::constants::{fields, DIGEST_SCHEME, QOP_AUTH};
use crate::error::ParseError;
use crate::header::{self, EmptyValues, HeaderFields};
use crate::providers::DigestAlgorithm;
use std::fmt;
use std::str::FromStr;

/// Wire order of challenge parameters.
const CHALLENGE_ORDER: [&str; 7] = [
    fields::REALM,
    fields::NONCE,
    fields::DOMAIN,
    fields::QOP,
    fields::STALE,
    fields::ALGORITHM,
    fields::OPAQUE,
];

/// Server challenge telling the client how to authenticate.
///
/// `realm` and `nonce` are always non-empty. Instances are immutable once
/// built; the `with_*` methods consume and return a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeMessage {
    realm: String,
    nonce: String,
    domain: Vec<String>,
    qop: String,
    stale: bool,
    algorithm: Option<String>,
    opaque: Option<String>,
}

impl ChallengeMessage {
    /// Create a challenge with default `qop` (`auth`) and algorithm (`MD5`).
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::EmptyField`] if `realm` or `nonce` is empty.
    pub fn new(realm: impl Into<String>, nonce: impl Into<String>) -> Result<Self, ParseError> {
        let realm = realm.into();
        let nonce = nonce.into();

        if realm.is_empty() {
            return Err(ParseError::EmptyField(fields::REALM));
        }
        if nonce.is_empty() {
            return Err(ParseError::EmptyField(fields::NONCE));
        }

        Ok(Self {
            realm,
            nonce,
            domain: Vec::new(),
            qop: QOP_AUTH.to_string(),
            stale: false,
            algorithm: Some(DigestAlgorithm::Md5.as_str().to_string()),
            opaque: None,
        })
    }

    /// Set the protected URI prefixes.
    #[must_use]
    pub fn with_domain(mut self, domain: Vec<String>) -> Self {
        self.domain = domain;
        self
    }

    /// Set the quality-of-protection list (e.g. `"auth,auth-int"`).
    #[must_use]
    pub fn with_qop(mut self, qop: impl Into<String>) -> Self {
        self.qop = qop.into();
        self
    }

    /// Mark the challenge as answering a request whose nonce went stale.
    #[must_use]
    pub const fn with_stale(mut self, stale: bool) -> Self {
        self.stale = stale;
        self
    }

    /// Set the advertised algorithm name, or `None` to omit it.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: Option<String>) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the opaque token echoed back by clients.
    #[must_use]
    pub fn with_opaque(mut self, opaque: Option<String>) -> Self {
        self.opaque = opaque;
        self
    }

    /// Protection realm.
    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Server nonce.
    #[must_use]
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Protected URI prefixes.
    #[must_use]
    pub fn domain(&self) -> &[String] {
        &self.domain
    }

    /// Quality-of-protection list.
    #[must_use]
    pub fn qop(&self) -> &str {
        &self.qop
    }

    /// Whether the previous nonce was rejected only for being stale.
    #[must_use]
    pub const fn stale(&self) -> bool {
        self.stale
    }

    /// Advertised algorithm, if any.
    #[must_use]
    pub fn algorithm(&self) -> Option<&str> {
        self.algorithm.as_deref()
    }

    /// Opaque token, if any.
    #[must_use]
    pub fn opaque(&self) -> Option<&str> {
        self.opaque.as_deref()
    }

    /// Render the `WWW-Authenticate` header value.
    ///
    /// # Examples
    ///
    /// ```
    /// use composable_digest_auth::ChallengeMessage;
    ///
    /// let challenge = ChallengeMessage::new("api", "abc123").unwrap();
    /// assert_eq!(
    ///     challenge.to_wire_string(),
    ///     r#"Digest realm="api", nonce="abc123", qop="auth", algorithm="MD5""#
    /// );
    /// ```
    #[must_use]
    pub fn to_wire_string(&self) -> String {
        let mut map = HeaderFields::new();
        map.insert(fields::REALM.to_string(), self.realm.clone());
        map.insert(fields::NONCE.to_string(), self.nonce.clone());
        if !self.domain.is_empty() {
            map.insert(fields::DOMAIN.to_string(), self.domain.join(" "));
        }
        map.insert(fields::QOP.to_string(), self.qop.clone());
        if self.stale {
            map.insert(fields::STALE.to_string(), "true".to_string());
        }
        if let Some(algorithm) = &self.algorithm {
            map.insert(fields::ALGORITHM.to_string(), algorithm.clone());
        }
        if let Some(opaque) = &self.opaque {
            map.insert(fields::OPAQUE.to_string(), opaque.clone());
        }

        header::format(DIGEST_SCHEME, &map, &CHALLENGE_ORDER)
    }

    /// Parse a `WWW-Authenticate` header value.
    ///
    /// Absent `qop` defaults to `auth`; absent `algorithm` stays absent.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::MissingScheme`] for a non-Digest header,
    /// [`ParseError::MissingField`] if `realm` or `nonce` is absent, and
    /// [`ParseError::EmptyField`] if either is empty.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut map = header::parse(text, DIGEST_SCHEME, EmptyValues::Keep)?;

        let realm = map
            .remove(fields::REALM)
            .ok_or(ParseError::MissingField(fields::REALM))?;
        let nonce = map
            .remove(fields::NONCE)
            .ok_or(ParseError::MissingField(fields::NONCE))?;

        let mut challenge = Self::new(realm, nonce)?;
        challenge.domain = map
            .remove(fields::DOMAIN)
            .map(|d| d.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        if let Some(qop) = map.remove(fields::QOP) {
            challenge.qop = qop;
        }
        challenge.stale = map
            .remove(fields::STALE)
            .is_some_and(|s| s.eq_ignore_ascii_case("true"));
        challenge.algorithm = map.remove(fields::ALGORITHM);
        challenge.opaque = map.remove(fields::OPAQUE);

        Ok(challenge)
    }
}

impl fmt::Display for ChallengeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire_string())
    }
}

impl FromStr for ChallengeMessage {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_fields() {
        assert_eq!(
            ChallengeMessage::new("", "n"),
            Err(ParseError::EmptyField("realm"))
        );
        assert_eq!(
            ChallengeMessage::new("r", ""),
            Err(ParseError::EmptyField("nonce"))
        );
    }

    #[test]
    fn test_full_wire_order() {
        let challenge = ChallengeMessage::new("api", "n1")
            .unwrap()
            .with_domain(vec!["/a".to_string(), "/b".to_string()])
            .with_stale(true)
            .with_opaque(Some("op".to_string()));

        assert_eq!(
            challenge.to_wire_string(),
            r#"Digest realm="api", nonce="n1", domain="/a /b", qop="auth", stale="true", algorithm="MD5", opaque="op""#
        );
    }

    #[test]
    fn test_parse_round_trip() {
        let challenge = ChallengeMessage::new("api", "n1")
            .unwrap()
            .with_domain(vec!["/admin".to_string()])
            .with_qop("auth,auth-int")
            .with_stale(true)
            .with_algorithm(Some("SHA-256".to_string()))
            .with_opaque(Some("xyz".to_string()));

        let parsed: ChallengeMessage = challenge.to_wire_string().parse().unwrap();
        assert_eq!(parsed, challenge);
    }

    #[test]
    fn test_parse_third_party_challenge() {
        let text = r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;
        let challenge = ChallengeMessage::parse(text).unwrap();

        assert_eq!(challenge.realm(), "testrealm@host.com");
        assert_eq!(challenge.nonce(), "dcd98b7102dd2f0e8b11d0f600bfb0c093");
        assert_eq!(challenge.qop(), "auth,auth-int");
        assert!(!challenge.stale());
        assert_eq!(challenge.algorithm(), None);
        assert_eq!(challenge.opaque(), Some("5ccc069c403ebaf9f0171e9517f40e41"));
    }

    #[test]
    fn test_parse_missing_nonce() {
        assert_eq!(
            ChallengeMessage::parse(r#"Digest realm="api""#),
            Err(ParseError::MissingField("nonce"))
        );
    }

    #[test]
    fn test_parse_defaults_qop() {
        let challenge = ChallengeMessage::parse(r#"Digest realm="api", nonce="n""#).unwrap();
        assert_eq!(challenge.qop(), "auth");
    }
}
