//! `Authorization` credential message.

use crate::challenge::ChallengeMessage;
use crate::constants::{fields, DIGEST_SCHEME, QOP_AUTH};
use crate::error::ParseError;
use crate::header::{self, EmptyValues, HeaderFields};
use crate::providers::{DigestHasher, HashError};
use crate::verifier::expected_response;
use std::fmt;
use std::str::FromStr;

/// Wire order of authorization parameters.
const AUTHORIZATION_ORDER: [&str; 9] = [
    fields::USERNAME,
    fields::REALM,
    fields::NONCE,
    fields::URI,
    fields::QOP,
    fields::CNONCE,
    fields::NC,
    fields::RESPONSE,
    fields::OPAQUE,
];

/// Client credentials proving knowledge of the password for one request.
///
/// `username` and `response` are always present; parsing fails without them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationMessage {
    username: String,
    response: String,
    realm: Option<String>,
    nonce: Option<String>,
    uri: Option<String>,
    qop: Option<String>,
    cnonce: Option<String>,
    nc: Option<String>,
    opaque: Option<String>,
}

/// Inputs for answering a challenge on the client side.
#[derive(Debug, Clone)]
pub struct AnswerParams<'a> {
    /// Username.
    pub username: &'a str,

    /// Stored `hash(username:realm:secret)`.
    pub ha1: &'a str,

    /// HTTP method of the request being authorized.
    pub method: &'a str,

    /// Request URI.
    pub uri: &'a str,

    /// Client nonce.
    pub cnonce: &'a str,

    /// How many times this nonce has been used, including this request.
    pub nonce_count: u64,
}

impl AuthorizationMessage {
    /// Create a message with only the required fields.
    #[must_use]
    pub fn new(username: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            response: response.into(),
            realm: None,
            nonce: None,
            uri: None,
            qop: None,
            cnonce: None,
            nc: None,
            opaque: None,
        }
    }

    /// Set the realm.
    #[must_use]
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// Set the server nonce being answered.
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Set the digest-uri.
    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Set the chosen quality of protection.
    #[must_use]
    pub fn with_qop(mut self, qop: impl Into<String>) -> Self {
        self.qop = Some(qop.into());
        self
    }

    /// Set the client nonce.
    #[must_use]
    pub fn with_cnonce(mut self, cnonce: impl Into<String>) -> Self {
        self.cnonce = Some(cnonce.into());
        self
    }

    /// Set the nonce count (8 hex digits).
    #[must_use]
    pub fn with_nc(mut self, nc: impl Into<String>) -> Self {
        self.nc = Some(nc.into());
        self
    }

    /// Set the echoed opaque token.
    #[must_use]
    pub fn with_opaque(mut self, opaque: impl Into<String>) -> Self {
        self.opaque = Some(opaque.into());
        self
    }

    /// Replace the response digest.
    #[must_use]
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = response.into();
        self
    }

    /// Username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Response digest (hex).
    #[must_use]
    pub fn response(&self) -> &str {
        &self.response
    }

    /// Realm, if sent.
    #[must_use]
    pub fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }

    /// Server nonce, if sent.
    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        self.nonce.as_deref()
    }

    /// Digest-uri, if sent.
    #[must_use]
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// Quality of protection, if sent.
    #[must_use]
    pub fn qop(&self) -> Option<&str> {
        self.qop.as_deref()
    }

    /// Client nonce, if sent.
    #[must_use]
    pub fn cnonce(&self) -> Option<&str> {
        self.cnonce.as_deref()
    }

    /// Nonce count, if sent.
    #[must_use]
    pub fn nc(&self) -> Option<&str> {
        self.nc.as_deref()
    }

    /// Opaque token, if sent.
    #[must_use]
    pub fn opaque(&self) -> Option<&str> {
        self.opaque.as_deref()
    }

    /// First field the `qop` digest chain needs that this message lacks.
    ///
    /// With a non-empty `qop`, `uri`, `cnonce` and `nc` are required.
    /// Legacy messages without `qop` never report a missing field.
    #[must_use]
    pub fn missing_qop_field(&self) -> Option<&'static str> {
        if self.qop.as_deref().is_none_or(str::is_empty) {
            return None;
        }
        [
            (fields::URI, &self.uri),
            (fields::CNONCE, &self.cnonce),
            (fields::NC, &self.nc),
        ]
        .into_iter()
        .find_map(|(key, value)| value.is_none().then_some(key))
    }

    /// Render the `Authorization` header value.
    #[must_use]
    pub fn to_wire_string(&self) -> String {
        let mut map = HeaderFields::new();
        map.insert(fields::USERNAME.to_string(), self.username.clone());
        map.insert(fields::RESPONSE.to_string(), self.response.clone());

        let optional = [
            (fields::REALM, &self.realm),
            (fields::NONCE, &self.nonce),
            (fields::URI, &self.uri),
            (fields::QOP, &self.qop),
            (fields::CNONCE, &self.cnonce),
            (fields::NC, &self.nc),
            (fields::OPAQUE, &self.opaque),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                map.insert(key.to_string(), value.clone());
            }
        }

        header::format(DIGEST_SCHEME, &map, &AUTHORIZATION_ORDER)
    }

    /// Parse an `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::MissingScheme`] for a non-Digest header and
    /// [`ParseError::MissingField`] if `username` or `response` is absent,
    /// or if `qop` is set without `uri`, `cnonce` or `nc`.
    ///
    /// # Examples
    ///
    /// ```
    /// use composable_digest_auth::{AuthorizationMessage, ParseError};
    ///
    /// assert_eq!(
    ///     AuthorizationMessage::parse(r#"Digest username="a""#),
    ///     Err(ParseError::MissingField("response"))
    /// );
    /// ```
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut map = header::parse(text, DIGEST_SCHEME, EmptyValues::Keep)?;

        let response = map
            .remove(fields::RESPONSE)
            .ok_or(ParseError::MissingField(fields::RESPONSE))?;
        let username = map
            .remove(fields::USERNAME)
            .ok_or(ParseError::MissingField(fields::USERNAME))?;

        let message = Self {
            username,
            response,
            realm: map.remove(fields::REALM),
            nonce: map.remove(fields::NONCE),
            uri: map.remove(fields::URI),
            qop: map.remove(fields::QOP),
            cnonce: map.remove(fields::CNONCE),
            nc: map.remove(fields::NC),
            opaque: map.remove(fields::OPAQUE),
        };

        match message.missing_qop_field() {
            Some(field) => Err(ParseError::MissingField(field)),
            None => Ok(message),
        }
    }

    /// Build a correctly hashed answer to `challenge`.
    ///
    /// Uses `qop=auth` when the challenge offers it and the legacy
    /// no-qop chain otherwise. The challenge's opaque token is echoed.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the hasher fails.
    pub fn answer(
        challenge: &ChallengeMessage,
        params: &AnswerParams<'_>,
        hasher: &dyn DigestHasher,
    ) -> Result<Self, HashError> {
        let offers_auth = challenge
            .qop()
            .split(',')
            .any(|token| token.trim().eq_ignore_ascii_case(QOP_AUTH));

        let mut message = Self::new(params.username, String::new())
            .with_realm(challenge.realm())
            .with_nonce(challenge.nonce())
            .with_uri(params.uri);
        if offers_auth {
            message = message
                .with_qop(QOP_AUTH)
                .with_cnonce(params.cnonce)
                .with_nc(format!("{:08x}", params.nonce_count));
        }
        if let Some(opaque) = challenge.opaque() {
            message = message.with_opaque(opaque);
        }

        let response = expected_response(hasher, params.ha1, params.method, &message)?;
        Ok(message.with_response(response))
    }
}

impl fmt::Display for AuthorizationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire_string())
    }
}

impl FromStr for AuthorizationMessage {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
