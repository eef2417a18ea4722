//! Room codes and the transport identities derived from them.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::error::SessionError;

/// Prefix shared by every host identity
pub const IDENTITY_PREFIX: &str = "hockey-link-";

/// Four-digit numeric room code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Draw a new code in 1000..=9999 (no leading zero to misread)
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        Self(rng.random_range(1000u16..=9999).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value, used by transports that map codes to ports
    pub fn number(&self) -> u16 {
        // Validated to four ASCII digits on construction
        self.0.bytes().fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0'))
    }

    /// The host's externally addressable identity
    pub fn identity(&self) -> String {
        format!("{IDENTITY_PREFIX}{}", self.0)
    }

    /// Recover a room code from an identity produced by [`RoomCode::identity`]
    pub fn from_identity(identity: &str) -> Option<Self> {
        identity
            .strip_prefix(IDENTITY_PREFIX)
            .and_then(|code| code.parse().ok())
    }
}

impl FromStr for RoomCode {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_string()))
        } else {
            Err(SessionError::InvalidRoomCode(s.to_string()))
        }
    }
}

impl TryFrom<String> for RoomCode {
    type Error = SessionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
