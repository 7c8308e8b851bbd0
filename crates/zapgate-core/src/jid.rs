//! JID — the provider-side address of a user or group conversation endpoint.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Server suffix for individual user endpoints.
pub const USER_SERVER: &str = "s.whatsapp.net";
/// Server suffix for group endpoints.
pub const GROUP_SERVER: &str = "g.us";
/// Server suffix for broadcast lists (including status).
pub const BROADCAST_SERVER: &str = "broadcast";

/// A validated `user@server` address.
///
/// Stored and compared as the canonical string form so it can be used
/// directly as a database key and as an object-storage path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jid(String);

impl Jid {
    /// Build a JID from its parts. No validation beyond joining.
    pub fn new(user: &str, server: &str) -> Self {
        Jid(format!("{user}@{server}"))
    }

    /// Parse a strict `user@server` form.
    pub fn parse(s: &str) -> Result<Self, GatewayError> {
        let (user, server) = s
            .split_once('@')
            .ok_or_else(|| GatewayError::InvalidInput(format!("jid '{s}' is missing '@'")))?;
        if user.is_empty() || server.is_empty() {
            return Err(GatewayError::InvalidInput(format!(
                "jid '{s}' has an empty user or server part"
            )));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(GatewayError::InvalidInput(format!(
                "jid '{s}' contains whitespace"
            )));
        }
        Ok(Jid(s.to_string()))
    }

    /// Normalize caller-supplied recipient input into a JID.
    ///
    /// Accepts a full `user@server` form, or a bare phone number (digits,
    /// optionally with `+`, spaces, dashes, parentheses) which is rewritten
    /// to `{digits}@s.whatsapp.net`.
    pub fn normalize(input: &str) -> Result<Self, GatewayError> {
        let trimmed = input.trim();
        if trimmed.contains('@') {
            return Self::parse(trimmed);
        }
        let digits: String = trimmed
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        let rest: String = trimmed
            .chars()
            .filter(|c| !c.is_ascii_digit() && !matches!(c, '+' | ' ' | '-' | '(' | ')'))
            .collect();
        if digits.is_empty() || !rest.is_empty() {
            return Err(GatewayError::InvalidInput(format!(
                "recipient '{input}' is neither a jid nor a phone number"
            )));
        }
        Ok(Jid(format!("{digits}@{USER_SERVER}")))
    }

    /// The part before `@`.
    pub fn user(&self) -> &str {
        self.0.split('@').next().unwrap_or("")
    }

    /// The part after `@`.
    pub fn server(&self) -> &str {
        self.0.split('@').nth(1).unwrap_or("")
    }

    /// Whether this address is a group conversation.
    pub fn is_group(&self) -> bool {
        self.server() == GROUP_SERVER
    }

    /// Whether this address is a broadcast list.
    pub fn is_broadcast(&self) -> bool {
        self.server() == BROADCAST_SERVER
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Jid {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
