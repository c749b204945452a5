use serde::{Deserialize, Serialize};

/// Display data for the signed-in user. Never used for authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Profile {
    pub name: String,
    pub email: String,
}

/// Access/refresh credential pair. The two tokens are only ever
/// stored, replaced and cleared together.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

// Tokens must never end up in logs.
impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// The client-held authenticated identity.
///
/// A session is either fully present (token pair set) or fully absent.
/// An absent session never carries a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    tokens: Option<TokenPair>,
    profile: Option<Profile>,
}

impl Session {
    /// The fully-absent session
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn authenticated(tokens: TokenPair, profile: Option<Profile>) -> Self {
        Self {
            tokens: Some(tokens),
            profile,
        }
    }

    /// Replace the token pair, keeping the profile
    pub fn with_tokens(self, tokens: TokenPair) -> Self {
        Self {
            tokens: Some(tokens),
            profile: self.profile,
        }
    }

    pub fn is_present(&self) -> bool {
        self.tokens.is_some()
    }

    pub fn tokens(&self) -> Option<&TokenPair> {
        self.tokens.as_ref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.access_token.as_str())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.refresh_token.as_str())
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }
}
