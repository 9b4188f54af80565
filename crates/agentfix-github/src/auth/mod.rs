//! GitHub App identities and the credentials minted for them.
//!
//! An App signs a short-lived assertion with its private key ([`jwt`]) and
//! trades it for an installation token ([`tokens`]). Both live for one run:
//! nothing here caches or persists token material, and every secret is
//! redacted from `Debug` output.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::{AuthError, ValidationError};

pub mod jwt;
pub mod tokens;

pub use jwt::{build_assertion, JwtGenerator, RS256JwtGenerator};
pub use tokens::AppAuthenticator;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            pub fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            /// Parse a decimal id, ignoring surrounding whitespace.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| ValidationError::InvalidFormat {
                        field: $field.to_string(),
                        message: "must be a positive integer".to_string(),
                    })
            }
        }
    };
}

numeric_id!(
    /// Numeric id GitHub assigns to an App at registration.
    ///
    /// # Examples
    ///
    /// ```
    /// use agentfix_github::auth::GitHubAppId;
    ///
    /// let app_id: GitHubAppId = "123".parse().unwrap();
    /// assert_eq!(app_id.as_u64(), 123);
    /// assert_eq!(app_id.to_string(), "123");
    /// ```
    GitHubAppId,
    "github_app_id"
);

numeric_id!(
    /// One account's installation of the App.
    InstallationId,
    "installation_id"
);

// ============================================================================
// Credentials
// ============================================================================

/// PEM text of the App's RSA private key, wiped on drop.
#[derive(Clone)]
pub struct PrivateKey {
    key_data: Zeroizing<Vec<u8>>,
}

impl PrivateKey {
    pub fn key_data(&self) -> &[u8] {
        &self.key_data
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<REDACTED>)")
    }
}

/// Registered claims of an App assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// App id as a decimal string
    pub iss: String,
    /// Unix seconds, back-dated for clock skew
    pub iat: i64,
    /// Unix seconds
    pub exp: i64,
}

/// Bearer material plus the instant it stops being accepted.
#[derive(Clone)]
struct Expiring {
    secret: Zeroizing<String>,
    expires_at: DateTime<Utc>,
}

impl Expiring {
    fn new(secret: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: Zeroizing::new(secret),
            expires_at,
        }
    }

    /// True when less than `margin` of validity is left.
    fn lapses_within(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_at
    }
}

/// Signed RS256 assertion identifying the App itself.
///
/// # Examples
///
/// ```
/// use agentfix_github::auth::{GitHubAppId, JsonWebToken};
/// use chrono::{Duration, Utc};
///
/// let now = Utc::now();
/// let jwt = JsonWebToken::new("a.b.c".to_string(), GitHubAppId::new(1), now, now + Duration::minutes(9));
/// assert!(!jwt.is_expired());
/// ```
#[derive(Clone)]
pub struct JsonWebToken {
    inner: Expiring,
    app_id: GitHubAppId,
    issued_at: DateTime<Utc>,
}

impl JsonWebToken {
    pub fn new(
        token: String,
        app_id: GitHubAppId,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            inner: Expiring::new(token, expires_at),
            app_id,
            issued_at,
        }
    }

    /// Encoded assertion for `Authorization: Bearer`.
    pub fn token(&self) -> &str {
        &self.inner.secret
    }

    pub fn app_id(&self) -> GitHubAppId {
        self.app_id
    }

    /// The `iat` claim as a timestamp.
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.inner.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.inner.lapses_within(Duration::zero())
    }
}

impl fmt::Debug for JsonWebToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonWebToken")
            .field("app_id", &self.app_id)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.inner.expires_at)
            .finish_non_exhaustive()
    }
}

/// Token scoped to one installation, sent as `Authorization: token <value>`.
#[derive(Clone)]
pub struct InstallationToken {
    inner: Expiring,
    installation_id: InstallationId,
}

impl InstallationToken {
    pub fn new(token: String, installation_id: InstallationId, expires_at: DateTime<Utc>) -> Self {
        Self {
            inner: Expiring::new(token, expires_at),
            installation_id,
        }
    }

    pub fn token(&self) -> &str {
        &self.inner.secret
    }

    pub fn installation_id(&self) -> InstallationId {
        self.installation_id
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.inner.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.inner.lapses_within(Duration::zero())
    }

    /// True when the token lapses within `margin`.
    pub fn expires_soon(&self, margin: Duration) -> bool {
        self.inner.lapses_within(margin)
    }

    /// Require the token to outlive `work`.
    ///
    /// # Errors
    ///
    /// `AuthError::TokenExpired` when the token lapses before `work` elapses.
    pub fn ensure_valid_for(&self, work: Duration) -> Result<(), AuthError> {
        match self.expires_soon(work) {
            true => Err(AuthError::TokenExpired),
            false => Ok(()),
        }
    }
}

impl fmt::Debug for InstallationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InstallationToken {{ installation_id: {}, expires_at: {}, token: <REDACTED> }}",
            self.installation_id, self.inner.expires_at
        )
    }
}

// ============================================================================
// Provider Seam
// ============================================================================

/// Mints installation tokens; every call yields a fresh one.
#[async_trait::async_trait]
pub trait AuthenticationProvider: Send + Sync {
    async fn installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
