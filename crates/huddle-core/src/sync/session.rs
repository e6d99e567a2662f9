//! The identity every engine call runs under.

use std::fmt;

use crate::auth::AuthSession;
use crate::models::AuthorId;

/// Caller identity passed explicitly into engine operations.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub author_id: AuthorId,
    access_token: Option<String>,
}

impl Session {
    /// Not signed in: records are owned by the anonymous placeholder.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            author_id: AuthorId::anonymous(),
            access_token: None,
        }
    }

    #[must_use]
    pub fn authenticated(auth: &AuthSession) -> Self {
        Self {
            author_id: AuthorId::from(auth.user.id.as_str()),
            access_token: Some(auth.access_token.clone()),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.author_id.is_anonymous()
    }

    /// Bearer credential for remote calls, if signed in
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Session")
            .field("author_id", &self.author_id)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthUser;

    #[test]
    fn authenticated_session_uses_user_id() {
        let auth = AuthSession {
            access_token: "secret".to_string(),
            expires_at: 0,
            user: AuthUser {
                id: "u-42".to_string(),
                email: None,
            },
        };
        let session = Session::authenticated(&auth);
        assert_eq!(session.author_id.as_str(), "u-42");
        assert!(!session.is_anonymous());
        assert_eq!(session.access_token(), Some("secret"));
        assert!(!format!("{session:?}").contains("secret"));
    }

    #[test]
    fn default_is_anonymous() {
        assert!(Session::default().is_anonymous());
        assert!(Session::default().access_token().is_none());
    }
}
