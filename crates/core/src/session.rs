//! Explicit session state.
//!
//! The login flow itself happens elsewhere (an OAuth redirect that ends with the backend
//! setting a cookie). This client only carries the resulting cookie and, once checked, the
//! profile of the user it belongs to.

use crate::model::UserProfile;
use crate::{DriveError, DriveResult};

/// Session passed to [`HttpDriveClient`](crate::HttpDriveClient) at construction.
#[derive(Clone, Debug, Default)]
pub struct SessionContext {
    cookie: Option<String>,
    user: Option<UserProfile>,
}

impl SessionContext {
    /// A session with no cookie. Every authenticated call will fail with
    /// [`DriveError::Unauthenticated`] on the backend side.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A session carrying the raw `Cookie` header value issued by the backend.
    pub fn with_cookie(cookie: impl Into<String>) -> DriveResult<Self> {
        let cookie = cookie.into();
        let cookie = cookie.trim();
        if cookie.is_empty() {
            return Err(DriveError::InvalidInput(
                "session cookie cannot be empty".into(),
            ));
        }
        if cookie.chars().any(|c| c.is_control()) {
            return Err(DriveError::InvalidInput(
                "session cookie contains control characters".into(),
            ));
        }
        Ok(Self {
            cookie: Some(cookie.to_string()),
            user: None,
        })
    }

    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    /// Records the profile returned by a successful session check.
    pub fn authenticated_as(mut self, user: UserProfile) -> Self {
        self.user = Some(user);
        self
    }

    /// The guard run before any file operation: fails unless a session check succeeded.
    pub fn require_authenticated(&self) -> DriveResult<&UserProfile> {
        self.user.as_ref().ok_or(DriveError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserProfile {
        UserProfile {
            display_name: "Ada".into(),
            photo_url: None,
            email: "ada@example.com".into(),
            total_storage_used: 0,
            storage_limit: 0,
        }
    }

    #[test]
    fn test_with_cookie_trims_and_validates() {
        let session = SessionContext::with_cookie("  connect.sid=abc  ").unwrap();
        assert_eq!(session.cookie(), Some("connect.sid=abc"));

        assert!(SessionContext::with_cookie("   ").is_err());
        assert!(SessionContext::with_cookie("sid=a\r\nX-Evil: 1").is_err());
    }

    #[test]
    fn test_require_authenticated() {
        let session = SessionContext::with_cookie("sid=1").unwrap();
        assert!(matches!(
            session.require_authenticated(),
            Err(DriveError::Unauthenticated)
        ));

        let session = session.authenticated_as(user());
        assert_eq!(session.require_authenticated().unwrap().display_name, "Ada");
    }
}
