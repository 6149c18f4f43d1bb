//! The authentication boundary.

use crate::error::Result;
use crate::models::UserId;
use async_trait::async_trait;
use std::sync::Arc;

/// Resolves the currently authenticated user.
///
/// Sign-in and sign-out flows live entirely outside this workspace. The one
/// question the library ever asks is "who, if anyone, is signed in right
/// now", and it asks once per operation so the whole call sees one answer.
#[async_trait]
pub trait Identity {
    /// The signed-in user, or `None` when the device is signed out.
    async fn current_user(&self) -> Result<Option<UserId>>;
}

/// Shared handle to an identity source.
pub type IdentityHandle = Arc<dyn Identity + Send + Sync>;

/// Identity fixed at construction time.
///
/// A device is signed in as one configured user for the whole process
/// lifetime, or signed out. This is all a single-user CLI needs, and it gives
/// tests both authentication states for free.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user: Option<UserId>,
}

impl StaticIdentity {
    pub fn signed_in(user: UserId) -> Self {
        Self { user: Some(user) }
    }

    pub fn signed_out() -> Self {
        Self { user: None }
    }
}

#[async_trait]
impl Identity for StaticIdentity {
    async fn current_user(&self) -> Result<Option<UserId>> {
        Ok(self.user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signed_in() {
        let identity = StaticIdentity::signed_in(UserId::new("reader-1"));
        assert_eq!(identity.current_user().await.unwrap(), Some(UserId::new("reader-1")));
    }

    #[tokio::test]
    async fn test_signed_out() {
        let identity = StaticIdentity::signed_out();
        assert_eq!(identity.current_user().await.unwrap(), None);
    }
}
