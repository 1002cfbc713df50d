//! Authorization port.
//!
//! The engine needs one capability from the identity system: is this user
//! an administrator. Ownership checks are plain id equality.

use std::collections::HashSet;

use async_trait::async_trait;

#[async_trait]
pub trait AuthorizationPort: Send + Sync {
    async fn is_admin(&self, user_id: &str) -> bool;
}

/// Fixed set of administrator ids, normally from `[auth] admins`.
#[derive(Debug, Clone, Default)]
pub struct AdminList {
    admins: HashSet<String>,
}

impl AdminList {
    pub fn new<I, S>(admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            admins: admins.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl AuthorizationPort for AdminList {
    async fn is_admin(&self, user_id: &str) -> bool {
        self.admins.contains(user_id)
    }
}

/// Owner or administrator.
pub async fn can_access(
    auth: &dyn AuthorizationPort,
    owner_id: &str,
    is_public: bool,
    requester_id: &str,
) -> bool {
    is_public || owner_id == requester_id || auth.is_admin(requester_id).await
}
