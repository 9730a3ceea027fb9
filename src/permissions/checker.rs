//! Permission checks against the platform.
//!
//! Member status is looked up on every call and never cached: a demoted
//! admin must lose access on their next message.

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, ChatMember, ChatMemberKind, UserId};
use tracing::debug;

/// What a chat member is allowed to do.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemberPrivileges {
    pub is_owner: bool,
    pub is_admin: bool,
    pub can_delete_messages: bool,
    pub can_restrict_members: bool,
    pub can_pin_messages: bool,
}

impl MemberPrivileges {
    /// Privileges of a chat creator or a bot owner.
    pub fn full() -> Self {
        Self {
            is_owner: true,
            is_admin: true,
            can_delete_messages: true,
            can_restrict_members: true,
            can_pin_messages: true,
        }
    }

    /// Read privileges from a ChatMember.
    pub fn from_chat_member(member: &ChatMember) -> Self {
        match &member.kind {
            ChatMemberKind::Owner(_) => Self::full(),
            ChatMemberKind::Administrator(admin) => Self {
                is_owner: false,
                is_admin: true,
                can_delete_messages: admin.can_delete_messages,
                can_restrict_members: admin.can_restrict_members,
                can_pin_messages: admin.can_pin_messages,
            },
            _ => Self::default(),
        }
    }
}

/// Platform query for a member's privileges.
#[async_trait]
pub trait MemberLookup: Send + Sync {
    async fn privileges(&self, chat_id: ChatId, user_id: UserId)
    -> anyhow::Result<MemberPrivileges>;
}

#[async_trait]
impl MemberLookup for Bot {
    async fn privileges(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> anyhow::Result<MemberPrivileges> {
        let member = self.get_chat_member(chat_id, user_id).await?;
        Ok(MemberPrivileges::from_chat_member(&member))
    }
}

/// Permission checker.
///
/// Bot owners (from OWNER_IDS env) pass every check. Lookup errors count
/// as "not allowed".
#[derive(Clone)]
pub struct Permissions {
    lookup: Arc<dyn MemberLookup>,
    /// Bot owner IDs - these users have all permissions in all chats.
    owner_ids: Vec<u64>,
}

impl Permissions {
    pub fn new(lookup: Arc<dyn MemberLookup>, owner_ids: Vec<u64>) -> Self {
        Self { lookup, owner_ids }
    }

    #[inline]
    fn is_bot_owner(&self, user_id: UserId) -> bool {
        self.owner_ids.contains(&user_id.0)
    }

    /// Privileges of a user, failing closed.
    pub async fn privileges(&self, chat_id: ChatId, user_id: UserId) -> MemberPrivileges {
        if self.is_bot_owner(user_id) {
            return MemberPrivileges::full();
        }
        match self.lookup.privileges(chat_id, user_id).await {
            Ok(privileges) => privileges,
            Err(e) => {
                debug!(
                    "Member lookup for {} in {} failed, treating as member: {}",
                    user_id, chat_id, e
                );
                MemberPrivileges::default()
            }
        }
    }

    /// Check if a user is an admin (including owner).
    pub async fn is_admin(&self, chat_id: ChatId, user_id: UserId) -> bool {
        self.privileges(chat_id, user_id).await.is_admin
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Lookup answering from a fixed table; unknown users make the call fail.
    pub(crate) struct FakeLookup(pub HashMap<u64, MemberPrivileges>);

    #[async_trait]
    impl MemberLookup for FakeLookup {
        async fn privileges(
            &self,
            _chat_id: ChatId,
            user_id: UserId,
        ) -> anyhow::Result<MemberPrivileges> {
            self.0
                .get(&user_id.0)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("lookup failed"))
        }
    }

    pub(crate) fn admin() -> MemberPrivileges {
        MemberPrivileges {
            is_admin: true,
            can_delete_messages: true,
            ..Default::default()
        }
    }

    fn permissions(owner_ids: Vec<u64>) -> Permissions {
        let table = HashMap::from([(1, admin()), (2, MemberPrivileges::default())]);
        Permissions::new(Arc::new(FakeLookup(table)), owner_ids)
    }

    #[tokio::test]
    async fn test_admin_and_member() {
        let perms = permissions(vec![]);
        let chat = ChatId(-100);
        assert!(perms.is_admin(chat, UserId(1)).await);
        assert!(!perms.privileges(chat, UserId(1)).await.can_restrict_members);
        assert!(!perms.is_admin(chat, UserId(2)).await);
    }

    #[tokio::test]
    async fn test_lookup_error_fails_closed() {
        let perms = permissions(vec![]);
        assert_eq!(
            perms.privileges(ChatId(-100), UserId(99)).await,
            MemberPrivileges::default()
        );
    }

    #[tokio::test]
    async fn test_bot_owner_bypasses_lookup() {
        let perms = permissions(vec![99]);
        let privileges = perms.privileges(ChatId(-100), UserId(99)).await;
        assert!(privileges.is_owner);
        assert!(privileges.can_pin_messages);
    }
}
