//! Command guard.
//!
//! Decides whether a command message may reach its handler. In group chats
//! non-admins are held back while the chat's admin-only mode is on.

use std::collections::HashSet;

use teloxide::types::{ChatId, UserId};
use tracing::{debug, warn};

use super::checker::Permissions;
use crate::database::{ChatSettings, SettingsStore};

/// Outcome for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardVerdict {
    /// Not one of our commands, nothing to decide.
    NotCommand,
    /// The handler may run.
    Allowed,
    /// Delete the message; the handler must not run.
    Suppressed,
    /// Leave the message; the handler must not run.
    Blocked,
}

impl GuardVerdict {
    /// Whether the command handler must be skipped.
    pub fn stops_handler(self) -> bool {
        matches!(self, Self::Suppressed | Self::Blocked)
    }
}

/// Who sent a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSender {
    User(UserId),
    /// Anonymous admin posting as the chat itself.
    ChatItself,
    /// A channel or another chat.
    OtherChat,
}

/// One command-shaped message.
#[derive(Debug, Clone, Copy)]
pub struct CommandMessage<'a> {
    pub chat_id: ChatId,
    pub is_group: bool,
    pub sender: CommandSender,
    pub text: &'a str,
}

/// Admin-gated command policy.
#[derive(Debug, Clone)]
pub struct CommandGuard {
    /// Lowercase command names without the slash
    commands: HashSet<String>,
    /// Lowercase bot username without @
    bot_username: String,
    /// Scope restriction
    allowed_chat: Option<i64>,
}

impl CommandGuard {
    pub fn new<I, S>(commands: I, bot_username: &str, allowed_chat: Option<i64>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            commands: commands
                .into_iter()
                .map(|c| c.as_ref().trim_start_matches('/').to_lowercase())
                .collect(),
            bot_username: bot_username.trim_start_matches('@').to_lowercase(),
            allowed_chat,
        }
    }

    /// Whether the bot serves this chat.
    pub fn in_scope(&self, chat_id: ChatId) -> bool {
        self.allowed_chat.is_none_or(|allowed| allowed == chat_id.0)
    }

    /// The command name if `text` is one of our commands.
    ///
    /// `/cmd@other_bot` is addressed to another bot and is not ours.
    pub fn command_name<'a>(&self, text: &'a str) -> Option<&'a str> {
        let token = text.split_whitespace().next()?.strip_prefix('/')?;
        let (name, target) = match token.split_once('@') {
            Some((name, target)) => (name, Some(target)),
            None => (token, None),
        };
        if let Some(target) = target {
            if !target.eq_ignore_ascii_case(&self.bot_username) {
                return None;
            }
        }
        self.commands
            .contains(&name.to_lowercase())
            .then_some(name)
    }

    /// Evaluate a message.
    pub async fn evaluate(
        &self,
        message: CommandMessage<'_>,
        permissions: &Permissions,
        settings: &dyn SettingsStore,
    ) -> GuardVerdict {
        let Some(command) = self.command_name(message.text) else {
            return GuardVerdict::NotCommand;
        };

        if !message.is_group {
            return GuardVerdict::Allowed;
        }

        if !self.in_scope(message.chat_id) {
            debug!("/{} in out-of-scope chat {}", command, message.chat_id);
            return GuardVerdict::Suppressed;
        }

        let is_admin = match message.sender {
            CommandSender::User(user_id) => permissions.is_admin(message.chat_id, user_id).await,
            CommandSender::ChatItself => true,
            CommandSender::OtherChat => false,
        };
        if is_admin {
            return GuardVerdict::Allowed;
        }

        let settings = match settings.get_settings(message.chat_id.0).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(
                    "Failed to load settings for {}, using defaults: {}",
                    message.chat_id, e
                );
                ChatSettings::new(message.chat_id.0)
            }
        };

        let verdict = if !settings.admin_only_commands {
            GuardVerdict::Allowed
        } else if settings.delete_non_admin_commands {
            GuardVerdict::Suppressed
        } else {
            GuardVerdict::Blocked
        };
        debug!(
            "/{} from non-admin {:?} in {}: {:?}",
            command, message.sender, message.chat_id, verdict
        );
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::permissions::checker::tests::{admin, FakeLookup};
    use crate::permissions::checker::MemberPrivileges;
    use std::collections::HashMap;
    use std::sync::Arc;

    const CHAT: ChatId = ChatId(-100);
    const ADMIN: UserId = UserId(1);
    const MEMBER: UserId = UserId(2);
    const BROKEN: UserId = UserId(3);

    fn guard(allowed_chat: Option<i64>) -> CommandGuard {
        CommandGuard::new(["filter", "ban", "start"], "harley_bot", allowed_chat)
    }

    fn permissions() -> Permissions {
        let table = HashMap::from([(1, admin()), (2, MemberPrivileges::default())]);
        Permissions::new(Arc::new(FakeLookup(table)), vec![])
    }

    fn message(sender: UserId, text: &str) -> CommandMessage<'_> {
        CommandMessage {
            chat_id: CHAT,
            is_group: true,
            sender: CommandSender::User(sender),
            text,
        }
    }

    #[test]
    fn test_command_name() {
        let guard = guard(None);
        assert_eq!(guard.command_name("/filter hi there"), Some("filter"));
        assert_eq!(guard.command_name("/FILTER@Harley_Bot hi"), Some("FILTER"));
        assert_eq!(guard.command_name("/filter@other_bot hi"), None);
        assert_eq!(guard.command_name("/unknown"), None);
        assert_eq!(guard.command_name("filter"), None);
        assert_eq!(guard.command_name(""), None);
    }

    #[tokio::test]
    async fn test_not_command_passes() {
        let store = MemoryStore::new();
        let verdict = guard(None)
            .evaluate(message(MEMBER, "merhaba"), &permissions(), &store)
            .await;
        assert_eq!(verdict, GuardVerdict::NotCommand);
    }

    #[tokio::test]
    async fn test_admin_allowed() {
        let store = MemoryStore::new();
        let verdict = guard(None)
            .evaluate(message(ADMIN, "/ban"), &permissions(), &store)
            .await;
        assert_eq!(verdict, GuardVerdict::Allowed);
    }

    #[tokio::test]
    async fn test_non_admin_suppressed_by_default() {
        let store = MemoryStore::new();
        let verdict = guard(None)
            .evaluate(message(MEMBER, "/ban"), &permissions(), &store)
            .await;
        assert_eq!(verdict, GuardVerdict::Suppressed);
        assert!(verdict.stops_handler());
    }

    #[tokio::test]
    async fn test_lookup_error_is_not_admin() {
        let store = MemoryStore::new();
        let verdict = guard(None)
            .evaluate(message(BROKEN, "/filter x y"), &permissions(), &store)
            .await;
        assert_eq!(verdict, GuardVerdict::Suppressed);
    }

    #[tokio::test]
    async fn test_admin_only_off_allows_members() {
        let store = MemoryStore::new();
        store.set_admin_only_mode(CHAT.0, false).await.unwrap();
        let verdict = guard(None)
            .evaluate(message(MEMBER, "/ban"), &permissions(), &store)
            .await;
        assert_eq!(verdict, GuardVerdict::Allowed);
    }

    #[tokio::test]
    async fn test_blocked_when_deletion_disabled() {
        let store = MemoryStore::new();
        let mut settings = ChatSettings::new(CHAT.0);
        settings.delete_non_admin_commands = false;
        store.put_settings(settings);

        let verdict = guard(None)
            .evaluate(message(MEMBER, "/ban"), &permissions(), &store)
            .await;
        assert_eq!(verdict, GuardVerdict::Blocked);
        assert!(verdict.stops_handler());
    }

    #[tokio::test]
    async fn test_out_of_scope_suppressed_even_for_admin() {
        let store = MemoryStore::new();
        let verdict = guard(Some(-200))
            .evaluate(message(ADMIN, "/ban"), &permissions(), &store)
            .await;
        assert_eq!(verdict, GuardVerdict::Suppressed);
    }

    #[tokio::test]
    async fn test_private_chat_allowed() {
        let store = MemoryStore::new();
        let mut msg = message(MEMBER, "/start");
        msg.is_group = false;
        let verdict = guard(Some(-200))
            .evaluate(msg, &permissions(), &store)
            .await;
        assert_eq!(verdict, GuardVerdict::Allowed);
    }

    #[tokio::test]
    async fn test_anonymous_admin_allowed() {
        let store = MemoryStore::new();
        let mut msg = message(MEMBER, "/ban");
        msg.sender = CommandSender::ChatItself;
        let verdict = guard(None).evaluate(msg, &permissions(), &store).await;
        assert_eq!(verdict, GuardVerdict::Allowed);
    }
}
