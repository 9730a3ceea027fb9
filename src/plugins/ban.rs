//! Ban management commands.
//!
//! Commands for banning, unbanning, and kicking users.

use std::time::Duration;

use chrono::{DateTime, Utc};
use teloxide::prelude::*;
use tracing::info;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::utils::{parse_duration, resolve_target, user_mention, DurationError};

use super::{reply_html, require, Privilege};

/// Handle /ban command.
pub async fn ban_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    ban_action(bot, msg, state, args, BanMode::Forever).await
}

/// Handle /tban <target> <duration>.
pub async fn tban_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    ban_action(bot, msg, state, args, BanMode::Temporary).await
}

/// Handle /unban command.
pub async fn unban_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    ban_action(bot, msg, state, args, BanMode::Unban).await
}

/// Handle /kick command.
pub async fn kick_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    ban_action(bot, msg, state, args, BanMode::Kick).await
}

#[derive(Debug, PartialEq, Clone, Copy)]
enum BanMode {
    Forever,
    Temporary,
    Unban,
    Kick,
}

impl BanMode {
    fn usage_key(self) -> &'static str {
        match self {
            Self::Forever => "ban.usage",
            Self::Temporary => "ban.tban_usage",
            Self::Unban => "ban.unban_usage",
            Self::Kick => "ban.kick_usage",
        }
    }
}

/// Telegram makes restrictions shorter than 30s or longer than 366 days
/// permanent. These bounds keep clear of both edges.
pub(crate) const MIN_RESTRICTION: Duration = Duration::from_secs(60);
pub(crate) const MAX_RESTRICTION: Duration = Duration::from_secs(365 * 86_400);

/// First token shaped like a duration (`<digits><unit>`).
pub(crate) fn find_duration_token(args: &str) -> Option<&str> {
    args.split_whitespace().find(|t| {
        t.starts_with(|c: char| c.is_ascii_digit())
            && t.ends_with(|c: char| matches!(c.to_ascii_lowercase(), 's' | 'm' | 'h' | 'd' | 'w'))
    })
}

/// Parse the duration argument of a timed restriction.
pub(crate) fn duration_arg(args: &str) -> Option<Result<(String, Duration), DurationError>> {
    let token = find_duration_token(args)?;
    Some(parse_duration(token).and_then(|d| {
        if (MIN_RESTRICTION..=MAX_RESTRICTION).contains(&d) {
            Ok((token.to_string(), d))
        } else {
            Err(DurationError::OutOfRange(token.to_string()))
        }
    }))
}

/// Expiry of a restriction starting at `now`.
pub(crate) fn until(now: DateTime<Utc>, duration: Duration) -> Option<DateTime<Utc>> {
    let delta = chrono::Duration::from_std(duration).ok()?;
    now.checked_add_signed(delta)
}

async fn ban_action(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
    mode: BanMode,
) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Restrict).await? {
        return Ok(());
    }
    let chat_id = msg.chat.id;

    let Some((target, rest)) = resolve_target(&bot, &msg, &state, &args).await else {
        reply_html(&bot, &msg, state.text(mode.usage_key())).await?;
        return Ok(());
    };

    // Admins can't be banned or kicked
    if mode != BanMode::Unban && state.permissions.is_admin(chat_id, target.id).await {
        let key = if mode == BanMode::Kick {
            "ban.anti_admin_kick"
        } else {
            "ban.anti_admin"
        };
        reply_html(&bot, &msg, state.text(key)).await?;
        return Ok(());
    }

    let mention = user_mention(target.id.0, &target.name);

    let result = match mode {
        BanMode::Forever => bot
            .ban_chat_member(chat_id, target.id)
            .await
            .map(|_| state.text("ban.banned").replace("{user}", &mention)),
        BanMode::Temporary => {
            let (token, duration) = match duration_arg(rest) {
                Some(Ok(parsed)) => parsed,
                Some(Err(e)) => {
                    let text = state
                        .text("common.invalid_duration")
                        .replace("{error}", &e.to_string());
                    reply_html(&bot, &msg, text).await?;
                    return Ok(());
                }
                None => {
                    reply_html(&bot, &msg, state.text("ban.duration_missing")).await?;
                    return Ok(());
                }
            };
            let Some(until_date) = until(Utc::now(), duration) else {
                let text = state
                    .text("common.invalid_duration")
                    .replace("{error}", &token);
                reply_html(&bot, &msg, text).await?;
                return Ok(());
            };
            bot.ban_chat_member(chat_id, target.id)
                .until_date(until_date)
                .await
                .map(|_| {
                    state
                        .text("ban.tbanned")
                        .replace("{user}", &mention)
                        .replace("{duration}", &token)
                })
        }
        BanMode::Unban => bot
            .unban_chat_member(chat_id, target.id)
            .only_if_banned(true)
            .await
            .map(|_| state.text("ban.unbanned").replace("{user}", &mention)),
        BanMode::Kick => match bot.ban_chat_member(chat_id, target.id).await {
            // Ban then unban = kick
            Ok(_) => bot
                .unban_chat_member(chat_id, target.id)
                .await
                .map(|_| state.text("ban.kicked").replace("{user}", &mention)),
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(text) => {
            info!("{:?} {} in chat {}", mode, target.id, chat_id);
            reply_html(&bot, &msg, text).await?;
        }
        Err(e) => {
            reply_html(
                &bot,
                &msg,
                state.text("common.error").replace("{error}", &e.to_string()),
            )
            .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_duration_token() {
        assert_eq!(find_duration_token("1h spam"), Some("1h"));
        assert_eq!(find_duration_token("spam 30m"), Some("30m"));
        assert_eq!(find_duration_token("spam"), None);
        assert_eq!(find_duration_token("10"), None);
    }

    #[test]
    fn test_duration_arg() {
        let (token, duration) = duration_arg("1h").unwrap().unwrap();
        assert_eq!(token, "1h");
        assert_eq!(duration, Duration::from_secs(3600));
        assert!(duration_arg("0m").unwrap().is_err());
        assert!(duration_arg("").is_none());
    }

    #[test]
    fn test_duration_outside_telegram_window_is_rejected() {
        for token in ["10s", "59s", "366d", "53w"] {
            assert_eq!(
                duration_arg(token),
                Some(Err(DurationError::OutOfRange(token.to_string())))
            );
        }
        assert!(duration_arg("1m").unwrap().is_ok());
        assert!(duration_arg("52w").unwrap().is_ok());
        assert!(duration_arg("365d").unwrap().is_ok());
    }

    #[test]
    fn test_until_adds_duration() {
        let now = Utc::now();
        let expiry = until(now, Duration::from_secs(3600)).unwrap();
        assert_eq!((expiry - now).num_seconds(), 3600);
    }
}
