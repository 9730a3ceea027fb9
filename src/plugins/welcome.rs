//! Welcome command handlers.
//!
//! /setwelcome stores the template, /welcome toggles it. Sending happens in
//! `events::welcome`.

use teloxide::prelude::*;
use tracing::{error, info};

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::utils::parse_toggle;

use super::{reply_html, require, Privilege};

/// Handle /setwelcome <text>. Without text the custom message is cleared.
pub async fn setwelcome_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Admin).await? {
        return Ok(());
    }

    let chat_id = msg.chat.id.0;
    let template = welcome_template(&args);
    let key = if template.is_some() {
        "welcome.set"
    } else {
        "welcome.cleared"
    };

    if let Err(e) = state.storage.settings.set_welcome_message(chat_id, template).await {
        error!("Failed to store welcome message in {}: {}", chat_id, e);
        reply_html(&bot, &msg, state.text("common.storage_error")).await?;
        return Ok(());
    }
    info!("Welcome message updated in chat {}", chat_id);
    reply_html(&bot, &msg, state.text(key)).await?;

    Ok(())
}

/// Handle /welcome [on|off].
pub async fn welcome_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Admin).await? {
        return Ok(());
    }

    let chat_id = msg.chat.id.0;
    let arg = args.trim();

    if arg.is_empty() {
        let text = match state.storage.settings.get_settings(chat_id).await {
            Ok(settings) => {
                let status = if settings.welcome_enabled {
                    state.text("common.on")
                } else {
                    state.text("common.off")
                };
                state.text("welcome.status").replace("{status}", &status)
            }
            Err(e) => {
                error!("Failed to read settings of {}: {}", chat_id, e);
                state.text("common.storage_error")
            }
        };
        reply_html(&bot, &msg, text).await?;
        return Ok(());
    }

    let Some(enabled) = parse_toggle(arg) else {
        reply_html(&bot, &msg, state.text("welcome.invalid")).await?;
        return Ok(());
    };

    let text = match state.storage.settings.set_welcome_enabled(chat_id, enabled).await {
        Ok(()) if enabled => state.text("welcome.enabled"),
        Ok(()) => state.text("welcome.disabled"),
        Err(e) => {
            error!("Failed to toggle welcome in {}: {}", chat_id, e);
            state.text("common.storage_error")
        }
    };
    reply_html(&bot, &msg, text).await?;

    Ok(())
}

fn welcome_template(args: &str) -> Option<String> {
    let trimmed = args.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_template() {
        assert_eq!(welcome_template("  "), None);
        assert_eq!(
            welcome_template(" Hoş geldin {mention}! "),
            Some("Hoş geldin {mention}!".to_string())
        );
    }
}
