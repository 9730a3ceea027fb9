//! Plugin system for command handlers.
//!
//! Add new plugins by:
//! 1. Creating a new file in this directory
//! 2. Adding `pub mod your_plugin;` below
//! 3. Adding the handler to `command_handler()`

pub mod admin;
pub mod approve;
pub mod ban;
pub mod filters;
pub mod lock;
pub mod mute;
pub mod pin;
pub mod purge;
pub mod start;
pub mod tagger;
pub mod welcome;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, ReplyParameters};
use teloxide::utils::command::BotCommands;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::utils::delete_silently;

/// All bot commands.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Kullanılabilir komutlar:")]
pub enum Command {
    #[command(description = "Botu başlat")]
    Start(String),

    #[command(description = "Komut listesi")]
    Help,

    #[command(description = "Kullanıcı ve grup ID bilgisi")]
    Id,

    #[command(description = "Kullanıcı bilgisi")]
    Info,

    #[command(description = "Özelden yönetim")]
    Connect,

    // Filter commands
    #[command(description = "Filtre ekle")]
    Filter(String),

    #[command(description = "Filtreleri listele")]
    Filters,

    #[command(description = "Filtre sil")]
    Stop(String),

    #[command(description = "Tüm filtreleri sil")]
    Stopall,

    // Admin commands
    #[command(description = "Sadece admin komut modu")]
    Adminonly(String),

    #[command(description = "Admin listesi")]
    Admins,

    // Ban commands
    #[command(description = "Banla")]
    Ban(String),

    #[command(description = "Süreli ban")]
    Tban(String),

    #[command(description = "Banı kaldır")]
    Unban(String),

    #[command(description = "Gruptan at")]
    Kick(String),

    // Mute commands
    #[command(description = "Sustur")]
    Mute(String),

    #[command(description = "Süreli sustur")]
    Tmute(String),

    #[command(description = "Susturmayı kaldır")]
    Unmute(String),

    // Sticker/GIF approval
    #[command(description = "GIF/Sticker izni ver")]
    Approve(String),

    #[command(description = "GIF/Sticker iznini kaldır")]
    Disapprove(String),

    // Lock commands
    #[command(description = "Grubu kilitle")]
    Lock,

    #[command(description = "Kilidi aç")]
    Unlock,

    // Purge commands
    #[command(description = "Yanıtlanan mesajı sil")]
    Del,

    #[command(description = "Yanıtlanan mesajdan itibaren sil")]
    Purge,

    // Pin commands
    #[command(description = "Mesajı sabitle")]
    Pin(String),

    #[command(description = "Sabitlemeyi kaldır")]
    Unpin,

    // Welcome commands
    #[command(description = "Karşılama mesajını ayarla")]
    Setwelcome(String),

    #[command(description = "Karşılamayı aç/kapat")]
    Welcome(String),

    // Tagging commands
    #[command(description = "Üyeleri kaydet")]
    Kaydet,

    #[command(description = "Kayıtlı üye sayısı")]
    Uyeler,

    #[command(description = "Üye kayıtlarını sil")]
    Temizle,

    #[command(description = "Herkese soru sor")]
    Naber,

    #[command(description = "5'erli etiketle")]
    Etiket(String),

    #[command(description = "Etiketlemeyi durdur")]
    Durdur,

    #[command(description = "Herkesi etiketle")]
    Herkes(String),
}

/// Build the combined command handler.
pub fn command_handler() -> UpdateHandler<anyhow::Error> {
    use dptree::case;

    teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start(args)].endpoint(start::start_command))
        .branch(case![Command::Help].endpoint(start::help_command))
        .branch(case![Command::Id].endpoint(start::id_command))
        .branch(case![Command::Info].endpoint(start::info_command))
        .branch(case![Command::Connect].endpoint(start::connect_command))
        // Filters
        .branch(case![Command::Filter(args)].endpoint(filters::filter_command))
        .branch(case![Command::Filters].endpoint(filters::filters_command))
        .branch(case![Command::Stop(args)].endpoint(filters::stop_command))
        .branch(case![Command::Stopall].endpoint(filters::stopall_command))
        // Admin
        .branch(case![Command::Adminonly(args)].endpoint(admin::adminonly_command))
        .branch(case![Command::Admins].endpoint(admin::admins_command))
        // Ban
        .branch(case![Command::Ban(args)].endpoint(ban::ban_command))
        .branch(case![Command::Tban(args)].endpoint(ban::tban_command))
        .branch(case![Command::Unban(args)].endpoint(ban::unban_command))
        .branch(case![Command::Kick(args)].endpoint(ban::kick_command))
        // Mute
        .branch(case![Command::Mute(args)].endpoint(mute::mute_command))
        .branch(case![Command::Tmute(args)].endpoint(mute::tmute_command))
        .branch(case![Command::Unmute(args)].endpoint(mute::unmute_command))
        // Approval
        .branch(case![Command::Approve(args)].endpoint(approve::approve_command))
        .branch(case![Command::Disapprove(args)].endpoint(approve::disapprove_command))
        // Lock
        .branch(case![Command::Lock].endpoint(lock::lock_command))
        .branch(case![Command::Unlock].endpoint(lock::unlock_command))
        // Purge
        .branch(case![Command::Del].endpoint(purge::del_command))
        .branch(case![Command::Purge].endpoint(purge::purge_command))
        // Pin
        .branch(case![Command::Pin(args)].endpoint(pin::pin_command))
        .branch(case![Command::Unpin].endpoint(pin::unpin_command))
        // Welcome
        .branch(case![Command::Setwelcome(args)].endpoint(welcome::setwelcome_command))
        .branch(case![Command::Welcome(args)].endpoint(welcome::welcome_command))
        // Tagging
        .branch(case![Command::Kaydet].endpoint(tagger::kaydet_command))
        .branch(case![Command::Uyeler].endpoint(tagger::uyeler_command))
        .branch(case![Command::Temizle].endpoint(tagger::temizle_command))
        .branch(case![Command::Naber].endpoint(tagger::naber_command))
        .branch(case![Command::Etiket(args)].endpoint(tagger::etiket_command))
        .branch(case![Command::Durdur].endpoint(tagger::durdur_command))
        .branch(case![Command::Herkes(args)].endpoint(tagger::herkes_command))
}

/// Privilege a command needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    Admin,
    Restrict,
    Delete,
    Pin,
}

/// Check that a group command may run.
///
/// Private chats get a "groups only" reply. Out-of-scope chats and senders
/// without the privilege are answered with silent deletion.
pub async fn require(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
    privilege: Privilege,
) -> anyhow::Result<bool> {
    if !(msg.chat.is_group() || msg.chat.is_supergroup()) {
        reply_html(bot, msg, state.text("common.group_only")).await?;
        return Ok(false);
    }
    if !state.guard.in_scope(msg.chat.id) {
        return Ok(false);
    }

    // Anonymous admins post as the chat itself
    if msg.sender_chat.as_ref().is_some_and(|c| c.id == msg.chat.id) {
        return Ok(true);
    }

    let allowed = match msg.from.as_ref() {
        Some(user) => {
            let p = state.permissions.privileges(msg.chat.id, user.id).await;
            match privilege {
                Privilege::Admin => p.is_admin,
                Privilege::Restrict => p.can_restrict_members,
                Privilege::Delete => p.can_delete_messages,
                Privilege::Pin => p.can_pin_messages,
            }
        }
        None => false,
    };

    if !allowed {
        delete_silently(bot, msg.chat.id, msg.id).await;
    }
    Ok(allowed)
}

/// Reply to a message with HTML text.
pub async fn reply_html(
    bot: &ThrottledBot,
    msg: &Message,
    text: impl Into<String>,
) -> anyhow::Result<Message> {
    Ok(bot
        .send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?)
}
