//! Member tagging commands.
//!
//! /kaydet, /uyeler and /temizle manage the member list. /naber, /etiket and
//! /herkes mention those members. The sending loops run in spawned tasks so the
//! chat's other updates keep flowing while they sleep between messages.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::seq::SliceRandom;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{debug, error, info, warn};

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::{Member, SettingsStore};
use crate::utils::{html_escape, user_mention};

use super::{reply_html, require, Privilege};

/// Greetings used by /naber.
const RANDOM_QUESTIONS: &[&str] = &[
    "Naber?",
    "Nasılsın?",
    "Ne yapıyorsun?",
    "İyi misin?",
    "Selam!",
    "Hoş geldin!",
    "Burada mısın?",
    "Aktif misin?",
    "Günaydın!",
    "İyi akşamlar!",
];

const ETIKET_BATCH: usize = 5;
const ETIKET_PAUSE: Duration = Duration::from_secs(3);
const HERKES_CHUNK: usize = 50;
const HERKES_PAUSE: Duration = Duration::from_secs(2);
const NABER_PAUSE: Duration = Duration::from_secs(1);

/// Tag loops running in this process, one generation per chat.
///
/// Starting a new /etiket bumps the chat's generation so an older loop for the
/// same chat ends at its next batch instead of running alongside.
#[derive(Clone, Default)]
pub struct TagRegistry {
    loops: Arc<DashMap<i64, u64>>,
    next: Arc<AtomicU64>,
}

impl TagRegistry {
    /// Register a new loop for the chat and return its generation.
    pub fn begin(&self, chat_id: i64) -> u64 {
        let generation = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        self.loops.insert(chat_id, generation);
        generation
    }

    /// Whether `generation` is still the chat's newest loop.
    pub fn is_current(&self, chat_id: i64, generation: u64) -> bool {
        self.loops.get(&chat_id).is_some_and(|g| *g == generation)
    }

    /// Forget the loop unless a newer one replaced it.
    pub fn finish(&self, chat_id: i64, generation: u64) {
        self.loops.remove_if(&chat_id, |_, g| *g == generation);
    }
}

/// How a tag loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOutcome {
    /// Every member was mentioned.
    Completed(usize),
    /// The session was stopped with /durdur.
    Stopped,
    /// A newer loop took over the chat.
    Superseded,
}

/// Handle /kaydet - save the administrators as members.
///
/// The Bot API cannot list ordinary members; they are collected as they write.
pub async fn kaydet_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Admin).await? {
        return Ok(());
    }
    let chat_id = msg.chat.id;

    let admins = match bot.get_chat_administrators(chat_id).await {
        Ok(admins) => admins,
        Err(e) => {
            reply_html(
                &bot,
                &msg,
                state.text("common.error").replace("{error}", &e.to_string()),
            )
            .await?;
            return Ok(());
        }
    };

    let members: Vec<Member> = admins
        .iter()
        .filter(|m| !m.user.is_bot)
        .map(|m| Member::from_telegram(chat_id.0, &m.user))
        .collect();

    if members.is_empty() {
        reply_html(&bot, &msg, state.text("tag.none_saved")).await?;
        return Ok(());
    }

    let text = match state.storage.members.save_members(members).await {
        Ok(count) => {
            info!("Saved {} members in chat {}", count, chat_id);
            state.text("tag.saved").replace("{count}", &count.to_string())
        }
        Err(e) => {
            error!("Failed to save members in {}: {}", chat_id, e);
            state.text("common.storage_error")
        }
    };
    reply_html(&bot, &msg, text).await?;

    Ok(())
}

/// Handle /uyeler - number of saved members.
pub async fn uyeler_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Admin).await? {
        return Ok(());
    }

    let text = match state.storage.members.count_members(msg.chat.id.0).await {
        Ok(count) => state.text("tag.count").replace("{count}", &count.to_string()),
        Err(e) => {
            error!("Failed to count members in {}: {}", msg.chat.id, e);
            state.text("common.storage_error")
        }
    };
    reply_html(&bot, &msg, text).await?;

    Ok(())
}

/// Handle /temizle - forget every saved member.
pub async fn temizle_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Admin).await? {
        return Ok(());
    }

    let text = match state.storage.members.delete_all_members(msg.chat.id.0).await {
        Ok(count) => state.text("tag.cleared").replace("{count}", &count.to_string()),
        Err(e) => {
            error!("Failed to clear members in {}: {}", msg.chat.id, e);
            state.text("common.storage_error")
        }
    };
    reply_html(&bot, &msg, text).await?;

    Ok(())
}

/// Handle /naber - one random greeting per member.
pub async fn naber_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Admin).await? {
        return Ok(());
    }
    let Some(members) = load_members(&bot, &msg, &state).await? else {
        return Ok(());
    };

    reply_html(
        &bot,
        &msg,
        state.text("tag.started").replace("{count}", &members.len().to_string()),
    )
    .await?;

    let messages: Vec<String> = {
        let mut rng = rand::thread_rng();
        members
            .iter()
            .map(|m| {
                let question = RANDOM_QUESTIONS.choose(&mut rng).copied().unwrap_or("Naber?");
                format!("{} {}", member_mention(m), question)
            })
            .collect()
    };

    let chat_id = msg.chat.id;
    let done = state.text("tag.done").replace("{count}", &members.len().to_string());
    tokio::spawn(async move {
        send_paced(messages, NABER_PAUSE, |text| send_html(&bot, chat_id, text)).await;
        if let Err(e) = send_html(&bot, chat_id, done).await {
            warn!("Failed to report tagging result in {}: {}", chat_id, e);
        }
    });

    Ok(())
}

/// Handle /etiket <message> - mention members five at a time until done or
/// stopped with /durdur.
pub async fn etiket_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Admin).await? {
        return Ok(());
    }

    let message = args.trim().to_string();
    if message.is_empty() {
        reply_html(&bot, &msg, state.text("tag.etiket_usage")).await?;
        return Ok(());
    }
    let Some(members) = load_members(&bot, &msg, &state).await? else {
        return Ok(());
    };

    let chat_id = msg.chat.id;
    let started_by = msg.from.as_ref().map(|u| u.id.0).unwrap_or_default();
    // Retire any running loop before its session row is reset
    let generation = state.tags.begin(chat_id.0);
    if let Err(e) = state
        .storage
        .settings
        .start_tag_session(chat_id.0, &message, started_by)
        .await
    {
        error!("Failed to start tag session in {}: {}", chat_id, e);
        reply_html(&bot, &msg, state.text("common.storage_error")).await?;
        return Ok(());
    }
    info!("Tag session started in chat {} for {} members", chat_id, members.len());

    reply_html(
        &bot,
        &msg,
        state.text("tag.started").replace("{count}", &members.len().to_string()),
    )
    .await?;

    let mentions: Vec<String> = members.iter().map(member_mention).collect();
    let messages = batch_messages(Some(&html_escape(&message)), &mentions, ETIKET_BATCH, true);
    let total = members.len();

    tokio::spawn(async move {
        let session = TagLoop {
            settings: state.storage.settings.as_ref(),
            registry: &state.tags,
            chat_id: chat_id.0,
            generation,
            batch_size: ETIKET_BATCH,
            pause: ETIKET_PAUSE,
        };
        let outcome = session
            .run(messages, total, |text| send_html(&bot, chat_id, text))
            .await;
        state.tags.finish(chat_id.0, generation);
        debug!("Tag session in {} ended: {:?}", chat_id, outcome);

        let report = match outcome {
            TagOutcome::Completed(count) => {
                if let Err(e) = state.storage.settings.stop_tag_session(chat_id.0).await {
                    warn!("Failed to close tag session in {}: {}", chat_id, e);
                }
                state.text("tag.done").replace("{count}", &count.to_string())
            }
            TagOutcome::Stopped => state.text("tag.stopped"),
            TagOutcome::Superseded => return,
        };
        if let Err(e) = send_html(&bot, chat_id, report).await {
            warn!("Failed to report tagging result in {}: {}", chat_id, e);
        }
    });

    Ok(())
}

/// Handle /durdur - stop the running /etiket session.
pub async fn durdur_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Admin).await? {
        return Ok(());
    }

    let key = match state.storage.settings.stop_tag_session(msg.chat.id.0).await {
        Ok(true) => "tag.stop_ok",
        Ok(false) => "tag.no_active",
        Err(e) => {
            error!("Failed to stop tag session in {}: {}", msg.chat.id, e);
            "common.storage_error"
        }
    };
    reply_html(&bot, &msg, state.text(key)).await?;

    Ok(())
}

/// Handle /herkes [message] - mention everyone, fifty per message.
pub async fn herkes_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Admin).await? {
        return Ok(());
    }
    let Some(members) = load_members(&bot, &msg, &state).await? else {
        return Ok(());
    };

    let announcement = match args.trim() {
        "" => state.text("tag.default_announcement"),
        text => text.to_string(),
    };
    let header = format!("<b>{}</b>", html_escape(&announcement));
    let mentions: Vec<String> = members.iter().map(member_mention).collect();
    let messages = batch_messages(Some(&header), &mentions, HERKES_CHUNK, false);

    let chat_id = msg.chat.id;
    tokio::spawn(async move {
        let sent = send_paced(messages, HERKES_PAUSE, |text| send_html(&bot, chat_id, text)).await;
        debug!("Sent {} announcement messages in {}", sent, chat_id);
    });

    Ok(())
}

/// Saved members of the chat, or `None` after telling the admin there are none.
async fn load_members(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
) -> anyhow::Result<Option<Vec<Member>>> {
    match state.storage.members.list_members(msg.chat.id.0).await {
        Ok(members) if !members.is_empty() => Ok(Some(members)),
        Ok(_) => {
            reply_html(bot, msg, state.text("tag.no_members")).await?;
            Ok(None)
        }
        Err(e) => {
            error!("Failed to load members in {}: {}", msg.chat.id, e);
            reply_html(bot, msg, state.text("common.storage_error")).await?;
            Ok(None)
        }
    }
}

async fn send_html(bot: &ThrottledBot, chat_id: ChatId, text: String) -> anyhow::Result<()> {
    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// `@username`, or a link on the first name.
fn member_mention(member: &Member) -> String {
    match member.username.as_deref() {
        Some(username) => format!("@{}", username),
        None => user_mention(member.user_id, member.first_name.as_deref().unwrap_or_default()),
    }
}

/// Join mentions into messages of `size`. The header goes on every message
/// when `header_each` is set, otherwise only on the first.
fn batch_messages(
    header: Option<&str>,
    mentions: &[String],
    size: usize,
    header_each: bool,
) -> Vec<String> {
    mentions
        .chunks(size.max(1))
        .enumerate()
        .map(|(i, chunk)| {
            let joined = chunk.join(" ");
            match header {
                Some(header) if header_each || i == 0 => format!("{}\n\n{}", header, joined),
                _ => joined,
            }
        })
        .collect()
}

/// Send every message with a pause in between. Failed sends are skipped.
async fn send_paced<F, Fut>(messages: Vec<String>, pause: Duration, mut send: F) -> usize
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let total = messages.len();
    let mut sent = 0;
    for (i, text) in messages.into_iter().enumerate() {
        match send(text).await {
            Ok(()) => sent += 1,
            Err(e) => warn!("Tag message failed: {}", e),
        }
        if i + 1 < total {
            tokio::time::sleep(pause).await;
        }
    }
    sent
}

/// A stoppable /etiket loop.
struct TagLoop<'a> {
    settings: &'a dyn SettingsStore,
    registry: &'a TagRegistry,
    chat_id: i64,
    generation: u64,
    batch_size: usize,
    pause: Duration,
}

impl TagLoop<'_> {
    /// Send the batches, recording progress after each one.
    ///
    /// The stored session is checked before every batch; a failed send is
    /// logged and the loop moves on to the next batch.
    async fn run<F, Fut>(&self, batches: Vec<String>, total: usize, mut send: F) -> TagOutcome
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let count = batches.len();
        for (i, text) in batches.into_iter().enumerate() {
            if !self.registry.is_current(self.chat_id, self.generation) {
                return TagOutcome::Superseded;
            }
            match self.settings.active_tag_session(self.chat_id).await {
                Ok(Some(_)) => {}
                Ok(None) => return TagOutcome::Stopped,
                Err(e) => warn!("Failed to read tag session of {}: {}", self.chat_id, e),
            }

            if let Err(e) = send(text).await {
                warn!("Tag batch {} failed in {}: {}", i, self.chat_id, e);
            }
            // A restart during the send owns the session row now
            if !self.registry.is_current(self.chat_id, self.generation) {
                return TagOutcome::Superseded;
            }

            let index = ((i + 1) * self.batch_size).min(total) as u64;
            if let Err(e) = self.settings.update_tag_index(self.chat_id, index).await {
                warn!("Failed to record tag progress of {}: {}", self.chat_id, e);
            }

            if i + 1 < count {
                tokio::time::sleep(self.pause).await;
            }
        }
        TagOutcome::Completed(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use std::sync::Mutex;

    fn mentions(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("@user{}", i)).collect()
    }

    fn tag_loop<'a>(store: &'a MemoryStore, registry: &'a TagRegistry, generation: u64) -> TagLoop<'a> {
        TagLoop {
            settings: store,
            registry,
            chat_id: 1,
            generation,
            batch_size: ETIKET_BATCH,
            pause: Duration::ZERO,
        }
    }

    #[test]
    fn test_member_mention() {
        let with_username = Member::new(1, 5, Some("ayse".into()), Some("Ayşe".into()));
        assert_eq!(member_mention(&with_username), "@ayse");

        let without = Member::new(1, 6, None, Some("Can".into()));
        assert_eq!(member_mention(&without), "<a href=\"tg://user?id=6\">Can</a>");
    }

    #[test]
    fn test_batch_messages() {
        let etiket = batch_messages(Some("Toplantı"), &mentions(7), 5, true);
        assert_eq!(etiket.len(), 2);
        assert_eq!(etiket[1], "Toplantı\n\n@user5 @user6");

        let herkes = batch_messages(Some("<b>Duyuru!</b>"), &mentions(3), 2, false);
        assert_eq!(herkes, vec!["<b>Duyuru!</b>\n\n@user0 @user1", "@user2"]);
    }

    #[test]
    fn test_registry_generations() {
        let registry = TagRegistry::default();
        let first = registry.begin(1);
        let second = registry.begin(1);
        assert!(!registry.is_current(1, first));
        assert!(registry.is_current(1, second));

        registry.finish(1, first);
        assert!(registry.is_current(1, second));
        registry.finish(1, second);
        assert!(!registry.is_current(1, second));
    }

    #[tokio::test]
    async fn test_session_runs_in_batches_of_five() {
        let store = MemoryStore::new();
        let registry = TagRegistry::default();
        store.start_tag_session(1, "Toplantı", 9).await.unwrap();
        let generation = registry.begin(1);

        let batches = batch_messages(Some("Toplantı"), &mentions(12), ETIKET_BATCH, true);
        let sent = Arc::new(Mutex::new(Vec::new()));
        let outcome = tag_loop(&store, &registry, generation)
            .run(batches, 12, |text| {
                let sent = sent.clone();
                async move {
                    sent.lock().unwrap().push(text);
                    Ok(())
                }
            })
            .await;

        assert_eq!(outcome, TagOutcome::Completed(12));
        assert_eq!(sent.lock().unwrap().len(), 3);
        let session = store.get_tag_session(1).await.unwrap().unwrap();
        assert_eq!(session.current_index, 12);
    }

    #[tokio::test]
    async fn test_stop_ends_session_before_next_batch() {
        let store = Arc::new(MemoryStore::new());
        let registry = TagRegistry::default();
        store.start_tag_session(1, "Toplantı", 9).await.unwrap();
        let generation = registry.begin(1);

        let batches = batch_messages(Some("Toplantı"), &mentions(20), ETIKET_BATCH, true);
        let sent = Arc::new(Mutex::new(0usize));
        let outcome = tag_loop(&store, &registry, generation)
            .run(batches, 20, |_| {
                let store = store.clone();
                let sent = sent.clone();
                async move {
                    let count = {
                        let mut sent = sent.lock().unwrap();
                        *sent += 1;
                        *sent
                    };
                    if count == 2 {
                        store.stop_tag_session(1).await?;
                    }
                    Ok(())
                }
            })
            .await;

        assert_eq!(outcome, TagOutcome::Stopped);
        assert_eq!(*sent.lock().unwrap(), 2);
        let session = store.get_tag_session(1).await.unwrap().unwrap();
        assert!(!session.is_active);
        assert_eq!(session.current_index, 10);
    }

    #[tokio::test]
    async fn test_failed_batch_is_skipped() {
        let store = MemoryStore::new();
        let registry = TagRegistry::default();
        store.start_tag_session(1, "x", 9).await.unwrap();
        let generation = registry.begin(1);

        let calls = Arc::new(Mutex::new(0usize));
        let outcome = tag_loop(&store, &registry, generation)
            .run(batch_messages(None, &mentions(10), 5, true), 10, |_| {
                let calls = calls.clone();
                async move {
                    let mut calls = calls.lock().unwrap();
                    *calls += 1;
                    if *calls == 1 {
                        anyhow::bail!("flood");
                    }
                    Ok(())
                }
            })
            .await;

        assert_eq!(outcome, TagOutcome::Completed(10));
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_restart_supersedes_old_loop() {
        let store = MemoryStore::new();
        let registry = TagRegistry::default();
        store.start_tag_session(1, "eski", 9).await.unwrap();
        let old = registry.begin(1);

        // A second /etiket resets the stored session and takes the chat over
        store.start_tag_session(1, "yeni", 9).await.unwrap();
        let _new = registry.begin(1);

        let sent = Arc::new(Mutex::new(0usize));
        let outcome = tag_loop(&store, &registry, old)
            .run(batch_messages(None, &mentions(5), 5, true), 5, |_| {
                let sent = sent.clone();
                async move {
                    *sent.lock().unwrap() += 1;
                    Ok(())
                }
            })
            .await;
        assert_eq!(outcome, TagOutcome::Superseded);
        assert_eq!(*sent.lock().unwrap(), 0);

        let session = store.get_tag_session(1).await.unwrap().unwrap();
        assert_eq!(session.message, "yeni");
        assert!(session.is_active);
    }

    #[tokio::test]
    async fn test_restart_during_send_keeps_new_cursor() {
        let store = Arc::new(MemoryStore::new());
        let registry = TagRegistry::default();
        store.start_tag_session(1, "eski", 9).await.unwrap();
        let old = registry.begin(1);

        let outcome = tag_loop(&store, &registry, old)
            .run(batch_messages(None, &mentions(10), 5, true), 10, |_| {
                let store = store.clone();
                let registry = registry.clone();
                async move {
                    registry.begin(1);
                    store.start_tag_session(1, "yeni", 9).await?;
                    Ok(())
                }
            })
            .await;
        assert_eq!(outcome, TagOutcome::Superseded);

        let session = store.get_tag_session(1).await.unwrap().unwrap();
        assert_eq!(session.message, "yeni");
        assert_eq!(session.current_index, 0);
    }

    #[tokio::test]
    async fn test_send_paced_counts_successes() {
        let calls = Arc::new(Mutex::new(0usize));
        let sent = send_paced(vec!["a".into(), "b".into(), "c".into()], Duration::ZERO, |text| {
            let calls = calls.clone();
            async move {
                *calls.lock().unwrap() += 1;
                if text == "b" {
                    anyhow::bail!("blocked");
                }
                Ok(())
            }
        })
        .await;
        assert_eq!(sent, 2);
        assert_eq!(*calls.lock().unwrap(), 3);
    }
}
