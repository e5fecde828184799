//! Bot behavior: command handling, menu navigation, and mode-driven text
//! dispatch. All Telegram traffic goes through `MessagingPort`, so tests can
//! record it instead of sending it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::{
    auth::{AccessRequest, Approval, AuthGate, Removal},
    chat::ChatPipeline,
    completion::CompletionClient,
    config::Config,
    domain::UserId,
    formatting::{escape_html, split_message},
    history::HistoryStore,
    language::Language,
    menu::{self, callback},
    messaging::{
        port::MessagingPort,
        types::{CallbackPress, InlineKeyboard, Sender},
    },
    session::{SessionMode, SessionStore},
    settings::SettingsStore,
    store::RecordStore,
    Result,
};

const MAIN_MENU_HTML: &str = "🏠 <b>Main Menu</b>\n\nChoose an option:";

const ADMIN_PANEL_HTML: &str = "🔐 <b>Admin Panel</b>\n\nManage bot users and settings:";

const HELP_HTML: &str = "ℹ️ <b>Help & Info</b>\n\n\
    💬 <b>Chat:</b> Talk with the AI model\n\
    ⚙️ <b>Settings:</b> Change language & model\n\
    📊 <b>Status:</b> View bot information\n\n\
    Commands:\n\
    /start - Show main menu\n\
    /menu - Return to menu\n\
    /admin - Admin panel (owner only)";

const CHANGE_MODEL_HTML: &str = "🤖 <b>Change Model</b>\n\n\
    Send the model ID you want to use.\n\n\
    Examples:\n\
    • <code>deepseek/deepseek-r1:free</code>\n\
    • <code>google/gemini-2.5-flash-preview-09-2025</code>\n\
    • <code>openai/gpt-4o-mini</code>\n\n\
    Type /cancel to cancel";

const ADD_USER_HTML: &str =
    "➕ <b>Add User</b>\n\nSend the user ID to add to whitelist.\n\nType /cancel to cancel";

const REMOVE_USER_HTML: &str =
    "➖ <b>Remove User</b>\n\nSend the user ID to remove from whitelist.\n\nType /cancel to cancel";

const HISTORY_CLEARED_HTML: &str = "✅ <b>Chat History Cleared</b>\n\n\
    Your conversation history has been deleted.\n\
    Start fresh with /start";

const ACCESS_GRANTED_HTML: &str =
    "✅ <b>Access Granted!</b>\n\nYou can now use the bot.\nType /start to begin!";

const INVALID_ID_TEXT: &str = "❌ Invalid user ID. Please send a number.";

/// One service instance handles every update the dispatcher feeds it.
pub struct BotService {
    cfg: Arc<Config>,
    auth: AuthGate,
    sessions: SessionStore,
    history: HistoryStore,
    settings: SettingsStore,
    chat: ChatPipeline,
    messenger: Arc<dyn MessagingPort>,
    started_at: DateTime<Utc>,
}

impl BotService {
    pub fn new(
        cfg: Arc<Config>,
        store: Arc<dyn RecordStore>,
        completion: Arc<dyn CompletionClient>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        let auth = AuthGate::new(store.clone(), cfg.owner_id);
        let settings = SettingsStore::new(store.clone());
        let history = HistoryStore::new(store, cfg.max_history);
        let chat = ChatPipeline::new(cfg.clone(), settings.clone(), history.clone(), completion);
        Self {
            cfg,
            auth,
            sessions: SessionStore::new(),
            history,
            settings,
            chat,
            messenger,
            started_at: Utc::now(),
        }
    }

    /// `/start`: greet known users, register access requests for strangers.
    pub async fn handle_start(&self, sender: &Sender) -> Result<()> {
        let user = sender.user_id;
        let chat = user.direct_chat();
        let count = self.history.turn_count(user).await;
        let has_history = count > 0;

        if user == self.auth.owner() {
            let greeting = if has_history {
                "Welcome back, Boss!"
            } else {
                "Welcome, Boss!"
            };
            let html = format!(
                "👋 {greeting}\n\n🤖 <b>OpenRouter Bot Active</b>\n📱 Owner Panel Ready\n\
                 💬 {count} messages in history\n\nUse the menu below to get started:"
            );
            self.messenger
                .send_html(chat, &html, Some(menu::main_menu(has_history)))
                .await?;
            return Ok(());
        }

        let display = escape_html(sender.display_name());
        match self
            .auth
            .request_access(user, sender.username.as_deref(), &sender.first_name)
            .await?
        {
            AccessRequest::AlreadyAuthorized => {
                let greeting = if has_history {
                    format!("Welcome back, {display}!")
                } else {
                    format!("Welcome, {display}!")
                };
                let html = format!(
                    "👋 {greeting}\n\n🤖 <b>OpenRouter Bot</b>\n\
                     ✅ You are authorized to use this bot\n\
                     💬 {count} previous messages\n\nChoose an option below:"
                );
                self.messenger
                    .send_html(chat, &html, Some(menu::main_menu(has_history)))
                    .await?;
            }
            AccessRequest::AlreadyPending => {
                let html = format!(
                    "⏳ <b>Access Pending</b>\n\nYour request is waiting for owner approval.\n\
                     User ID: <code>{}</code>\nUsername: @{display}\n\n\
                     Please wait for authorization.",
                    user.0
                );
                self.messenger.send_html(chat, &html, None).await?;
            }
            AccessRequest::NewlyRequested => {
                let html = format!(
                    "🔒 <b>Authorization Required</b>\n\n\
                     This bot is private. Access request sent to owner.\n\n\
                     User ID: <code>{}</code>\nUsername: @{display}\n\n\
                     ⏳ Waiting for approval...",
                    user.0
                );
                self.messenger.send_html(chat, &html, None).await?;
                self.notify_owner_of_request(sender).await;
            }
        }
        Ok(())
    }

    /// `/menu`: drop any awaiting mode and show the main menu.
    pub async fn handle_menu(&self, user: UserId) -> Result<()> {
        self.sessions.reset(user).await;

        if !self.auth.is_authorized(user).await {
            self.messenger
                .send_text(user.direct_chat(), "❌ Access Denied", None)
                .await?;
            return Ok(());
        }

        self.messenger
            .send_html(
                user.direct_chat(),
                MAIN_MENU_HTML,
                Some(menu::main_menu(false)),
            )
            .await?;
        Ok(())
    }

    /// `/admin`: owner-only panel.
    pub async fn handle_admin(&self, user: UserId) -> Result<()> {
        if user != self.auth.owner() {
            self.messenger
                .send_text(user.direct_chat(), "❌ Access Denied: Owner Only", None)
                .await?;
            return Ok(());
        }

        self.messenger
            .send_html(
                user.direct_chat(),
                ADMIN_PANEL_HTML,
                Some(menu::admin_menu()),
            )
            .await?;
        Ok(())
    }

    /// `/cancel`: leave whatever mode the user is in.
    pub async fn handle_cancel(&self, user: UserId) -> Result<()> {
        if self.sessions.reset(user).await {
            self.messenger
                .send_text(
                    user.direct_chat(),
                    "❌ Cancelled",
                    Some(menu::main_menu(false)),
                )
                .await?;
        } else {
            self.messenger
                .send_text(user.direct_chat(), "Nothing to cancel.", None)
                .await?;
        }
        Ok(())
    }

    /// Inline-button dispatch. Every press is answered exactly once so the
    /// client stops its spinner, whatever branch runs.
    pub async fn handle_callback(&self, press: &CallbackPress) -> Result<()> {
        let user = press.sender.user_id;

        if !self.auth.is_authorized(user).await {
            self.show(
                press,
                "❌ Access Denied: You are not authorized to use this bot.",
                None,
            )
            .await?;
            return self.ack(press, None, false).await;
        }

        let data = press.data.as_str();

        // Admin screens and approve/deny decisions are owner-only even for
        // whitelisted users.
        let owner_only = data.starts_with("admin_")
            || data.starts_with(callback::APPROVE_PREFIX)
            || data.starts_with(callback::DENY_PREFIX);
        if owner_only && user != self.auth.owner() {
            return self.ack(press, Some("❌ Owner only!"), true).await;
        }

        match data {
            callback::MAIN_MENU => {
                self.sessions.set_mode(user, SessionMode::Idle).await;
                self.show(press, MAIN_MENU_HTML, Some(menu::main_menu(false)))
                    .await?;
            }
            callback::CHAT => {
                self.sessions.set_mode(user, SessionMode::Chat).await;
                let count = self.history.turn_count(user).await;
                let history_info = if count > 0 {
                    format!("💭 {count} previous messages loaded\n\n")
                } else {
                    String::new()
                };
                let html = format!(
                    "💬 <b>Chat Mode Activated</b>\n\n{history_info}\
                     Send me any message and I'll respond instantly!\n\n\
                     I remember our previous conversations 🧠"
                );
                self.show(press, &html, Some(menu::chat_quick_replies()))
                    .await?;
            }
            callback::CLEAR_HISTORY => {
                self.history.clear(user).await?;
                self.show(press, HISTORY_CLEARED_HTML, Some(menu::main_menu(false)))
                    .await?;
                return self.ack(press, Some("🗑️ Chat history cleared!"), true).await;
            }
            callback::SETTINGS => {
                let settings = self.settings.load().await;
                self.show(
                    press,
                    "⚙️ <b>Settings</b>\n\nConfigure your preferences:",
                    Some(menu::settings_menu(&settings)),
                )
                .await?;
            }
            callback::STATUS => {
                let settings = self.settings.load().await;
                let whitelist = self.auth.whitelist().await;
                let html = format!(
                    "📊 <b>Bot Status</b>\n\n🤖 Model: <code>{}</code>\n\
                     🌐 Language: {}\n👥 Authorized Users: {}\n\
                     🆔 Your ID: <code>{}</code>\n\n🟢 Bot is running smoothly!",
                    escape_html(&settings.model),
                    settings.language,
                    whitelist.len(),
                    user.0,
                );
                self.show(press, &html, Some(menu::back_to(callback::MAIN_MENU)))
                    .await?;
            }
            callback::HELP => {
                self.show(press, HELP_HTML, Some(menu::back_to(callback::MAIN_MENU)))
                    .await?;
            }
            callback::CHANGE_LANGUAGE => {
                self.show(
                    press,
                    "🌐 <b>Select Language</b>\n\nChoose your preferred language:",
                    Some(menu::language_picker()),
                )
                .await?;
            }
            callback::CHANGE_MODEL => {
                self.sessions
                    .set_mode(user, SessionMode::AwaitingModelId)
                    .await;
                self.show(press, CHANGE_MODEL_HTML, None).await?;
            }
            callback::ADMIN_PANEL => {
                self.show(press, ADMIN_PANEL_HTML, Some(menu::admin_menu()))
                    .await?;
            }
            callback::ADMIN_VIEW_WHITELIST => {
                let whitelist = self.auth.whitelist().await;
                let lines: Vec<String> = whitelist
                    .iter()
                    .map(|u| format!("• <code>{}</code>", u.0))
                    .collect();
                let html = format!(
                    "👥 <b>Authorized Users ({})</b>\n\n{}",
                    whitelist.len(),
                    lines.join("\n"),
                );
                self.show(press, &html, Some(menu::back_to(callback::ADMIN_PANEL)))
                    .await?;
            }
            callback::ADMIN_PENDING => {
                let pending = self.auth.pending().await;
                if pending.is_empty() {
                    self.show(
                        press,
                        "📭 <b>No Pending Requests</b>",
                        Some(menu::back_to(callback::ADMIN_PANEL)),
                    )
                    .await?;
                } else {
                    let html = format!(
                        "🔔 <b>Pending Requests ({})</b>\n\nApprove or deny users below:",
                        pending.len(),
                    );
                    self.show(press, &html, Some(menu::pending_requests(&pending)))
                        .await?;
                }
            }
            callback::ADMIN_STATS => {
                let settings = self.settings.load().await;
                let whitelist = self.auth.whitelist().await;
                let pending = self.auth.pending().await;
                let html = format!(
                    "📊 <b>Bot Statistics</b>\n\n👥 Authorized Users: {}\n\
                     ⏳ Pending Requests: {}\n🤖 Current Model: <code>{}</code>\n\
                     🌐 Language: {}\n💻 Bot Running Since: {}",
                    whitelist.len(),
                    pending.len(),
                    escape_html(&settings.model),
                    settings.language,
                    self.started_at.format("%Y-%m-%d %H:%M"),
                );
                self.show(press, &html, Some(menu::back_to(callback::ADMIN_PANEL)))
                    .await?;
            }
            callback::ADMIN_ADD_USER => {
                self.sessions
                    .set_mode(user, SessionMode::AwaitingAddUserId)
                    .await;
                self.show(press, ADD_USER_HTML, None).await?;
            }
            callback::ADMIN_REMOVE_USER => {
                self.sessions
                    .set_mode(user, SessionMode::AwaitingRemoveUserId)
                    .await;
                self.show(press, REMOVE_USER_HTML, None).await?;
            }
            other => {
                if let Some(name) = other.strip_prefix(callback::LANG_PREFIX) {
                    if let Some(lang) = Language::from_name(name) {
                        let mut settings = self.settings.load().await;
                        settings.language = lang;
                        self.settings.save(&settings).await?;
                        let html = format!("✅ Language set to <b>{lang}</b>");
                        self.show(press, &html, Some(menu::settings_menu(&settings)))
                            .await?;
                    }
                } else if let Some(raw) = other.strip_prefix(callback::APPROVE_PREFIX) {
                    if let Ok(id) = raw.parse::<i64>() {
                        let target = UserId(id);
                        if let Approval::Approved = self.auth.approve(target).await? {
                            self.notify_access_granted(target).await;
                        }
                        let html = format!("✅ User <code>{id}</code> has been approved!");
                        self.show(press, &html, Some(menu::back_to(callback::ADMIN_PANEL)))
                            .await?;
                        return self
                            .ack(press, Some(&format!("✅ User {id} approved!")), false)
                            .await;
                    }
                } else if let Some(raw) = other.strip_prefix(callback::DENY_PREFIX) {
                    if let Ok(id) = raw.parse::<i64>() {
                        self.auth.deny(UserId(id)).await?;
                        let html = format!("❌ User <code>{id}</code> has been denied.");
                        self.show(press, &html, Some(menu::back_to(callback::ADMIN_PANEL)))
                            .await?;
                        return self
                            .ack(press, Some(&format!("❌ User {id} denied!")), false)
                            .await;
                    }
                }
                // Unrecognized data: just stop the spinner.
            }
        }

        self.ack(press, None, false).await
    }

    /// Plain text dispatch, serialized per user: a second message from the
    /// same user waits until the previous one (upstream call included) is
    /// done, so history updates never interleave.
    pub async fn handle_text(&self, sender: &Sender, text: &str) -> Result<()> {
        let user = sender.user_id;
        if !self.auth.is_authorized(user).await {
            return Ok(());
        }

        let _guard = self.sessions.lock_user(user).await;
        match self.sessions.mode(user).await {
            SessionMode::Idle => Ok(()),
            SessionMode::AwaitingModelId => self.apply_model_update(user, text).await,
            SessionMode::AwaitingAddUserId => self.apply_whitelist_add(user, text).await,
            SessionMode::AwaitingRemoveUserId => self.apply_whitelist_remove(user, text).await,
            SessionMode::Chat => self.run_chat_turn(sender, text).await,
        }
    }

    async fn apply_model_update(&self, user: UserId, text: &str) -> Result<()> {
        let model = text.trim().to_string();
        let mut settings = self.settings.load().await;
        settings.model = model.clone();
        self.settings.save(&settings).await?;
        self.sessions.set_mode(user, SessionMode::Idle).await;

        self.messenger
            .send_html(
                user.direct_chat(),
                &format!("✅ Model updated to: <code>{}</code>", escape_html(&model)),
                Some(menu::settings_menu(&settings)),
            )
            .await?;
        Ok(())
    }

    async fn apply_whitelist_add(&self, user: UserId, text: &str) -> Result<()> {
        let chat = user.direct_chat();
        if user != self.auth.owner() {
            self.messenger
                .send_text(chat, "❌ Access Denied", None)
                .await?;
            return Ok(());
        }
        let Ok(id) = text.trim().parse::<i64>() else {
            // Bad input keeps the mode so the owner can retry.
            self.messenger.send_text(chat, INVALID_ID_TEXT, None).await?;
            return Ok(());
        };

        let target = UserId(id);
        self.sessions.set_mode(user, SessionMode::Idle).await;
        match self.auth.approve(target).await? {
            Approval::Approved => {
                self.messenger
                    .send_html(
                        chat,
                        &format!("✅ User <code>{id}</code> added to whitelist!"),
                        Some(menu::admin_menu()),
                    )
                    .await?;
                self.notify_access_granted(target).await;
            }
            Approval::AlreadyAuthorized => {
                self.messenger
                    .send_html(
                        chat,
                        &format!("⚠️ User <code>{id}</code> already in whitelist!"),
                        None,
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn apply_whitelist_remove(&self, user: UserId, text: &str) -> Result<()> {
        let chat = user.direct_chat();
        if user != self.auth.owner() {
            self.messenger
                .send_text(chat, "❌ Access Denied", None)
                .await?;
            return Ok(());
        }
        let Ok(id) = text.trim().parse::<i64>() else {
            self.messenger.send_text(chat, INVALID_ID_TEXT, None).await?;
            return Ok(());
        };

        self.sessions.set_mode(user, SessionMode::Idle).await;
        match self.auth.remove(UserId(id)).await? {
            Removal::OwnerProtected => {
                self.messenger
                    .send_text(chat, "❌ Cannot remove owner from whitelist!", None)
                    .await?;
            }
            Removal::Removed => {
                self.messenger
                    .send_html(
                        chat,
                        &format!("✅ User <code>{id}</code> removed from whitelist!"),
                        Some(menu::admin_menu()),
                    )
                    .await?;
            }
            Removal::NotPresent => {
                self.messenger
                    .send_html(
                        chat,
                        &format!("⚠️ User <code>{id}</code> not in whitelist!"),
                        None,
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn run_chat_turn(&self, sender: &Sender, text: &str) -> Result<()> {
        let user = sender.user_id;
        let chat = user.direct_chat();

        if let Err(e) = self.messenger.send_typing(chat).await {
            warn!(user_id = user.0, error = %e, "typing indicator failed");
        }

        let reply = self.chat.run_exchange(user, &sender.first_name, text).await?;

        // Quick replies ride on the first chunk only.
        let mut keyboard = Some(menu::chat_quick_replies());
        for chunk in split_message(&reply, self.cfg.telegram_safe_limit) {
            self.messenger
                .send_text(chat, &chunk, keyboard.take())
                .await?;
        }
        Ok(())
    }

    /// Best-effort DM to the owner about a brand-new access request.
    async fn notify_owner_of_request(&self, sender: &Sender) {
        let html = format!(
            "🔔 <b>New Access Request</b>\n\n👤 Name: {}\n🆔 User ID: <code>{}</code>\n\
             📱 Username: @{}\n\nUse /admin to approve or deny.",
            escape_html(&sender.first_name),
            sender.user_id.0,
            escape_html(sender.display_name()),
        );
        if let Err(e) = self
            .messenger
            .send_html(self.auth.owner().direct_chat(), &html, None)
            .await
        {
            warn!(user_id = sender.user_id.0, error = %e, "owner notification failed");
        }
    }

    /// Best-effort DM telling a user they were approved.
    async fn notify_access_granted(&self, user: UserId) {
        if let Err(e) = self
            .messenger
            .send_html(user.direct_chat(), ACCESS_GRANTED_HTML, None)
            .await
        {
            warn!(user_id = user.0, error = %e, "access-granted notification failed");
        }
    }

    /// Edit the message carrying the pressed keyboard, or send fresh when
    /// Telegram no longer exposes it.
    async fn show(
        &self,
        press: &CallbackPress,
        html: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<()> {
        match press.message {
            Some(msg) => self.messenger.edit_html(msg, html, keyboard).await,
            None => self
                .messenger
                .send_html(press.sender.user_id.direct_chat(), html, keyboard)
                .await
                .map(|_| ()),
        }
    }

    async fn ack(&self, press: &CallbackPress, text: Option<&str>, show_alert: bool) -> Result<()> {
        self.messenger
            .answer_callback(&press.callback_id, text, show_alert)
            .await
    }
}
