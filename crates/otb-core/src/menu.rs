//! Inline keyboard layouts for the bot's menu screens.

use crate::{
    auth::PendingRequest,
    domain::UserId,
    language::Language,
    messaging::types::{InlineButton, InlineKeyboard},
    settings::BotSettings,
    utils::truncate_text,
};

/// Callback data carried by the menu buttons.
pub mod callback {
    pub const MAIN_MENU: &str = "main_menu";
    pub const CHAT: &str = "chat";
    pub const CLEAR_HISTORY: &str = "clear_history";
    pub const SETTINGS: &str = "settings";
    pub const STATUS: &str = "status";
    pub const HELP: &str = "help";
    pub const CHANGE_LANGUAGE: &str = "change_language";
    pub const CHANGE_MODEL: &str = "change_model";
    pub const ADMIN_PANEL: &str = "admin_panel";
    pub const ADMIN_VIEW_WHITELIST: &str = "admin_view_whitelist";
    pub const ADMIN_PENDING: &str = "admin_pending";
    pub const ADMIN_STATS: &str = "admin_stats";
    pub const ADMIN_ADD_USER: &str = "admin_add_user";
    pub const ADMIN_REMOVE_USER: &str = "admin_remove_user";

    pub const LANG_PREFIX: &str = "lang_";
    pub const APPROVE_PREFIX: &str = "approve_";
    pub const DENY_PREFIX: &str = "deny_";
}

/// Main menu. The clear-history row only appears when the user actually
/// has history to clear.
pub fn main_menu(show_clear: bool) -> InlineKeyboard {
    let mut rows = vec![
        vec![InlineButton::new("💬 Start Chat", callback::CHAT)],
        vec![
            InlineButton::new("⚙️ Settings", callback::SETTINGS),
            InlineButton::new("📊 Status", callback::STATUS),
        ],
        vec![InlineButton::new("ℹ️ Help", callback::HELP)],
    ];
    if show_clear {
        rows.insert(
            1,
            vec![InlineButton::new(
                "🗑️ Clear Chat History",
                callback::CLEAR_HISTORY,
            )],
        );
    }
    InlineKeyboard::new(rows)
}

/// Compact keyboard attached to chat replies.
pub fn chat_quick_replies() -> InlineKeyboard {
    InlineKeyboard::new(vec![vec![
        InlineButton::new("📜 Menu", callback::MAIN_MENU),
        InlineButton::new("🗑️ Clear History", callback::CLEAR_HISTORY),
    ]])
}

/// Settings screen; button labels show the current choices.
pub fn settings_menu(settings: &BotSettings) -> InlineKeyboard {
    InlineKeyboard::new(vec![
        vec![InlineButton::new(
            format!("🌐 Language: {}", settings.language),
            callback::CHANGE_LANGUAGE,
        )],
        vec![InlineButton::new(
            format!("🤖 Model: {}", truncate_text(&settings.model, 30)),
            callback::CHANGE_MODEL,
        )],
        vec![InlineButton::new("🔙 Back to Menu", callback::MAIN_MENU)],
    ])
}

/// Language picker, two languages per row.
pub fn language_picker() -> InlineKeyboard {
    let mut rows: Vec<Vec<InlineButton>> = Language::ALL
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|lang| {
                    InlineButton::new(
                        lang.as_str(),
                        format!("{}{}", callback::LANG_PREFIX, lang.as_str()),
                    )
                })
                .collect()
        })
        .collect();
    rows.push(vec![InlineButton::new("🔙 Back", callback::SETTINGS)]);
    InlineKeyboard::new(rows)
}

/// Owner-only admin panel.
pub fn admin_menu() -> InlineKeyboard {
    InlineKeyboard::new(vec![
        vec![InlineButton::new(
            "👥 View Whitelist",
            callback::ADMIN_VIEW_WHITELIST,
        )],
        vec![InlineButton::new(
            "🔔 Pending Requests",
            callback::ADMIN_PENDING,
        )],
        vec![
            InlineButton::new("➕ Add User", callback::ADMIN_ADD_USER),
            InlineButton::new("➖ Remove User", callback::ADMIN_REMOVE_USER),
        ],
        vec![InlineButton::new("📊 Bot Stats", callback::ADMIN_STATS)],
        vec![InlineButton::new("🔙 Back to Menu", callback::MAIN_MENU)],
    ])
}

/// One approve/deny row per pending request, plus a back row.
pub fn pending_requests(entries: &[(UserId, PendingRequest)]) -> InlineKeyboard {
    let mut rows: Vec<Vec<InlineButton>> = entries
        .iter()
        .map(|(user, req)| {
            vec![
                InlineButton::new(
                    format!("✅ {}", req.username),
                    format!("{}{}", callback::APPROVE_PREFIX, user.0),
                ),
                InlineButton::new("❌ Deny", format!("{}{}", callback::DENY_PREFIX, user.0)),
            ]
        })
        .collect();
    rows.push(vec![InlineButton::new("🔙 Back", callback::ADMIN_PANEL)]);
    InlineKeyboard::new(rows)
}

/// Single back button jumping to `target`.
pub fn back_to(target: &str) -> InlineKeyboard {
    InlineKeyboard::new(vec![vec![InlineButton::new("🔙 Back", target)]])
}
