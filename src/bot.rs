//! Conversational dispatcher.
//!
//! Turns chat-style input (a text message or a button callback from one
//! user) into a [`Reply`]: message text plus the buttons to show under it.
//! The dispatcher is transport-agnostic; [`crate::server`] exposes it over
//! HTTP and the tests drive it directly.
//!
//! # Messages
//!
//! | Input | Effect |
//! |-------|--------|
//! | `/start` | Greeting and the search-mode menu |
//! | `/help` | Command list |
//! | `/reload` | Re-read the spreadsheet and swap the catalog |
//! | any other text | Search, store results as the user's session, show page 1 |
//!
//! # Callbacks
//!
//! | Data | Effect |
//! |------|--------|
//! | `page_<n>` | Jump to zero-based page `n` (clamped) |
//! | `next` / `prev` | Move one page (clamped) |
//! | `noop` | Re-render the current page (the page label button) |
//! | `mode_combined` / `mode_code` / `mode_name` | Select how text is matched |
//! | `new_search` | Drop the session and show the menu again |
//! | `exit` | Drop the session |
//!
//! Sessions are per user. Callers that may receive concurrent input for the
//! same user hold that user's [`UserGate`] lock around each call.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

use stock_lookup_core::search::search_active;
use stock_lookup_core::{
    Catalog, CatalogHandle, IngestionError, Normalizer, Page, PageStep, SearchMode,
    SearchOutcome, SessionError, SessionStore, UserId,
};

use crate::config::Config;
use crate::ingest;

pub const MSG_START: &str = "🔍 Привет! Я бот для поиска товаров.\n\
Отправьте мне артикул или название товара.\n\
Несколько артикулов можно перечислить через пробел, запятую или точку с запятой.\n\
Для обновления данных используйте /reload\n\
Для получения списка команд используйте /help";

pub const MSG_HELP: &str = "Список команд:\n\
/start - Начать работу с ботом\n\
/reload - Обновить данные из Excel-файла\n\
/help - Показать это сообщение\n\n\
Просто отправьте мне артикул или название товара, чтобы начать поиск.";

pub const MSG_NOT_FOUND: &str = "😞 Ничего не найдено";
pub const MSG_NOT_LOADED: &str = "❌ Данные не загружены. Используйте /reload";
pub const MSG_NO_SESSION: &str = "❌ Данные не найдены. Попробуйте снова.";
pub const MSG_RELOADED: &str = "✅ Данные успешно обновлены!";
pub const MSG_SESSION_CLOSED: &str = "✅ Сессия завершена. Для нового поиска введите /start";
pub const MSG_UNKNOWN_COMMAND: &str = "Неизвестная команда. Используйте /help";

const ITEM_SEPARATOR: &str = "—————————————";

/// Machine-readable category of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    Info,
    Page,
    NotFound,
    CatalogUnavailable,
    NoSession,
    Error,
}

/// An inline button: the label shown and the callback data sent back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// What the front end should show in response to one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub kind: ReplyKind,
    pub text: String,
    /// Button rows, top to bottom.
    pub buttons: Vec<Vec<Button>>,
}

impl Reply {
    fn text(kind: ReplyKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    fn with_buttons(mut self, row: Vec<Button>) -> Self {
        self.buttons.push(row);
        self
    }
}

/// Input the dispatcher refuses outright.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BotError {
    #[error("message text must not be empty")]
    EmptyMessage,
    #[error("unknown callback data: '{0}'")]
    UnknownCallback(String),
}

/// Slash commands understood in text messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Reload,
    Unknown,
}

impl Command {
    /// Parses `/start`, `/help` and `/reload`, also in the `/cmd@botname`
    /// form. Returns `None` for anything that is not a slash command.
    pub fn parse(text: &str) -> Option<Command> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let word = rest.split_whitespace().next().unwrap_or("");
        let name = word.split('@').next().unwrap_or("");
        Some(match name.to_lowercase().as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "reload" => Command::Reload,
            _ => Command::Unknown,
        })
    }
}

/// One async lock per user id, so that two inputs from the same user are
/// handled one after the other while different users proceed in parallel.
///
/// A user's entry lives only while a turn holds or waits for it.
#[derive(Debug, Default)]
pub struct UserGate {
    locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl UserGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the user's lock. The turn releases it on drop.
    pub async fn acquire(&self, user: UserId) -> UserTurn<'_> {
        let lock = self.locks.entry(user).or_default().clone();
        let guard = lock.lock_owned().await;
        UserTurn {
            gate: self,
            user,
            guard: Some(guard),
        }
    }

    /// Number of users with a held or awaited lock.
    pub fn active_users(&self) -> usize {
        self.locks.len()
    }

    fn release(&self, user: UserId) {
        // Waiters clone the Arc under the shard lock, so a count of one
        // means only the map still refers to the mutex.
        self.locks
            .remove_if(&user, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// A held [`UserGate`] lock.
#[derive(Debug)]
pub struct UserTurn<'a> {
    gate: &'a UserGate,
    user: UserId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserTurn<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.gate.release(self.user);
    }
}

/// The dispatcher: catalog, sessions, per-user search modes.
pub struct Bot {
    config: Arc<Config>,
    catalog: Arc<CatalogHandle>,
    normalizer: Normalizer,
    sessions: SessionStore,
    modes: DashMap<UserId, SearchMode>,
    gate: UserGate,
}

impl Bot {
    pub fn new(config: Arc<Config>, catalog: Arc<CatalogHandle>) -> anyhow::Result<Self> {
        let normalizer = config.normalizer()?;
        let sessions = SessionStore::new(config.pagination.page_size);
        Ok(Self {
            config,
            catalog,
            normalizer,
            sessions,
            modes: DashMap::new(),
            gate: UserGate::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<CatalogHandle> {
        &self.catalog
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn gate(&self) -> &UserGate {
        &self.gate
    }

    /// The search mode the user selected, `Combined` by default.
    pub fn mode(&self, user: UserId) -> SearchMode {
        self.modes.get(&user).map(|m| *m).unwrap_or_default()
    }

    /// Dispatches a text message: a command or a search query.
    pub fn handle_message(&self, user: UserId, text: &str) -> Result<Reply, BotError> {
        if text.trim().is_empty() {
            return Err(BotError::EmptyMessage);
        }
        Ok(match Command::parse(text) {
            Some(Command::Start) => self.handle_start(user),
            Some(Command::Help) => self.handle_help(),
            Some(Command::Reload) => self.handle_reload(),
            Some(Command::Unknown) => Reply::text(ReplyKind::Info, MSG_UNKNOWN_COMMAND),
            None => self.handle_text(user, text),
        })
    }

    pub fn handle_start(&self, user: UserId) -> Reply {
        tracing::debug!(user, "start");
        Reply::text(ReplyKind::Info, MSG_START).with_buttons(mode_menu(self.mode(user)))
    }

    pub fn handle_help(&self) -> Reply {
        Reply::text(ReplyKind::Info, MSG_HELP)
    }

    /// Searches for `text` and opens a session on page 1.
    pub fn handle_text(&self, user: UserId, text: &str) -> Reply {
        let query = text.trim();
        let mode = self.mode(user);
        let results = match search_active(query, &self.catalog, &self.normalizer, mode) {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(user, error = %e, "search before catalog load");
                return Reply::text(ReplyKind::CatalogUnavailable, MSG_NOT_LOADED);
            }
        };

        match self.sessions.record_search(user, results) {
            SearchOutcome::Empty => {
                tracing::info!(user, query, %mode, "nothing found");
                Reply::text(ReplyKind::NotFound, MSG_NOT_FOUND)
            }
            SearchOutcome::Stored { total, .. } => {
                tracing::info!(user, query, %mode, results = total, "search results stored");
                self.render_session(user)
            }
        }
    }

    /// Handles a button press.
    pub fn handle_callback(&self, user: UserId, data: &str) -> Result<Reply, BotError> {
        let data = data.trim();
        let moved = match data {
            "next" => self.sessions.step(user, PageStep::Next),
            "prev" => self.sessions.step(user, PageStep::Prev),
            "noop" | "none" => return Ok(self.render_session(user)),
            "new_search" => {
                self.sessions.clear(user);
                return Ok(self.handle_start(user));
            }
            "exit" => {
                self.sessions.clear(user);
                self.modes.remove(&user);
                return Ok(Reply::text(ReplyKind::Info, MSG_SESSION_CLOSED));
            }
            _ => {
                if let Some(mode) = data.strip_prefix("mode_") {
                    let mode: SearchMode = mode
                        .parse()
                        .map_err(|_| BotError::UnknownCallback(data.to_string()))?;
                    if mode == SearchMode::default() {
                        self.modes.remove(&user);
                    } else {
                        self.modes.insert(user, mode);
                    }
                    return Ok(Reply::text(ReplyKind::Info, mode_prompt(mode)));
                }
                let page = data
                    .strip_prefix("page_")
                    .and_then(|n| n.parse::<i64>().ok())
                    .ok_or_else(|| BotError::UnknownCallback(data.to_string()))?;
                self.sessions.set_page(user, page)
            }
        };

        Ok(match moved {
            Ok(page) => {
                tracing::debug!(user, page, "page selected");
                self.render_session(user)
            }
            Err(e) => {
                tracing::debug!(user, error = %e, "pagination without a session");
                Reply::text(ReplyKind::NoSession, MSG_NO_SESSION)
            }
        })
    }

    /// Re-reads the spreadsheet and reports the outcome as a chat reply.
    ///
    /// Blocking: performs file I/O.
    pub fn handle_reload(&self) -> Reply {
        match self.reload() {
            Ok(_) => Reply::text(ReplyKind::Info, MSG_RELOADED),
            Err(e) => Reply::text(ReplyKind::Error, format!("❌ Ошибка загрузки данных: {}", e)),
        }
    }

    /// Re-reads the spreadsheet and swaps the catalog. The previous snapshot
    /// stays active on failure. Existing sessions keep the results they hold.
    ///
    /// Blocking: performs file I/O.
    pub fn reload(&self) -> Result<Arc<Catalog>, IngestionError> {
        ingest::load_catalog(&self.config, &self.catalog, &self.normalizer)
    }

    fn render_session(&self, user: UserId) -> Reply {
        match self.sessions.render_current(user) {
            Ok(page) => page_reply(&page),
            Err(SessionError::NoActiveSession(_)) => {
                Reply::text(ReplyKind::NoSession, MSG_NO_SESSION)
            }
            Err(e @ SessionError::Pagination(_)) => {
                Reply::text(ReplyKind::Error, format!("❌ Ошибка отображения страницы: {}", e))
            }
        }
    }
}

/// One text block per item followed by the navigation and session rows.
pub fn page_reply(page: &Page) -> Reply {
    let text = page
        .items
        .iter()
        .map(|item| {
            format!(
                "📦 Артикул: {}\n📌 Название: {}\n🔢 В наличии: {} шт.\n📥 В резерве: {} шт.\n{}",
                item.code, item.name, item.on_hand, item.reserved, ITEM_SEPARATOR
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut nav = Vec::with_capacity(3);
    if page.has_prev {
        nav.push(Button::new("⬅️ Назад", format!("page_{}", page.page - 1)));
    }
    nav.push(Button::new(page.label.clone(), "noop"));
    if page.has_next {
        nav.push(Button::new("Вперед ➡️", format!("page_{}", page.page + 1)));
    }

    Reply::text(ReplyKind::Page, text)
        .with_buttons(nav)
        .with_buttons(vec![
            Button::new("🔄 Новый поиск", "new_search"),
            Button::new("✅ Завершить", "exit"),
        ])
}

fn mode_menu(current: SearchMode) -> Vec<Button> {
    [
        (SearchMode::Combined, "🔍 Везде"),
        (SearchMode::Code, "🔢 Поиск по материалу"),
        (SearchMode::Name, "📖 Поиск по названию"),
    ]
    .into_iter()
    .map(|(mode, label)| {
        let label = if mode == current {
            format!("• {}", label)
        } else {
            label.to_string()
        };
        Button::new(label, format!("mode_{}", mode))
    })
    .collect()
}

fn mode_prompt(mode: SearchMode) -> &'static str {
    match mode {
        SearchMode::Combined => "📝 Введите артикул или название товара:",
        SearchMode::Code => "📝 Введите материал(ы) через пробел или запятую:",
        SearchMode::Name => "📝 Введите название товара:",
    }
}
