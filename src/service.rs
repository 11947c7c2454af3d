//! Board operations.
//!
//! Every mutation is one load, validate, mutate, save, notify cycle over the
//! whole board, serialized by the repository's write lock (or a per-service
//! lock when the repository has none) so concurrent callers cannot lose each
//! other's edits. Validation failures are reported before storage
//! is touched and a failed operation never saves.

use crate::{
    domain::{
        sanitize::{require_actor, sanitize_body, sanitize_display_name, sanitize_title},
        BoardSnapshot, Card, CardId, CardView, Direction, Lane, Registrar,
    },
    error::Result,
    notifier::{ChangeNotifier, NoopNotifier},
    storage::BoardRepository,
    usage::{UsageEvent, UsageLogger},
};
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct BoardService {
    repository: Arc<dyn BoardRepository>,
    notifier: Arc<dyn ChangeNotifier>,
    usage: Option<UsageLogger>,
    write_lock: Arc<Mutex<()>>,
}

impl BoardService {
    pub fn new(repository: Arc<dyn BoardRepository>, notifier: Arc<dyn ChangeNotifier>) -> Self {
        let write_lock = repository.write_lock().unwrap_or_default();
        Self {
            repository,
            notifier,
            usage: None,
            write_lock,
        }
    }

    /// A service whose changes are not announced anywhere
    pub fn without_notifier(repository: Arc<dyn BoardRepository>) -> Self {
        Self::new(repository, Arc::new(NoopNotifier))
    }

    /// File-backed service broadcasting its changes through `hub`
    #[cfg(feature = "file-storage")]
    pub fn from_config(
        config: &crate::config::CoreConfig,
        hub: Arc<crate::hub::LiveUpdateHub>,
    ) -> Self {
        let repository = Arc::new(crate::storage::FileRepository::new(&config.data_file));
        let service = Self::new(repository, Arc::new(crate::hub::HubNotifier::new(hub)));
        match &config.usage_log_file {
            Some(path) => service.with_usage_logger(UsageLogger::new(path)),
            None => service,
        }
    }

    /// Records every committed mutation in a usage log as well
    pub fn with_usage_logger(mut self, logger: UsageLogger) -> Self {
        self.usage = Some(logger);
        self
    }

    async fn mutate<T>(
        &self,
        actor: &str,
        action: &'static str,
        apply: impl FnOnce(&mut BoardSnapshot) -> Result<T>,
    ) -> Result<T> {
        let _guard = self.write_lock.lock().await;

        let mut board = self.repository.load().await?;
        let output = apply(&mut board)?;
        self.repository.save(&board).await?;

        let cards = board.ordered_views();
        self.notifier.notify_board_updated(actor, &cards);
        tracing::debug!(actor, action, cards = cards.len(), "board updated");

        if let Some(usage) = &self.usage {
            let event = UsageEvent::now("card", action).with_user(actor);
            if let Err(e) = usage.record(&event).await {
                tracing::warn!(error = %e, action, "failed to record usage event");
            }
        }
        Ok(output)
    }

    /// Creates a card at the top of `lane`
    pub async fn create_card(
        &self,
        actor: &str,
        title: &str,
        lane: Lane,
        body: Option<&str>,
        expanded: Option<bool>,
    ) -> Result<Card> {
        let actor = require_actor(actor)?;
        let title = sanitize_title(title)?;
        let body = sanitize_body(body)?;

        self.mutate(actor, "create", |board| {
            let card = Card::new(board.next_card_id(), title, lane, actor.to_string())
                .with_body(body)
                .with_expanded(expanded.unwrap_or(true));
            board.insert_card(card.clone())?;
            Ok(card)
        })
        .await
    }

    /// Moves a card to the top of `lane`, including its current lane
    pub async fn move_card(&self, actor: &str, id: &CardId, lane: Lane) -> Result<Card> {
        let actor = require_actor(actor)?;
        self.mutate(actor, "move", |board| board.move_to_lane(id, lane).cloned())
            .await
    }

    /// Swaps a card with the one above it; a no-op at the top
    pub async fn move_card_up(&self, actor: &str, id: &CardId) -> Result<Card> {
        self.shift(actor, id, Direction::Up, "move_up").await
    }

    /// Swaps a card with the one below it; a no-op at the bottom
    pub async fn move_card_down(&self, actor: &str, id: &CardId) -> Result<Card> {
        self.shift(actor, id, Direction::Down, "move_down").await
    }

    async fn shift(
        &self,
        actor: &str,
        id: &CardId,
        direction: Direction,
        action: &'static str,
    ) -> Result<Card> {
        let actor = require_actor(actor)?;
        self.mutate(actor, action, |board| {
            board.shift(id, direction)?;
            board.card(id).cloned()
        })
        .await
    }

    pub async fn update_text(&self, actor: &str, id: &CardId, body: Option<&str>) -> Result<Card> {
        let actor = require_actor(actor)?;
        let body = sanitize_body(body)?;
        self.mutate(actor, "update_text", |board| {
            board.set_body(id, body).cloned()
        })
        .await
    }

    pub async fn update_title(&self, actor: &str, id: &CardId, title: &str) -> Result<Card> {
        let actor = require_actor(actor)?;
        let title = sanitize_title(title)?;
        self.mutate(actor, "update_title", |board| {
            board.set_title(id, title).cloned()
        })
        .await
    }

    pub async fn update_expanded(&self, actor: &str, id: &CardId, expanded: bool) -> Result<Card> {
        let actor = require_actor(actor)?;
        self.mutate(actor, "update_expanded", |board| {
            board.set_expanded(id, expanded).cloned()
        })
        .await
    }

    /// Registers the actor on a card, replacing any entry that matches the
    /// actor id, the display name or one of the aliases.
    pub async fn register(
        &self,
        actor: &str,
        id: &CardId,
        display_name: Option<&str>,
        aliases: &[&str],
    ) -> Result<CardView> {
        let actor = require_actor(actor)?;
        let name = sanitize_display_name(display_name, actor)?;
        let keys = registrar_keys(actor, &name, aliases);

        self.mutate(actor, "register", |board| {
            board.register(id, Registrar::new(actor, name.as_str()), &keys)?;
            board.view(id)
        })
        .await
    }

    /// Removes every registrar entry matching the actor id, display name or aliases
    pub async fn unregister(
        &self,
        actor: &str,
        id: &CardId,
        display_name: Option<&str>,
        aliases: &[&str],
    ) -> Result<CardView> {
        let actor = require_actor(actor)?;
        let name = sanitize_display_name(display_name, actor)?;
        let keys = registrar_keys(actor, &name, aliases);

        self.mutate(actor, "unregister", |board| {
            board.unregister(id, &keys)?;
            board.view(id)
        })
        .await
    }

    /// Deletes a card with its ordering entry and registrars
    pub async fn delete_card(&self, actor: &str, id: &CardId) -> Result<Card> {
        let actor = require_actor(actor)?;
        self.mutate(actor, "delete", |board| board.remove_card(id))
            .await
    }

    /// All cards lane by lane, top to bottom. Reading needs no actor.
    pub async fn list_cards(&self, _actor: Option<&str>) -> Result<Vec<CardView>> {
        let board = self.repository.load().await?;
        Ok(board.ordered_views())
    }

    /// Looks a card up by its (sanitized) title; first match in board order
    pub async fn find_by_title(&self, title: &str) -> Result<Option<CardView>> {
        let title = sanitize_title(title)?;
        let board = self.repository.load().await?;
        Ok(board
            .ordered_views()
            .into_iter()
            .find(|view| view.card.title == title))
    }
}

fn registrar_keys<'a>(actor: &'a str, name: &'a str, aliases: &[&'a str]) -> Vec<&'a str> {
    let mut keys = vec![actor, name];
    keys.extend(
        aliases
            .iter()
            .copied()
            .map(str::trim)
            .filter(|alias| !alias.is_empty()),
    );
    keys
}
