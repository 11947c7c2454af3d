use crate::{domain::BoardSnapshot, error::Result, storage::BoardRepository};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// In-process storage, mainly for tests and ephemeral boards
#[derive(Debug, Default)]
pub struct MemoryRepository {
    board: RwLock<BoardSnapshot>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing board
    pub fn with_board(board: BoardSnapshot) -> Self {
        Self {
            board: RwLock::new(board),
        }
    }
}

#[async_trait]
impl BoardRepository for MemoryRepository {
    async fn load(&self) -> Result<BoardSnapshot> {
        Ok(self.board.read().await.clone())
    }

    async fn save(&self, board: &BoardSnapshot) -> Result<()> {
        *self.board.write().await = board.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Card, CardId, Lane};

    #[tokio::test]
    async fn test_empty_repository_loads_empty_board() {
        let repo = MemoryRepository::new();
        let board = repo.load().await.unwrap();
        assert!(board.is_empty());
    }

    #[tokio::test]
    async fn test_load_returns_saved_board() {
        let repo = MemoryRepository::new();
        let mut board = BoardSnapshot::new();
        board
            .insert_card(Card::new(
                CardId::generate(),
                "Stored".to_string(),
                Lane::Done,
                "alice".to_string(),
            ))
            .unwrap();

        repo.save(&board).await.unwrap();
        assert_eq!(repo.load().await.unwrap(), board);
    }

    #[tokio::test]
    async fn test_loaded_copy_is_detached() {
        let repo = MemoryRepository::new();
        let mut loaded = repo.load().await.unwrap();
        loaded
            .insert_card(Card::new(
                CardId::generate(),
                "Unsaved".to_string(),
                Lane::Todo,
                "alice".to_string(),
            ))
            .unwrap();

        assert!(repo.load().await.unwrap().is_empty());
    }
}
