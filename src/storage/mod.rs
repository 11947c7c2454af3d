use crate::{domain::BoardSnapshot, error::Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

#[cfg(feature = "file-storage")]
pub mod file_storage;
pub mod memory_storage;

#[cfg(feature = "file-storage")]
pub use file_storage::FileRepository;
pub use memory_storage::MemoryRepository;

/// Storage contract for the whole board.
///
/// Implementations must give read-your-writes consistency for a single
/// writer: `load()` right after `save(s)` returns a board equal to `s`.
#[async_trait]
pub trait BoardRepository: Send + Sync {
    /// Loads the current board, normalized and consistent
    async fn load(&self) -> Result<BoardSnapshot>;

    /// Persists the full board, replacing whatever was stored
    async fn save(&self, board: &BoardSnapshot) -> Result<()>;

    /// Lock shared by every repository instance over the same stored board.
    ///
    /// Services hold it for a whole load-mutate-save cycle. `None` means the
    /// repository is only reachable through one service, which then uses a
    /// lock of its own.
    fn write_lock(&self) -> Option<Arc<Mutex<()>>> {
        None
    }
}
