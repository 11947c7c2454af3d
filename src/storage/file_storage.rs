use crate::{
    domain::BoardSnapshot,
    error::Result,
    storage::BoardRepository,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError, Weak};
use tokio::fs;
use tokio::sync::Mutex;

type LockRegistry = std::sync::Mutex<HashMap<PathBuf, Weak<Mutex<()>>>>;

static PATH_LOCKS: OnceLock<LockRegistry> = OnceLock::new();

/// Returns the write lock for `path`, shared by every live repository on it
fn lock_for(path: &Path) -> Arc<Mutex<()>> {
    let key = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|dir| dir.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut locks = PATH_LOCKS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(lock) = locks.get(&key).and_then(Weak::upgrade) {
        return lock;
    }
    locks.retain(|_, lock| lock.strong_count() > 0);
    let lock = Arc::new(Mutex::new(()));
    locks.insert(key, Arc::downgrade(&lock));
    lock
}

/// JSON-file storage for the whole board.
///
/// Repositories opened on the same path within one process share a write
/// lock, so services built on them serialize their mutations.
pub struct FileRepository {
    board_file: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileRepository {
    const TEMP_SUFFIX: &'static str = "tmp";

    /// Creates a repository backed by the given JSON file
    pub fn new(board_file: impl AsRef<Path>) -> Self {
        let board_file = board_file.as_ref().to_path_buf();
        Self {
            write_lock: lock_for(&board_file),
            board_file,
        }
    }

    pub fn path(&self) -> &Path {
        &self.board_file
    }

    fn temp_file(&self) -> PathBuf {
        let mut name = self
            .board_file
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(Self::TEMP_SUFFIX);
        self.board_file.with_file_name(name)
    }

    async fn ensure_parent_exists(&self) -> Result<()> {
        if let Some(parent) = self.board_file.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Writes an empty board if no file exists yet
    pub async fn initialize(&self) -> Result<()> {
        if !self.is_initialized().await {
            self.save(&BoardSnapshot::default()).await?;
        }
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        self.board_file.exists()
    }
}

#[async_trait]
impl BoardRepository for FileRepository {
    async fn load(&self) -> Result<BoardSnapshot> {
        if !self.board_file.exists() {
            return Ok(BoardSnapshot::default());
        }

        let contents = fs::read_to_string(&self.board_file).await?;
        if contents.trim().is_empty() {
            return Ok(BoardSnapshot::default());
        }

        let (board, report) = BoardSnapshot::from_json(&contents)?;
        if !report.is_clean() {
            tracing::warn!(
                path = %self.board_file.display(),
                ?report,
                "repaired inconsistent board on load"
            );
        }
        Ok(board)
    }

    async fn save(&self, board: &BoardSnapshot) -> Result<()> {
        self.ensure_parent_exists().await?;

        let json = board.to_json()?;
        let temp = self.temp_file();
        fs::write(&temp, json).await?;
        fs::rename(&temp, &self.board_file).await?;

        tracing::debug!(path = %self.board_file.display(), cards = board.len(), "board saved");
        Ok(())
    }

    fn write_lock(&self) -> Option<Arc<Mutex<()>>> {
        Some(Arc::clone(&self.write_lock))
    }
}
