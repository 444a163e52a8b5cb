//! Cursor store persisted to a single file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, trace};

use herald_core::{Context, CursorError, CursorResult, CursorStore};

/// Keeps the cursor as a decimal number in a text file.
///
/// Writes go to a sibling temporary file that is then renamed over the target,
/// so a crash mid-write leaves the previous cursor intact. A missing file
/// reads as the configured initial cursor.
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    path: PathBuf,
    initial: i64,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            initial: 0,
        }
    }

    /// Sets the cursor reported while no file exists yet.
    pub fn with_initial(mut self, initial: i64) -> Self {
        self.initial = initial;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> CursorResult<i64> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| CursorError::Corrupt(format!("{}: {:?}", self.path.display(), raw))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!(path = %self.path.display(), "No cursor file yet");
                Ok(self.initial)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, cursor: i64) -> CursorResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, cursor.to_string()).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), cursor, "Cursor saved");
        Ok(())
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    async fn load(&self, ctx: &Context) -> CursorResult<i64> {
        tokio::select! {
            res = self.read() => res,
            err = ctx.done() => Err(err.into()),
        }
    }

    async fn save(&self, ctx: &Context, cursor: i64) -> CursorResult<()> {
        tokio::select! {
            res = self.write(cursor) => res,
            err = ctx.done() => Err(err.into()),
        }
    }
}
