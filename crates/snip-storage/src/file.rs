use crate::index::UrlIndex;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snip_core::error::{Result, StorageError};
use snip_core::{BatchItem, ReadRepository, Repository, ShortCode, Stats, UrlRecord};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// One line of the append-only log.
///
/// `user_id` and `is_deleted` are optional on read so logs holding only
/// the first three fields still load.
#[derive(Debug, Serialize, Deserialize)]
struct LogLine {
    uuid: String,
    short_url: String,
    original_url: String,
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    is_deleted: bool,
}

impl From<&UrlRecord> for LogLine {
    fn from(record: &UrlRecord) -> Self {
        Self {
            uuid: record.id.clone(),
            short_url: record.short_code.to_string(),
            original_url: record.original_url.clone(),
            user_id: record.owner_id.clone(),
            is_deleted: record.deleted,
        }
    }
}

impl From<LogLine> for UrlRecord {
    fn from(line: LogLine) -> Self {
        Self {
            id: line.uuid,
            short_code: ShortCode::new_unchecked(line.short_url),
            original_url: line.original_url,
            owner_id: line.user_id,
            deleted: line.is_deleted,
        }
    }
}

#[derive(Debug)]
struct FileState {
    index: UrlIndex,
    file: File,
    /// Length of the log after the last successful append.
    len: u64,
}

/// Durable repository backed by an append-only JSON-lines log.
///
/// Records live in memory exactly like [`InMemoryRepository`]; every
/// successful write is also appended to the log as one JSON object per
/// line. On open the log is replayed from the start, first write wins per
/// short code. Soft deletes are appended as a copy of the record with
/// `is_deleted` set, so they survive restarts too.
///
/// One async reader/writer lock guards both the records and the file
/// handle, which serializes appends.
///
/// [`InMemoryRepository`]: crate::InMemoryRepository
#[derive(Debug)]
pub struct FileRepository {
    path: PathBuf,
    state: RwLock<FileState>,
}

impl FileRepository {
    /// Opens the log at `path`, creating it if missing, and replays it.
    ///
    /// An unterminated last line left by an interrupted append is dropped
    /// from the file when it does not parse. When it does parse, the missing
    /// newline is written so the next append starts on a fresh line.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let Replay {
            index,
            valid_len,
            unterminated,
        } = load_from_file(&path).await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| io_error(&path, e))?;
        let mut len = file
            .metadata()
            .await
            .map_err(|e| io_error(&path, e))?
            .len();

        if len > valid_len {
            warn!(
                path = %path.display(),
                discarded = len - valid_len,
                "truncating partial line at end of log"
            );
            file.set_len(valid_len)
                .await
                .map_err(|e| io_error(&path, e))?;
            len = valid_len;
        }

        if unterminated {
            file.write_all(b"\n")
                .await
                .map_err(|e| io_error(&path, e))?;
            file.flush().await.map_err(|e| io_error(&path, e))?;
            len += 1;
        }

        info!(path = %path.display(), records = index.len(), "opened file storage");

        Ok(Self {
            path,
            state: RwLock::new(FileState { index, file, len }),
        })
    }

    /// Returns the path of the underlying log.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `buf` at the end of the log.
    ///
    /// On failure the file is truncated back to its previous length so a
    /// half-written line never reaches the next replay.
    async fn append(&self, state: &mut FileState, buf: &[u8]) -> Result<()> {
        let written = match state.file.write_all(buf).await {
            Ok(()) => state.file.flush().await,
            Err(e) => Err(e),
        };

        match written {
            Ok(()) => {
                state.len += buf.len() as u64;
                Ok(())
            }
            Err(e) => {
                if let Err(truncate) = state.file.set_len(state.len).await {
                    warn!(
                        path = %self.path.display(),
                        error = %truncate,
                        "failed to truncate log after write error"
                    );
                }
                Err(io_error(&self.path, e))
            }
        }
    }
}

/// Outcome of replaying the log.
#[derive(Debug, Default)]
struct Replay {
    index: UrlIndex,
    /// Bytes of the log that hold whole, usable lines.
    valid_len: u64,
    /// The last line parsed but has no trailing newline.
    unterminated: bool,
}

async fn load_from_file(path: &Path) -> Result<Replay> {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Replay::default()),
        Err(e) => return Err(io_error(path, e)),
    };

    let terminated = content
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |pos| pos + 1);
    let (body, tail) = content.split_at(terminated);

    let mut replay = Replay {
        valid_len: content.len() as u64,
        ..Replay::default()
    };
    let mut skipped = 0usize;
    let mut number = 0usize;

    for line in body.split(|&b| b == b'\n') {
        number += 1;
        if is_blank(line) {
            continue;
        }

        let entry: LogLine = serde_json::from_slice(line).map_err(|e| {
            StorageError::InvalidData(format!("{} line {number}: {e}", path.display()))
        })?;

        if !replay.index.replay(entry.into()) {
            skipped += 1;
        }
    }

    if !is_blank(tail) {
        match serde_json::from_slice::<LogLine>(tail) {
            Ok(entry) => {
                replay.unterminated = true;
                if !replay.index.replay(entry.into()) {
                    skipped += 1;
                }
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    line = number,
                    error = %e,
                    "skipping partial line at end of log"
                );
                replay.valid_len = terminated as u64;
            }
        }
    }

    debug!(
        path = %path.display(),
        records = replay.index.len(),
        skipped,
        "replayed log"
    );
    Ok(replay)
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|b| b.is_ascii_whitespace())
}

fn encode_lines<'a>(records: impl IntoIterator<Item = &'a UrlRecord>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for record in records {
        serde_json::to_writer(&mut buf, &LogLine::from(record))
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;
        buf.push(b'\n');
    }
    Ok(buf)
}

fn io_error(path: &Path, err: io::Error) -> StorageError {
    StorageError::Unavailable(format!("{}: {err}", path.display()))
}

#[async_trait]
impl ReadRepository for FileRepository {
    async fn get(&self, code: &ShortCode) -> Result<String> {
        trace!(code = %code, "resolving short code");
        self.state.read().await.index.get(code)
    }

    async fn get_by_owner(&self, owner_id: &str) -> Result<Vec<UrlRecord>> {
        Ok(self.state.read().await.index.by_owner(owner_id))
    }

    async fn stats(&self) -> Result<Stats> {
        Ok(self.state.read().await.index.stats())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Repository for FileRepository {
    async fn set(&self, original_url: &str, owner_id: &str) -> Result<UrlRecord> {
        let record = UrlRecord::new(Uuid::new_v4().to_string(), original_url, owner_id);

        let mut state = self.state.write().await;
        state.index.check_new(&record)?;

        let buf = encode_lines([&record])?;
        self.append(&mut state, &buf).await?;
        state.index.insert(record.clone());

        debug!(code = %record.short_code, owner = %owner_id, "stored url");
        Ok(record)
    }

    async fn set_batch(&self, items: &[BatchItem], owner_id: &str) -> Result<Vec<UrlRecord>> {
        let mut state = self.state.write().await;
        let records = state.index.prepare_batch(items, owner_id)?;

        let buf = encode_lines(&records)?;
        self.append(&mut state, &buf).await?;
        for record in &records {
            state.index.insert(record.clone());
        }

        debug!(count = records.len(), owner = %owner_id, "stored url batch");
        Ok(records)
    }

    async fn batch_delete(&self, owner_id: &str, codes: &[ShortCode]) -> Result<()> {
        let mut state = self.state.write().await;
        let positions = state.index.deletable(owner_id, codes);
        if positions.is_empty() {
            trace!(owner = %owner_id, requested = codes.len(), "nothing to delete");
            return Ok(());
        }

        let tombstones: Vec<UrlRecord> = positions
            .iter()
            .map(|&pos| UrlRecord {
                deleted: true,
                ..state.index.record(pos).clone()
            })
            .collect();
        let buf = encode_lines(&tombstones)?;
        self.append(&mut state, &buf).await?;
        state.index.mark_deleted(&positions);

        debug!(
            requested = codes.len(),
            deleted = positions.len(),
            owner = %owner_id,
            "soft-deleted urls"
        );
        Ok(())
    }
}
