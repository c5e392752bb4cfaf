//! Durable record of published clip ids
//!
//! The ledger is an append-only UTF-8 text file with one clip id per line.
//! At startup the whole file is loaded into a `HashSet`; afterwards only the
//! bytes appended since the last read are parsed, so lines written by
//! another handle on the same file (another process, or the `publish`
//! command next to a running relay) become visible without reloading.
//!
//! Writers serialize through an advisory lock on `<ledger>.lock`. A
//! [`LedgerClaim`] holds that lock, which makes "is it recorded?" followed
//! by "record it" one atomic unit across every handle on the file. Readers
//! never take the lock; they only consume complete lines.

use std::collections::HashSet;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{Mutex, MutexGuard};

use crate::utils::error::LedgerError;

#[derive(Debug, Default)]
struct Snapshot {
    ids: HashSet<String>,
    /// Bytes of the file already parsed (always at a line boundary)
    offset: u64,
}

/// Append-only set of published clip ids
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    lock_path: PathBuf,
    snapshot: Mutex<Snapshot>,
    writer: Mutex<()>,
}

impl Ledger {
    /// Open the ledger at `path`, loading every recorded id.
    ///
    /// A missing file is an empty ledger. If a previous writer died in the
    /// middle of an append the last line lacks its newline; that line is kept
    /// as an id and the newline is restored so later appends stay separate.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| LedgerError::Load {
                    path: path.clone(),
                    source,
                })?;
        }

        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");

        let ledger = Self {
            path,
            lock_path: PathBuf::from(lock_path),
            snapshot: Mutex::new(Snapshot::default()),
            writer: Mutex::new(()),
        };

        // Loading under the lock lets a partial trailing line be repaired
        drop(ledger.claim().await?);

        tracing::info!(
            path = %ledger.path.display(),
            records = ledger.snapshot.lock().await.ids.len(),
            "Ledger loaded"
        );
        Ok(ledger)
    }

    /// Take the advisory lock and catch up with the file.
    ///
    /// While the claim is alive no other handle can record, so a `contains`
    /// answer from the claim stays true until [`LedgerClaim::record`].
    pub async fn claim(&self) -> Result<LedgerClaim<'_>, LedgerError> {
        let serial = self.writer.lock().await;
        let lock = lock_exclusive(&self.lock_path).await?;
        self.refresh(true).await?;

        Ok(LedgerClaim {
            ledger: self,
            _serial: serial,
            _lock: lock,
        })
    }

    /// Whether `clip_id` has been recorded as published by any handle
    pub async fn contains(&self, clip_id: &str) -> bool {
        if self.snapshot.lock().await.ids.contains(clip_id) {
            return true;
        }
        self.catch_up().await;
        self.snapshot.lock().await.ids.contains(clip_id)
    }

    /// Durably record `clip_id` as published.
    ///
    /// The line is flushed and synced before the in-memory set is updated.
    /// On error the id is not considered recorded. Recording an id twice
    /// writes nothing the second time.
    pub async fn record(&self, clip_id: &str) -> Result<(), LedgerError> {
        validate_id(clip_id)?;
        self.claim().await?.record(clip_id).await
    }

    /// Number of recorded ids
    pub async fn len(&self) -> usize {
        self.catch_up().await;
        self.snapshot.lock().await.ids.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// All recorded ids, sorted
    pub async fn ids(&self) -> Vec<String> {
        self.catch_up().await;
        let mut ids: Vec<String> = self.snapshot.lock().await.ids.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock-free refresh; a failed read keeps answering from memory
    async fn catch_up(&self) {
        if let Err(e) = self.refresh(false).await {
            tracing::warn!(path = %self.path.display(), error = %e, "Ledger refresh failed");
        }
    }

    /// Parse lines appended since the last refresh.
    ///
    /// `repair` is only set under the lock: then no writer is active, so a
    /// line without its newline was left by a writer that died.
    async fn refresh(&self, repair: bool) -> Result<(), LedgerError> {
        let mut snapshot = self.snapshot.lock().await;
        let tail = read_from(&self.path, snapshot.offset)
            .await
            .map_err(|source| LedgerError::Load {
                path: self.path.clone(),
                source,
            })?;

        let complete = tail
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |pos| pos + 1);
        let (lines, rest) = tail.split_at(complete);

        snapshot.ids.extend(
            String::from_utf8_lossy(lines)
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
        snapshot.offset += complete as u64;

        if repair && !rest.is_empty() {
            tracing::warn!(path = %self.path.display(), "Ledger ends with a partial line, repairing");
            append_line(&self.path, "").await?;

            let id = String::from_utf8_lossy(rest).trim().to_string();
            if !id.is_empty() {
                snapshot.ids.insert(id);
            }
            snapshot.offset += rest.len() as u64 + 1;
        }

        Ok(())
    }
}

/// Exclusive hold on the ledger file for one check-and-record unit.
///
/// The lock is released when the claim is dropped.
pub struct LedgerClaim<'a> {
    ledger: &'a Ledger,
    _serial: MutexGuard<'a, ()>,
    _lock: std::fs::File,
}

impl LedgerClaim<'_> {
    /// Whether `clip_id` is recorded, as of the moment the claim was taken
    pub async fn contains(&self, clip_id: &str) -> bool {
        self.ledger.snapshot.lock().await.ids.contains(clip_id)
    }

    /// Append `clip_id` and sync before it becomes visible in memory
    pub async fn record(&mut self, clip_id: &str) -> Result<(), LedgerError> {
        validate_id(clip_id)?;

        let mut snapshot = self.ledger.snapshot.lock().await;
        if snapshot.ids.contains(clip_id) {
            return Ok(());
        }

        append_line(&self.ledger.path, clip_id).await?;
        snapshot.offset += clip_id.len() as u64 + 1;
        snapshot.ids.insert(clip_id.to_string());

        tracing::debug!(path = %self.ledger.path.display(), clip_id = %clip_id, "Ledger record appended");
        Ok(())
    }
}

fn validate_id(clip_id: &str) -> Result<(), LedgerError> {
    if clip_id.is_empty() || clip_id.contains(['\n', '\r']) {
        return Err(LedgerError::InvalidId(clip_id.to_string()));
    }
    Ok(())
}

/// Block on the advisory lock without holding up the runtime
async fn lock_exclusive(path: &Path) -> Result<std::fs::File, LedgerError> {
    let lock_err = |source: std::io::Error| LedgerError::Lock {
        path: path.to_path_buf(),
        source,
    };

    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&owned)?;
        file.lock_exclusive()?;
        Ok::<_, std::io::Error>(file)
    })
    .await
    .map_err(|e| lock_err(std::io::Error::other(e)))?
    .map_err(lock_err)
}

/// Bytes from `offset` to the end of the file; a missing file has none
async fn read_from(path: &Path, offset: u64) -> std::io::Result<Vec<u8>> {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    file.seek(SeekFrom::Start(offset)).await?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).await?;
    Ok(buf)
}

/// Append `line` plus a newline in a single write, then sync
async fn append_line(path: &Path, line: &str) -> Result<(), LedgerError> {
    let append_err = |source: std::io::Error| LedgerError::Append {
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(append_err)?;

    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');

    file.write_all(buf.as_bytes()).await.map_err(append_err)?;
    file.flush().await.map_err(append_err)?;
    file.sync_data().await.map_err(append_err)?;
    Ok(())
}
