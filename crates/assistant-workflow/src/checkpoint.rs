//! Checkpoint Store
//!
//! Snapshots of [`SessionState`] taken after every node, keyed by session.
//! The latest snapshot resumes a session; the full history is kept for
//! inspection and replay.
//!
//! Writes for distinct sessions never interfere. Running two turns of the
//! same session at once is not supported.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkflowError};
use crate::nodes::NodeId;
use crate::state::{SessionId, SessionState};

/// One persisted snapshot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub session_id: SessionId,
    
    /// Monotonic per session, starting at 1
    pub step: u64,
    
    /// Node that produced this state
    pub node: NodeId,
    
    pub state: SessionState,
    
    pub created_at: DateTime<Utc>,
}

/// Persistence for session snapshots
pub trait CheckpointStore: Send + Sync {
    /// Append a snapshot; returns its step number
    fn put(&self, session_id: &SessionId, node: NodeId, state: &SessionState) -> Result<u64>;
    
    /// Most recent snapshot
    fn latest(&self, session_id: &SessionId) -> Result<Option<Checkpoint>>;
    
    /// All snapshots, oldest first
    fn history(&self, session_id: &SessionId) -> Result<Vec<Checkpoint>>;
    
    /// Known sessions, sorted
    fn sessions(&self) -> Result<Vec<SessionId>>;
    
    fn delete(&self, session_id: &SessionId) -> Result<()>;
    
    /// State of the most recent snapshot
    fn get(&self, session_id: &SessionId) -> Result<Option<SessionState>> {
        Ok(self.latest(session_id)?.map(|checkpoint| checkpoint.state))
    }
}

fn poisoned<T>(_: T) -> WorkflowError {
    WorkflowError::Checkpoint("checkpoint lock poisoned".into())
}

fn next_checkpoint(
    history: &[Checkpoint],
    session_id: &SessionId,
    node: NodeId,
    state: &SessionState,
) -> Checkpoint {
    Checkpoint {
        session_id: session_id.clone(),
        step: history.last().map_or(1, |last| last.step + 1),
        node,
        state: state.clone(),
        created_at: Utc::now(),
    }
}

/// In-memory store, the default. Lives as long as the process.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    sessions: RwLock<HashMap<SessionId, Vec<Checkpoint>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn put(&self, session_id: &SessionId, node: NodeId, state: &SessionState) -> Result<u64> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let history = sessions.entry(session_id.clone()).or_default();
        let checkpoint = next_checkpoint(history, session_id, node, state);
        let step = checkpoint.step;
        history.push(checkpoint);
        Ok(step)
    }
    
    fn latest(&self, session_id: &SessionId) -> Result<Option<Checkpoint>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.get(session_id).and_then(|h| h.last().cloned()))
    }
    
    fn history(&self, session_id: &SessionId) -> Result<Vec<Checkpoint>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.get(session_id).cloned().unwrap_or_default())
    }
    
    fn sessions(&self) -> Result<Vec<SessionId>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        let mut ids: Vec<SessionId> = sessions.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
    
    fn delete(&self, session_id: &SessionId) -> Result<()> {
        self.sessions.write().map_err(poisoned)?.remove(session_id);
        Ok(())
    }
}

/// Durable store: one JSON file per session, replaced atomically on write
pub struct FileCheckpointStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCheckpointStore {
    /// Open (and create if needed) a checkpoint directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, &e))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }
    
    pub fn dir(&self) -> &Path {
        &self.dir
    }
    
    fn path_for(&self, session_id: &SessionId) -> Result<PathBuf> {
        if !session_id.is_portable() {
            return Err(WorkflowError::Checkpoint(format!(
                "session id `{session_id}` cannot be used as a file name"
            )));
        }
        Ok(self.dir.join(format!("{session_id}.json")))
    }
    
    fn read_history(&self, path: &Path) -> Result<Vec<Checkpoint>> {
        match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                WorkflowError::Checkpoint(format!("{}: {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(io_error(path, &e)),
        }
    }
    
    fn write_history(&self, path: &Path, history: &[Checkpoint]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(history)
            .map_err(|e| WorkflowError::Checkpoint(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        
        let mut file = fs::File::create(&tmp).map_err(|e| io_error(&tmp, &e))?;
        file.write_all(&bytes).map_err(|e| io_error(&tmp, &e))?;
        file.sync_all().map_err(|e| io_error(&tmp, &e))?;
        fs::rename(&tmp, path).map_err(|e| io_error(path, &e))
    }
}

fn io_error(path: &Path, err: &std::io::Error) -> WorkflowError {
    WorkflowError::Checkpoint(format!("{}: {err}", path.display()))
}

impl CheckpointStore for FileCheckpointStore {
    fn put(&self, session_id: &SessionId, node: NodeId, state: &SessionState) -> Result<u64> {
        let path = self.path_for(session_id)?;
        let _guard = self.write_lock.lock().map_err(poisoned)?;
        
        let mut history = self.read_history(&path)?;
        let checkpoint = next_checkpoint(&history, session_id, node, state);
        let step = checkpoint.step;
        history.push(checkpoint);
        self.write_history(&path, &history)?;
        
        tracing::debug!(session_id = %session_id, step, node = %node, "Checkpoint written");
        Ok(step)
    }
    
    fn latest(&self, session_id: &SessionId) -> Result<Option<Checkpoint>> {
        Ok(self.history(session_id)?.pop())
    }
    
    fn history(&self, session_id: &SessionId) -> Result<Vec<Checkpoint>> {
        let path = self.path_for(session_id)?;
        self.read_history(&path)
    }
    
    fn sessions(&self) -> Result<Vec<SessionId>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| io_error(&self.dir, &e))?;
        let mut ids = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_error(&self.dir, &e))?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(SessionId::from_string(stem));
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
    
    fn delete(&self, session_id: &SessionId) -> Result<()> {
        let path = self.path_for(session_id)?;
        let _guard = self.write_lock.lock().map_err(poisoned)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, &e)),
        }
    }
}
