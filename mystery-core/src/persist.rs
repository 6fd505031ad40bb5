//! Local persistence of game state.
//!
//! State lives in a small key-value store: the full progress blob under
//! [`SAVE_KEY`] and the raw start timestamp under [`START_TIME_KEY`]. A
//! damaged or older save loses only the fields that cannot be read.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::fs;

use crate::state::{ConversationTurn, GameState};

/// Key holding the serialized game state.
pub const SAVE_KEY: &str = "mystery_save";

/// Key holding the game start time in epoch milliseconds.
pub const START_TIME_KEY: &str = "mystery_start_time";

/// Current save format version.
const SAVE_VERSION: u32 = 1;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid storage key '{0}'")]
    InvalidKey(String),
}

/// A string key-value store.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), PersistError>;
    async fn remove(&self, key: &str) -> Result<(), PersistError>;
}

// ============================================================================
// File storage
// ============================================================================

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, PersistError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(PersistError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PersistError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).await?;

        // Readers only ever see a complete file.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PersistError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Memory storage
// ============================================================================

/// In-memory storage. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a valid map.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current raw value of a key.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PersistError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PersistError> {
        self.lock().remove(key);
        Ok(())
    }
}

// ============================================================================
// Save format
// ============================================================================

#[derive(Debug, Serialize)]
struct SaveBlob<'a> {
    version: u32,
    saved_at: String,
    started_at_ms: i64,
    history: &'a BTreeMap<String, Vec<ConversationTurn>>,
    flags: &'a BTreeSet<String>,
    unlocked_evidence: &'a BTreeSet<String>,
    unlocked_clues: &'a BTreeSet<String>,
}

/// Serialize a state to the save blob.
pub fn encode(state: &GameState) -> Result<String, PersistError> {
    let blob = SaveBlob {
        version: SAVE_VERSION,
        saved_at: chrono::Utc::now().to_rfc3339(),
        started_at_ms: state.started_at_ms,
        history: &state.history,
        flags: &state.flags,
        unlocked_evidence: &state.unlocked_evidence,
        unlocked_clues: &state.unlocked_clues,
    };
    Ok(serde_json::to_string(&blob)?)
}

/// Decode a save blob, keeping every field that can be read.
///
/// `fallback_start_ms` is used when the blob has no readable start time.
pub fn decode(raw: &str, fallback_start_ms: i64) -> GameState {
    let mut state = GameState::new(fallback_start_ms);

    let value: Value = match serde_json::from_str(raw) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(_) => {
            tracing::warn!("save blob is not an object; starting from an empty state");
            return state;
        }
        Err(error) => {
            tracing::warn!(%error, "save blob is not valid JSON; starting from an empty state");
            return state;
        }
    };

    if let Some(version) = value.get("version").and_then(Value::as_u64) {
        if version > u64::from(SAVE_VERSION) {
            tracing::warn!(version, expected = SAVE_VERSION, "save written by a newer version");
        }
    }

    if let Some(start) = field(&value, &["started_at_ms", "startTime"]).and_then(as_millis) {
        state.started_at_ms = start;
    }

    if let Some(history) = field(&value, &["history"]) {
        state.history = decode_history(history);
    }

    if let Some(flags) = field(&value, &["flags"]) {
        state.flags = decode_flags(flags);
    }

    if let Some(evidence) = field(&value, &["unlocked_evidence"]) {
        state.unlocked_evidence = decode_id_set("unlocked_evidence", evidence);
    }

    if let Some(clues) = field(&value, &["unlocked_clues", "revealedClues"]) {
        state.unlocked_clues = decode_id_set("unlocked_clues", clues);
    }

    state
}

fn field<'v>(value: &'v Value, names: &[&str]) -> Option<&'v Value> {
    names.iter().find_map(|name| value.get(*name))
}

fn as_millis(value: &Value) -> Option<i64> {
    let millis = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => return parse_millis(s),
        _ => None,
    };
    millis.filter(|ms| *ms >= 0)
}

/// Epoch milliseconds; negative timestamps count as unreadable.
fn parse_millis(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.round() as i64))
        .filter(|ms| *ms >= 0)
}

fn decode_history(value: &Value) -> BTreeMap<String, Vec<ConversationTurn>> {
    let Some(map) = value.as_object() else {
        tracing::warn!("saved history is not an object; dropping it");
        return BTreeMap::new();
    };

    let mut history = BTreeMap::new();
    for (character_id, turns) in map {
        let Some(turns) = turns.as_array() else {
            tracing::warn!(character = %character_id, "saved turns are not a list; dropping them");
            continue;
        };
        let decoded: Vec<ConversationTurn> = turns
            .iter()
            .filter_map(|turn| serde_json::from_value(turn.clone()).ok())
            .collect();
        if decoded.len() != turns.len() {
            tracing::warn!(
                character = %character_id,
                dropped = turns.len() - decoded.len(),
                "dropped unreadable conversation turns"
            );
        }
        history.insert(character_id.clone(), decoded);
    }
    history
}

/// Flags as a list of names, or the legacy `{name: true}` object.
fn decode_flags(value: &Value) -> BTreeSet<String> {
    match value {
        Value::Object(map) => map
            .iter()
            .filter(|(_, set)| set.as_bool().unwrap_or(false))
            .map(|(name, _)| name.clone())
            .collect(),
        other => decode_id_set("flags", other),
    }
}

fn decode_id_set(name: &str, value: &Value) -> BTreeSet<String> {
    match value.as_array() {
        Some(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        None => {
            tracing::warn!(field = name, "saved field is not a list; dropping it");
            BTreeSet::new()
        }
    }
}

// ============================================================================
// Operations
// ============================================================================

/// Write the state and its start time, replacing any previous save.
pub async fn save(storage: &dyn Storage, state: &GameState) -> Result<(), PersistError> {
    let blob = encode(state)?;
    storage.set(SAVE_KEY, &blob).await?;
    storage
        .set(START_TIME_KEY, &state.started_at_ms.to_string())
        .await?;
    tracing::debug!(bytes = blob.len(), "game state saved");
    Ok(())
}

/// A stored value as read back from storage.
enum Slot {
    Missing,
    Present(String),
    /// The key exists but its bytes are not text.
    Unreadable,
}

impl Slot {
    fn is_missing(&self) -> bool {
        matches!(self, Slot::Missing)
    }

    fn text(&self) -> Option<&str> {
        match self {
            Slot::Present(raw) => Some(raw),
            Slot::Missing | Slot::Unreadable => None,
        }
    }
}

async fn read_slot(storage: &dyn Storage, key: &str) -> Result<Slot, PersistError> {
    match storage.get(key).await {
        Ok(Some(raw)) => Ok(Slot::Present(raw)),
        Ok(None) => Ok(Slot::Missing),
        Err(PersistError::Io(error)) if error.kind() == std::io::ErrorKind::InvalidData => {
            tracing::warn!(key, %error, "saved value is not text; ignoring it");
            Ok(Slot::Unreadable)
        }
        Err(error) => Err(error),
    }
}

/// Restore the saved state, or `None` when nothing has been saved.
///
/// The blob and the start time are read independently. A missing start time
/// falls back to the start-time key, then to `now_ms`.
pub async fn load(storage: &dyn Storage, now_ms: i64) -> Result<Option<GameState>, PersistError> {
    let blob = read_slot(storage, SAVE_KEY).await?;
    let start_raw = read_slot(storage, START_TIME_KEY).await?;

    if blob.is_missing() && start_raw.is_missing() {
        return Ok(None);
    }

    let stored_start = start_raw.text().and_then(parse_millis);
    let fallback_start = stored_start.unwrap_or_else(|| {
        tracing::warn!("no readable start time in save; restarting the clock");
        now_ms
    });

    let state = match blob.text() {
        Some(raw) => {
            let state = decode(raw, fallback_start);
            // The blob may carry its own start time; the dedicated key wins.
            match stored_start {
                Some(start) if start != state.started_at_ms => GameState {
                    started_at_ms: start,
                    ..state
                },
                _ => state,
            }
        }
        None => GameState::new(fallback_start),
    };

    tracing::info!(
        flags = state.flags.len(),
        evidence = state.unlocked_evidence.len(),
        clues = state.unlocked_clues.len(),
        "game state restored"
    );
    Ok(Some(state))
}

/// Erase the save irreversibly.
pub async fn reset(storage: &dyn Storage) -> Result<(), PersistError> {
    storage.remove(SAVE_KEY).await?;
    storage.remove(START_TIME_KEY).await?;
    tracing::info!("saved game erased");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_state() -> GameState {
        let mut state = GameState::new(1_700_000_000_000);
        state.append_turn("cook", ConversationTurn::character("Yes?"));
        state.append_turn("cook", ConversationTurn::player("Where were you?"));
        state.set_flag("ledger_found");
        state.unlock_evidence("e_knife");
        state.unlock_clue("c_weather");
        state
    }

    #[tokio::test]
    async fn test_round_trip_memory() {
        let storage = MemoryStorage::new();
        let state = sample_state();
        save(&storage, &state).await.unwrap();

        let restored = load(&storage, 0).await.unwrap().unwrap();
        assert_eq!(restored, state);
        assert_eq!(
            storage.raw(START_TIME_KEY).as_deref(),
            Some("1700000000000")
        );
    }

    #[tokio::test]
    async fn test_load_empty_is_none() {
        let storage = MemoryStorage::new();
        assert!(load(&storage, 5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reset_removes_both_keys() {
        let storage = MemoryStorage::new();
        save(&storage, &sample_state()).await.unwrap();
        reset(&storage).await.unwrap();
        assert!(storage.is_empty());
        assert!(load(&storage, 5).await.unwrap().is_none());
    }

    #[test]
    fn test_decode_legacy_shape() {
        let raw = r#"{
            "history": {"cook": [{"role": "model", "text": "Yes?"}, {"role": "user", "text": "Hi"}]},
            "flags": {"ledger_found": true, "ignored": false},
            "startTime": 42,
            "revealedClues": ["c_weather"]
        }"#;
        let state = decode(raw, 0);
        assert_eq!(state.started_at_ms(), 42);
        assert_eq!(state.history("cook").len(), 2);
        assert!(state.has_flag("ledger_found"));
        assert!(!state.has_flag("ignored"));
        assert!(state.is_clue_unlocked("c_weather"));
    }

    #[test]
    fn test_decode_tolerates_bad_fields() {
        let raw = r#"{
            "started_at_ms": "soon",
            "history": {"cook": [{"role": "player", "text": "ok"}, {"bogus": 1}], "maid": 3},
            "flags": ["a", 7, "b"],
            "unlocked_evidence": "e_knife"
        }"#;
        let state = decode(raw, 99);
        assert_eq!(state.started_at_ms(), 99);
        assert_eq!(state.history("cook").len(), 1);
        assert!(state.history("maid").is_empty());
        assert_eq!(state.flags().len(), 2);
        assert!(state.unlocked_evidence().is_empty());
    }

    #[test]
    fn test_decode_garbage() {
        let state = decode("not json at all", 7);
        assert_eq!(state, GameState::new(7));
    }

    #[tokio::test]
    async fn test_load_corrupt_blob_keeps_start_key() {
        let storage = MemoryStorage::new();
        storage.set(SAVE_KEY, "{{{").await.unwrap();
        storage.set(START_TIME_KEY, "1234").await.unwrap();

        let state = load(&storage, 9_999).await.unwrap().unwrap();
        assert_eq!(state, GameState::new(1234));
    }

    #[tokio::test]
    async fn test_load_missing_start_uses_now() {
        let storage = MemoryStorage::new();
        storage.set(SAVE_KEY, r#"{"flags": ["x"]}"#).await.unwrap();

        let state = load(&storage, 9_999).await.unwrap().unwrap();
        assert_eq!(state.started_at_ms(), 9_999);
        assert!(state.has_flag("x"));
    }

    #[tokio::test]
    async fn test_file_storage_round_trip() {
        let dir = TempDir::new().expect("temp dir");
        let storage = FileStorage::new(dir.path().join("saves"));

        assert_eq!(storage.get(SAVE_KEY).await.unwrap(), None);
        save(&storage, &sample_state()).await.unwrap();
        assert!(dir.path().join("saves/mystery_save.json").exists());
        assert!(!dir.path().join("saves/mystery_save.json.tmp").exists());

        let restored = load(&storage, 0).await.unwrap().unwrap();
        assert_eq!(restored, sample_state());

        reset(&storage).await.unwrap();
        assert!(!dir.path().join("saves/mystery_start_time.json").exists());
        reset(&storage).await.unwrap();
    }

    #[tokio::test]
    async fn test_load_binary_blob_keeps_start_key() {
        let dir = TempDir::new().expect("temp dir");
        let storage = FileStorage::new(dir.path());
        std::fs::write(dir.path().join("mystery_save.json"), [0xff, 0xfe, 0x7b]).unwrap();
        storage.set(START_TIME_KEY, "1000").await.unwrap();

        let state = load(&storage, 999_999).await.unwrap().unwrap();
        assert_eq!(state, GameState::new(1000));
    }

    #[test]
    fn test_negative_start_times_are_unreadable() {
        assert_eq!(parse_millis("-9223372036854775808"), None);
        assert_eq!(parse_millis("-1e30"), None);
        assert_eq!(parse_millis(" 1500.4 "), Some(1500));
        let state = decode(r#"{"started_at_ms": -1e30}"#, 77);
        assert_eq!(state.started_at_ms(), 77);
    }

    #[tokio::test]
    async fn test_file_storage_rejects_bad_keys() {
        let dir = TempDir::new().expect("temp dir");
        let storage = FileStorage::new(dir.path());
        assert!(matches!(
            storage.set("../escape", "x").await,
            Err(PersistError::InvalidKey(_))
        ));
    }
}
