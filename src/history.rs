//! Conversation history persistence - one JSONL file per conversation.
//!
//! Files are append-only; each line is one turn. Appends for a conversation
//! are serialized through a per-file mutex so a chain's user/assistant pair
//! lands contiguously even when two chains share a conversation id.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{GhostwriterError, Result};
use crate::tokens::estimate_tokens;

/// Speaker of one persisted turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

/// One persisted conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: TurnRole,
    pub text: String,
}

impl HistoryTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            text: text.into(),
        }
    }

    /// Estimated token weight of this turn (role + text).
    pub fn estimated_tokens(&self) -> u64 {
        estimate_tokens(self.role.as_str()) + estimate_tokens(&self.text)
    }
}

/// Turn a conversation or persona id into a safe file stem.
///
/// `@` becomes `_` (WhatsApp-style ids like `12345@c.us`); path traversal
/// and control characters are rejected outright.
pub fn sanitize_id(id: &str) -> Result<String> {
    if id.is_empty()
        || id.contains('/')
        || id.contains('\\')
        || id.contains("..")
        || id.chars().any(char::is_control)
    {
        return Err(GhostwriterError::InvalidId(id.to_string()));
    }
    Ok(id.replace('@', "_"))
}

/// Drop oldest turns until the estimated token count fits the budget.
pub fn trim_turns(turns: Vec<HistoryTurn>, max_tokens: u64) -> Vec<HistoryTurn> {
    let mut total: u64 = turns.iter().map(HistoryTurn::estimated_tokens).sum();
    let mut drop = 0;
    while total > max_tokens && drop < turns.len() {
        total -= turns[drop].estimated_tokens();
        drop += 1;
    }
    if drop == 0 {
        turns
    } else {
        turns[drop..].to_vec()
    }
}

/// Load/append store for per-conversation history files.
pub struct HistoryStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl HistoryStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn file_path(&self, conversation_id: &str) -> Result<PathBuf> {
        let stem = sanitize_id(conversation_id)?;
        Ok(self.dir.join(format!("{}.jsonl", stem)))
    }

    fn file_lock(&self, stem: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| GhostwriterError::Storage(e.to_string()))?;
        Ok(locks.entry(stem.to_string()).or_default().clone())
    }

    /// Load all turns for a conversation, oldest first.
    ///
    /// A missing file is an empty history; unreadable files degrade to empty
    /// and malformed lines are skipped.
    pub fn load(&self, conversation_id: &str) -> Result<Vec<HistoryTurn>> {
        let path = self.file_path(conversation_id)?;
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => {
                warn!("failed to open history file {}: {}", path.display(), e);
                return Ok(Vec::new());
            }
        };

        let reader = BufReader::new(file);
        let mut turns = Vec::new();
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryTurn>(&line) {
                Ok(turn) => turns.push(turn),
                Err(_) => continue,
            }
        }
        Ok(turns)
    }

    /// Append turns for a conversation, creating the directory and file on
    /// first use. The whole batch is written under the file's lock and
    /// flushed before returning.
    pub fn append(&self, conversation_id: &str, turns: &[HistoryTurn]) -> Result<()> {
        let stem = sanitize_id(conversation_id)?;
        let path = self.dir.join(format!("{}.jsonl", stem));
        fs::create_dir_all(&self.dir)?;

        let lock = self.file_lock(&stem)?;
        let _guard = lock
            .lock()
            .map_err(|e| GhostwriterError::Storage(e.to_string()))?;

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        for turn in turns {
            writeln!(file, "{}", serde_json::to_string(turn)?)?;
        }
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (HistoryStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = HistoryStore::new(temp_dir.path().join("history"));
        (store, temp_dir)
    }

    #[test]
    fn test_sanitize_replaces_at() {
        assert_eq!(sanitize_id("12345@c.us").unwrap(), "12345_c.us");
    }

    #[test]
    fn test_sanitize_rejects_traversal() {
        assert!(sanitize_id("../secrets").is_err());
        assert!(sanitize_id("a/b").is_err());
        assert!(sanitize_id("a\\b").is_err());
        assert!(sanitize_id("bad\nid").is_err());
        assert!(sanitize_id("").is_err());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let (store, _temp) = create_test_store();
        let turns = store.load("nobody@c.us").unwrap();
        assert!(turns.is_empty());
    }

    #[test]
    fn test_append_then_load_round_trip() {
        let (store, _temp) = create_test_store();
        let turns = vec![
            HistoryTurn::user("Hello there"),
            HistoryTurn::assistant("Hi!"),
        ];

        store.append("12345@c.us", &turns).unwrap();
        let loaded = store.load("12345@c.us").unwrap();

        assert_eq!(loaded, turns);
    }

    #[test]
    fn test_append_is_append_only() {
        let (store, _temp) = create_test_store();
        store.append("a@c.us", &[HistoryTurn::user("one")]).unwrap();
        store
            .append("a@c.us", &[HistoryTurn::assistant("two")])
            .unwrap();

        let loaded = store.load("a@c.us").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].text, "one");
        assert_eq!(loaded[1].text, "two");
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("history");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("12345_c.us.jsonl"),
            "{\"role\":\"user\",\"text\":\"keep me\"}\nnot json\n\n{\"role\":\"assistant\",\"text\":\"me too\"}\n",
        )
        .unwrap();

        let store = HistoryStore::new(&dir);
        let turns = store.load("12345@c.us").unwrap();

        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].text, "keep me");
        assert_eq!(turns[1].text, "me too");
    }

    #[test]
    fn test_trim_keeps_everything_under_budget() {
        let turns = vec![
            HistoryTurn::user("Hello there"),
            HistoryTurn::assistant("Hi!"),
        ];
        let trimmed = trim_turns(turns.clone(), 10_000);
        assert_eq!(trimmed, turns);
    }

    #[test]
    fn test_trim_drops_oldest_first() {
        let turns = vec![
            HistoryTurn::user("x".repeat(400)),      // ~100 tokens + role
            HistoryTurn::assistant("y".repeat(400)), // ~100 tokens + role
            HistoryTurn::user("z".repeat(40)),       // ~10 tokens + role
        ];
        let trimmed = trim_turns(turns, 120);

        assert_eq!(trimmed.len(), 2);
        assert!(trimmed[0].text.starts_with('y'));
        assert!(trimmed[1].text.starts_with('z'));
    }

    #[test]
    fn test_trim_can_drop_everything() {
        let turns = vec![HistoryTurn::user("x".repeat(4000))];
        let trimmed = trim_turns(turns, 10);
        assert!(trimmed.is_empty());
    }

    #[test]
    fn test_estimated_tokens_counts_role_and_text() {
        let turn = HistoryTurn::user("abcd");
        // "user" -> 1 token, "abcd" -> 1 token
        assert_eq!(turn.estimated_tokens(), 2);
    }

    #[test]
    fn test_turn_serialization_shape() {
        let turn = HistoryTurn::user("How are you?");
        let json = serde_json::to_string(&turn).unwrap();
        assert_eq!(json, "{\"role\":\"user\",\"text\":\"How are you?\"}");
    }

    #[test]
    fn test_append_rejects_bad_id() {
        let (store, _temp) = create_test_store();
        let result = store.append("../escape", &[HistoryTurn::user("x")]);
        assert!(matches!(result, Err(GhostwriterError::InvalidId(_))));
    }
}
