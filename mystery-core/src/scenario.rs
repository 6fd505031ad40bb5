//! Scenario data: the case, its characters, evidence and time-gated clues.
//!
//! A scenario is loaded once from JSON and never mutated afterwards. The
//! `characters` array may hold inline character objects or paths to
//! character files, resolved relative to the scenario file.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

use crate::directive::is_valid_flag_name;

/// Unlock condition literal meaning "visible from the first moment of play".
pub const START_SENTINEL: &str = "start";

const DEFAULT_GREETING: &str = "...What do you want? Make it quick.";
const DEFAULT_FALLBACK_LINE: &str = "...Sorry, the line is unclear. Could you say that again?";

/// Errors from loading or validating a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {origin} at {at}: {message}")]
    Parse {
        origin: String,
        at: String,
        message: String,
    },

    #[error("character file not found: {0} (check the path and its letter case)")]
    MissingCharacterFile(PathBuf),

    #[error("character entry {index} must be an object or a file path")]
    InvalidCharacterEntry { index: usize },

    #[error("character entry {index} refers to '{path}' but the scenario has no base directory")]
    UnresolvedCharacterPath { index: usize, path: String },

    #[error("scenario has no characters")]
    NoCharacters,

    #[error("duplicate {kind} id '{id}'")]
    DuplicateId { kind: &'static str, id: String },

    #[error("culprit '{0}' is not one of the scenario's characters")]
    UnknownCulprit(String),

    #[error("time clue '{0}' has an invalid unlock delay")]
    InvalidDelay(String),

    #[error("{owner} uses flag '{flag}'; flags may only contain letters, digits and '_'")]
    InvalidFlag { owner: String, flag: String },
}

/// When a piece of evidence becomes visible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UnlockCondition {
    /// Visible from the start of the game.
    AtStart,
    /// Visible once the named flag is set.
    Flag(String),
}

impl From<String> for UnlockCondition {
    fn from(raw: String) -> Self {
        if raw.trim() == START_SENTINEL {
            UnlockCondition::AtStart
        } else {
            UnlockCondition::Flag(raw.trim().to_string())
        }
    }
}

impl From<UnlockCondition> for String {
    fn from(condition: UnlockCondition) -> Self {
        match condition {
            UnlockCondition::AtStart => START_SENTINEL.to_string(),
            UnlockCondition::Flag(name) => name,
        }
    }
}

/// The case being investigated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub title: String,
    #[serde(default)]
    pub outline: String,
    /// Identifier of the guilty character.
    pub culprit: String,
    /// Resolution text revealed on a correct accusation.
    #[serde(default)]
    pub truth: String,
}

/// Rules about what a character may and may not lie about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LyingRules {
    #[serde(default)]
    pub allowed: Vec<String>,
    #[serde(default)]
    pub forbidden: Vec<String>,
}

/// Something a character hides, optionally tied to an unlock flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Secret {
    Plain(String),
    Gated {
        content: String,
        #[serde(default)]
        unlock: Option<String>,
    },
}

impl Secret {
    pub fn content(&self) -> &str {
        match self {
            Secret::Plain(content) | Secret::Gated { content, .. } => content,
        }
    }

    /// Flag the character should emit when revealing this secret.
    pub fn unlock_flag(&self) -> Option<&str> {
        match self {
            Secret::Plain(_) => None,
            Secret::Gated { unlock, .. } => unlock.as_deref().filter(|f| !f.is_empty()),
        }
    }
}

/// One step of a character's movements on the night in question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub time: String,
    pub action: String,
}

/// A character the player can interrogate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub personality: Vec<String>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub secrets: Vec<Secret>,
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
    #[serde(default)]
    pub world_view: Option<String>,
    #[serde(default)]
    pub lying_rules: LyingRules,
    #[serde(default)]
    pub language_style: Vec<String>,
    /// Raw extra instructions appended to the rendered persona.
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub greeting: Option<String>,
    #[serde(default)]
    pub fallback_line: Option<String>,
}

impl Character {
    /// Opening line shown before the first question.
    pub fn greeting(&self) -> &str {
        self.greeting.as_deref().unwrap_or(DEFAULT_GREETING)
    }

    /// Line shown when the chat collaborator cannot be reached.
    pub fn fallback_line(&self) -> &str {
        self.fallback_line.as_deref().unwrap_or(DEFAULT_FALLBACK_LINE)
    }
}

/// A piece of evidence shown in the evidence panel once unlocked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub unlock_condition: UnlockCondition,
    /// Words that unlock this evidence when they appear in an exchange.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Information released after a fixed time from game start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeClue {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub unlock_minutes: f64,
}

impl TimeClue {
    /// Delay from game start, in milliseconds.
    pub fn delay_ms(&self) -> i64 {
        (self.unlock_minutes * 60_000.0).round() as i64
    }
}

/// A complete, validated scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    pub case: Case,
    pub characters: Vec<Character>,
    pub evidences: Vec<Evidence>,
    pub time_clues: Vec<TimeClue>,
}

/// On-disk shape before character references are resolved.
#[derive(Debug, Deserialize)]
struct ScenarioFile {
    case: Case,
    #[serde(default)]
    characters: Vec<serde_json::Value>,
    #[serde(default, alias = "evidence")]
    evidences: Vec<Evidence>,
    #[serde(default)]
    time_clues: Vec<TimeClue>,
}

impl Scenario {
    /// Load a scenario file, resolving character file paths relative to it.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .await
            .map_err(|source| ScenarioError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let file: ScenarioFile = parse_json(&raw, &path.display().to_string())?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut characters = Vec::with_capacity(file.characters.len());
        for (index, entry) in file.characters.into_iter().enumerate() {
            let character = match entry {
                serde_json::Value::String(reference) => {
                    load_character_file(&base_dir.join(&reference)).await?
                }
                value @ serde_json::Value::Object(_) => {
                    character_from_value(value, &format!("characters[{index}]"))?
                }
                _ => return Err(ScenarioError::InvalidCharacterEntry { index }),
            };
            characters.push(character);
        }

        let scenario = Self {
            case: file.case,
            characters,
            evidences: file.evidences,
            time_clues: file.time_clues,
        };
        scenario.validate()?;

        tracing::info!(
            title = %scenario.case.title,
            characters = scenario.characters.len(),
            evidences = scenario.evidences.len(),
            time_clues = scenario.time_clues.len(),
            "scenario loaded"
        );
        Ok(scenario)
    }

    /// Parse a self-contained scenario (every character inline).
    pub fn from_json(raw: &str) -> Result<Self, ScenarioError> {
        let file: ScenarioFile = parse_json(raw, "scenario")?;

        let mut characters = Vec::with_capacity(file.characters.len());
        for (index, entry) in file.characters.into_iter().enumerate() {
            match entry {
                serde_json::Value::String(path) => {
                    return Err(ScenarioError::UnresolvedCharacterPath { index, path })
                }
                value @ serde_json::Value::Object(_) => {
                    characters.push(character_from_value(value, &format!("characters[{index}]"))?)
                }
                _ => return Err(ScenarioError::InvalidCharacterEntry { index }),
            }
        }

        let scenario = Self {
            case: file.case,
            characters,
            evidences: file.evidences,
            time_clues: file.time_clues,
        };
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<(), ScenarioError> {
        if self.characters.is_empty() {
            return Err(ScenarioError::NoCharacters);
        }

        check_unique("character", self.characters.iter().map(|c| c.id.as_str()))?;
        check_unique("evidence", self.evidences.iter().map(|e| e.id.as_str()))?;
        check_unique("time clue", self.time_clues.iter().map(|c| c.id.as_str()))?;

        if self.character(&self.case.culprit).is_none() {
            return Err(ScenarioError::UnknownCulprit(self.case.culprit.clone()));
        }

        for clue in &self.time_clues {
            if !clue.unlock_minutes.is_finite() || clue.unlock_minutes < 0.0 {
                return Err(ScenarioError::InvalidDelay(clue.id.clone()));
            }
        }

        for evidence in &self.evidences {
            if let UnlockCondition::Flag(flag) = &evidence.unlock_condition {
                check_flag(|| format!("evidence '{}'", evidence.id), flag)?;
            }
        }
        for character in &self.characters {
            for flag in character.secrets.iter().filter_map(|s| s.unlock_flag()) {
                check_flag(|| format!("a secret of '{}'", character.id), flag)?;
            }
        }

        Ok(())
    }

    /// Look up a character by identifier.
    pub fn character(&self, id: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    /// Look up a piece of evidence by identifier.
    pub fn evidence(&self, id: &str) -> Option<&Evidence> {
        self.evidences.iter().find(|e| e.id == id)
    }

    /// Look up a time clue by identifier.
    pub fn time_clue(&self, id: &str) -> Option<&TimeClue> {
        self.time_clues.iter().find(|c| c.id == id)
    }

    /// Evidence gated behind the given flag, in scenario order.
    pub fn evidence_for_flag<'a>(&'a self, flag: &'a str) -> impl Iterator<Item = &'a Evidence> {
        self.evidences
            .iter()
            .filter(move |e| matches!(&e.unlock_condition, UnlockCondition::Flag(f) if f == flag))
    }
}

fn check_flag(owner: impl FnOnce() -> String, flag: &str) -> Result<(), ScenarioError> {
    if is_valid_flag_name(flag) {
        Ok(())
    } else {
        Err(ScenarioError::InvalidFlag {
            owner: owner(),
            flag: flag.to_string(),
        })
    }
}

fn check_unique<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), ScenarioError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ScenarioError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

fn parse_json<T: serde::de::DeserializeOwned>(raw: &str, origin: &str) -> Result<T, ScenarioError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
        let at = error.path().to_string();
        ScenarioError::Parse {
            origin: origin.to_string(),
            at,
            message: error.into_inner().to_string(),
        }
    })
}

fn character_from_value(value: serde_json::Value, origin: &str) -> Result<Character, ScenarioError> {
    serde_path_to_error::deserialize(value).map_err(|error| {
        let at = error.path().to_string();
        ScenarioError::Parse {
            origin: origin.to_string(),
            at,
            message: error.into_inner().to_string(),
        }
    })
}

async fn load_character_file(path: &Path) -> Result<Character, ScenarioError> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ScenarioError::MissingCharacterFile(path.to_path_buf()))
        }
        Err(source) => {
            return Err(ScenarioError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    parse_json(&raw, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"{
        "case": {"title": "T", "outline": "O", "culprit": "a", "truth": "It was A."},
        "characters": [
            {"id": "a", "name": "Alice", "role": "Cook"},
            {"id": "b", "name": "Bob", "role": "Gardener"}
        ],
        "evidences": [
            {"id": "e1", "name": "Knife", "description": "Bloody", "unlock_condition": "start"},
            {"id": "e2", "name": "Note", "description": "Torn", "unlock_condition": "note_found"}
        ]
    }"#;

    #[test]
    fn test_unlock_condition_from_string() {
        assert_eq!(UnlockCondition::from("start".to_string()), UnlockCondition::AtStart);
        assert_eq!(
            UnlockCondition::from("knife_found".to_string()),
            UnlockCondition::Flag("knife_found".to_string())
        );
        assert_eq!(String::from(UnlockCondition::AtStart), "start");
    }

    #[test]
    fn test_from_json_minimal() {
        let scenario = Scenario::from_json(MINIMAL).unwrap();
        assert_eq!(scenario.characters.len(), 2);
        assert!(scenario.time_clues.is_empty());
        assert_eq!(scenario.character("b").unwrap().name, "Bob");
        assert_eq!(
            scenario.evidence_for_flag("note_found").map(|e| e.id.as_str()).collect::<Vec<_>>(),
            vec!["e2"]
        );
    }

    #[test]
    fn test_character_defaults() {
        let scenario = Scenario::from_json(MINIMAL).unwrap();
        let alice = scenario.character("a").unwrap();
        assert_eq!(alice.greeting(), DEFAULT_GREETING);
        assert_eq!(alice.fallback_line(), DEFAULT_FALLBACK_LINE);
        assert!(alice.secrets.is_empty());
    }

    #[test]
    fn test_secret_forms() {
        let secrets: Vec<Secret> = serde_json::from_str(
            r#"["plain secret", {"content": "gated secret", "unlock": "flag_a"}]"#,
        )
        .unwrap();
        assert_eq!(secrets[0].content(), "plain secret");
        assert_eq!(secrets[0].unlock_flag(), None);
        assert_eq!(secrets[1].content(), "gated secret");
        assert_eq!(secrets[1].unlock_flag(), Some("flag_a"));
    }

    #[test]
    fn test_unknown_culprit_rejected() {
        let raw = MINIMAL.replace(r#""culprit": "a""#, r#""culprit": "zed""#);
        let err = Scenario::from_json(&raw).unwrap_err();
        assert!(matches!(err, ScenarioError::UnknownCulprit(id) if id == "zed"));
    }

    #[test]
    fn test_duplicate_evidence_rejected() {
        let raw = MINIMAL.replace(r#""id": "e2""#, r#""id": "e1""#);
        let err = Scenario::from_json(&raw).unwrap_err();
        assert!(matches!(err, ScenarioError::DuplicateId { kind: "evidence", .. }));
    }

    #[test]
    fn test_unparseable_flag_names_rejected() {
        let raw = MINIMAL.replace("note_found", "note-found");
        let err = Scenario::from_json(&raw).unwrap_err();
        assert!(
            matches!(&err, ScenarioError::InvalidFlag { owner, flag } if owner == "evidence 'e2'" && flag == "note-found")
        );

        let raw = MINIMAL.replace(
            r#""role": "Gardener"}"#,
            r#""role": "Gardener", "secrets": [{"content": "x", "unlock": "saw it"}]}"#,
        );
        let err = Scenario::from_json(&raw).unwrap_err();
        assert!(matches!(err, ScenarioError::InvalidFlag { flag, .. } if flag == "saw it"));
    }

    #[test]
    fn test_parse_error_reports_path() {
        let raw = MINIMAL.replace(r#""unlock_condition": "start""#, r#""unlock_condition": 5"#);
        match Scenario::from_json(&raw).unwrap_err() {
            ScenarioError::Parse { at, .. } => assert!(at.contains("evidences")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_path_entry_needs_base_dir() {
        let raw = MINIMAL.replace(
            r#"{"id": "b", "name": "Bob", "role": "Gardener"}"#,
            r#""characters/bob.json""#,
        );
        let err = Scenario::from_json(&raw).unwrap_err();
        assert!(matches!(err, ScenarioError::UnresolvedCharacterPath { index: 1, .. }));
    }

    #[test]
    fn test_time_clue_delay() {
        let clue = TimeClue {
            id: "c".to_string(),
            title: "Report".to_string(),
            content: String::new(),
            unlock_minutes: 2.5,
        };
        assert_eq!(clue.delay_ms(), 150_000);
    }

    #[tokio::test]
    async fn test_load_resolves_character_files() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::create_dir_all(dir.path().join("characters")).unwrap();
        std::fs::write(
            dir.path().join("characters/bob.json"),
            r#"{"id": "b", "name": "Bob", "role": "Gardener", "personality": ["gruff"]}"#,
        )
        .unwrap();
        let raw = MINIMAL.replace(
            r#"{"id": "b", "name": "Bob", "role": "Gardener"}"#,
            r#""characters/bob.json""#,
        );
        let path = dir.path().join("case.json");
        std::fs::write(&path, raw).unwrap();

        let scenario = Scenario::load(&path).await.unwrap();
        let bob = scenario.character("b").unwrap();
        assert_eq!(bob.personality, vec!["gruff".to_string()]);
    }

    #[tokio::test]
    async fn test_load_missing_character_file() {
        let dir = TempDir::new().expect("temp dir");
        let raw = MINIMAL.replace(
            r#"{"id": "b", "name": "Bob", "role": "Gardener"}"#,
            r#""characters/Bob.json""#,
        );
        let path = dir.path().join("case.json");
        std::fs::write(&path, raw).unwrap();

        let err = Scenario::load(&path).await.unwrap_err();
        assert!(matches!(err, ScenarioError::MissingCharacterFile(_)));
    }

    #[tokio::test]
    async fn test_load_missing_scenario_file() {
        let err = Scenario::load("/definitely/not/here.json").await.unwrap_err();
        assert!(matches!(err, ScenarioError::Io { .. }));
    }
}
