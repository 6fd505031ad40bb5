//! Mystery interrogation engine with AI-driven suspects.
//!
//! This crate provides:
//! - Scenario loading (case, characters, evidence, time-gated clues)
//! - Player progress with per-character conversation history
//! - The evidence/clue unlock engine (reply directives, keywords, elapsed time)
//! - Persona rendering and the chat collaborator seam
//! - Accusation verdicts
//! - Local persistence of game state
//!
//! # Quick Start
//!
//! ```ignore
//! use mystery_core::{ClaudeBackend, GameSession, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::new("scenarios/case1.json").with_save_dir("saves");
//!     let mut session = GameSession::from_config(&config).await?;
//!     let backend = ClaudeBackend::from_env()?.with_config(config.chat.clone());
//!
//!     session.open("butler").await?;
//!     let outcome = session.send(&backend, "Where were you at ten?").await;
//!     println!("{}", outcome.reply_text().unwrap_or_default());
//!     Ok(())
//! }
//! ```

pub mod accusation;
pub mod chat;
pub mod clock;
pub mod conversation;
pub mod directive;
pub mod persist;
pub mod persona;
pub mod scenario;
pub mod session;
pub mod state;
pub mod testing;
pub mod unlock;

// Primary public API
pub use accusation::{accuse, AccuseError, Verdict};
pub use chat::{ChatBackend, ChatConfig, ChatError, ClaudeBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use conversation::{ConversationController, ConversationError, PendingReply, SendOutcome};
pub use persist::{FileStorage, MemoryStorage, PersistError, Storage};
pub use persona::build_persona;
pub use scenario::{Character, Evidence, Scenario, ScenarioError, TimeClue, UnlockCondition};
pub use session::{GameSession, SessionConfig, SessionError};
pub use state::{ConversationTurn, GameState, Speaker};
pub use testing::{ScriptedBackend, TestHarness};
pub use unlock::{ClueState, ClueStatus, UnlockCause, UnlockEngine, UnlockEvent, UnlockTarget};
