//! TUI widgets for the mystery game

pub mod chat;
pub mod evidence;
pub mod input;
pub mod status_bar;
pub mod suspects;

pub use chat::ChatWidget;
pub use evidence::EvidenceWidget;
pub use input::{InputWidget, Prompt};
pub use status_bar::{HotkeyBarWidget, StatusBarWidget};
pub use suspects::SuspectsWidget;
