//! Headless mode for the mystery game.
//!
//! A line-oriented interface for running the game without a TUI. It's
//! designed for scripted play and automated testing.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::Result;
use mystery_core::accusation::resolve_suspect;
use mystery_core::{ChatBackend, GameSession, SendOutcome, UnlockEvent, Verdict};

use crate::app::unlock_notice;

const COMMANDS: &[(&str, &str)] = &[
    ("#talk <name>", "Question a suspect"),
    ("#back", "Leave the current conversation"),
    ("#suspects", "List the suspects"),
    ("#evidence", "List the evidence found so far"),
    ("#clues", "List reports and when the locked ones arrive"),
    ("#accuse <name>", "Name the culprit"),
    ("#reset", "Erase progress and start over"),
    ("#status", "Show current game status"),
    ("#help", "Show this help"),
    ("#quit", "Exit the game"),
];

/// Run the game in headless mode.
///
/// Lines starting with `#` are commands; anything else is said to the
/// suspect currently being questioned.
pub async fn run_headless(mut session: GameSession, backend: Arc<dyn ChatBackend>) -> Result<()> {
    println!("=== {} ===", session.scenario().case.title);
    println!("{}", session.scenario().case.outline);
    println!();
    print_suspects(&session);
    println!();
    println!("Commands:");
    print_commands();
    println!();
    println!("Enter your questions (one per line):");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        // Time moves on between lines
        let events = session.tick().await;
        print_unlocks(&session, &events);

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('#') {
            let (name, rest) = match command.trim().split_once(char::is_whitespace) {
                Some((name, rest)) => (name, rest.trim()),
                None => (command.trim(), ""),
            };
            let keep_going = run_command(&mut session, name, rest).await;
            report_persist_error(&mut session);
            stdout.flush().ok();
            if !keep_going {
                break;
            }
            continue;
        }

        let Some(character) = session.active_character() else {
            println!("[ERROR] Nobody is listening. Use #talk <name> first.");
            continue;
        };
        let speaker = character.name.to_uppercase();

        print!("[PROCESSING]");
        stdout.flush().ok();

        let outcome = session.send(backend.as_ref(), line).await;

        // Clear the processing indicator
        print!("\r            \r");
        stdout.flush().ok();

        match &outcome {
            SendOutcome::Replied { text, .. } => {
                println!("[{speaker}]");
                println!("{text}");
            }
            SendOutcome::Fallback { text, error, .. } => {
                println!("[{speaker}]");
                println!("{text}");
                println!("[WARN] No answer from the collaborator: {error}");
            }
            SendOutcome::Skipped | SendOutcome::Discarded { .. } => {}
        }
        println!();
        print_unlocks(&session, outcome.events());
        report_persist_error(&mut session);
    }

    Ok(())
}

/// Execute one `#` command. Returns false when the player quits.
async fn run_command(session: &mut GameSession, name: &str, rest: &str) -> bool {
    match name {
        "quit" | "exit" => {
            println!("Goodbye!");
            return false;
        }
        "talk" => {
            if rest.is_empty() {
                println!("[ERROR] Usage: #talk <name>");
                return true;
            }
            let Some(id) = resolve_suspect(session.scenario(), rest).map(|c| c.id.clone()) else {
                println!("[ERROR] No suspect matches '{rest}'");
                return true;
            };
            match session.open(&id).await {
                Ok(()) => {
                    if let Some(character) = session.active_character() {
                        println!("[TALKING] {} ({})", character.name, character.role);
                    }
                    for turn in session.history(&id) {
                        let who = match turn.role {
                            mystery_core::Speaker::Player => "YOU".to_string(),
                            mystery_core::Speaker::Character => session
                                .active_character()
                                .map(|c| c.name.to_uppercase())
                                .unwrap_or_default(),
                        };
                        println!("[{who}] {}", turn.text);
                    }
                }
                Err(e) => println!("[ERROR] {e}"),
            }
        }
        "back" => {
            session.close();
            println!("[TALKING] nobody");
        }
        "suspects" => print_suspects(session),
        "evidence" => {
            println!("[EVIDENCE]");
            let evidence = session.visible_evidence();
            if evidence.is_empty() {
                println!("  Nothing found yet.");
            }
            for item in evidence {
                println!("  {}: {}", item.name, item.description);
            }
        }
        "clues" => {
            println!("[CLUES]");
            let status = session.clue_status();
            if status.is_empty() {
                println!("  This case has no timed reports.");
            }
            for clue in status {
                match clue.countdown() {
                    None => println!("  {}: {}", clue.clue.title, clue.clue.content),
                    Some(remaining) => println!("  {} (arrives in {remaining})", clue.clue.title),
                }
            }
        }
        "accuse" => {
            let query = if rest.is_empty() {
                session.active_character().map(|c| c.id.clone())
            } else {
                Some(rest.to_string())
            };
            let Some(query) = query else {
                println!("[ERROR] Usage: #accuse <name>");
                return true;
            };
            match session.accuse(&query) {
                Ok(Verdict::Correct {
                    culprit_name, truth, ..
                }) => {
                    println!("[SOLVED] {culprit_name} is the culprit.");
                    println!("{truth}");
                }
                Ok(Verdict::Incorrect { message, .. }) => println!("[WRONG] {message}"),
                Err(e) => println!("[ERROR] {e}"),
            }
        }
        "reset" => match session.reset().await {
            Ok(()) => println!("[RESET] The case starts over."),
            Err(e) => println!("[ERROR] Reset failed: {e}"),
        },
        "status" => {
            let scenario = session.scenario();
            let elapsed = session.elapsed_ms() / 1000;
            println!("[STATUS]");
            println!("  Case: {}", scenario.case.title);
            println!("  Elapsed: {}:{:02}", elapsed / 60, elapsed % 60);
            println!(
                "  Talking to: {}",
                session
                    .active_character()
                    .map(|c| c.name.as_str())
                    .unwrap_or("nobody")
            );
            println!(
                "  Evidence: {}/{}",
                session.visible_evidence().len(),
                scenario.evidences.len()
            );
            println!(
                "  Reports: {}/{}",
                session.unlocked_clues().len(),
                scenario.time_clues.len()
            );
        }
        "help" => {
            println!("[HELP]");
            print_commands();
            println!("  (anything else is said to the current suspect)");
        }
        _ => println!("[ERROR] Unknown command. Type #help for help."),
    }
    true
}

fn print_commands() {
    for (usage, description) in COMMANDS {
        println!("  {usage:<16} - {description}");
    }
}

fn print_suspects(session: &GameSession) {
    println!("Suspects:");
    for character in &session.scenario().characters {
        println!("  {} ({}) [{}]", character.name, character.role, character.id);
    }
}

fn print_unlocks(session: &GameSession, events: &[UnlockEvent]) {
    for event in events {
        if let Some(notice) = unlock_notice(session.scenario(), event) {
            println!("[UNLOCKED] {notice}");
        }
    }
}

fn report_persist_error(session: &mut GameSession) {
    if let Some(error) = session.take_persist_error() {
        println!("[WARN] Progress could not be saved: {error}");
    }
}
