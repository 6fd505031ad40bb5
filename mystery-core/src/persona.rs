//! Persona rendering for the chat collaborator.

use crate::directive::directive;
use crate::scenario::{Character, Evidence, TimeClue};

/// Render the system prompt for a character.
///
/// Deterministic: the same character, evidence and clues always produce the
/// same text. `evidence` and `clues` are what the investigator has found so
/// far, in the order they should be listed.
pub fn build_persona(character: &Character, evidence: &[&Evidence], clues: &[&TimeClue]) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!("You are {}", character.name));
    if !character.role.is_empty() {
        prompt.push_str(&format!(", {}", character.role));
    }
    prompt.push_str(
        ". An investigator is questioning you about a crime. \
         Answer as this person would, in plain spoken dialogue.\n",
    );

    if let Some(world_view) = non_empty(character.world_view.as_deref()) {
        prompt.push_str("\n## World View\n");
        prompt.push_str(world_view);
        prompt.push('\n');
    }

    if let Some(background) = non_empty(character.background.as_deref()) {
        prompt.push_str("\n## Background\n");
        prompt.push_str(background);
        prompt.push('\n');
    }

    push_list(&mut prompt, "Personality", &character.personality);
    push_list(&mut prompt, "Speech Style", &character.language_style);

    let rules = &character.lying_rules;
    if !rules.allowed.is_empty() || !rules.forbidden.is_empty() {
        prompt.push_str("\n## Lying Rules\n");
        for item in &rules.allowed {
            prompt.push_str(&format!("- You may lie about: {item}\n"));
        }
        for item in &rules.forbidden {
            prompt.push_str(&format!("- You must never lie about: {item}\n"));
        }
    }

    let has_tags = character.secrets.iter().any(|s| s.unlock_flag().is_some());
    if !character.secrets.is_empty() {
        prompt.push_str("\n## Secrets\n");
        for secret in &character.secrets {
            match secret.unlock_flag() {
                Some(flag) => {
                    prompt.push_str(&format!("- {} {}\n", secret.content(), directive(flag)))
                }
                None => prompt.push_str(&format!("- {}\n", secret.content())),
            }
        }
    }

    if !character.timeline.is_empty() {
        prompt.push_str("\n## Timeline\n");
        for entry in &character.timeline {
            prompt.push_str(&format!("- {}: {}\n", entry.time, entry.action));
        }
    }

    prompt.push_str("\n## What the Investigator Knows\n");
    if evidence.is_empty() && clues.is_empty() {
        prompt.push_str("Nothing has been found yet.\n");
    }
    for item in evidence {
        prompt.push_str(&format!("- Evidence: {}. {}\n", item.name, item.description));
    }
    for clue in clues {
        prompt.push_str(&format!("- Report: {}. {}\n", clue.title, clue.content));
    }

    prompt.push('\n');
    prompt.push_str(include_str!("prompts/reply_rules.txt"));

    if has_tags {
        prompt.push('\n');
        prompt.push_str(include_str!("prompts/unlock_protocol.txt"));
    }

    if let Some(custom) = non_empty(character.system_prompt.as_deref()) {
        prompt.push_str("\n## Additional Instructions\n");
        prompt.push_str(custom);
        prompt.push('\n');
    }

    prompt
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

fn push_list(prompt: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    prompt.push_str(&format!("\n## {heading}\n"));
    for item in items {
        prompt.push_str(&format!("- {item}\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_scenario;

    #[test]
    fn test_persona_is_deterministic() {
        let scenario = sample_scenario().unwrap();
        let cook = scenario.character("cook").unwrap();
        let knife = scenario.evidence("e_knife").unwrap();

        let a = build_persona(cook, &[knife], &[]);
        let b = build_persona(cook, &[knife], &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_persona_contains_sections() {
        let scenario = sample_scenario().unwrap();
        let gardener = scenario.character("gardener").unwrap();
        let persona = build_persona(gardener, &[], &[]);

        assert!(persona.starts_with("You are Tom Reed, Gardener."));
        assert!(persona.contains("## Personality"));
        assert!(persona.contains("## Lying Rules"));
        assert!(persona.contains("[UNLOCK:boots_muddy]"));
        assert!(persona.contains("## Revealing Secrets"));
        assert!(persona.contains("Nothing has been found yet."));
    }

    #[test]
    fn test_persona_lists_known_items() {
        let scenario = sample_scenario().unwrap();
        let cook = scenario.character("cook").unwrap();
        let knife = scenario.evidence("e_knife").unwrap();
        let clue = scenario.time_clue("c_weather").unwrap();

        let persona = build_persona(cook, &[knife], &[clue]);
        assert!(persona.contains(&format!("- Evidence: {}.", knife.name)));
        assert!(persona.contains(&format!("- Report: {}.", clue.title)));
        assert!(!persona.contains("Nothing has been found yet."));
    }

    #[test]
    fn test_persona_appends_custom_prompt() {
        let scenario = sample_scenario().unwrap();
        let mut maid = scenario.character("maid").unwrap().clone();
        maid.system_prompt = Some("Always mention the weather.".to_string());
        maid.secrets.clear();

        let persona = build_persona(&maid, &[], &[]);
        assert!(persona.trim_end().ends_with("Always mention the weather."));
        assert!(!persona.contains("## Revealing Secrets"));
    }
}
