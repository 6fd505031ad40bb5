//! Accusation verdicts.

use thiserror::Error;

use crate::scenario::{Character, Scenario};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccuseError {
    #[error("no suspect matches '{0}'")]
    NoSuchSuspect(String),
}

/// The result of naming a suspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Correct {
        culprit_id: String,
        culprit_name: String,
        truth: String,
    },
    Incorrect {
        accused_id: String,
        accused_name: String,
        message: String,
    },
}

impl Verdict {
    pub fn is_correct(&self) -> bool {
        matches!(self, Verdict::Correct { .. })
    }
}

/// Judge an accusation against the scenario's culprit.
///
/// `query` may be a character id, a name, or part of a name or role. A
/// wrong guess does not end the game; the player may accuse again.
pub fn accuse(scenario: &Scenario, query: &str) -> Result<Verdict, AccuseError> {
    let accused = resolve_suspect(scenario, query)
        .ok_or_else(|| AccuseError::NoSuchSuspect(query.trim().to_string()))?;

    let verdict = if accused.id == scenario.case.culprit {
        Verdict::Correct {
            culprit_id: accused.id.clone(),
            culprit_name: accused.name.clone(),
            truth: scenario.case.truth.clone(),
        }
    } else {
        Verdict::Incorrect {
            accused_id: accused.id.clone(),
            accused_name: accused.name.clone(),
            message: format!("Wrong! {} is not the culprit.", accused.name),
        }
    };

    tracing::info!(accused = %accused.id, correct = verdict.is_correct(), "accusation made");
    Ok(verdict)
}

/// Find the character a free-form query refers to.
pub fn resolve_suspect<'a>(scenario: &'a Scenario, query: &str) -> Option<&'a Character> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    if let Some(character) = scenario.character(query) {
        return Some(character);
    }

    let needle = query.to_lowercase();
    let characters = &scenario.characters;

    characters
        .iter()
        .find(|c| c.name.to_lowercase() == needle)
        .or_else(|| {
            characters.iter().find(|c| {
                let name = c.name.to_lowercase();
                let role = c.role.to_lowercase();
                needle.contains(&name)
                    || name.contains(&needle)
                    || (!role.is_empty() && role.contains(&needle))
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_scenario;

    #[test]
    fn test_accuse_culprit_by_id() {
        let scenario = sample_scenario().unwrap();
        let verdict = accuse(&scenario, "gardener").unwrap();
        assert!(verdict.is_correct());
        match verdict {
            Verdict::Correct { truth, .. } => assert_eq!(truth, scenario.case.truth),
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[test]
    fn test_accuse_wrong_names_the_accused() {
        let scenario = sample_scenario().unwrap();
        match accuse(&scenario, "Martha Bell").unwrap() {
            Verdict::Incorrect { accused_id, message, .. } => {
                assert_eq!(accused_id, "cook");
                assert_eq!(message, "Wrong! Martha Bell is not the culprit.");
            }
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[test]
    fn test_resolution_order() {
        let scenario = sample_scenario().unwrap();
        assert_eq!(resolve_suspect(&scenario, "ivy shaw").unwrap().id, "maid");
        assert_eq!(resolve_suspect(&scenario, "reed").unwrap().id, "gardener");
        assert_eq!(resolve_suspect(&scenario, "I accuse Tom Reed!").unwrap().id, "gardener");
        assert_eq!(resolve_suspect(&scenario, "COOK").unwrap().id, "cook");
    }

    #[test]
    fn test_no_such_suspect() {
        let scenario = sample_scenario().unwrap();
        assert_eq!(
            accuse(&scenario, "the butler"),
            Err(AccuseError::NoSuchSuspect("the butler".to_string()))
        );
        assert!(accuse(&scenario, "  ").is_err());
    }

    #[test]
    fn test_repeated_accusations_are_independent() {
        let scenario = sample_scenario().unwrap();
        assert!(!accuse(&scenario, "maid").unwrap().is_correct());
        assert!(accuse(&scenario, "gardener").unwrap().is_correct());
    }
}
