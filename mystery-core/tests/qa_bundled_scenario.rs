//! QA tests for the scenario shipped with the game.
//!
//! Run with: `cargo test -p mystery-core --test qa_bundled_scenario`

use mystery_core::testing::TestHarness;
use mystery_core::{Scenario, UnlockCondition, Verdict};
use std::path::PathBuf;
use std::time::Duration;

fn case_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../scenarios/case1.json")
}

#[tokio::test]
async fn test_bundled_case_loads_with_character_files() {
    let scenario = Scenario::load(case_path())
        .await
        .expect("bundled scenario should load");

    assert_eq!(scenario.case.title, "Death at Marlow House");
    let ids: Vec<_> = scenario.characters.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["butler", "niece", "doctor"]);
    assert!(scenario.character(&scenario.case.culprit).is_some());
    assert_eq!(
        scenario.evidence("e_teacup").map(|e| &e.unlock_condition),
        Some(&UnlockCondition::AtStart)
    );
}

#[tokio::test]
async fn test_bundled_case_plays_through() {
    let scenario = Scenario::load(case_path()).await.unwrap();
    let mut harness = TestHarness::with_scenario(scenario).await.unwrap();
    assert_eq!(harness.evidence_ids(), vec!["e_teacup".to_string()]);

    harness.talk_to("niece").await.unwrap();
    harness.expect_reply("There was a little bottle by the ferns. [UNLOCK:vial_seen]");
    harness.say("Did you go anywhere after ten?").await;
    assert!(harness.evidence_ids().contains(&"e_vial".to_string()));

    harness.talk_to("butler").await.unwrap();
    harness.expect_reply("He did sign a new will this morning, sir. [UNLOCK:will_changed]");
    harness.say("Any changes to his affairs recently?").await;
    assert!(harness.evidence_ids().contains(&"e_will".to_string()));

    harness.advance(Duration::from_secs(10 * 60));
    assert_eq!(harness.tick().await.len(), 2);

    assert!(matches!(
        harness.session.accuse("Price").unwrap(),
        Verdict::Correct { ref culprit_id, .. } if culprit_id == "doctor"
    ));
}
