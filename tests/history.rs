//! Conversation memory integration tests

use parley::history::{ConversationHistory, Speaker, Turn};

#[test]
fn test_length_never_exceeds_cap() {
    let mut history = ConversationHistory::new(6);

    for i in 0..100 {
        let speaker = if i % 2 == 0 { Speaker::User } else { Speaker::Assistant };
        history.append(Turn::new(speaker, format!("turn {i}")));
        assert!(history.len() <= history.cap());
    }
}

#[test]
fn test_truncation_keeps_most_recent_in_original_order() {
    let mut history = ConversationHistory::new(4);

    for i in 0..9 {
        history.append(Turn::new(Speaker::User, format!("turn {i}")));
    }

    let texts: Vec<&str> = history.as_prompt_context().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, ["turn 5", "turn 6", "turn 7", "turn 8"]);
}

#[test]
fn test_chronological_order_preserved_across_speakers() {
    let mut history = ConversationHistory::new(10);
    history.append(Turn::new(Speaker::User, "question one"));
    history.append(Turn::new(Speaker::Assistant, "answer one"));
    history.append(Turn::new(Speaker::User, "question two"));
    history.append(Turn::new(Speaker::Assistant, "answer two"));

    let roles: Vec<&str> = history.as_prompt_context().map(|t| t.speaker.role()).collect();
    assert_eq!(roles, ["user", "assistant", "user", "assistant"]);

    let mut timestamps = history.as_prompt_context().map(|t| t.timestamp);
    let first = timestamps.next().unwrap();
    assert!(timestamps.all(|ts| ts >= first));
}

#[test]
fn test_reset_always_yields_empty_history() {
    for size in [0usize, 1, 5, 50] {
        let mut history = ConversationHistory::new(5);
        for i in 0..size {
            history.append(Turn::new(Speaker::User, format!("turn {i}")));
        }

        history.reset();
        assert!(history.is_empty());
        assert_eq!(history.as_prompt_context().count(), 0);
    }
}

#[test]
fn test_cap_of_one_keeps_only_latest() {
    let mut history = ConversationHistory::new(1);
    history.append(Turn::new(Speaker::User, "old"));
    history.append(Turn::new(Speaker::Assistant, "new"));

    assert_eq!(history.len(), 1);
    let turn = history.as_prompt_context().next().unwrap();
    assert_eq!(turn.text, "new");
    assert_eq!(turn.speaker, Speaker::Assistant);
}
