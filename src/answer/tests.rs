use super::*;
use crate::provider::Role;
use crate::retriever::Excerpt;
use std::cell::RefCell;

/// Records every conversation and replies with canned choices
struct ScriptedCompleter {
    choices: Vec<String>,
    seen: RefCell<Vec<Vec<ChatMessage>>>,
}

impl ScriptedCompleter {
    fn new(choices: &[&str]) -> Self {
        Self {
            choices: choices.iter().map(ToString::to_string).collect(),
            seen: RefCell::new(Vec::new()),
        }
    }
}

impl Completer for ScriptedCompleter {
    fn complete(&self, messages: &[ChatMessage]) -> Result<Vec<String>> {
        self.seen.borrow_mut().push(messages.to_vec());
        Ok(self.choices.clone())
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

struct FailingCompleter;

impl Completer for FailingCompleter {
    fn complete(&self, _messages: &[ChatMessage]) -> Result<Vec<String>> {
        Err(QaError::Completion("HTTP 503".to_string()))
    }

    fn model(&self) -> &str {
        "failing"
    }
}

fn pets() -> RetrievalResult {
    RetrievalResult {
        excerpts: vec![
            Excerpt {
                ordinal: 0,
                text: "A cat sat.".to_string(),
                distance: 0.2,
            },
            Excerpt {
                ordinal: 1,
                text: "A dog ran.".to_string(),
                distance: 0.3,
            },
        ],
    }
}

#[test]
fn prompt_contains_every_part() {
    let prompt = build_prompt("Why?", "Doc", "[1]. A cat sat.");

    assert!(prompt.contains("user query:\nWhy?"));
    assert!(prompt.contains("title of the paper:\nDoc"));
    assert!(prompt.contains("excerpts:\n[1]. A cat sat.\n---"));
    assert!(prompt.contains("cite the excerpts by its number"));
    assert!(prompt.contains("may not be relevant"));
}

#[test]
fn answer_appends_excerpts_after_first_choice() {
    let completer = ScriptedCompleter::new(&["Cats sit and dogs run [1][2].", "ignored"]);

    let text = answer("What do pets do?", "Doc", &pets(), &completer)
        .expect("answer should succeed");

    assert_eq!(
        text,
        "Cats sit and dogs run [1][2].\n--- EXCERPTS ---\n[1]. A cat sat.\n[2]. A dog ran."
    );
}

#[test]
fn one_user_message_is_sent() {
    let completer = ScriptedCompleter::new(&["ok"]);
    answer("What do pets do?", "Doc", &pets(), &completer).expect("answer should succeed");

    let seen = completer.seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].len(), 1);
    assert_eq!(seen[0][0].role, Role::User);
    assert_eq!(
        seen[0][0].content,
        build_prompt("What do pets do?", "Doc", "[1]. A cat sat.\n[2]. A dog ran.")
    );
}

#[test]
fn no_choices_is_a_completion_error() {
    let completer = ScriptedCompleter::new(&[]);
    assert!(matches!(
        answer("What?", "Doc", &pets(), &completer),
        Err(QaError::Completion(_))
    ));
}

#[test]
fn provider_failure_propagates() {
    match answer("What?", "Doc", &pets(), &FailingCompleter) {
        Err(QaError::Completion(message)) => assert!(message.contains("503")),
        other => panic!("expected completion error, got {other:?}"),
    }
}

#[test]
fn empty_choice_still_gets_excerpts() {
    let completer = ScriptedCompleter::new(&[""]);
    let text = answer("What?", "Doc", &pets(), &completer).expect("answer should succeed");
    assert!(text.starts_with(EXCERPTS_SEPARATOR));
}
