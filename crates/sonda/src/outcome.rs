//! ResultInterpreter - the app's outcome vocabulary as a typed value.
//!
//! The hook answers with a handful of strings: `OK`, `OK:<payload>`, `YES`,
//! `NO` and `ERROR: <message>`. Callers say which shape they expect and get
//! an [`Outcome`] back; the raw strings do not travel further than this
//! module.

use crate::command::RawResult;

const OK: &str = "OK";
const OK_PREFIX: &str = "OK:";
const ERROR_PREFIX: &str = "ERROR:";
const YES: &str = "YES";
const NO: &str = "NO";

/// Shape of answer a capability is expected to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// `OK` or an error
    Unit,
    /// `YES`, `NO` or an error
    Boolean,
    /// `OK:<payload>` or an error
    Payload,
}

/// Interpreted answer from the app
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The command succeeded
    Success,
    /// The command succeeded and returned a payload
    Payload(String),
    /// Tri-state answer resolved to a boolean
    Bool(bool),
    /// The app reported a failure
    Failure(String),
    /// The answer is outside the vocabulary for the expected shape
    ProtocolViolation(String),
}

impl Outcome {
    /// Whether this is a success of any kind
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::Payload(_) | Self::Bool(_))
    }

    /// Whether the app reported exactly this failure message
    ///
    /// Lets a single call treat one known failure as the expected negative
    /// outcome without changing the interpretation rules.
    #[must_use]
    pub fn is_failure_with(&self, message: &str) -> bool {
        matches!(self, Self::Failure(m) if m == message)
    }
}

/// Interpret a raw result against the expected shape
///
/// Pure function of its inputs. A non-string value is always a protocol
/// violation.
#[must_use]
pub fn interpret(raw: &RawResult, shape: Shape) -> Outcome {
    let Some(text) = raw.as_str() else {
        return Outcome::ProtocolViolation(raw.to_string());
    };

    if let Some(message) = text.strip_prefix(ERROR_PREFIX) {
        return Outcome::Failure(message.trim_start().to_string());
    }

    match shape {
        Shape::Unit if text == OK => Outcome::Success,
        Shape::Boolean if text == YES => Outcome::Bool(true),
        Shape::Boolean if text == NO => Outcome::Bool(false),
        Shape::Payload => match text.strip_prefix(OK_PREFIX) {
            Some(payload) => Outcome::Payload(payload.to_string()),
            None => Outcome::ProtocolViolation(text.to_string()),
        },
        _ => Outcome::ProtocolViolation(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn raw(s: &str) -> RawResult {
        RawResult::from(s)
    }

    mod vocabulary_tests {
        use super::*;

        #[test]
        fn test_unit_ok() {
            assert_eq!(interpret(&raw("OK"), Shape::Unit), Outcome::Success);
        }

        #[test]
        fn test_payload_exact_remainder() {
            assert_eq!(
                interpret(&raw("OK:header text"), Shape::Payload),
                Outcome::Payload("header text".to_string())
            );
            assert_eq!(
                interpret(&raw("OK: padded "), Shape::Payload),
                Outcome::Payload(" padded ".to_string())
            );
            assert_eq!(
                interpret(&raw("OK:"), Shape::Payload),
                Outcome::Payload(String::new())
            );
        }

        #[test]
        fn test_boolean() {
            assert_eq!(interpret(&raw("YES"), Shape::Boolean), Outcome::Bool(true));
            assert_eq!(interpret(&raw("NO"), Shape::Boolean), Outcome::Bool(false));
        }

        #[test]
        fn test_error_message() {
            for shape in [Shape::Unit, Shape::Boolean, Shape::Payload] {
                assert_eq!(
                    interpret(&raw("ERROR: not found"), shape),
                    Outcome::Failure("not found".to_string())
                );
            }
        }

        #[test]
        fn test_garbage_is_protocol_violation() {
            for shape in [Shape::Unit, Shape::Boolean, Shape::Payload] {
                assert_eq!(
                    interpret(&raw("garbage"), shape),
                    Outcome::ProtocolViolation("garbage".to_string())
                );
            }
        }

        #[test]
        fn test_shape_mismatch_is_protocol_violation() {
            assert!(matches!(
                interpret(&raw("YES"), Shape::Unit),
                Outcome::ProtocolViolation(_)
            ));
            assert!(matches!(
                interpret(&raw("OK"), Shape::Boolean),
                Outcome::ProtocolViolation(_)
            ));
            assert!(matches!(
                interpret(&raw("OK"), Shape::Payload),
                Outcome::ProtocolViolation(_)
            ));
            assert!(matches!(
                interpret(&raw("ok"), Shape::Unit),
                Outcome::ProtocolViolation(_)
            ));
        }

        #[test]
        fn test_non_string_values() {
            for value in [json!(null), json!(true), json!(1), json!({"a": 1})] {
                let outcome = interpret(&RawResult::new(value), Shape::Unit);
                assert!(matches!(outcome, Outcome::ProtocolViolation(_)));
            }
        }

        #[test]
        fn test_expected_failure_predicate() {
            let outcome = interpret(
                &raw("ERROR: All items are already loaded."),
                Shape::Unit,
            );
            assert!(outcome.is_failure_with("All items are already loaded."));
            assert!(!outcome.is_failure_with("Something else"));
            assert!(!Outcome::Success.is_failure_with("All items are already loaded."));
        }
    }

    proptest! {
        #[test]
        fn prop_unknown_strings_never_succeed(s in "\\PC*") {
            prop_assume!(!matches!(s.as_str(), "OK" | "YES" | "NO"));
            prop_assume!(!s.starts_with("OK:") && !s.starts_with("ERROR:"));
            for shape in [Shape::Unit, Shape::Boolean, Shape::Payload] {
                let outcome = interpret(&raw(&s), shape);
                prop_assert_eq!(outcome, Outcome::ProtocolViolation(s.clone()));
            }
        }

        #[test]
        fn prop_payload_is_exact_suffix(payload in "\\PC*") {
            let text = format!("OK:{payload}");
            prop_assert_eq!(interpret(&raw(&text), Shape::Payload), Outcome::Payload(payload));
        }
    }
}
