use super::{is_safe_session_id, SessionId, SESSION_ID_MAX_LEN};
use proptest::prelude::*;

#[yare::parameterized(
    simple          = { "abc",                true  },
    with_dots       = { "a.b.c",              true  },
    with_dash       = { "ses-1234",           true  },
    with_underscore = { "a_b",                true  },
    single_char     = { "x",                  true  },
    digit_start     = { "9lives",             true  },
    empty           = { "",                   false },
    leading_dot     = { ".hidden",            false },
    leading_dash    = { "-flag",              false },
    dotdot          = { "a..b",               false },
    slash           = { "a/b",                false },
    backslash       = { "a\\b",               false },
    space           = { "a b",                false },
    unicode         = { "séance",             false },
    null_byte       = { "a\0b",               false },
)]
fn safety_cases(input: &str, ok: bool) {
    assert_eq!(is_safe_session_id(input), ok, "input: {input:?}");
}

#[test]
fn length_boundary() {
    let exactly_128 = format!("a{}", "b".repeat(SESSION_ID_MAX_LEN - 1));
    assert_eq!(exactly_128.len(), 128);
    assert!(is_safe_session_id(&exactly_128));

    let too_long = format!("a{}", "b".repeat(SESSION_ID_MAX_LEN));
    assert_eq!(too_long.len(), 129);
    assert!(!is_safe_session_id(&too_long));
}

#[test]
fn generated_ids_are_safe() {
    for _ in 0..64 {
        let id = SessionId::generate();
        assert!(is_safe_session_id(id.as_str()), "unsafe id: {id}");
    }
}

#[test]
fn parse_rejects_unsafe() {
    assert!(SessionId::parse("ok-id").is_ok());
    assert!(SessionId::parse("../etc/passwd").is_err());
}

#[test]
fn deserialize_revalidates() {
    let ok: Result<SessionId, _> = serde_json::from_str("\"fine.id\"");
    assert!(ok.is_ok());
    let bad: Result<SessionId, _> = serde_json::from_str("\"../sneaky\"");
    assert!(bad.is_err());
}

proptest! {
    /// Safe ids never contain path separators or parent references.
    #[test]
    fn safe_ids_have_no_path_tricks(s in "\\PC{0,140}") {
        if is_safe_session_id(&s) {
            prop_assert!(!s.contains('/'));
            prop_assert!(!s.contains('\\'));
            prop_assert!(!s.contains(".."));
            prop_assert!(s.len() <= SESSION_ID_MAX_LEN);
        }
    }

    /// Validation agrees with the documented character-class rules.
    #[test]
    fn safety_matches_charclass(s in "[A-Za-z0-9][A-Za-z0-9._-]{0,127}") {
        prop_assert_eq!(is_safe_session_id(&s), !s.contains(".."));
    }
}
