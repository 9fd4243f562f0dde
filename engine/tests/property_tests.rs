use delve_engine::fs_guard::PathGuard;
use delve_engine::protocol::{extract, ParsedCall};
use proptest::prelude::*;
use tempfile::TempDir;

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,8}".prop_map(String::from),
        Just("..".to_string()),
        Just(".".to_string()),
    ]
}

proptest! {
    // Whatever the input, a resolved path never leaves the root
    #[test]
    fn test_resolved_paths_stay_inside_root(segments in prop::collection::vec(segment(), 1..8)) {
        let temp = TempDir::new().unwrap();
        let guard = PathGuard::new(temp.path()).unwrap();
        let relative = segments.join("/");

        if let Ok(resolved) = guard.resolve(&relative) {
            prop_assert!(resolved.starts_with(guard.root()));
        }
    }

    // A `..` segment anywhere is refused, even when it would stay inside
    #[test]
    fn test_parent_segment_always_rejected(
        before in prop::collection::vec("[a-z]{1,8}", 0..4),
        after in prop::collection::vec("[a-z]{1,8}", 0..4),
    ) {
        let temp = TempDir::new().unwrap();
        let guard = PathGuard::new(temp.path()).unwrap();
        let relative = before
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(".."))
            .chain(after.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("/");

        prop_assert!(guard.resolve(&relative).is_err());
    }

    // Plain names always resolve to a child of the root
    #[test]
    fn test_plain_names_resolve(segments in prop::collection::vec("[a-z]{1,8}", 1..6)) {
        let temp = TempDir::new().unwrap();
        let guard = PathGuard::new(temp.path()).unwrap();
        let relative = segments.join("/");

        let resolved = guard.resolve(&relative).unwrap();
        prop_assert_eq!(guard.relative_display(&resolved), relative);
    }

    // Extraction never panics and finds one call per well-formed block
    #[test]
    fn test_extract_counts_blocks(
        prefix in "[a-zA-Z .,]{0,40}",
        names in prop::collection::vec("[A-Z][a-z]{1,8}", 0..5),
    ) {
        let mut text = prefix.clone();
        for name in &names {
            text.push_str(&format!(
                "<tool_call>{{\"name\": \"{}\", \"parameters\": {{}}}}</tool_call>",
                name
            ));
        }

        let reply = extract(&text);
        prop_assert_eq!(reply.calls.len(), names.len());
        for (parsed, name) in reply.calls.iter().zip(&names) {
            match parsed {
                ParsedCall::Valid(call) => prop_assert_eq!(&call.name, name),
                ParsedCall::Malformed { .. } => prop_assert!(false, "unexpected malformed call"),
            }
        }
        prop_assert_eq!(reply.text, prefix.trim());
    }

    // Arbitrary text never panics and extraction is deterministic
    #[test]
    fn test_extract_is_deterministic(text in ".{0,200}") {
        prop_assert_eq!(extract(&text), extract(&text));
    }
}
