//! End-to-end behavior of the vault operations.

use codevault_core::{CodeVault, ManualClock, SaveOptions, StoreOptions, DEFAULT_HISTORY_LIMIT};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn vault(step: i64) -> CodeVault {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000, step));
    CodeVault::open_in_memory_with_options(StoreOptions::new().clock(clock)).unwrap()
}

#[test]
fn save_history_restore_scenario() {
    let vault = vault(1);
    let a = SaveOptions::new().filename("a");

    let first = vault.save_code("js", "print(1)", &a).unwrap().unwrap();
    assert_eq!(first.id, "js:a");
    assert_eq!(first.version, 1);
    assert_eq!(first.code, "print(1)");
    let history = vault.get_history("js", Some("a"), DEFAULT_HISTORY_LIMIT).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!((history[0].version, history[0].code.as_str()), (1, "print(1)"));

    let second = vault.save_code("js", "print(2)", &a).unwrap().unwrap();
    assert_eq!(second.version, 2);
    assert_eq!(second.code, "print(2)");
    assert_eq!(vault.get_history("js", Some("a"), DEFAULT_HISTORY_LIMIT).unwrap().len(), 2);

    let latest = vault.get_history("js", Some("a"), 1).unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].version, 2);

    let version_one = vault
        .get_history("js", Some("a"), DEFAULT_HISTORY_LIMIT)
        .unwrap()
        .into_iter()
        .find(|entry| entry.version == 1)
        .unwrap();
    vault.restore_from_history(version_one.id.unwrap()).unwrap().unwrap();

    let restored = vault.get_code_record("js", "a").unwrap().unwrap();
    assert_eq!(restored.code, "print(1)");
    assert_eq!(restored.version, 3);
    assert_eq!(restored.author, "restore");
    assert_eq!(vault.get_history("js", Some("a"), DEFAULT_HISTORY_LIMIT).unwrap().len(), 2);
}

#[test]
fn export_import_round_trip_preserves_every_record() {
    let source = vault(3);
    source.save_setting("theme", json!({"name": "dark", "contrast": 2})).unwrap();
    for (lang, filename, code) in [("js", "a", "1"), ("js", "a", "2"), ("rs", "main", "fn main() {}")] {
        source
            .save_code(lang, code, &SaveOptions::new().filename(filename).auto(true))
            .unwrap();
    }
    let snippet = source.save_snippet("rs", "test", "#[test]", ["attr"]).unwrap().unwrap();
    source.increment_snippet_usage(snippet).unwrap();

    let export = serde_json::to_value(source.export_database().unwrap()).unwrap();
    let target = vault(3);
    target.import_database(&export).unwrap();
    let again = serde_json::to_value(target.export_database().unwrap()).unwrap();

    for field in ["settings", "code", "history", "snippets"] {
        assert_eq!(again[field], export[field], "{field} differs after import");
    }
    assert_eq!(again["meta"]["storeName"], export["meta"]["storeName"]);
    assert_eq!(target.get_stats().unwrap(), source.get_stats().unwrap());
}

#[test]
fn stats_count_distinct_documents() {
    let vault = vault(1);
    for (lang, filename, code) in [
        ("js", "a", "1"),
        ("js", "a", "2"),
        ("js", "b", "1"),
        ("py", "a", "1"),
        ("js", "a", "2"),
    ] {
        vault
            .save_code(lang, code, &SaveOptions::new().filename(filename))
            .unwrap();
    }
    let stats = vault.get_stats().unwrap();
    assert_eq!(stats.code.count, 3);
    assert_eq!(stats.history.count, 4);
}

fn lang() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["js", "py", "rs"]).prop_map(str::to_string)
}

fn filename() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,6}").expect("valid regex")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn saved_code_loads_back(lang in lang(), filename in filename(), code in ".*") {
        let vault = vault(1);
        vault.save_code(&lang, &code, &SaveOptions::new().filename(filename.clone())).unwrap();
        prop_assert_eq!(vault.load_code(&lang, &filename).unwrap(), Some(code));
    }

    #[test]
    fn versions_follow_changes(codes in prop::collection::vec("[ab]{0,3}", 1..20)) {
        let vault = vault(1);
        let options = SaveOptions::new().filename("doc");
        let mut expected_version = 0;
        let mut last: Option<String> = None;
        let mut logged = 0;

        for code in &codes {
            let record = vault.save_code("js", code, &options).unwrap().unwrap();
            if last.as_deref() != Some(code.as_str()) {
                expected_version += 1;
                logged += 1;
            }
            prop_assert_eq!(record.version, expected_version);
            last = Some(code.clone());
        }
        prop_assert_eq!(vault.get_history("js", Some("doc"), usize::MAX).unwrap().len(), logged);
    }

    #[test]
    fn history_is_bounded_and_newest_first(
        saves in prop::collection::vec((0usize..3, 0i64..4), 1..40),
        limit in 0usize..10,
    ) {
        // A clock step of 0 plus explicit jumps produces both ties and gaps.
        let clock = Arc::new(ManualClock::new(0, 0));
        let vault = CodeVault::open_in_memory_with_options(
            StoreOptions::new().clock(clock.clone()),
        ).unwrap();
        let mut now = 0;
        for (i, (file, jump)) in saves.iter().enumerate() {
            now += jump;
            clock.set(now);
            let options = SaveOptions::new().filename(format!("f{file}")).skip_if_unchanged(false);
            vault.save_code("js", &i.to_string(), &options).unwrap();
        }

        for filename in [None, Some("f0"), Some("f1")] {
            let history = vault.get_history("js", filename, limit).unwrap();
            prop_assert!(history.len() <= limit);
            for pair in history.windows(2) {
                prop_assert!(pair[0].timestamp >= pair[1].timestamp);
                if pair[0].timestamp == pair[1].timestamp {
                    prop_assert!(pair[0].id > pair[1].id);
                }
            }
            if let Some(filename) = filename {
                prop_assert!(history.iter().all(|entry| entry.filename == filename));
            }
        }
    }
}
