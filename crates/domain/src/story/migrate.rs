//! Legacy field migration

use serde_json::{Map, Value};

/// Rewrite alternate field names into the canonical ones.
///
/// Returns a new value; the input is left untouched. A legacy key is only moved when
/// its canonical counterpart is absent, so canonical payloads pass through unchanged.
///
/// | level | legacy | canonical |
/// |---|---|---|
/// | game | `title` | `game_title` |
/// | branch | `id` | `branch_id` |
/// | branch | `branch_title`, `title` | `chapter` |
/// | branch | `content`, `text` | `scene_detail` |
/// | branch | `options` | `choices` |
/// | choice | `option_id`, `optionId` | `id` |
/// | choice | `option_text`, `text` | `choice` |
/// | choice | `target_branch_id`, `target` | `next_branch` |
/// | status change | `state_id` | `attribute` |
/// | status change | `add` `subtract` `multiply` `divide` `set` | `+` `-` `*` `/` `=` |
pub fn migrate_legacy_fields(payload: &Value) -> Value {
    let mut migrated = payload.clone();
    let Some(root) = migrated.as_object_mut() else {
        return migrated;
    };

    move_field(root, "title", "game_title");

    if let Some(Value::Array(branches)) = root.get_mut("branches") {
        for branch in branches.iter_mut().filter_map(Value::as_object_mut) {
            migrate_branch(branch);
        }
    }

    migrated
}

fn migrate_branch(branch: &mut Map<String, Value>) {
    move_field(branch, "id", "branch_id");
    move_field(branch, "branch_title", "chapter");
    move_field(branch, "title", "chapter");
    move_field(branch, "content", "scene_detail");
    move_field(branch, "text", "scene_detail");
    move_field(branch, "options", "choices");

    if let Some(Value::Array(choices)) = branch.get_mut("choices") {
        for choice in choices.iter_mut().filter_map(Value::as_object_mut) {
            migrate_choice(choice);
        }
    }
}

fn migrate_choice(choice: &mut Map<String, Value>) {
    move_field(choice, "option_id", "id");
    move_field(choice, "optionId", "id");
    move_field(choice, "option_text", "choice");
    move_field(choice, "text", "choice");
    move_field(choice, "target_branch_id", "next_branch");
    move_field(choice, "target", "next_branch");

    if let Some(Value::Array(changes)) = choice.get_mut("status_changes") {
        for change in changes.iter_mut().filter_map(Value::as_object_mut) {
            move_field(change, "state_id", "attribute");
            let symbol = change
                .get("operation")
                .and_then(Value::as_str)
                .and_then(operation_symbol);
            if let Some(symbol) = symbol {
                change.insert("operation".to_string(), Value::String(symbol.to_string()));
            }
        }
    }
}

fn operation_symbol(word: &str) -> Option<&'static str> {
    match word {
        "add" => Some("+"),
        "subtract" => Some("-"),
        "multiply" => Some("*"),
        "divide" => Some("/"),
        "set" => Some("="),
        _ => None,
    }
}

fn move_field(map: &mut Map<String, Value>, from: &str, to: &str) {
    if map.contains_key(to) {
        return;
    }
    if let Some(value) = map.remove(from) {
        map.insert(to.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_payload_is_unchanged() {
        let payload = json!({
            "game_title": "t",
            "branches": [{"branch_id": "a", "chapter": "c", "scene_detail": "d",
                          "choices": [{"id": "1", "choice": "go", "next_branch": "a"}]}]
        });
        assert_eq!(migrate_legacy_fields(&payload), payload);
    }

    #[test]
    fn status_changes_are_rewritten() {
        let payload = json!({
            "branches": [{"branch_id": "a", "options": [{
                "option_text": "跑",
                "status_changes": [
                    {"state_id": "exposure", "operation": "add", "value": 5},
                    {"state_id": "shame", "operation": "set", "value": 0}
                ]
            }]}]
        });

        let migrated = migrate_legacy_fields(&payload);
        let changes = &migrated["branches"][0]["choices"][0]["status_changes"];

        assert_eq!(changes[0]["attribute"], "exposure");
        assert_eq!(changes[0]["operation"], "+");
        assert_eq!(changes[1]["operation"], "=");
        assert!(changes[0].get("state_id").is_none());
    }

    #[test]
    fn input_is_not_mutated() {
        let payload = json!({"title": "x"});
        let before = payload.clone();
        let migrated = migrate_legacy_fields(&payload);
        assert_eq!(payload, before);
        assert_eq!(migrated["game_title"], "x");
    }

    #[test]
    fn canonical_wins_when_both_are_present() {
        let payload = json!({"title": "legacy", "game_title": "canonical"});
        let migrated = migrate_legacy_fields(&payload);
        assert_eq!(migrated["game_title"], "canonical");
        assert_eq!(migrated["title"], "legacy");
    }

    #[test]
    fn non_objects_pass_through() {
        assert_eq!(migrate_legacy_fields(&json!([1, 2])), json!([1, 2]));
        assert_eq!(migrate_legacy_fields(&Value::Null), Value::Null);
    }
}
