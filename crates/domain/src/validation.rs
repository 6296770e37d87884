//! Structural validation of game payloads.
//!
//! The validator reads a raw JSON payload and reports problems as data. It never
//! fails and never mutates its input; callers decide whether to proceed. Messages
//! are user-facing and matched on by the editors, so their wording is stable.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of validating one payload. `valid` is true iff `errors` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn from_parts(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// JSON truthiness: null, false, 0 and "" are falsy; arrays and objects are truthy even when empty.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).filter(|v| is_truthy(v))
}

/// Ids may be authored as strings or numbers.
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn validate_game_data(payload: &Value) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if !is_truthy(payload) {
        errors.push("游戏数据不能为空".to_string());
        return ValidationReport::from_parts(errors, Vec::new());
    }

    if field(payload, "game_title").is_none() && field(payload, "title").is_none() {
        errors.push("缺少游戏标题".to_string());
    }

    let branches = field(payload, "branches");
    let scenes = field(payload, "scenes");
    if branches.is_none() && scenes.is_none() {
        errors.push("缺少游戏分支或场景数据".to_string());
    }

    if let Some(branches) = branches {
        match branches.as_array() {
            None => errors.push("branches必须是数组".to_string()),
            Some(list) if list.is_empty() => warnings.push("游戏没有任何分支".to_string()),
            Some(list) => {
                validate_branches(list, &mut errors, &mut warnings);
                validate_connections(list, &mut errors, &mut warnings);
            }
        }
    }

    if let Some(scenes) = scenes {
        match scenes.as_object() {
            None => errors.push("scenes必须是对象".to_string()),
            Some(map) if map.is_empty() => warnings.push("游戏没有任何场景".to_string()),
            Some(_) => {}
        }
    }

    ValidationReport::from_parts(errors, warnings)
}

fn validate_branches(branches: &[Value], errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    let mut seen = HashSet::new();

    for (index, branch) in branches.iter().enumerate() {
        let position = index + 1;
        let branch_id = branch.get("branch_id").and_then(id_text);
        let label = branch_id.clone().unwrap_or_else(|| position.to_string());

        match &branch_id {
            None => errors.push(format!("分支 {} 缺少branch_id", position)),
            Some(id) if !seen.insert(id.clone()) => errors.push(format!("分支ID重复: {}", id)),
            Some(_) => {}
        }

        if field(branch, "chapter").is_none() && field(branch, "scene_detail").is_none() {
            errors.push(format!("分支 {} 缺少章节标题或场景描述", label));
        }

        let Some(choices) = branch.get("choices").and_then(Value::as_array) else {
            continue;
        };
        for (choice_index, choice) in choices.iter().enumerate() {
            let choice_position = choice_index + 1;
            if field(choice, "choice").is_none() && field(choice, "text").is_none() {
                errors.push(format!(
                    "分支 {} 的选择项 {} 缺少choice字段",
                    label, choice_position
                ));
            }
            if field(choice, "next_branch").is_none() && field(choice, "end_game").is_none() {
                warnings.push(format!(
                    "分支 {} 的选择项 {} 没有next_branch也没有end_game标记",
                    label, choice_position
                ));
            }
        }
    }
}

/// Dangling `next_branch` targets are errors; unreachable branches are warnings.
fn validate_connections(branches: &[Value], errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    let branch_ids: Vec<String> = branches
        .iter()
        .filter_map(|b| b.get("branch_id").and_then(id_text))
        .collect();
    let start = branches
        .first()
        .and_then(|b| b.get("branch_id"))
        .and_then(id_text);

    let mut referenced: Vec<String> = Vec::new();
    for choice in branches
        .iter()
        .filter_map(|b| b.get("choices").and_then(Value::as_array))
        .flatten()
    {
        if let Some(target) = choice.get("next_branch").and_then(id_text) {
            if !referenced.contains(&target) {
                referenced.push(target);
            }
        }
    }

    let mut orphaned: Vec<&str> = Vec::new();
    for id in &branch_ids {
        if Some(id) != start.as_ref() && !referenced.contains(id) && !orphaned.contains(&id.as_str()) {
            orphaned.push(id);
        }
    }
    if !orphaned.is_empty() {
        warnings.push(format!("发现孤立分支: {}", orphaned.join(", ")));
    }

    let missing: Vec<&str> = referenced
        .iter()
        .filter(|target| !branch_ids.contains(target))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        errors.push(format!("引用了不存在的分支: {}", missing.join(", ")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn branch(id: &str, next: &str) -> Value {
        json!({
            "branch_id": id,
            "chapter": format!("章节{id}"),
            "scene_detail": "……",
            "choices": [{"id": "c", "choice": "继续", "next_branch": next}]
        })
    }

    #[test]
    fn null_payload_has_single_error() {
        let report = validate_game_data(&Value::Null);
        assert_eq!(
            report,
            ValidationReport {
                valid: false,
                errors: vec!["游戏数据不能为空".to_string()],
                warnings: vec![],
            }
        );
    }

    #[test]
    fn minimal_game_is_valid() {
        let report = validate_game_data(&json!({
            "game_title": "测试游戏",
            "branches": [{"branch_id": "b1", "chapter": "c1", "scene_detail": "d1", "choices": []}]
        }));
        assert!(report.valid, "{:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn missing_title_and_content() {
        let report = validate_game_data(&json!({"description": "x"}));
        assert!(!report.valid);
        assert_eq!(report.errors, vec!["缺少游戏标题", "缺少游戏分支或场景数据"]);
    }

    #[test]
    fn title_alias_is_accepted() {
        let report = validate_game_data(&json!({"title": "t", "scenes": {"a": {}}}));
        assert!(report.valid);
    }

    #[test]
    fn branches_must_be_an_array() {
        let report = validate_game_data(&json!({"title": "t", "branches": {"a": 1}}));
        assert_eq!(report.errors, vec!["branches必须是数组"]);
    }

    #[test]
    fn empty_branches_only_warn() {
        let report = validate_game_data(&json!({"title": "t", "branches": []}));
        assert!(report.valid);
        assert_eq!(report.warnings, vec!["游戏没有任何分支"]);
    }

    #[test]
    fn branch_level_errors() {
        let report = validate_game_data(&json!({
            "title": "t",
            "branches": [
                {"chapter": "no id"},
                {"branch_id": "a", "scene_detail": "x"},
                {"branch_id": "a"}
            ]
        }));

        assert!(report.errors.contains(&"分支 1 缺少branch_id".to_string()));
        assert!(report.errors.contains(&"分支ID重复: a".to_string()));
        assert!(report.errors.contains(&"分支 a 缺少章节标题或场景描述".to_string()));
    }

    #[test]
    fn choice_level_rules() {
        let report = validate_game_data(&json!({
            "title": "t",
            "branches": [{
                "branch_id": "a",
                "chapter": "c",
                "choices": [
                    {"id": "1", "next_branch": "a"},
                    {"id": "2", "text": "alt text"},
                    {"id": "3", "choice": "end", "end_game": true}
                ]
            }]
        }));

        assert_eq!(report.errors, vec!["分支 a 的选择项 1 缺少choice字段"]);
        assert_eq!(
            report.warnings,
            vec!["分支 a 的选择项 2 没有next_branch也没有end_game标记"]
        );
    }

    #[test]
    fn dangling_references_and_orphans() {
        let report = validate_game_data(&json!({
            "title": "t",
            "branches": [branch("start", "ghost"), branch("lonely", "other"), branch("island", "start")]
        }));

        assert!(!report.valid);
        assert_eq!(report.errors, vec!["引用了不存在的分支: ghost, other"]);
        assert_eq!(report.warnings, vec!["发现孤立分支: lonely, island"]);
    }

    #[test]
    fn start_branch_is_never_orphaned() {
        let report = validate_game_data(&json!({
            "title": "t",
            "branches": [branch("start", "next"), branch("next", "start")]
        }));
        assert!(report.valid);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn scenes_must_be_an_object() {
        let report = validate_game_data(&json!({"title": "t", "scenes": "nope"}));
        assert_eq!(report.errors, vec!["scenes必须是对象"]);

        let empty = validate_game_data(&json!({"title": "t", "scenes": {}}));
        assert!(empty.valid);
        assert_eq!(empty.warnings, vec!["游戏没有任何场景"]);
    }

    #[test]
    fn validation_does_not_mutate_input() {
        let payload = json!({"title": "t", "branches": [branch("a", "b")]});
        let before = payload.clone();
        let _ = validate_game_data(&payload);
        assert_eq!(payload, before);
    }
}
