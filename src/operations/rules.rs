//! Parameter rules per operation type.
//!
//! Each operation has a table of [`FieldRule`]s. Every violation is
//! collected so the caller sees all problems at once.

use crate::error::{AppError, Result};
use crate::operations::OperationType;
use serde_json::Value;

/// Constraint on one parameter value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleKind {
    /// Non-empty string of at most `max_len` characters
    Text { max_len: usize },
    /// String that must be one of the listed values
    OneOf(&'static [&'static str]),
    /// Integer in `min..=max`
    Integer { min: i64, max: i64 },
    Bool,
    /// Array of at most `max_items` strings
    StringList { max_items: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRule {
    pub field: &'static str,
    pub required: bool,
    pub kind: RuleKind,
}

const fn required(field: &'static str, kind: RuleKind) -> FieldRule {
    FieldRule {
        field,
        required: true,
        kind,
    }
}

const fn optional(field: &'static str, kind: RuleKind) -> FieldRule {
    FieldRule {
        field,
        required: false,
        kind,
    }
}

pub const TOPOLOGIES: &[&str] = &["mesh", "hierarchical", "ring", "star"];
pub const AGENT_TYPES: &[&str] = &[
    "researcher",
    "coder",
    "analyst",
    "optimizer",
    "coordinator",
    "tester",
    "reviewer",
    "documenter",
];
pub const PRIORITIES: &[&str] = &["low", "medium", "high", "critical"];

const ID: RuleKind = RuleKind::Text { max_len: 128 };

/// Rule set for `operation`
pub fn rules_for(operation: OperationType) -> &'static [FieldRule] {
    match operation {
        OperationType::SwarmInit => const { &[
            required("topology", RuleKind::OneOf(TOPOLOGIES)),
            optional("max_agents", RuleKind::Integer { min: 1, max: 100 }),
            optional(
                "strategy",
                RuleKind::OneOf(&["balanced", "specialized", "adaptive"]),
            ),
        ] },
        OperationType::SwarmStatus => const { &[optional("verbose", RuleKind::Bool)] },
        OperationType::SwarmMonitor => const { &[
            optional("duration", RuleKind::Integer { min: 1, max: 3600 }),
            optional("interval", RuleKind::Integer { min: 1, max: 60 }),
        ] },
        OperationType::AgentSpawn => const { &[
            required("type", RuleKind::OneOf(AGENT_TYPES)),
            optional("name", RuleKind::Text { max_len: 100 }),
            optional("capabilities", RuleKind::StringList { max_items: 32 }),
        ] },
        OperationType::AgentList => const { &[optional(
            "filter",
            RuleKind::OneOf(&["all", "active", "idle", "busy"]),
        )] },
        OperationType::AgentMetrics => const { &[
            optional("agent_id", ID),
            optional(
                "metric",
                RuleKind::OneOf(&["all", "cpu", "memory", "tasks", "performance"]),
            ),
        ] },
        OperationType::TaskOrchestrate => const { &[
            required("task", RuleKind::Text { max_len: 1000 }),
            optional("priority", RuleKind::OneOf(PRIORITIES)),
            optional(
                "strategy",
                RuleKind::OneOf(&["parallel", "sequential", "adaptive"]),
            ),
            optional("max_agents", RuleKind::Integer { min: 1, max: 10 }),
        ] },
        OperationType::TaskStatus => const { &[
            optional("task_id", ID),
            optional("detailed", RuleKind::Bool),
        ] },
        OperationType::TaskResults => const { &[
            required("task_id", ID),
            optional("format", RuleKind::OneOf(&["summary", "detailed", "raw"])),
        ] },
        OperationType::BenchmarkRun => const { &[
            optional(
                "type",
                RuleKind::OneOf(&["all", "wasm", "swarm", "agent", "task"]),
            ),
            optional("iterations", RuleKind::Integer { min: 1, max: 100 }),
        ] },
        OperationType::FeaturesDetect => const { &[optional(
            "category",
            RuleKind::OneOf(&["all", "wasm", "simd", "memory", "platform"]),
        )] },
        OperationType::MemoryUsage => const { &[optional(
            "detail",
            RuleKind::OneOf(&["summary", "detailed", "by-agent"]),
        )] },
        OperationType::NeuralStatus => const { &[optional("agent_id", ID)] },
        OperationType::NeuralTrain => const { &[
            optional("agent_id", ID),
            optional("iterations", RuleKind::Integer { min: 1, max: 100 }),
        ] },
        OperationType::NeuralPatterns => const { &[optional(
            "pattern",
            RuleKind::OneOf(&[
                "all",
                "convergent",
                "divergent",
                "lateral",
                "systems",
                "critical",
                "abstract",
            ]),
        )] },
    }
}

fn check_value(rule: &FieldRule, value: &Value) -> Option<String> {
    let field = rule.field;
    match rule.kind {
        RuleKind::Text { max_len } => match value.as_str() {
            Some(s) if s.trim().is_empty() => Some(format!("'{}' must not be empty", field)),
            Some(s) if s.chars().count() > max_len => Some(format!(
                "'{}' must be at most {} characters",
                field, max_len
            )),
            Some(_) => None,
            None => Some(format!("'{}' must be a string", field)),
        },
        RuleKind::OneOf(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => None,
            Some(s) => Some(format!(
                "'{}' must be one of [{}], got '{}'",
                field,
                allowed.join(", "),
                s
            )),
            None => Some(format!("'{}' must be a string", field)),
        },
        RuleKind::Integer { min, max } => match value.as_i64() {
            Some(n) if (min..=max).contains(&n) => None,
            Some(n) => Some(format!(
                "'{}' must be between {} and {}, got {}",
                field, min, max, n
            )),
            None => Some(format!("'{}' must be an integer", field)),
        },
        RuleKind::Bool => {
            if value.is_boolean() {
                None
            } else {
                Some(format!("'{}' must be a boolean", field))
            }
        }
        RuleKind::StringList { max_items } => match value.as_array() {
            Some(items) if items.len() > max_items => Some(format!(
                "'{}' must have at most {} items",
                field, max_items
            )),
            Some(items) if items.iter().all(Value::is_string) => None,
            Some(_) => Some(format!("'{}' must only contain strings", field)),
            None => Some(format!("'{}' must be an array", field)),
        },
    }
}

/// Validate `params` for `operation`, reporting every violation.
/// `null` counts as absent.
pub fn validate_params(operation: OperationType, params: &Value) -> Result<()> {
    let object = match params {
        Value::Object(map) => map,
        Value::Null => {
            return validate_params(operation, &Value::Object(Default::default()));
        }
        _ => {
            return Err(AppError::Validation(format!(
                "{}: parameters must be an object",
                operation
            )))
        }
    };

    let violations: Vec<String> = rules_for(operation)
        .iter()
        .filter_map(|rule| match object.get(rule.field) {
            None | Some(Value::Null) if rule.required => {
                Some(format!("'{}' is required", rule.field))
            }
            None | Some(Value::Null) => None,
            Some(value) => check_value(rule, value),
        })
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{}: {}",
            operation,
            violations.join("; ")
        )))
    }
}

/// Check that a successful result carries the fields `operation` promises
pub fn validate_result(operation: OperationType, result: &Value) -> Result<()> {
    let object = result
        .as_object()
        .ok_or_else(|| AppError::MalformedResult {
            reason: "result must be an object".to_string(),
            missing: Vec::new(),
        })?;

    let missing: Vec<String> = operation
        .required_result_fields()
        .iter()
        .filter(|field| !object.contains_key(**field))
        .map(|field| field.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::MalformedResult {
            reason: format!("{} required field(s) missing", missing.len()),
            missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strum::IntoEnumIterator;

    #[test]
    fn test_agent_spawn_rejects_unknown_type() {
        let err = validate_params(
            OperationType::AgentSpawn,
            &json!({"type": "not-a-real-type"}),
        )
        .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("not-a-real-type"));

        assert!(validate_params(OperationType::AgentSpawn, &json!({"type": "coder"})).is_ok());
    }

    #[test]
    fn test_missing_required_and_null_params() {
        let err = validate_params(OperationType::SwarmInit, &Value::Null).unwrap_err();
        assert!(err.to_string().contains("'topology' is required"));

        assert!(validate_params(OperationType::SwarmStatus, &Value::Null).is_ok());
        assert!(validate_params(OperationType::SwarmStatus, &json!("verbose")).is_err());
    }

    #[test]
    fn test_numeric_ranges() {
        assert!(validate_params(
            OperationType::SwarmInit,
            &json!({"topology": "mesh", "max_agents": 100})
        )
        .is_ok());

        let err = validate_params(
            OperationType::SwarmInit,
            &json!({"topology": "mesh", "max_agents": 0}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("between 1 and 100"));
    }

    #[test]
    fn test_all_violations_reported() {
        let err = validate_params(
            OperationType::TaskOrchestrate,
            &json!({"task": "  ", "priority": "urgent", "max_agents": "three"}),
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'task' must not be empty"));
        assert!(message.contains("'priority' must be one of"));
        assert!(message.contains("'max_agents' must be an integer"));
    }

    #[test]
    fn test_string_list() {
        assert!(validate_params(
            OperationType::AgentSpawn,
            &json!({"type": "coder", "capabilities": ["rust", 1]})
        )
        .is_err());
    }

    #[test]
    fn test_every_operation_has_rules() {
        for operation in OperationType::iter() {
            assert!(
                !rules_for(operation).is_empty(),
                "{operation} has no parameter rules"
            );
        }
    }

    #[test]
    fn test_result_shape() {
        assert!(validate_result(OperationType::AgentList, &json!({"agents": []})).is_ok());

        let err = validate_result(OperationType::TaskResults, &json!({"task_id": "t1"})).unwrap_err();
        match &err {
            AppError::MalformedResult { missing, .. } => {
                assert_eq!(missing, &vec!["results".to_string()])
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.to_string().contains("results"));

        assert!(validate_result(OperationType::AgentList, &json!([])).is_err());
    }
}
