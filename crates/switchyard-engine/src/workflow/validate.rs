//! Workflow validation - catch structural mistakes before any step runs.

use std::collections::HashSet;

use switchyard_catalog::Catalog;
use thiserror::Error;

use super::condition::Condition;
use super::definition::{Step, StepKind, WorkflowDefinition, AUTO_MODEL};

/// Validation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("malformed workflow: {0}")]
    Malformed(String),

    #[error("workflow has no steps")]
    NoSteps,

    #[error("workflow has no name")]
    MissingName,

    #[error("duplicate step name: {0}")]
    DuplicateStep(String),

    #[error("step {index} has no name")]
    UnnamedStep { index: usize },

    #[error("step '{step}' is missing '{field}'")]
    MissingField { step: String, field: &'static str },

    #[error("step '{step}' has an invalid pattern: {reason}")]
    InvalidPattern { step: String, reason: String },

    #[error("step '{step}' has an invalid condition: {reason}")]
    InvalidCondition { step: String, reason: String },

    #[error("step '{step}' nests a {kind} step; branches and bodies must be single steps")]
    NestedControlFlow { step: String, kind: &'static str },

    #[error("step '{step}' extracts from '{from}', which is not declared before it")]
    UnknownSourceStep { step: String, from: String },

    #[error("step '{step}' uses unknown model '{model}'")]
    UnknownModel { step: String, model: String },

    #[error("step '{step}' sleeps for a negative or invalid duration")]
    InvalidDuration { step: String },
}

/// Validate a workflow definition. Model ids are checked when a catalog is
/// given.
pub fn validate(
    def: &WorkflowDefinition,
    catalog: Option<&Catalog>,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if def.name.trim().is_empty() {
        errors.push(ValidationError::MissingName);
    }
    if def.steps.is_empty() {
        errors.push(ValidationError::NoSteps);
        return Err(errors);
    }

    // Names of steps declared so far, including nested ones
    let mut declared: HashSet<&str> = HashSet::new();

    for (index, step) in def.steps.iter().enumerate() {
        if step.name.trim().is_empty() {
            errors.push(ValidationError::UnnamedStep { index });
        }

        match &step.kind {
            StepKind::Conditional {
                then, otherwise, ..
            } => {
                check_step(step, &declared, catalog, &mut errors);
                check_nested(step, then, &declared, catalog, &mut errors);
                if let Some(otherwise) = otherwise {
                    check_nested(step, otherwise, &declared, catalog, &mut errors);
                }
            }
            StepKind::Loop { body, .. } => {
                check_step(step, &declared, catalog, &mut errors);
                check_nested(step, body, &declared, catalog, &mut errors);
            }
            _ => check_step(step, &declared, catalog, &mut errors),
        }

        for s in step.walk() {
            if s.name.trim().is_empty() {
                continue;
            }
            if !declared.insert(s.name.as_str()) {
                errors.push(ValidationError::DuplicateStep(s.name.clone()));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_nested(
    parent: &Step,
    child: &Step,
    declared: &HashSet<&str>,
    catalog: Option<&Catalog>,
    errors: &mut Vec<ValidationError>,
) {
    if !child.kind.is_leaf() {
        errors.push(ValidationError::NestedControlFlow {
            step: parent.name.clone(),
            kind: child.kind.type_name(),
        });
        return;
    }
    if child.name.trim().is_empty() {
        errors.push(ValidationError::MissingField {
            step: parent.name.clone(),
            field: "name (of nested step)",
        });
    }
    check_step(child, declared, catalog, errors);
}

fn check_step(
    step: &Step,
    declared: &HashSet<&str>,
    catalog: Option<&Catalog>,
    errors: &mut Vec<ValidationError>,
) {
    let missing = |field: &'static str| ValidationError::MissingField {
        step: step.name.clone(),
        field,
    };

    match &step.kind {
        StepKind::Prompt { model, prompt, .. } => {
            if prompt.trim().is_empty() {
                errors.push(missing("prompt"));
            }
            check_model(step, model, catalog, errors);
        }
        StepKind::Template {
            template, model, ..
        } => {
            if template.trim().is_empty() {
                errors.push(missing("template"));
            }
            check_model(step, model, catalog, errors);
        }
        StepKind::Conditional { condition, .. } => {
            if condition.trim().is_empty() {
                errors.push(missing("condition"));
            } else if let Err(reason) = Condition::parse(condition) {
                errors.push(ValidationError::InvalidCondition {
                    step: step.name.clone(),
                    reason,
                });
            }
        }
        StepKind::Loop {
            items, loop_var, ..
        } => {
            if items.trim().is_empty() {
                errors.push(missing("items"));
            }
            if loop_var.trim().is_empty() {
                errors.push(missing("loop_var"));
            }
        }
        StepKind::Extract {
            from_step,
            pattern,
            output_var,
        } => {
            if from_step.trim().is_empty() {
                errors.push(missing("from_step"));
            } else if !declared.contains(from_step.as_str()) {
                errors.push(ValidationError::UnknownSourceStep {
                    step: step.name.clone(),
                    from: from_step.clone(),
                });
            }
            if pattern.is_empty() {
                errors.push(missing("pattern"));
            } else if let Err(e) = regex::Regex::new(pattern) {
                errors.push(ValidationError::InvalidPattern {
                    step: step.name.clone(),
                    reason: e.to_string(),
                });
            }
            if output_var.trim().is_empty() {
                errors.push(missing("output_var"));
            }
        }
        StepKind::Sleep { seconds } => {
            if !seconds.is_finite() || *seconds < 0.0 {
                errors.push(ValidationError::InvalidDuration {
                    step: step.name.clone(),
                });
            }
        }
    }
}

fn check_model(
    step: &Step,
    model: &str,
    catalog: Option<&Catalog>,
    errors: &mut Vec<ValidationError>,
) {
    // Templated ids are resolved at run time.
    if model == AUTO_MODEL || model.contains("{{") {
        return;
    }
    if let Some(catalog) = catalog {
        if !catalog.contains(model) {
            errors.push(ValidationError::UnknownModel {
                step: step.name.clone(),
                model: model.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn parse(json: &str) -> WorkflowDefinition {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_valid_workflow() {
        let def = parse(
            r#"{"name": "ok", "steps": [
                {"name": "a", "type": "prompt", "prompt": "hi", "output_var": "out"},
                {"name": "b", "type": "extract", "from_step": "a", "pattern": "(\\d+)", "output_var": "n"},
                {"name": "c", "type": "conditional", "condition": "{{n}} >= 1",
                 "then": {"name": "c1", "type": "sleep", "seconds": 0}}
            ]}"#,
        );
        let catalog = Catalog::builtin(Path::new("/models"));
        assert_eq!(validate(&def, Some(&catalog)), Ok(()));
    }

    #[test]
    fn test_collects_every_problem() {
        let def = parse(
            r#"{"name": "bad", "steps": [
                {"name": "a", "type": "prompt", "prompt": " ", "model": "nope"},
                {"name": "a", "type": "sleep", "seconds": -1},
                {"name": "x", "type": "extract", "from_step": "later", "pattern": "(", "output_var": "v"},
                {"name": "later", "type": "conditional", "condition": "score > 1",
                 "then": {"name": "inner", "type": "loop", "items": "xs", "loop_var": "x",
                          "body": {"name": "deep", "type": "sleep", "seconds": 0}}}
            ]}"#,
        );
        let catalog = Catalog::builtin(Path::new("/models"));
        let errors = validate(&def, Some(&catalog)).unwrap_err();

        assert!(errors.contains(&ValidationError::MissingField {
            step: "a".into(),
            field: "prompt"
        }));
        assert!(errors.contains(&ValidationError::UnknownModel {
            step: "a".into(),
            model: "nope".into()
        }));
        assert!(errors.contains(&ValidationError::DuplicateStep("a".into())));
        assert!(errors.contains(&ValidationError::InvalidDuration { step: "a".into() }));
        assert!(errors.contains(&ValidationError::UnknownSourceStep {
            step: "x".into(),
            from: "later".into()
        }));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidPattern { step, .. } if step == "x")));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidCondition { step, .. } if step == "later")));
        assert!(errors.contains(&ValidationError::NestedControlFlow {
            step: "later".into(),
            kind: "loop"
        }));
    }

    #[test]
    fn test_nested_names_must_be_unique() {
        let def = parse(
            r#"{"name": "dup", "steps": [
                {"name": "a", "type": "prompt", "prompt": "p"},
                {"name": "l", "type": "loop", "items": "xs", "loop_var": "x",
                 "body": {"name": "a", "type": "prompt", "prompt": "{{x}}"}}
            ]}"#,
        );
        assert_eq!(
            validate(&def, None),
            Err(vec![ValidationError::DuplicateStep("a".into())])
        );
    }

    #[test]
    fn test_empty_workflow() {
        let def = parse(r#"{"name": "empty", "steps": []}"#);
        assert_eq!(validate(&def, None), Err(vec![ValidationError::NoSteps]));
    }
}
