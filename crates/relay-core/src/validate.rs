//! Structured-output validation of model text against a JSON schema.

use crate::error::RelayError;
use serde_json::Value;

/// How many times a caller should re-ask the model after a validation failure.
pub const DEFAULT_VALIDATION_RETRIES: usize = 3;

/// Parse `text` as JSON and validate it against `schema`.
///
/// Text wrapped in a fenced code block (```json ... ```) is unwrapped first.
pub fn validate_output(text: &str, schema: &Value) -> Result<Value, RelayError> {
    let validator =
        jsonschema::validator_for(schema).map_err(|e| RelayError::InvalidSchema(e.to_string()))?;

    let output: Value = serde_json::from_str(strip_fence(text)).map_err(|e| {
        RelayError::SchemaValidation(vec![format!("output is not valid JSON: {e}")])
    })?;

    let mut errors = validator
        .iter_errors(&output)
        .map(|e| e.to_string())
        .collect::<Vec<_>>();
    if errors.is_empty() {
        Ok(output)
    } else {
        errors.sort();
        Err(RelayError::SchemaValidation(errors))
    }
}

fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer", "minimum": 0}
            },
            "required": ["name", "age"]
        })
    }

    #[test]
    fn test_valid_output() {
        let value = validate_output(r#"{"name":"Ada","age":36}"#, &person_schema()).unwrap();
        assert_eq!(value["name"], "Ada");
    }

    #[test]
    fn test_fenced_output() {
        let text = "```json\n{\"name\":\"Ada\",\"age\":36}\n```";
        assert!(validate_output(text, &person_schema()).is_ok());
    }

    #[test]
    fn test_schema_violation() {
        let err = validate_output(r#"{"name":"Ada","age":-1}"#, &person_schema()).unwrap_err();
        match err {
            RelayError::SchemaValidation(errors) => assert_eq!(errors.len(), 1),
            other => panic!("expected SchemaValidation, got {other:?}"),
        }
        assert!(validate_output(r#"{"name":"Ada"}"#, &person_schema())
            .unwrap_err()
            .is_retryable());
    }

    #[test]
    fn test_not_json() {
        let err = validate_output("Sure! Here it is.", &person_schema()).unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn test_invalid_schema() {
        let err = validate_output("{}", &json!({"type": 12})).unwrap_err();
        assert!(matches!(err, RelayError::InvalidSchema(_)));
    }

    #[test]
    fn test_strip_fence() {
        assert_eq!(strip_fence("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_fence("```\n[1]\n```"), "[1]");
    }
}
