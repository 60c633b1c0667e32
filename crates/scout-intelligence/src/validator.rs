use serde_json::Value;
use thiserror::Error;

use scout_core::StructuredResult;

/// Why a candidate final answer was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResultValidationError {
    #[error("final answer is not valid JSON: {0}")]
    Malformed(String),

    #[error("final answer must be a JSON object")]
    NotAnObject,

    #[error("field '{field}' must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("answer must not be empty")]
    EmptyAnswer,

    #[error("confidence {0} is outside [0.0, 1.0]")]
    ConfidenceOutOfRange(f64),
}

/// Check the arguments of a `final_result` call.
///
/// `sources` defaults to empty; `answer` and `confidence` are required.
/// A confidence outside `[0.0, 1.0]` is rejected, never clamped.
pub fn validate_value(value: &Value) -> Result<StructuredResult, ResultValidationError> {
    let object = value.as_object().ok_or(ResultValidationError::NotAnObject)?;

    let answer = match object.get("answer") {
        None | Some(Value::Null) => return Err(ResultValidationError::MissingField("answer")),
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(ResultValidationError::WrongType {
                field: "answer",
                expected: "a string",
            })
        }
    };

    let sources = match object.get("sources") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or(ResultValidationError::WrongType {
                        field: "sources",
                        expected: "an array of strings",
                    })
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(ResultValidationError::WrongType {
                field: "sources",
                expected: "an array of strings",
            })
        }
    };

    let confidence = match object.get("confidence") {
        None | Some(Value::Null) => return Err(ResultValidationError::MissingField("confidence")),
        Some(v) => v.as_f64().ok_or(ResultValidationError::WrongType {
            field: "confidence",
            expected: "a number",
        })?,
    };

    validate(StructuredResult {
        answer,
        sources,
        confidence,
    })
}

/// Enforce the invariants on an already-typed result.
///
/// An empty answer is only accepted as an explicit non-answer: no sources
/// and a confidence of exactly zero.
pub fn validate(result: StructuredResult) -> Result<StructuredResult, ResultValidationError> {
    if !(0.0..=1.0).contains(&result.confidence) {
        return Err(ResultValidationError::ConfidenceOutOfRange(result.confidence));
    }
    let non_answer = result.sources.is_empty() && result.confidence == 0.0;
    if result.answer.trim().is_empty() && !non_answer {
        return Err(ResultValidationError::EmptyAnswer);
    }
    Ok(result)
}

/// Try to read a plain-text model reply as a final answer.
///
/// Returns `None` when the text is not JSON at all (an ordinary prose
/// reply), and `Some(Err(..))` when it is JSON but not a valid result.
/// A surrounding Markdown code fence is tolerated.
pub fn parse_text(text: &str) -> Option<Result<StructuredResult, ResultValidationError>> {
    let body = strip_fence(text.trim());
    if !body.starts_with('{') {
        return None;
    }
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => return Some(Err(ResultValidationError::Malformed(e.to_string()))),
    };
    Some(validate_value(&value))
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
