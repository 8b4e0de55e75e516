//! Structured-output validation for scoring responses.
//!
//! Implements the contract between raw LLM text and [`PersonalityExplanation`].
//! Validation is a sequence of binary gates; nothing is clamped or trimmed.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::types::{format_number, PersonalityExplanation, ScoredBias};

// =============================================================================
// Errors
// =============================================================================

/// Which gate rejected the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    MalformedJson,
    InvalidShape,
    WrongCardinality,
    MissingFields,
    ScoreOutOfRange,
}

impl ValidationKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedJson => "MALFORMED_JSON",
            Self::InvalidShape => "INVALID_SHAPE",
            Self::WrongCardinality => "WRONG_CARDINALITY",
            Self::MissingFields => "MISSING_FIELDS",
            Self::ScoreOutOfRange => "SCORE_OUT_OF_RANGE",
        }
    }
}

/// A rejected response. The display text is echoed verbatim into the retry prompt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid JSON format: {0}")]
    MalformedJson(String),

    #[error("Invalid response format: scored_biases array is missing or not an array")]
    InvalidShape,

    #[error("Invalid response format: Expected {expected} explanations, got {actual}")]
    WrongCardinality { expected: usize, actual: usize },

    /// `position` is 1-indexed.
    #[error("Missing or invalid fields in explanation {position}: {}", .fields.join(", "))]
    MissingFields {
        position: usize,
        fields: Vec<&'static str>,
    },

    #[error("Scores must be between {} and {} in explanation {position}", fmt_bound(.min), fmt_bound(.max))]
    ScoreOutOfRange { position: usize, min: f64, max: f64 },
}

impl ValidationError {
    pub fn kind(&self) -> ValidationKind {
        match self {
            Self::MalformedJson(_) => ValidationKind::MalformedJson,
            Self::InvalidShape => ValidationKind::InvalidShape,
            Self::WrongCardinality { .. } => ValidationKind::WrongCardinality,
            Self::MissingFields { .. } => ValidationKind::MissingFields,
            Self::ScoreOutOfRange { .. } => ValidationKind::ScoreOutOfRange,
        }
    }
}

fn fmt_bound(v: &f64) -> String {
    format_number(*v)
}

// =============================================================================
// Shape decode
// =============================================================================

/// Top-level response shapes accepted from the model.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawResponse {
    /// `[ {...}, ... ]`
    Bare(Vec<Value>),
    /// `{ "scored_biases": [...] , ... }` or any other object.
    Wrapped(Map<String, Value>),
    /// Anything else (string, number, null).
    Other(Value),
}

/// Canonical record every accepted shape is normalized into.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalResponse {
    /// `None` when the object carried no `scored_biases` array.
    pub scored_biases: Option<Vec<Value>>,
}

impl From<RawResponse> for CanonicalResponse {
    fn from(raw: RawResponse) -> Self {
        let scored_biases = match raw {
            RawResponse::Bare(items) => Some(items),
            RawResponse::Wrapped(mut obj) => match obj.remove("scored_biases") {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            },
            RawResponse::Other(_) => None,
        };
        Self { scored_biases }
    }
}

/// Parse the model's message as JSON and normalize its shape.
pub fn decode_response(message: &str) -> Result<CanonicalResponse, ValidationError> {
    let raw: RawResponse = serde_json::from_str(message)
        .map_err(|e| ValidationError::MalformedJson(e.to_string()))?;
    Ok(raw.into())
}

// =============================================================================
// Gates
// =============================================================================

/// Validates decoded responses against a fixed bias count and score range.
#[derive(Debug, Clone, Copy)]
pub struct ResponseValidator {
    pub expected_count: usize,
    pub min_score: f64,
    pub max_score: f64,
}

impl ResponseValidator {
    pub fn new(expected_count: usize) -> Self {
        Self {
            expected_count,
            min_score: 0.0,
            max_score: 10.0,
        }
    }

    pub fn with_range(mut self, min_score: f64, max_score: f64) -> Self {
        self.min_score = min_score;
        self.max_score = max_score;
        self
    }

    /// Run the gates in order; the first failure wins.
    pub fn validate(&self, parsed: &CanonicalResponse) -> Result<(), ValidationError> {
        let items = parsed
            .scored_biases
            .as_ref()
            .ok_or(ValidationError::InvalidShape)?;

        if items.len() != self.expected_count {
            return Err(ValidationError::WrongCardinality {
                expected: self.expected_count,
                actual: items.len(),
            });
        }

        for (idx, item) in items.iter().enumerate() {
            let fields = missing_fields(item);
            if !fields.is_empty() {
                return Err(ValidationError::MissingFields {
                    position: idx + 1,
                    fields,
                });
            }
        }

        let range = self.min_score..=self.max_score;
        for (idx, item) in items.iter().enumerate() {
            let for_score = item.get("for_score").and_then(Value::as_f64);
            let against_score = item.get("against_score").and_then(Value::as_f64);
            let in_range = matches!(
                (for_score, against_score),
                (Some(f), Some(a)) if range.contains(&f) && range.contains(&a)
            );
            if !in_range {
                return Err(ValidationError::ScoreOutOfRange {
                    position: idx + 1,
                    min: self.min_score,
                    max: self.max_score,
                });
            }
        }

        Ok(())
    }

    /// Decode, validate and convert a raw model message.
    pub fn parse_explanation(
        &self,
        personality: &str,
        message: &str,
    ) -> Result<PersonalityExplanation, ValidationError> {
        let parsed = decode_response(message)?;
        self.validate(&parsed)?;
        let scored_biases = parsed
            .scored_biases
            .unwrap_or_default()
            .iter()
            .filter_map(to_scored_bias)
            .collect();
        Ok(PersonalityExplanation {
            personality: personality.to_string(),
            scored_biases,
        })
    }
}

fn missing_fields(item: &Value) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if !is_non_empty_str(item.get("bias_type")) {
        missing.push("bias_type");
    }
    if !item.get("for_score").is_some_and(Value::is_number) {
        missing.push("for_score");
    }
    if !item.get("against_score").is_some_and(Value::is_number) {
        missing.push("against_score");
    }
    if !is_non_empty_str(item.get("detailed_explanation")) {
        missing.push("detailed_explanation");
    }
    missing
}

fn is_non_empty_str(v: Option<&Value>) -> bool {
    matches!(v, Some(Value::String(s)) if !s.is_empty())
}

fn to_scored_bias(item: &Value) -> Option<ScoredBias> {
    Some(ScoredBias {
        bias_type: item.get("bias_type")?.as_str()?.to_string(),
        for_score: item.get("for_score")?.as_f64()?,
        against_score: item.get("against_score")?.as_f64()?,
        detailed_explanation: item.get("detailed_explanation")?.as_str()?.to_string(),
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(name: &str, f: Value, a: Value) -> Value {
        json!({
            "bias_type": name,
            "for_score": f,
            "against_score": a,
            "detailed_explanation": "Reasoned view."
        })
    }

    fn canonical(items: Vec<Value>) -> CanonicalResponse {
        CanonicalResponse {
            scored_biases: Some(items),
        }
    }

    #[test]
    fn cardinality_gate_reports_both_counts() {
        let v = ResponseValidator::new(3);
        let err = v
            .validate(&canonical(vec![
                item("A", json!(1), json!(1)),
                item("B", json!(1), json!(1)),
            ]))
            .unwrap_err();
        assert_eq!(err.kind(), ValidationKind::WrongCardinality);
        let msg = err.to_string();
        assert!(msg.contains("Expected 3"));
        assert!(msg.contains("got 2"));
    }

    #[test]
    fn cardinality_checked_before_fields() {
        let v = ResponseValidator::new(2);
        let err = v.validate(&canonical(vec![json!({})])).unwrap_err();
        assert_eq!(
            err,
            ValidationError::WrongCardinality {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn range_gate_boundaries() {
        let v = ResponseValidator::new(1);
        for (f, a) in [(0.0, 10.0), (10.0, 0.0), (5.5, 4.25)] {
            assert!(v
                .validate(&canonical(vec![item("A", json!(f), json!(a))]))
                .is_ok());
        }
        for (f, a) in [(10.01, 5.0), (5.0, -0.01), (-1.0, 11.0)] {
            let err = v
                .validate(&canonical(vec![item("A", json!(f), json!(a))]))
                .unwrap_err();
            assert_eq!(err.kind(), ValidationKind::ScoreOutOfRange);
            assert_eq!(err.to_string(), "Scores must be between 0 and 10 in explanation 1");
        }
    }

    #[test]
    fn missing_fields_are_named_and_one_indexed() {
        let v = ResponseValidator::new(2);
        let err = v
            .validate(&canonical(vec![
                item("A", json!(1), json!(1)),
                json!({"bias_type": "", "for_score": "7", "against_score": 2}),
            ]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing or invalid fields in explanation 2: bias_type, for_score, detailed_explanation"
        );
    }

    #[test]
    fn fields_checked_for_every_item_before_ranges() {
        let v = ResponseValidator::new(2);
        let err = v
            .validate(&canonical(vec![
                item("A", json!(42), json!(1)),
                json!({"bias_type": "B", "for_score": 1, "against_score": 1}),
            ]))
            .unwrap_err();
        assert_eq!(err.kind(), ValidationKind::MissingFields);
    }

    #[test]
    fn shape_gate() {
        let v = ResponseValidator::new(1);
        let err = v
            .validate(&decode_response(r#"{"biases": []}"#).unwrap())
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidShape);

        let err = v
            .validate(&decode_response(r#"{"scored_biases": "nope"}"#).unwrap())
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidShape);

        let err = v.validate(&decode_response("42").unwrap()).unwrap_err();
        assert_eq!(err, ValidationError::InvalidShape);
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = decode_response("```json\n[]\n```").unwrap_err();
        assert_eq!(err.kind(), ValidationKind::MalformedJson);
        assert!(err.to_string().starts_with("Invalid JSON format: "));
    }

    #[test]
    fn bare_and_wrapped_shapes_validate_identically() {
        let items = json!([
            {"bias_type": "Anchoring", "for_score": 6, "against_score": 3, "detailed_explanation": "x"},
            {"bias_type": "Framing", "for_score": 0, "against_score": 10, "detailed_explanation": "y"}
        ]);
        let bare = items.to_string();
        let wrapped = json!({ "scored_biases": items }).to_string();

        let v = ResponseValidator::new(2);
        let a = v.parse_explanation("Ada", &bare).unwrap();
        let b = v.parse_explanation("Ada", &wrapped).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.scored_biases[1].against_score, 10.0);
    }

    #[test]
    fn no_normalization_of_text() {
        let msg = json!([{
            "bias_type": "  Anchoring ",
            "for_score": 6,
            "against_score": 3,
            "detailed_explanation": " padded "
        }])
        .to_string();
        let e = ResponseValidator::new(1).parse_explanation("Ada", &msg).unwrap();
        assert_eq!(e.scored_biases[0].bias_type, "  Anchoring ");
        assert_eq!(e.scored_biases[0].detailed_explanation, " padded ");
    }
}
