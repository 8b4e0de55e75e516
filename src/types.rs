//! Core data model for a bias explanation run.

use serde::{Deserialize, Serialize, Serializer};

// =============================================================================
// Inputs
// =============================================================================

/// An LLM persona whose perspective is used to score biases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Personality {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Personality {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
        }
    }
}

/// One bias type drawn from the template document's chapter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiasTemplateEntry {
    pub title: String,
}

// =============================================================================
// Validated output
// =============================================================================

/// A single validated judgement for one (personality, bias type) pair.
///
/// Scores are guaranteed to lie in the configured closed range once they
/// leave the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredBias {
    pub bias_type: String,
    #[serde(serialize_with = "serialize_score")]
    pub for_score: f64,
    #[serde(serialize_with = "serialize_score")]
    pub against_score: f64,
    pub detailed_explanation: String,
}

/// Whole scores serialize as integers (`6`, not `6.0`), matching the JSON
/// the model sent and the report content the host stores.
fn serialize_score<S: Serializer>(v: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    const EXACT: f64 = 9_007_199_254_740_992.0;
    if v.fract() == 0.0 && v.abs() < EXACT {
        serializer.serialize_i64(*v as i64)
    } else {
        serializer.serialize_f64(*v)
    }
}

/// Validated, shape-normalized output for one personality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityExplanation {
    /// Personality name (not id); this is what charts and chapters display.
    pub personality: String,
    pub scored_biases: Vec<ScoredBias>,
}

impl PersonalityExplanation {
    /// First scored bias with the given type, if any.
    pub fn find(&self, bias_type: &str) -> Option<&ScoredBias> {
        self.scored_biases.iter().find(|b| b.bias_type == bias_type)
    }
}

/// Ordered explanations, one per requested personality.
///
/// Built incrementally during a run and consumed once by the chart and
/// report stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRun {
    #[serde(rename = "allPersonalityExplanations")]
    pub explanations: Vec<PersonalityExplanation>,
}

impl AnalysisRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, explanation: PersonalityExplanation) {
        self.explanations.push(explanation);
    }

    pub fn len(&self) -> usize {
        self.explanations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.explanations.is_empty()
    }

    pub fn personality_names(&self) -> Vec<String> {
        self.explanations
            .iter()
            .map(|e| e.personality.clone())
            .collect()
    }

    /// Total number of scored biases across all personalities.
    pub fn judgement_count(&self) -> usize {
        self.explanations
            .iter()
            .map(|e| e.scored_biases.len())
            .sum()
    }
}

/// Render a score the way the host displays numbers: `10`, `6.5`, never `-0`.
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.is_finite() {
        let s = format!("{v:.0}");
        if s == "-0" {
            "0".to_string()
        } else {
            s
        }
    } else {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bias(name: &str, f: f64, a: f64) -> ScoredBias {
        ScoredBias {
            bias_type: name.into(),
            for_score: f,
            against_score: a,
            detailed_explanation: "because".into(),
        }
    }

    #[test]
    fn find_returns_first_match() {
        let e = PersonalityExplanation {
            personality: "Ada".into(),
            scored_biases: vec![bias("Anchoring", 1.0, 2.0), bias("Anchoring", 9.0, 9.0)],
        };
        assert_eq!(e.find("Anchoring").unwrap().for_score, 1.0);
        assert!(e.find("Framing").is_none());
    }

    #[test]
    fn run_serializes_under_host_key() {
        let mut run = AnalysisRun::new();
        run.push(PersonalityExplanation {
            personality: "Ada".into(),
            scored_biases: vec![bias("Anchoring", 6.0, 3.0)],
        });
        let v = serde_json::to_value(&run).unwrap();
        assert_eq!(v["allPersonalityExplanations"][0]["personality"], "Ada");
        assert_eq!(
            v["allPersonalityExplanations"][0]["scored_biases"][0]["for_score"],
            serde_json::json!(6)
        );
        assert_eq!(run.judgement_count(), 1);
    }

    #[test]
    fn whole_scores_serialize_without_a_fraction() {
        let text = serde_json::to_string(&bias("Anchoring", 6.0, 2.5)).unwrap();
        assert!(text.contains("\"for_score\":6,"));
        assert!(text.contains("\"against_score\":2.5,"));
        let zero = serde_json::to_string(&bias("Anchoring", -0.0, 10.0)).unwrap();
        assert!(zero.contains("\"for_score\":0,"));
        assert!(zero.contains("\"against_score\":10,"));

        let back: ScoredBias = serde_json::from_str(&text).unwrap();
        assert_eq!(back.for_score, 6.0);
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(10.0), "10");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(6.5), "6.5");
    }

    #[test]
    fn personality_description_defaults_to_empty() {
        let p: Personality = serde_json::from_str(r#"{"id":"p1","name":"Ada"}"#).unwrap();
        assert_eq!(p.description, "");
    }
}
