//! Score aggregation: the shared data model behind every chart.

use std::collections::HashMap;

use crate::types::{AnalysisRun, ScoredBias};

/// Scores indexed by bias type, then by personality position in the run.
///
/// `bias_types` comes from the first personality only, deduplicated in order
/// of first occurrence. Bias types reported solely by later personalities are
/// not charted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreTable {
    pub bias_types: Vec<String>,
    pub personalities: Vec<String>,
    per_bias: HashMap<String, Vec<Option<ScoredBias>>>,
}

impl ScoreTable {
    pub fn aggregate(run: &AnalysisRun) -> Self {
        let mut bias_types: Vec<String> = Vec::new();
        if let Some(first) = run.explanations.first() {
            for bias in &first.scored_biases {
                if !bias_types.contains(&bias.bias_type) {
                    bias_types.push(bias.bias_type.clone());
                }
            }
        }

        let per_bias = bias_types
            .iter()
            .map(|bias_type| {
                let row = run
                    .explanations
                    .iter()
                    .map(|e| e.find(bias_type).cloned())
                    .collect();
                (bias_type.clone(), row)
            })
            .collect();

        Self {
            bias_types,
            personalities: run.personality_names(),
            per_bias,
        }
    }

    pub fn bias_count(&self) -> usize {
        self.bias_types.len()
    }

    pub fn personality_count(&self) -> usize {
        self.personalities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bias_types.is_empty() || self.personalities.is_empty()
    }

    /// Score reported by the personality at `personality_index`, if any.
    pub fn get(&self, bias_type: &str, personality_index: usize) -> Option<&ScoredBias> {
        self.per_bias
            .get(bias_type)
            .and_then(|row| row.get(personality_index))
            .and_then(Option::as_ref)
    }

    /// Lookup by personality name; the first personality with that name wins.
    pub fn get_by_name(&self, bias_type: &str, personality: &str) -> Option<&ScoredBias> {
        let idx = self.personalities.iter().position(|p| p == personality)?;
        self.get(bias_type, idx)
    }

    /// `personality name -> score` for one bias type.
    pub fn by_personality(&self, bias_type: &str) -> HashMap<&str, &ScoredBias> {
        let mut out = HashMap::new();
        for (idx, name) in self.personalities.iter().enumerate() {
            if let Some(score) = self.get(bias_type, idx) {
                out.entry(name.as_str()).or_insert(score);
            }
        }
        out
    }
}
