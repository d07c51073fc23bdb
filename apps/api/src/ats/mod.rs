//! ATS Scoring Engine: deterministic (0-40) plus semantic (0-60) sub-scores.
//!
//! Independent of session state. The semantic half makes exactly one model
//! call and always produces a number, falling back to grade C everywhere.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::llm_client::Generator;

pub mod deterministic;
pub mod prompts;
pub mod semantic;

pub use semantic::Grade;

pub const MAX_SCORE: u32 = deterministic::MAX_TOTAL + semantic::MAX_TOTAL;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    Deterministic,
    Semantic,
}

/// One row of the report breakdown. `tip` is set for deterministic rows, `grade` for semantic ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryScore {
    pub key: &'static str,
    pub label: &'static str,
    pub score: u32,
    pub max: u32,
    pub percentage: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<Grade>,
    #[serde(rename = "type")]
    pub kind: ScoreKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct AtsReport {
    pub total_score: u32,
    pub max_score: u32,
    pub deterministic_total: u32,
    pub semantic_total: u32,
    pub categories: Vec<CategoryScore>,
    pub matched_keywords: Vec<String>,
    pub missing_keywords: Vec<String>,
    pub suggestions: Vec<String>,
}

pub struct AtsScorer {
    semantic: semantic::SemanticScorer,
}

impl AtsScorer {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            semantic: semantic::SemanticScorer::new(generator),
        }
    }

    pub async fn score(&self, resume_json: &Value) -> AtsReport {
        let deterministic = deterministic::score(resume_json);
        let semantic = self.semantic.score(resume_json).await;

        let deterministic_total = deterministic.iter().map(|c| c.score).sum();
        let mut categories = deterministic;
        categories.extend(semantic.categories);

        AtsReport {
            total_score: deterministic_total + semantic.total,
            max_score: MAX_SCORE,
            deterministic_total,
            semantic_total: semantic.total,
            categories,
            matched_keywords: semantic.matched_keywords,
            missing_keywords: semantic.missing_keywords,
            suggestions: semantic.suggestions,
        }
    }
}

/// `num / den * scale`, rounded half up. `den` of zero yields zero.
pub fn round_ratio(num: u32, den: u32, scale: u32) -> u32 {
    if den == 0 {
        return 0;
    }
    let (num, den, scale) = (num as u64, den as u64, scale as u64);
    ((2 * num * scale + den) / (2 * den)) as u32
}

pub fn percentage(score: u32, max: u32) -> u32 {
    round_ratio(score, max, 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGenerator;
    use serde_json::json;

    #[test]
    fn test_round_ratio_rounds_half_up() {
        assert_eq!(round_ratio(1, 2, 5), 3); // 2.5
        assert_eq!(round_ratio(3, 2, 5), 8); // 7.5
        assert_eq!(round_ratio(2, 7, 10), 3); // 2.857
        assert_eq!(round_ratio(1, 7, 10), 1); // 1.428
        assert_eq!(round_ratio(5, 0, 10), 0);
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(2, 5), 40);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
    }

    #[tokio::test]
    async fn test_report_sums_both_halves() {
        let generator = ScriptedGenerator::new();
        generator.push_reply(
            r#"{"grades": {"hard_skills": "A", "soft_skills": "A", "experience_relevance": "A",
                "job_title_alignment": "A", "content_quality": "A", "action_language": "A"},
                "matched_keywords": ["Rust"], "missing_keywords": ["Docker"],
                "top_suggestions": ["Add a metric"]}"#,
        );
        let scorer = AtsScorer::new(generator);
        let report = scorer
            .score(&json!({"personal_info": {"name": "Asha"}, "education": []}))
            .await;

        assert_eq!(report.max_score, 100);
        assert_eq!(report.semantic_total, 60);
        assert_eq!(
            report.total_score,
            report.deterministic_total + report.semantic_total
        );
        assert_eq!(report.categories.len(), 13);
        assert_eq!(report.matched_keywords, vec!["Rust".to_string()]);
        assert_eq!(report.suggestions, vec!["Add a metric".to_string()]);

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["categories"][0]["type"], "deterministic");
        assert!(value["categories"][0].get("grade").is_none());
        assert_eq!(value["categories"][7]["type"], "semantic");
        assert_eq!(value["categories"][7]["grade"], "A");
    }
}
