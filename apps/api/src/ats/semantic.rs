use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::ats::prompts::{grading_request, ATS_GRADING_SYSTEM};
use crate::ats::{percentage, round_ratio, CategoryScore, ScoreKind};
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{strip_json_fences, ChatTurn, Generator, LlmError};

pub const MAX_TOTAL: u32 = 60;

pub const FALLBACK_SUGGESTION: &str = "Could not analyze in detail. Please try again.";

/// Letter grade. Each maps to a fixed number of quarters of the category weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
}

/// Quarters of the weight earned per grade: A=100%, B=75%, C=50%, D=25%, E=0%.
const GRADE_QUARTERS: [(Grade, u32); 5] = [
    (Grade::A, 4),
    (Grade::B, 3),
    (Grade::C, 2),
    (Grade::D, 1),
    (Grade::E, 0),
];

impl Grade {
    pub fn quarters(self) -> u32 {
        GRADE_QUARTERS
            .iter()
            .find(|(grade, _)| *grade == self)
            .map(|(_, q)| *q)
            .unwrap_or(2)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Grade::A),
            "B" => Some(Grade::B),
            "C" => Some(Grade::C),
            "D" => Some(Grade::D),
            "E" => Some(Grade::E),
            _ => None,
        }
    }
}

/// (key, label, weight). Weights sum to [`MAX_TOTAL`].
const SEMANTIC_CATEGORIES: [(&str, &str, u32); 6] = [
    ("hard_skills", "Hard Skills Match", 20),
    ("soft_skills", "Soft Skills", 5),
    ("experience_relevance", "Experience Relevance", 15),
    ("job_title_alignment", "Job Title Alignment", 5),
    ("content_quality", "Content Quality", 10),
    ("action_language", "Action Language", 5),
];

#[derive(Debug, Deserialize)]
struct GradingReply {
    #[serde(default)]
    grades: HashMap<String, String>,
    #[serde(default)]
    matched_keywords: Vec<String>,
    #[serde(default)]
    missing_keywords: Vec<String>,
    #[serde(default)]
    top_suggestions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SemanticScore {
    pub categories: Vec<CategoryScore>,
    pub total: u32,
    pub matched_keywords: Vec<String>,
    pub missing_keywords: Vec<String>,
    pub suggestions: Vec<String>,
}

pub struct SemanticScorer {
    generator: Arc<dyn Generator>,
}

impl SemanticScorer {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// One grading call. Any failure grades every category C.
    pub async fn score(&self, resume: &Value) -> SemanticScore {
        match self.request_grades(resume).await {
            Ok(reply) => {
                let grades: HashMap<&str, Grade> = reply
                    .grades
                    .iter()
                    .filter_map(|(k, v)| Grade::parse(v).map(|g| (k.as_str(), g)))
                    .collect();
                let mut score = grade_categories(|key| grades.get(key).copied().unwrap_or(Grade::C));
                score.matched_keywords = reply.matched_keywords;
                score.missing_keywords = reply.missing_keywords;
                score.suggestions = reply.top_suggestions;
                score
            }
            Err(e) => {
                warn!("Semantic ATS scoring failed, falling back to grade C: {e}");
                fallback()
            }
        }
    }

    async fn request_grades(&self, resume: &Value) -> Result<GradingReply, LlmError> {
        let instructions = format!("{JSON_ONLY_SYSTEM}\n\n{ATS_GRADING_SYSTEM}");
        let request = grading_request(resume["objective"].as_str(), &resume.to_string());
        let text = self
            .generator
            .generate(&instructions, &[ChatTurn::user(request)])
            .await?;
        Ok(serde_json::from_str(strip_json_fences(&text))?)
    }
}

pub fn fallback() -> SemanticScore {
    let mut score = grade_categories(|_| Grade::C);
    score.suggestions = vec![FALLBACK_SUGGESTION.to_string()];
    score
}

/// Per-category points are rounded individually for display; the total is the
/// rounded exact weighted sum.
fn grade_categories(grade_for: impl Fn(&str) -> Grade) -> SemanticScore {
    let mut weighted_quarters: u32 = 0;
    let categories = SEMANTIC_CATEGORIES
        .iter()
        .map(|&(key, label, weight)| {
            let grade = grade_for(key);
            weighted_quarters += grade.quarters() * weight;
            let score = round_ratio(grade.quarters(), 4, weight);
            CategoryScore {
                key,
                label,
                score,
                max: weight,
                percentage: percentage(score, weight),
                tip: None,
                grade: Some(grade),
                kind: ScoreKind::Semantic,
            }
        })
        .collect();

    SemanticScore {
        categories,
        total: round_ratio(weighted_quarters, 4, 1),
        matched_keywords: Vec::new(),
        missing_keywords: Vec::new(),
        suggestions: Vec::new(),
    }
}
