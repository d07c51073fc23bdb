use serde::{Deserialize, Serialize};

/// What the counselor is told about the student before the conversation starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentContext {
    pub name: String,
    pub institution: String,
    pub profile: Option<StudentProfile>,
}

/// Self-reported profile. List fields are already decoded; see [`decode_list`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub education_level: Option<String>,
    pub class_or_year: Option<String>,
    pub board: Option<String>,
    pub stream: Option<String>,
    pub cgpa: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub parent_occupation: Option<String>,
    pub income_range: Option<String>,
    pub hobbies: Vec<String>,
    pub interests: Vec<String>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub languages: Vec<String>,
    pub career_aspiration: Option<String>,
}

/// Decodes a list-valued profile column.
///
/// Columns hold JSON array text (`["a","b"]`). Older rows may hold a plain
/// string, which is kept as a single item.
pub fn decode_list(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<serde_json::Value>>(raw) {
        Ok(items) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.trim().is_empty())
            .collect(),
        Err(_) => vec![raw.to_string()],
    }
}
