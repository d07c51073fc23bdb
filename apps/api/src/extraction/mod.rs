//! Tag Extractor: pulls tagged structured blocks out of a completed reply.
//!
//! Pure and synchronous. A block is matched by its open/close tag pair anywhere
//! in the text (case-sensitive, non-greedy, surrounding whitespace trimmed).
//! A JSON block that does not parse counts as absent; it never aborts the
//! other blocks. Callers only ever see a usable artifact or `None`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::models::session::SessionKind;

static ANALYSIS_JSON: Lazy<Regex> = Lazy::new(|| block_pattern("analysis_json"));
static ANALYSIS_MARKDOWN: Lazy<Regex> = Lazy::new(|| block_pattern("analysis_markdown"));
static ROADMAP_JSON: Lazy<Regex> = Lazy::new(|| block_pattern("roadmap_json"));
static RESUME_JSON: Lazy<Regex> = Lazy::new(|| block_pattern("resume_json"));

/// Keys a resume document must carry to be accepted.
pub const REQUIRED_RESUME_KEYS: [&str; 2] = ["personal_info", "education"];

fn block_pattern(tag: &str) -> Regex {
    Regex::new(&format!(r"(?s)<{tag}>\s*(.*?)\s*</{tag}>")).expect("static tag pattern")
}

#[derive(Debug, Clone, PartialEq)]
pub struct CareerExtract {
    pub analysis_json: Option<Value>,
    pub analysis_markdown: Option<String>,
    pub roadmap_json: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResumeExtract {
    pub resume_json: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedArtifact {
    Career(CareerExtract),
    Resume(ResumeExtract),
}

impl ExtractedArtifact {
    pub fn kind(&self) -> SessionKind {
        match self {
            ExtractedArtifact::Career(_) => SessionKind::Career,
            ExtractedArtifact::Resume(_) => SessionKind::Resume,
        }
    }

    /// The raw structured payload as sent to clients.
    pub fn payload(&self) -> Value {
        match self {
            ExtractedArtifact::Career(career) => serde_json::json!({
                "analysis_json": career.analysis_json,
                "analysis_markdown": career.analysis_markdown,
                "roadmap_json": career.roadmap_json,
            }),
            ExtractedArtifact::Resume(resume) => resume.resume_json.clone(),
        }
    }
}

/// Looks for the artifact of `kind` in `text`.
pub fn extract(kind: SessionKind, text: &str) -> Option<ExtractedArtifact> {
    match kind {
        SessionKind::Career => extract_career(text).map(ExtractedArtifact::Career),
        SessionKind::Resume => extract_resume(text).map(ExtractedArtifact::Resume),
    }
}

/// Usable when the analysis JSON parses or the markdown is non-empty. Roadmap is optional.
pub fn extract_career(text: &str) -> Option<CareerExtract> {
    let analysis_json = json_block(&ANALYSIS_JSON, text);
    let analysis_markdown = block(&ANALYSIS_MARKDOWN, text)
        .filter(|md| !md.is_empty())
        .map(str::to_string);

    if analysis_json.is_none() && analysis_markdown.is_none() {
        return None;
    }

    Some(CareerExtract {
        analysis_json,
        analysis_markdown,
        roadmap_json: json_block(&ROADMAP_JSON, text),
    })
}

/// Usable only when the block parses to an object holding every required key.
pub fn extract_resume(text: &str) -> Option<ResumeExtract> {
    let resume_json = json_block(&RESUME_JSON, text)?;
    let object = resume_json.as_object()?;
    if !REQUIRED_RESUME_KEYS.iter().all(|k| object.contains_key(*k)) {
        return None;
    }
    Some(ResumeExtract { resume_json })
}

fn block<'t>(pattern: &Regex, text: &'t str) -> Option<&'t str> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

fn json_block(pattern: &Regex, text: &str) -> Option<Value> {
    let raw = block(pattern, text)?;
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Discarding malformed JSON block: {e}");
            None
        }
    }
}
