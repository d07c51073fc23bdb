//! Rule-based half of the ATS report. Local, no external calls.
//!
//! Each category is a row in [`CATEGORIES`]: a cap, a scoring rule and a tip
//! ladder. Rules never see each other's results.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::ats::{percentage, round_ratio, CategoryScore, ScoreKind};

pub const MAX_TOTAL: u32 = 40;

struct Category {
    key: &'static str,
    label: &'static str,
    max: u32,
    rule: fn(&Value) -> Rated,
}

struct Rated {
    score: u32,
    tip: String,
}

static CATEGORIES: [Category; 7] = [
    Category {
        key: "contact_info",
        label: "Contact Info",
        max: 5,
        rule: contact_info,
    },
    Category {
        key: "section_completeness",
        label: "Section Structure",
        max: 10,
        rule: section_completeness,
    },
    Category {
        key: "skills_density",
        label: "Skills Density",
        max: 5,
        rule: skills_density,
    },
    Category {
        key: "action_verbs",
        label: "Action Verbs",
        max: 5,
        rule: action_verbs,
    },
    Category {
        key: "quantified_achievements",
        label: "Quantified Achievements",
        max: 5,
        rule: quantified_achievements,
    },
    Category {
        key: "content_length",
        label: "Content Length",
        max: 5,
        rule: content_length,
    },
    Category {
        key: "formatting",
        label: "Formatting",
        max: 5,
        rule: formatting,
    },
];

/// Scores every category, capped at its maximum, in table order.
pub fn score(resume: &Value) -> Vec<CategoryScore> {
    CATEGORIES
        .iter()
        .map(|category| {
            let rated = (category.rule)(resume);
            let score = rated.score.min(category.max);
            CategoryScore {
                key: category.key,
                label: category.label,
                score,
                max: category.max,
                percentage: percentage(score, category.max),
                tip: Some(rated.tip),
                grade: None,
                kind: ScoreKind::Deterministic,
            }
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Tip ladders: the first rung whose bound exceeds the value wins.
// ────────────────────────────────────────────────────────────────────────────

type Ladder = [(u32, &'static str)];

fn climb(ladder: &Ladder, value: u32) -> &'static str {
    ladder
        .iter()
        .find(|(below, _)| value < *below)
        .or(ladder.last())
        .map(|(_, tip)| *tip)
        .unwrap_or_default()
}

/// By skill count. `{n}` is replaced with the number still missing to reach five.
const SKILL_TIPS: &Ladder = &[
    (5, "Add {n} more skills for better ATS matching"),
    (8, "Good skill count. Consider adding more domain-specific skills"),
    (u32::MAX, "Excellent skills density for ATS matching"),
];

/// By action-verb score.
const ACTION_VERB_TIPS: &Ladder = &[
    (4, "Start more bullets with: Led, Developed, Achieved, Implemented"),
    (u32::MAX, "Excellent use of action verbs"),
];
const NO_BULLETS_ACTION_TIP: &str = "Add experience/project bullets starting with action verbs";

/// By quantified-achievement score.
const QUANTIFIED_TIPS: &Ladder = &[
    (4, "Add numbers and percentages to more bullet points"),
    (u32::MAX, "Great use of quantified metrics"),
];
const NO_BULLETS_QUANTIFIED_TIP: &str =
    "Include measurable achievements (e.g., 'increased efficiency by 30%')";

/// Word-count bands: (upper bound inclusive, score, tip).
const LENGTH_BANDS: [(usize, u32, &str); 4] = [
    (149, 1, "Resume is too short. Add more detail"),
    (299, 3, "Could be more detailed. Add more bullet points"),
    (800, 5, "Content length is ideal for ATS"),
    (usize::MAX, 4, "Consider trimming for conciseness"),
];

// ────────────────────────────────────────────────────────────────────────────
// Rules
// ────────────────────────────────────────────────────────────────────────────

const CONTACT_FIELDS: [&str; 4] = ["name", "email", "phone", "location"];
const PROFILE_LINKS: [&str; 3] = ["linkedin", "portfolio", "github"];

fn contact_info(resume: &Value) -> Rated {
    let info = &resume["personal_info"];
    let missing: Vec<&str> = CONTACT_FIELDS
        .iter()
        .copied()
        .filter(|f| !is_filled(&info[*f]))
        .collect();
    let present = (CONTACT_FIELDS.len() - missing.len()) as u32;
    let has_link = PROFILE_LINKS.iter().any(|k| is_filled(&info[*k]));

    // present/4 of 4 points, plus one for a profile link
    let score = round_ratio(present, CONTACT_FIELDS.len() as u32, 4) + u32::from(has_link);

    let tip = if !missing.is_empty() {
        format!("Add missing: {}", missing.join(", "))
    } else if !has_link {
        "Add a LinkedIn or portfolio link".to_string()
    } else {
        "All contact information present".to_string()
    };
    Rated { score, tip }
}

const SECTIONS: [&str; 7] = [
    "objective",
    "education",
    "experience",
    "projects",
    "skills",
    "achievements",
    "certifications",
];

fn section_completeness(resume: &Value) -> Rated {
    let missing: Vec<&str> = SECTIONS
        .iter()
        .copied()
        .filter(|s| !is_filled(&resume[*s]))
        .collect();
    let filled = (SECTIONS.len() - missing.len()) as u32;

    let tip = if missing.is_empty() {
        "All key sections present".to_string()
    } else {
        format!("Add: {}", missing[..missing.len().min(3)].join(", "))
    };
    Rated {
        score: round_ratio(filled, SECTIONS.len() as u32, 10),
        tip,
    }
}

const SKILL_GROUPS: [&str; 4] = ["technical", "soft", "languages", "tools"];
const SKILLS_FOR_FULL_MARKS: u32 = 8;

fn skills_density(resume: &Value) -> Rated {
    let count = SKILL_GROUPS
        .iter()
        .map(|g| array(&resume["skills"][*g]).iter().filter(|s| is_filled(s)).count())
        .sum::<usize>() as u32;

    let score = round_ratio(count.min(SKILLS_FOR_FULL_MARKS), SKILLS_FOR_FULL_MARKS, 5);
    let tip = climb(SKILL_TIPS, count).replace("{n}", &5u32.saturating_sub(count).to_string());
    Rated { score, tip }
}

pub const STRONG_ACTION_VERBS: [&str; 43] = [
    "led", "managed", "developed", "designed", "implemented", "created", "built", "launched",
    "achieved", "increased", "decreased", "improved", "delivered", "drove", "spearheaded",
    "orchestrated", "optimized", "streamlined", "established", "negotiated", "coordinated",
    "mentored", "pioneered", "resolved", "transformed", "generated", "automated", "analyzed",
    "engineered", "architected", "directed", "supervised", "collaborated", "initiated",
    "executed", "secured", "published", "presented", "facilitated", "championed",
    "integrated", "maintained", "reduced",
];

fn starts_with_action_verb(bullet: &str) -> bool {
    bullet
        .split_whitespace()
        .next()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphabetic())
                .to_lowercase()
        })
        .is_some_and(|word| STRONG_ACTION_VERBS.contains(&word.as_str()))
}

fn action_verbs(resume: &Value) -> Rated {
    let bullets = bullets(resume);
    if bullets.is_empty() {
        return Rated {
            score: 0,
            tip: NO_BULLETS_ACTION_TIP.to_string(),
        };
    }
    let strong = bullets.iter().filter(|b| starts_with_action_verb(b)).count() as u32;
    let score = round_ratio(strong, bullets.len() as u32, 5);
    Rated {
        score,
        tip: climb(ACTION_VERB_TIPS, score).to_string(),
    }
}

static METRIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+[%+]?|\$\d").expect("static metric pattern"));

fn quantified_achievements(resume: &Value) -> Rated {
    let bullets = bullets(resume);
    if bullets.is_empty() {
        return Rated {
            score: 0,
            tip: NO_BULLETS_QUANTIFIED_TIP.to_string(),
        };
    }
    let quantified = bullets.iter().filter(|b| METRIC.is_match(b)).count() as u32;
    // scaled to 6 so five of six quantified bullets already earn full marks
    let score = round_ratio(quantified, bullets.len() as u32, 6).min(5);
    Rated {
        score,
        tip: climb(QUANTIFIED_TIPS, score).to_string(),
    }
}

fn content_length(resume: &Value) -> Rated {
    let words = count_words(resume);
    let (_, score, tip) = LENGTH_BANDS
        .iter()
        .copied()
        .find(|(upper, _, _)| words <= *upper)
        .unwrap_or(LENGTH_BANDS[LENGTH_BANDS.len() - 1]);
    Rated {
        score,
        tip: tip.to_string(),
    }
}

/// Structural checks, one point each.
const FORMATTING_PENALTIES: [(fn(&Value) -> bool, &str); 4] = [
    (experience_without_bullets, "experience entries missing bullets"),
    (project_without_description, "projects missing descriptions"),
    (missing_objective, "missing career objective"),
    (education_without_grade, "education missing grade/CGPA"),
];

fn experience_without_bullets(resume: &Value) -> bool {
    array(&resume["experience"])
        .iter()
        .any(|e| !is_filled(&e["bullets"]))
}

fn project_without_description(resume: &Value) -> bool {
    array(&resume["projects"])
        .iter()
        .any(|p| !is_filled(&p["bullets"]) && !is_filled(&p["description"]))
}

fn missing_objective(resume: &Value) -> bool {
    !is_filled(&resume["objective"])
}

fn education_without_grade(resume: &Value) -> bool {
    array(&resume["education"])
        .iter()
        .any(|e| !is_filled(&e["grade"]))
}

fn formatting(resume: &Value) -> Rated {
    let issues: Vec<&str> = FORMATTING_PENALTIES
        .iter()
        .filter(|(check, _)| check(resume))
        .map(|(_, issue)| *issue)
        .collect();
    let tip = if issues.is_empty() {
        "Well-structured format".to_string()
    } else {
        format!("Fix: {}", issues[..issues.len().min(2)].join("; "))
    };
    Rated {
        score: 5u32.saturating_sub(issues.len() as u32),
        tip,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// JSON helpers
// ────────────────────────────────────────────────────────────────────────────

fn array(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or_default()
}

/// Non-null, non-blank, non-empty.
fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(_) => true,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => fields.values().any(is_filled),
    }
}

/// Bullet text from experience and project entries.
fn bullets(resume: &Value) -> Vec<&str> {
    ["experience", "projects"]
        .iter()
        .flat_map(|section| array(&resume[*section]))
        .flat_map(|entry| array(&entry["bullets"]))
        .filter_map(Value::as_str)
        .filter(|b| !b.trim().is_empty())
        .collect()
}

/// Whitespace-separated words across every string in the document.
fn count_words(value: &Value) -> usize {
    match value {
        Value::String(s) => s.split_whitespace().count(),
        Value::Array(items) => items.iter().map(count_words).sum(),
        Value::Object(fields) => fields.values().map(count_words).sum(),
        _ => 0,
    }
}
