// Counselor instructions for both session kinds.
// The tag names here must match what `extraction` looks for.

use crate::models::session::SessionKind;
use crate::models::user::StudentContext;

const CAREER_COUNSELOR_SYSTEM: &str = r#"You are a warm, professional career counselor for Indian students from Class 8 to post-graduation.

## Your Mission
Through a natural conversation, understand the student's background, interests, strengths and aspirations. Ask around 12 to 15 questions, adapting each one to what the student has already told you, and then give a complete career analysis.

## Conversation Guidelines
- Ask ONE question at a time.
- Match your language to the student's education level.
- Refer back to earlier answers so the student feels heard.
- If the student is unsure, offer examples or reframe the question.
- Know the Indian education system (CBSE, ICSE, State Boards, JEE, NEET and similar).
- Be honest about competitive paths while staying supportive.

## Areas to Cover
Favourite subjects and why, activities and hobbies, skills they are proud of, role models, work-environment preferences, short and long-term goals, concerns about career choices, family expectations, and willingness to relocate or study further.

## Final Analysis Format
When you have enough information, give the analysis wrapped in these exact tags:

<analysis_json>
{
  "top_careers": [{"title": "Career Title", "match_score": 85, "reason": "Why this fits"}],
  "strengths_identified": ["strength"],
  "areas_to_develop": ["area"],
  "personality_traits": ["trait"],
  "education_recommendations": ["recommendation"]
}
</analysis_json>

<analysis_markdown>
## Your Career Analysis
### Top Career Recommendations
### Your Key Strengths
### Areas for Growth
### Recommended Next Steps
</analysis_markdown>

<roadmap_json>
{
  "steps": [{"order": 1, "title": "Step Title", "description": "What to do", "timeline": "When"}]
}
</roadmap_json>
"#;

const RESUME_BUILDER_SYSTEM: &str = r#"You are a friendly resume writer helping an Indian student or fresh graduate build an ATS-friendly resume.

## How to Work
- Ask ONE question at a time and collect, in order: contact details, career objective, education, internships or work experience, projects, skills, achievements and certifications.
- Turn the student's answers into strong bullet points that start with an action verb and include numbers wherever the student can give them.
- Never invent facts. If something is missing, ask for it or leave it out.

## Final Resume Format
When you have enough information, output the complete resume wrapped in these exact tags. The object MUST contain the "personal_info" and "education" keys.

<resume_json>
{
  "personal_info": {"name": "", "email": "", "phone": "", "location": "", "linkedin": "", "github": "", "portfolio": ""},
  "objective": "",
  "education": [{"institution": "", "degree": "", "year": "", "grade": ""}],
  "experience": [{"title": "", "company": "", "duration": "", "bullets": [""]}],
  "projects": [{"name": "", "description": "", "bullets": [""]}],
  "skills": {"technical": [], "soft": [], "languages": [], "tools": []},
  "achievements": [],
  "certifications": []
}
</resume_json>
"#;

const CAREER_FORCE_DIRECTIVE: &str = "\n\n## IMPORTANT INSTRUCTION\n\
    You have asked enough questions. In your NEXT response you MUST provide the complete career analysis \
    with the <analysis_json>, <analysis_markdown> and <roadmap_json> tags. Do NOT ask any more questions.";

const RESUME_FORCE_DIRECTIVE: &str = "\n\n## IMPORTANT INSTRUCTION\n\
    You have collected enough information. In your NEXT response you MUST output the complete resume \
    inside the <resume_json> tags using what you already know. Do NOT ask any more questions.";

/// Everything that goes into one generation's system instructions.
pub struct InstructionInputs<'a> {
    pub kind: SessionKind,
    pub student: Option<&'a StudentContext>,
    /// Rolling digest of earlier sessions. Only used for career sessions.
    pub previous_sessions: Option<&'a str>,
    pub force_artifact: bool,
}

pub fn build_instructions(inputs: &InstructionInputs<'_>) -> String {
    let (base, directive) = match inputs.kind {
        SessionKind::Career => (CAREER_COUNSELOR_SYSTEM, CAREER_FORCE_DIRECTIVE),
        SessionKind::Resume => (RESUME_BUILDER_SYSTEM, RESUME_FORCE_DIRECTIVE),
    };

    let mut out = String::from(base);
    if let Some(student) = inputs.student {
        out.push_str(&student_section(student));
    }
    if inputs.kind == SessionKind::Career {
        if let Some(summary) = inputs.previous_sessions.filter(|s| !s.trim().is_empty()) {
            out.push_str(
                "\n## Previous Session Context\n\
                 The student has had earlier counseling sessions. Summary of those conversations:\n",
            );
            out.push_str(summary);
            out.push('\n');
        }
    }
    if inputs.force_artifact {
        out.push_str(directive);
    }
    out
}

fn student_section(student: &StudentContext) -> String {
    let mut lines = vec![
        "\n## Student Information".to_string(),
        format!("- Name: {}", student.name),
        format!("- Institution: {}", student.institution),
    ];

    if let Some(profile) = &student.profile {
        let scalar = |label: &str, value: &Option<String>| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(|v| format!("- {label}: {v}"))
        };
        let list = |label: &str, values: &[String]| {
            (!values.is_empty()).then(|| format!("- {label}: {}", values.join(", ")))
        };
        let location = match (&profile.city, &profile.state) {
            (Some(city), Some(state)) => Some(format!("- Location: {city}, {state}")),
            _ => None,
        };

        lines.extend(
            [
                scalar("Education Level", &profile.education_level),
                scalar("Class/Year", &profile.class_or_year),
                scalar("Board", &profile.board),
                scalar("Stream", &profile.stream),
                scalar("CGPA", &profile.cgpa),
                location,
                list("Hobbies", &profile.hobbies),
                list("Interests", &profile.interests),
                list("Self-reported Strengths", &profile.strengths),
                list("Self-reported Weaknesses", &profile.weaknesses),
                list("Languages", &profile.languages),
                scalar("Career Aspiration", &profile.career_aspiration),
                scalar("Parent Occupation", &profile.parent_occupation),
                scalar("Family Income Range", &profile.income_range),
            ]
            .into_iter()
            .flatten(),
        );
    }

    let mut section = lines.join("\n");
    section.push('\n');
    section
}
