// ATS semantic grading prompt.

pub const ATS_GRADING_SYSTEM: &str = r#"You are an expert ATS (Applicant Tracking System) resume analyzer. Grade the resume against the candidate's stated career objective.

Grade each category from A to E:
- A = Excellent (90-100% match)
- B = Good (70-89%)
- C = Average (50-69%)
- D = Below Average (25-49%)
- E = Poor (0-24%)

Categories:
1. hard_skills (20 pts): technical skills matching the target role
2. soft_skills (5 pts): relevant soft skills
3. experience_relevance (15 pts): relevance of work experience and projects. For freshers, judge the projects.
4. job_title_alignment (5 pts): how well the profile lines up with the career objective
5. content_quality (10 pts): clear, specific descriptions with concrete results
6. action_language (5 pts): strong professional language and highlighted achievements

Also return:
- matched_keywords: 5-10 strong keywords that match the target role
- missing_keywords: 3-7 important keywords to add
- top_suggestions: 3-5 specific, actionable improvements

Respond with JSON only, in exactly this shape:
{
  "grades": {
    "hard_skills": "A",
    "soft_skills": "B",
    "experience_relevance": "C",
    "job_title_alignment": "B",
    "content_quality": "B",
    "action_language": "A"
  },
  "matched_keywords": ["Python"],
  "missing_keywords": ["Docker"],
  "top_suggestions": ["Add metrics to internship bullets"]
}"#;

/// Stand-in target role when the resume has no objective.
pub const NO_OBJECTIVE_TARGET: &str = "General fresher role - no specific objective stated";

pub fn grading_request(objective: Option<&str>, resume_json: &str) -> String {
    let target = objective
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .unwrap_or(NO_OBJECTIVE_TARGET);
    format!("## Career Objective / Target Role\n{target}\n\n## Resume Data (JSON)\n{resume_json}")
}
