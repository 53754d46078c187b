// Prompt constants for CV summary generation.

/// System prompt that enforces JSON-only output.
pub const SUMMARY_SYSTEM: &str = "You are a precise technical resume writer. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Summary prompt template. Replace `{profile_json}` and `{target_role}` before sending.
pub const SUMMARY_PROMPT_TEMPLATE: &str = r#"Write resume copy for the developer described by this GitHub data:

{profile_json}

Target role: {target_role}

Return a JSON object with this EXACT schema (no extra fields):
{
  "summary": "2-3 sentence professional summary in third person, no first-person pronouns",
  "projects": {
    "owner/repo": "one sentence describing what the project does and the technologies used"
  }
}

Rules:
- Only mention languages, technologies and projects present in the data.
- Do NOT invent employers, metrics, dates or team sizes.
- Keep each project sentence under 30 words.
- Use the exact "owner/repo" keys from the data."#;
