//! Professional summary and per-project blurbs.
//!
//! The LLM is optional. Any failure (no key, transport, bad JSON) degrades to
//! the deterministic heuristic so a CV is always produced.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::cv::options::CvOptions;
use crate::github::models::{GitHubProfile, RepositoryDetail};
use crate::github::skills::{ExperienceLevel, SkillSummary};
use crate::llm_client::{prompts, LlmClient};

const MAX_BLURB_CHARS: usize = 240;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CvSummary {
    pub summary: String,
    /// Keyed by repository `full_name`.
    #[serde(default, rename = "projects")]
    pub project_blurbs: HashMap<String, String>,
}

impl CvSummary {
    /// Blurb for one project: the written one, else the description, else a generated line.
    pub fn project_blurb(&self, detail: &RepositoryDetail) -> String {
        let repo = &detail.repo;
        if let Some(blurb) = self
            .project_blurbs
            .get(&repo.full_name)
            .map(|b| b.trim())
            .filter(|b| !b.is_empty())
        {
            return truncate_chars(blurb, MAX_BLURB_CHARS);
        }
        if let Some(desc) = repo
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
        {
            return truncate_chars(desc, MAX_BLURB_CHARS);
        }
        let language = repo.language.as_deref().unwrap_or("Software");
        match repo.stargazers_count {
            1 => format!("{language} project with 1 star"),
            n => format!("{language} project with {n} stars"),
        }
    }
}

/// Writes the summary section, through the LLM when one is configured.
#[derive(Clone, Default)]
pub struct SummaryWriter {
    llm: Option<LlmClient>,
}

impl SummaryWriter {
    pub fn new(llm: Option<LlmClient>) -> Self {
        Self { llm }
    }

    pub fn heuristic() -> Self {
        Self { llm: None }
    }

    pub fn uses_llm(&self) -> bool {
        self.llm.is_some()
    }

    pub async fn write(
        &self,
        profile: &GitHubProfile,
        skills: &SkillSummary,
        options: &CvOptions,
    ) -> CvSummary {
        let Some(llm) = &self.llm else {
            return heuristic_summary(profile, skills, options);
        };

        let prompt = build_prompt(profile, skills, options);
        match llm.call_json::<CvSummary>(&prompt, prompts::SUMMARY_SYSTEM).await {
            Ok(written) if !written.summary.trim().is_empty() => {
                info!(
                    "LLM summary written for {} ({} project blurbs)",
                    profile.user.login,
                    written.project_blurbs.len()
                );
                written
            }
            Ok(_) => {
                warn!("LLM returned an empty summary, using heuristic");
                heuristic_summary(profile, skills, options)
            }
            Err(e) => {
                warn!("LLM summary failed, using heuristic: {e}");
                heuristic_summary(profile, skills, options)
            }
        }
    }
}

fn build_prompt(profile: &GitHubProfile, skills: &SkillSummary, options: &CvOptions) -> String {
    let projects: Vec<_> = profile
        .repositories
        .iter()
        .take(options.project_limit())
        .map(|d| {
            json!({
                "full_name": d.repo.full_name,
                "description": d.repo.description,
                "language": d.repo.language,
                "topics": d.repo.topics,
                "stars": d.repo.stargazers_count,
                "commits": d.commit_count,
            })
        })
        .collect();
    let data = json!({
        "login": profile.user.login,
        "name": profile.user.name,
        "bio": profile.user.bio,
        "experience_level": skills.experience_level.label(),
        "languages": skills.languages.iter().map(|l| &l.name).collect::<Vec<_>>(),
        "technologies": skills.technologies.iter().map(|t| &t.name).collect::<Vec<_>>(),
        "projects": projects,
    });
    let profile_json = serde_json::to_string_pretty(&data).unwrap_or_else(|_| data.to_string());

    prompts::SUMMARY_PROMPT_TEMPLATE
        .replace("{profile_json}", &profile_json)
        .replace(
            "{target_role}",
            options.target_role().unwrap_or("Software Engineer"),
        )
}

/// Deterministic two-to-three sentence summary built from the aggregated data.
pub fn heuristic_summary(
    profile: &GitHubProfile,
    skills: &SkillSummary,
    options: &CvOptions,
) -> CvSummary {
    let role = options
        .target_role()
        .map(str::to_string)
        .unwrap_or_else(|| "software developer".to_string());
    let level = match skills.experience_level {
        ExperienceLevel::Junior => "Emerging",
        ExperienceLevel::Mid => "Capable",
        ExperienceLevel::Senior => "Seasoned",
    };

    let mut sentences = Vec::new();
    let languages: Vec<&str> = skills
        .languages
        .iter()
        .take(3)
        .map(|l| l.name.as_str())
        .collect();
    if languages.is_empty() {
        sentences.push(format!("{level} {role} with a public GitHub portfolio."));
    } else {
        sentences.push(format!(
            "{level} {role} working primarily in {}.",
            join_natural(&languages)
        ));
    }

    let technologies: Vec<&str> = skills
        .technologies
        .iter()
        .take(4)
        .map(|t| t.name.as_str())
        .collect();
    if !technologies.is_empty() {
        sentences.push(format!(
            "Hands-on experience with {}.",
            join_natural(&technologies)
        ));
    }

    let repo_count = profile.repositories.len();
    if repo_count > 0 {
        let noun = if repo_count == 1 { "project" } else { "projects" };
        let stars = match skills.total_stars {
            0 => String::new(),
            1 => " earning 1 star".to_string(),
            n => format!(" earning {n} stars"),
        };
        sentences.push(format!(
            "Maintains {repo_count} featured open source {noun}{stars}."
        ));
    }

    CvSummary {
        summary: sentences.join(" "),
        project_blurbs: HashMap::new(),
    }
}

fn join_natural(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [one] => one.to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max - 3).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cv::document::tests::sample_profile;
    use crate::github::skills::extract_skills;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_join_natural() {
        assert_eq!(join_natural(&["Rust"]), "Rust");
        assert_eq!(join_natural(&["Rust", "Go"]), "Rust and Go");
        assert_eq!(join_natural(&["Rust", "Go", "C"]), "Rust, Go and C");
    }

    #[test]
    fn test_heuristic_mentions_languages_and_projects() {
        let profile = sample_profile(3);
        let skills = extract_skills(&profile);
        let summary = heuristic_summary(&profile, &skills, &CvOptions::default());
        assert!(summary.summary.contains("Rust"));
        assert!(summary.summary.contains("3 featured open source projects"));
    }

    #[test]
    fn test_heuristic_uses_target_role() {
        let profile = sample_profile(1);
        let skills = extract_skills(&profile);
        let options = CvOptions {
            target_role: Some("Platform Engineer".to_string()),
            ..CvOptions::default()
        };
        let summary = heuristic_summary(&profile, &skills, &options);
        assert!(summary.summary.contains("Platform Engineer"));
    }

    #[test]
    fn test_project_blurb_fallbacks() {
        let profile = sample_profile(1);
        let mut detail = profile.repositories[0].clone();
        let empty = CvSummary::default();
        assert_eq!(
            empty.project_blurb(&detail),
            "A docker-ready service number 0"
        );

        detail.repo.description = None;
        detail.repo.stargazers_count = 1;
        assert_eq!(empty.project_blurb(&detail), "Rust project with 1 star");

        let written = CvSummary {
            summary: String::new(),
            project_blurbs: HashMap::from([(
                "octocat/project-0".to_string(),
                "Written blurb".to_string(),
            )]),
        };
        assert_eq!(written.project_blurb(&detail), "Written blurb");
    }

    #[test]
    fn test_long_blurb_is_truncated() {
        let text = "word ".repeat(100);
        let out = truncate_chars(&text, 20);
        assert!(out.chars().count() <= 20);
        assert!(out.ends_with("..."));
    }

    #[tokio::test]
    async fn test_llm_summary_used_when_available() {
        let server = MockServer::start().await;
        let text = r#"{"summary": "Octo builds services.", "projects": {"octocat/project-0": "A service."}}"#;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": text}],
                "usage": {"input_tokens": 1, "output_tokens": 1}
            })))
            .mount(&server)
            .await;

        let llm = LlmClient::new("k".to_string())
            .unwrap()
            .with_base_url(server.uri());
        let writer = SummaryWriter::new(Some(llm));
        let profile = sample_profile(1);
        let skills = extract_skills(&profile);
        let summary = writer.write(&profile, &skills, &CvOptions::default()).await;
        assert_eq!(summary.summary, "Octo builds services.");
        assert_eq!(
            summary.project_blurb(&profile.repositories[0]),
            "A service."
        );
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_to_heuristic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let llm = LlmClient::new("k".to_string())
            .unwrap()
            .with_base_url(server.uri())
            .with_retry_base_delay(Duration::from_millis(1));
        let writer = SummaryWriter::new(Some(llm));
        let profile = sample_profile(2);
        let skills = extract_skills(&profile);
        let summary = writer.write(&profile, &skills, &CvOptions::default()).await;
        assert!(summary.summary.contains("Rust"));
    }
}
