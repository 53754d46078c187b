//! Heuristic skill extraction from an aggregated GitHub profile.
//!
//! No LLM calls. Everything here is deterministic so the CV renders the same
//! skills for the same profile.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::github::models::{ActivitySummary, GitHubProfile};

const MAX_LANGUAGES: usize = 8;
const MAX_TECHNOLOGIES: usize = 12;
const MIN_LANGUAGE_SHARE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechCategory {
    Framework,
    Database,
    DevOps,
    Cloud,
    Tooling,
}

impl TechCategory {
    pub fn label(self) -> &'static str {
        match self {
            TechCategory::Framework => "Frameworks",
            TechCategory::Database => "Databases",
            TechCategory::DevOps => "DevOps",
            TechCategory::Cloud => "Cloud",
            TechCategory::Tooling => "Tooling",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Junior,
    Mid,
    Senior,
}

impl ExperienceLevel {
    pub fn label(self) -> &'static str {
        match self {
            ExperienceLevel::Junior => "Junior",
            ExperienceLevel::Mid => "Mid-level",
            ExperienceLevel::Senior => "Senior",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageSkill {
    pub name: String,
    pub bytes: u64,
    /// Share of all counted bytes, rounded to a whole percent.
    pub percentage: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnologySkill {
    pub name: String,
    pub category: TechCategory,
    /// Number of repositories that mention this technology.
    pub repositories: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillSummary {
    pub languages: Vec<LanguageSkill>,
    pub technologies: Vec<TechnologySkill>,
    pub experience_level: ExperienceLevel,
    pub total_stars: u32,
    pub total_commits: u32,
    pub activity: ActivitySummary,
}

impl SkillSummary {
    /// Technologies grouped by category, categories in declaration order.
    pub fn technologies_by_category(&self) -> BTreeMap<TechCategory, Vec<&str>> {
        let mut grouped: BTreeMap<TechCategory, Vec<&str>> = BTreeMap::new();
        for tech in &self.technologies {
            grouped.entry(tech.category).or_default().push(tech.name.as_str());
        }
        grouped
    }
}

/// Keyword → (display name, category). Matched against topics exactly and
/// against repository names and descriptions as whole words.
static TECH_KEYWORDS: &[(&str, &str, TechCategory)] = &[
    ("react", "React", TechCategory::Framework),
    ("nextjs", "Next.js", TechCategory::Framework),
    ("next.js", "Next.js", TechCategory::Framework),
    ("vue", "Vue", TechCategory::Framework),
    ("angular", "Angular", TechCategory::Framework),
    ("svelte", "Svelte", TechCategory::Framework),
    ("django", "Django", TechCategory::Framework),
    ("flask", "Flask", TechCategory::Framework),
    ("fastapi", "FastAPI", TechCategory::Framework),
    ("rails", "Rails", TechCategory::Framework),
    ("spring", "Spring", TechCategory::Framework),
    ("express", "Express", TechCategory::Framework),
    ("axum", "Axum", TechCategory::Framework),
    ("actix", "Actix", TechCategory::Framework),
    ("tokio", "Tokio", TechCategory::Framework),
    ("tensorflow", "TensorFlow", TechCategory::Framework),
    ("pytorch", "PyTorch", TechCategory::Framework),
    ("postgres", "PostgreSQL", TechCategory::Database),
    ("postgresql", "PostgreSQL", TechCategory::Database),
    ("mysql", "MySQL", TechCategory::Database),
    ("sqlite", "SQLite", TechCategory::Database),
    ("mongodb", "MongoDB", TechCategory::Database),
    ("redis", "Redis", TechCategory::Database),
    ("elasticsearch", "Elasticsearch", TechCategory::Database),
    ("docker", "Docker", TechCategory::DevOps),
    ("kubernetes", "Kubernetes", TechCategory::DevOps),
    ("k8s", "Kubernetes", TechCategory::DevOps),
    ("terraform", "Terraform", TechCategory::DevOps),
    ("ansible", "Ansible", TechCategory::DevOps),
    ("github-actions", "GitHub Actions", TechCategory::DevOps),
    ("ci", "CI/CD", TechCategory::DevOps),
    ("aws", "AWS", TechCategory::Cloud),
    ("gcp", "Google Cloud", TechCategory::Cloud),
    ("azure", "Azure", TechCategory::Cloud),
    ("serverless", "Serverless", TechCategory::Cloud),
    ("graphql", "GraphQL", TechCategory::Tooling),
    ("grpc", "gRPC", TechCategory::Tooling),
    ("webassembly", "WebAssembly", TechCategory::Tooling),
    ("wasm", "WebAssembly", TechCategory::Tooling),
    ("cli", "CLI tooling", TechCategory::Tooling),
    ("llm", "LLMs", TechCategory::Tooling),
];

pub fn extract_skills(profile: &GitHubProfile) -> SkillSummary {
    extract_skills_at(profile, Utc::now())
}

/// Same as `extract_skills` with an explicit clock.
pub fn extract_skills_at(profile: &GitHubProfile, now: DateTime<Utc>) -> SkillSummary {
    let total_stars: u32 = profile
        .repositories
        .iter()
        .map(|r| r.repo.stargazers_count)
        .sum();
    let total_commits: u32 = profile.repositories.iter().map(|r| r.commit_count).sum();

    let account_years = profile
        .user
        .created_at
        .map(|created| (now - created).num_days() as f64 / 365.25)
        .unwrap_or(0.0);

    SkillSummary {
        languages: rank_languages(profile),
        technologies: detect_technologies(profile),
        experience_level: estimate_experience(account_years, total_stars, profile.user.public_repos),
        total_stars,
        total_commits,
        activity: profile.activity.clone(),
    }
}

fn rank_languages(profile: &GitHubProfile) -> Vec<LanguageSkill> {
    let mut totals: HashMap<&str, u64> = HashMap::new();
    for detail in &profile.repositories {
        if detail.languages.is_empty() {
            // No byte breakdown: count the primary language once.
            if let Some(lang) = &detail.repo.language {
                *totals.entry(lang.as_str()).or_default() += 1;
            }
            continue;
        }
        for (lang, bytes) in &detail.languages {
            *totals.entry(lang.as_str()).or_default() += bytes;
        }
    }

    let grand_total: u64 = totals.values().sum();
    if grand_total == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<(&str, u64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    ranked
        .into_iter()
        .filter(|(_, bytes)| (*bytes as f64 / grand_total as f64) >= MIN_LANGUAGE_SHARE)
        .take(MAX_LANGUAGES)
        .map(|(name, bytes)| LanguageSkill {
            name: name.to_string(),
            bytes,
            percentage: ((bytes as f64 / grand_total as f64) * 100.0).round() as u8,
        })
        .collect()
}

fn detect_technologies(profile: &GitHubProfile) -> Vec<TechnologySkill> {
    let mut counts: HashMap<&'static str, (TechCategory, u32)> = HashMap::new();

    for detail in &profile.repositories {
        let repo = &detail.repo;
        let topics: HashSet<String> = repo.topics.iter().map(|t| t.to_lowercase()).collect();
        let words = text_words(&format!(
            "{} {}",
            repo.name,
            repo.description.as_deref().unwrap_or("")
        ));

        let mut seen: HashSet<&'static str> = HashSet::new();
        for (keyword, display, category) in TECH_KEYWORDS {
            if topics.contains(*keyword) || words.contains(*keyword) {
                seen.insert(*display);
                counts.entry(*display).or_insert((*category, 0));
            }
        }
        for display in seen {
            if let Some(entry) = counts.get_mut(display) {
                entry.1 += 1;
            }
        }
    }

    let mut technologies: Vec<TechnologySkill> = counts
        .into_iter()
        .map(|(name, (category, repositories))| TechnologySkill {
            name: name.to_string(),
            category,
            repositories,
        })
        .collect();
    technologies.sort_by(|a, b| {
        b.repositories
            .cmp(&a.repositories)
            .then_with(|| a.name.cmp(&b.name))
    });
    technologies.truncate(MAX_TECHNOLOGIES);
    technologies
}

/// Lowercased words split on anything that is not alphanumeric, `.` or `-`.
fn text_words(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    let mut words: HashSet<String> = HashSet::new();
    for raw in lowered.split(|c: char| !(c.is_alphanumeric() || c == '.' || c == '-')) {
        let word = raw.trim_matches(|c| c == '.' || c == '-');
        if word.is_empty() {
            continue;
        }
        words.insert(word.to_string());
        // "rust-axum-api" should still match "axum"
        for part in word.split('-') {
            if !part.is_empty() {
                words.insert(part.to_string());
            }
        }
    }
    words
}

fn estimate_experience(account_years: f64, total_stars: u32, public_repos: u32) -> ExperienceLevel {
    if account_years >= 6.0 && (total_stars >= 100 || public_repos >= 30) {
        ExperienceLevel::Senior
    } else if account_years >= 2.0 && (total_stars >= 10 || public_repos >= 10) {
        ExperienceLevel::Mid
    } else {
        ExperienceLevel::Junior
    }
}
