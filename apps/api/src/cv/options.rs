use serde::{Deserialize, Serialize};

use crate::errors::AppError;

pub const MAX_PROJECTS_LIMIT: u32 = 20;
const MAX_TARGET_ROLE_LEN: usize = 100;
const LINKEDIN_PREFIXES: &[&str] = &["https://linkedin.com/in/", "https://www.linkedin.com/in/"];

/// Visual theme of the rendered CV.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CvTheme {
    #[default]
    #[serde(rename = "neon-tech")]
    NeonTech,
    #[serde(rename = "minimal")]
    Minimal,
    #[serde(rename = "enterprise")]
    Enterprise,
}

impl CvTheme {
    pub fn as_str(self) -> &'static str {
        match self {
            CvTheme::NeonTech => "neon-tech",
            CvTheme::Minimal => "minimal",
            CvTheme::Enterprise => "enterprise",
        }
    }
}

/// Options accepted by `POST /api/v1/cv/generate`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CvOptions {
    #[serde(alias = "template")]
    pub theme: CvTheme,
    pub max_projects: i64,
    pub target_role: Option<String>,
    pub include_forks: bool,
    pub include_linkedin: bool,
    pub linkedin_url: Option<String>,
}

impl Default for CvOptions {
    fn default() -> Self {
        Self {
            theme: CvTheme::NeonTech,
            max_projects: 5,
            target_role: None,
            include_forks: false,
            include_linkedin: false,
            linkedin_url: None,
        }
    }
}

impl CvOptions {
    /// Validates every field and reports all problems at once.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut problems: Vec<String> = Vec::new();

        if self.max_projects < 1 || self.max_projects > MAX_PROJECTS_LIMIT as i64 {
            problems.push(format!(
                "max_projects must be between 1 and {MAX_PROJECTS_LIMIT}"
            ));
        }

        if let Some(role) = &self.target_role {
            if role.trim().is_empty() {
                problems.push("target_role cannot be empty".to_string());
            } else if role.chars().count() > MAX_TARGET_ROLE_LEN {
                problems.push(format!(
                    "target_role must be at most {MAX_TARGET_ROLE_LEN} characters"
                ));
            }
        }

        if self.include_linkedin {
            match &self.linkedin_url {
                Some(url) if LINKEDIN_PREFIXES.iter().any(|p| url.starts_with(p)) => {}
                Some(_) => problems.push(
                    "linkedin_url must be a https://linkedin.com/in/ profile URL".to_string(),
                ),
                None => problems
                    .push("linkedin_url is required when include_linkedin is true".to_string()),
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(problems.join("; ")))
        }
    }

    /// Number of projects to render. Only meaningful after `validate`.
    pub fn project_limit(&self) -> usize {
        self.max_projects.clamp(1, MAX_PROJECTS_LIMIT as i64) as usize
    }

    /// Trimmed target role, if any.
    pub fn target_role(&self) -> Option<&str> {
        self.target_role
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}
