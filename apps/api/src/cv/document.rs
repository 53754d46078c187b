//! Declarative CV description.
//!
//! `build_document` turns the aggregated GitHub data into a theme-agnostic tree
//! of sections and blocks. Layout and rendering consume this tree; nothing here
//! knows about fonts or pages.

use serde::{Deserialize, Serialize};

use crate::cv::options::CvOptions;
use crate::cv::summary::CvSummary;
use crate::github::models::{GitHubProfile, RepositoryDetail};
use crate::github::skills::SkillSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Header,
    Summary,
    Skills,
    Projects,
    Activity,
    Links,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Top-level name line. Only the header uses it.
    Title { text: String },
    Subtitle { text: String },
    Heading { text: String },
    Paragraph { text: String },
    Bullet { text: String },
    KeyValue { key: String, value: String },
    Rule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub kind: SectionKind,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvDocument {
    pub title: String,
    pub sections: Vec<Section>,
}

impl CvDocument {
    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }
}

pub fn build_document(
    profile: &GitHubProfile,
    skills: &SkillSummary,
    summary: &CvSummary,
    options: &CvOptions,
) -> CvDocument {
    let user = &profile.user;
    let display_name = user.name.clone().unwrap_or_else(|| user.login.clone());

    let mut sections = vec![header_section(profile, &display_name, skills, options)];

    if !summary.summary.trim().is_empty() {
        sections.push(Section {
            kind: SectionKind::Summary,
            blocks: vec![
                Block::Heading {
                    text: "Summary".to_string(),
                },
                Block::Paragraph {
                    text: summary.summary.clone(),
                },
            ],
        });
    }

    if let Some(section) = skills_section(skills) {
        sections.push(section);
    }

    let projects: Vec<&RepositoryDetail> = profile
        .repositories
        .iter()
        .take(options.project_limit())
        .collect();
    if !projects.is_empty() {
        sections.push(projects_section(&projects, summary));
    }

    if let Some(section) = activity_section(skills) {
        sections.push(section);
    }

    sections.push(links_section(profile, options));

    CvDocument {
        title: format!("{display_name} - CV"),
        sections,
    }
}

fn header_section(
    profile: &GitHubProfile,
    display_name: &str,
    skills: &SkillSummary,
    options: &CvOptions,
) -> Section {
    let user = &profile.user;
    let subtitle = match options.target_role() {
        Some(role) => role.to_string(),
        None => match skills.languages.first() {
            Some(lang) => format!("{} {} Developer", skills.experience_level.label(), lang.name),
            None => format!("{} Software Developer", skills.experience_level.label()),
        },
    };

    let mut contact: Vec<String> = Vec::new();
    if let Some(location) = user.location.as_deref().filter(|l| !l.is_empty()) {
        contact.push(location.to_string());
    }
    if let Some(email) = user.email.as_deref().filter(|e| !e.is_empty()) {
        contact.push(email.to_string());
    }
    contact.push(format!("github.com/{}", user.login));

    let mut blocks = vec![
        Block::Title {
            text: display_name.to_string(),
        },
        Block::Subtitle { text: subtitle },
        Block::Paragraph {
            text: contact.join("  |  "),
        },
    ];
    if let Some(bio) = user.bio.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
        blocks.push(Block::Paragraph {
            text: bio.to_string(),
        });
    }
    blocks.push(Block::Rule);

    Section {
        kind: SectionKind::Header,
        blocks,
    }
}

fn skills_section(skills: &SkillSummary) -> Option<Section> {
    if skills.languages.is_empty() && skills.technologies.is_empty() {
        return None;
    }

    let mut blocks = vec![Block::Heading {
        text: "Skills".to_string(),
    }];
    if !skills.languages.is_empty() {
        let languages: Vec<String> = skills
            .languages
            .iter()
            .map(|l| format!("{} ({}%)", l.name, l.percentage))
            .collect();
        blocks.push(Block::KeyValue {
            key: "Languages".to_string(),
            value: languages.join(", "),
        });
    }
    for (category, names) in skills.technologies_by_category() {
        blocks.push(Block::KeyValue {
            key: category.label().to_string(),
            value: names.join(", "),
        });
    }

    Some(Section {
        kind: SectionKind::Skills,
        blocks,
    })
}

fn projects_section(projects: &[&RepositoryDetail], summary: &CvSummary) -> Section {
    let mut blocks = vec![Block::Heading {
        text: "Projects".to_string(),
    }];

    for detail in projects {
        let repo = &detail.repo;
        let mut meta: Vec<String> = Vec::new();
        if let Some(lang) = &repo.language {
            meta.push(lang.clone());
        }
        if repo.stargazers_count > 0 {
            meta.push(format!("{} stars", repo.stargazers_count));
        }
        if detail.commit_count > 0 {
            meta.push(format!("{} commits", detail.commit_count));
        }
        let value = if meta.is_empty() {
            repo.html_url.clone()
        } else {
            format!("{}  |  {}", meta.join(" / "), repo.html_url)
        };
        blocks.push(Block::KeyValue {
            key: repo.name.clone(),
            value,
        });
        blocks.push(Block::Bullet {
            text: summary.project_blurb(detail),
        });
    }

    Section {
        kind: SectionKind::Projects,
        blocks,
    }
}

fn activity_section(skills: &SkillSummary) -> Option<Section> {
    let a = &skills.activity;
    let mut blocks = vec![Block::Heading {
        text: "Open Source Activity".to_string(),
    }];

    if skills.total_commits > 0 || skills.total_stars > 0 {
        blocks.push(Block::Bullet {
            text: format!(
                "{} commits across featured repositories, {} stars earned",
                skills.total_commits, skills.total_stars
            ),
        });
    }
    if a.push_events > 0 {
        blocks.push(Block::Bullet {
            text: format!(
                "{} commits pushed in {} pushes across {} repositories recently",
                a.commits_pushed, a.push_events, a.repositories_touched
            ),
        });
    }
    if a.pull_requests_opened > 0 || a.reviews > 0 {
        blocks.push(Block::Bullet {
            text: format!(
                "{} pull requests opened and {} code reviews",
                a.pull_requests_opened, a.reviews
            ),
        });
    }
    if a.issues_opened > 0 {
        blocks.push(Block::Bullet {
            text: format!("{} issues reported", a.issues_opened),
        });
    }

    (blocks.len() > 1).then_some(Section {
        kind: SectionKind::Activity,
        blocks,
    })
}

fn links_section(profile: &GitHubProfile, options: &CvOptions) -> Section {
    let user = &profile.user;
    let mut blocks = vec![Block::Heading {
        text: "Links".to_string(),
    }];
    blocks.push(Block::KeyValue {
        key: "GitHub".to_string(),
        value: user
            .html_url
            .clone()
            .unwrap_or_else(|| format!("https://github.com/{}", user.login)),
    });
    if let Some(blog) = user.blog.as_deref().filter(|b| !b.is_empty()) {
        blocks.push(Block::KeyValue {
            key: "Website".to_string(),
            value: blog.to_string(),
        });
    }
    if options.include_linkedin {
        if let Some(url) = &options.linkedin_url {
            blocks.push(Block::KeyValue {
                key: "LinkedIn".to_string(),
                value: url.clone(),
            });
        }
    }

    Section {
        kind: SectionKind::Links,
        blocks,
    }
}
