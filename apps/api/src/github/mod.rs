// GitHub data aggregation: REST client, parallel repository fan-out, skill heuristics.
// All GitHub API traffic goes through client::GitHubClient.

pub mod aggregate;
pub mod client;
pub mod errors;
pub mod models;
pub mod skills;

pub use aggregate::{fetch_profile, FetchOptions};
pub use client::GitHubClient;
pub use errors::{ErrorCategory, GitHubError};
