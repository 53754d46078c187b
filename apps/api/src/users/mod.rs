// User accounts created through GitHub sign-in.

pub mod handlers;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::github::models::GitHubUser;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub github_id: i64,
    pub github_username: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    /// OAuth token used for the user's own GitHub reads. Never sent to clients.
    #[serde(skip_serializing, default)]
    pub github_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn from_github(profile: &GitHubUser, token: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            github_id: profile.id,
            github_username: profile.login.clone(),
            name: profile.name.clone(),
            email: profile.email.clone(),
            avatar_url: profile.avatar_url.clone(),
            github_token: token,
            created_at: now,
            updated_at: now,
            last_login_at: Some(now),
        }
    }
}

/// User persistence seam. Carried in `AppState` as `Arc<dyn UserStore>`.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Creates the user on first sign-in, otherwise refreshes profile fields,
    /// token and login time. The internal id never changes.
    async fn upsert_github(&self, profile: &GitHubUser, token: Option<String>) -> User;
    async fn get(&self, id: Uuid) -> Option<User>;
    /// Case-insensitive, as GitHub logins are.
    async fn find_by_login(&self, login: &str) -> Option<User>;
    async fn update(&self, user: User) -> Option<User>;
    async fn delete(&self, id: Uuid) -> Option<User>;
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn upsert_github(&self, profile: &GitHubUser, token: Option<String>) -> User {
        let mut users = self.users.write().await;
        let now = Utc::now();
        if let Some(existing) = users.values_mut().find(|u| u.github_id == profile.id) {
            existing.github_username = profile.login.clone();
            existing.name = profile.name.clone().or(existing.name.take());
            existing.email = profile.email.clone().or(existing.email.take());
            existing.avatar_url = profile.avatar_url.clone();
            existing.github_token = token;
            existing.updated_at = now;
            existing.last_login_at = Some(now);
            return existing.clone();
        }
        let user = User::from_github(profile, token);
        users.insert(user.id, user.clone());
        user
    }

    async fn get(&self, id: Uuid) -> Option<User> {
        self.users.read().await.get(&id).cloned()
    }

    async fn find_by_login(&self, login: &str) -> Option<User> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.github_username.eq_ignore_ascii_case(login))
            .cloned()
    }

    async fn update(&self, user: User) -> Option<User> {
        let mut users = self.users.write().await;
        let slot = users.get_mut(&user.id)?;
        *slot = User {
            updated_at: Utc::now(),
            ..user
        };
        Some(slot.clone())
    }

    async fn delete(&self, id: Uuid) -> Option<User> {
        self.users.write().await.remove(&id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn github_user(id: i64, login: &str) -> GitHubUser {
        GitHubUser {
            id,
            login: login.to_string(),
            name: Some("Octo Cat".to_string()),
            email: Some("octo@example.com".to_string()),
            avatar_url: Some("https://avatars.example.com/u/1".to_string()),
            html_url: Some(format!("https://github.com/{login}")),
            bio: None,
            company: None,
            location: None,
            blog: None,
            public_repos: 3,
            followers: 1,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let store = MemoryUserStore::new();
        let first = store
            .upsert_github(&github_user(7, "octocat"), Some("t1".to_string()))
            .await;
        let second = store
            .upsert_github(&github_user(7, "octo-renamed"), Some("t2".to_string()))
            .await;
        assert_eq!(first.id, second.id);
        assert_eq!(second.github_username, "octo-renamed");
        assert_eq!(second.github_token.as_deref(), Some("t2"));
    }

    #[tokio::test]
    async fn test_find_by_login_ignores_case() {
        let store = MemoryUserStore::new();
        store.upsert_github(&github_user(1, "OctoCat"), None).await;
        assert!(store.find_by_login("octocat").await.is_some());
        assert!(store.find_by_login("someone").await.is_none());
    }

    #[tokio::test]
    async fn test_token_never_serialized() {
        let user = User::from_github(&github_user(1, "octocat"), Some("secret".to_string()));
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
        assert!(!json.contains("github_token"));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = MemoryUserStore::new();
        let user = store.upsert_github(&github_user(1, "octocat"), None).await;
        let updated = store
            .update(User {
                name: Some("New Name".to_string()),
                ..user.clone()
            })
            .await
            .unwrap();
        assert_eq!(updated.name.as_deref(), Some("New Name"));
        assert!(store.delete(user.id).await.is_some());
        assert!(store.get(user.id).await.is_none());
        assert!(store.update(user).await.is_none());
    }
}
