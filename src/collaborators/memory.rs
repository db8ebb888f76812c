//! In-process collaborators for development and tests. Same contracts as
//! the hosted clients, no network.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use super::auth::{AuthError, AuthGateway, AuthUser, Session, SignUpOutcome};
use super::datastore::{FeedQuery, StoreError, VaultStore};
use super::storage::{ObjectStore, StorageError};
use crate::models::{
    Entry, NewEntry, NewPair, NewProject, NewShare, Pair, Project, Share,
};

#[derive(Default)]
struct AuthInner {
    /// email -> (password, user id)
    accounts: HashMap<String, (String, String)>,
    /// access token -> user id
    sessions: HashMap<String, String>,
    /// pending confirmation code -> email
    codes: HashMap<String, String>,
}

#[derive(Default)]
pub struct MemoryAuth {
    inner: Mutex<AuthInner>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint_session(inner: &mut AuthInner, user_id: &str, email: &str) -> Session {
        let token = Uuid::new_v4().to_string();
        inner.sessions.insert(token.clone(), user_id.to_string());
        Session {
            access_token: token,
            refresh_token: Uuid::new_v4().to_string(),
            expires_in: 3600,
            user: AuthUser {
                id: user_id.to_string(),
                email: Some(email.to_string()),
            },
        }
    }
}

#[async_trait]
impl AuthGateway for MemoryAuth {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _redirect_to: &str,
    ) -> Result<SignUpOutcome, AuthError> {
        let mut inner = self.inner.lock().map_err(|e| AuthError::Request(e.to_string()))?;
        if inner.accounts.contains_key(email) {
            return Err(AuthError::AlreadyRegistered);
        }
        let user_id = Uuid::new_v4().to_string();
        inner
            .accounts
            .insert(email.to_string(), (password.to_string(), user_id.clone()));
        let session = Self::mint_session(&mut inner, &user_id, email);
        Ok(SignUpOutcome {
            session: Some(session),
            confirmation_required: false,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let mut inner = self.inner.lock().map_err(|e| AuthError::Request(e.to_string()))?;
        let (stored, user_id) = match inner.accounts.get(email) {
            Some((p, id)) => (p.clone(), id.clone()),
            None => return Err(AuthError::InvalidCredentials),
        };
        if stored != password {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(Self::mint_session(&mut inner, &user_id, email))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let mut inner = self.inner.lock().map_err(|e| AuthError::Request(e.to_string()))?;
        inner.sessions.remove(access_token);
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let inner = self.inner.lock().map_err(|e| AuthError::Request(e.to_string()))?;
        let user_id = inner
            .sessions
            .get(access_token)
            .ok_or(AuthError::InvalidToken)?;
        let email = inner
            .accounts
            .iter()
            .find(|(_, (_, id))| id == user_id)
            .map(|(email, _)| email.clone());
        Ok(AuthUser {
            id: user_id.clone(),
            email,
        })
    }

    async fn exchange_code(&self, code: &str) -> Result<Session, AuthError> {
        let mut inner = self.inner.lock().map_err(|e| AuthError::Request(e.to_string()))?;
        let email = inner.codes.remove(code).ok_or(AuthError::LinkExpired)?;
        let user_id = inner
            .accounts
            .get(&email)
            .map(|(_, id)| id.clone())
            .ok_or(AuthError::LinkExpired)?;
        Ok(Self::mint_session(&mut inner, &user_id, &email))
    }

    async fn reset_password(&self, _email: &str, _redirect_to: &str) -> Result<(), AuthError> {
        Ok(())
    }

    async fn resend_confirmation(&self, _email: &str, _redirect_to: &str) -> Result<(), AuthError> {
        Ok(())
    }

    fn oauth_url(&self, provider: &str, redirect_to: &str) -> String {
        format!("memory://oauth/{}?redirect_to={}", provider, redirect_to)
    }
}

#[derive(Default)]
struct StoreInner {
    projects: Vec<Project>,
    entries: Vec<Entry>,
    shares: Vec<Share>,
    pairs: Vec<Pair>,
    next_pair_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreInner>, StoreError> {
        self.inner.lock().map_err(|e| StoreError::Request(e.to_string()))
    }

    fn matches_feed(caption: &Option<String>, query: &FeedQuery) -> bool {
        match &query.filter {
            Some(term) => caption
                .as_deref()
                .map(|c| c.to_lowercase().contains(&term.to_lowercase()))
                .unwrap_or(false),
            None => true,
        }
    }
}

#[async_trait]
impl VaultStore for MemoryStore {
    async fn insert_project(&self, row: NewProject) -> Result<Project, StoreError> {
        let mut inner = self.lock()?;
        let project = Project {
            id: Uuid::new_v4().to_string(),
            owner_id: row.owner_id,
            title: row.title,
            category: row.category,
            created_at: Utc::now(),
        };
        inner.projects.push(project.clone());
        Ok(project)
    }

    async fn list_projects(&self, owner_id: &str) -> Result<Vec<Project>, StoreError> {
        let inner = self.lock()?;
        let mut rows: Vec<Project> = inner
            .projects
            .iter()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn get_project(&self, owner_id: &str, id: &str) -> Result<Option<Project>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .projects
            .iter()
            .find(|p| p.id == id && p.owner_id == owner_id)
            .cloned())
    }

    async fn insert_entry(&self, row: NewEntry) -> Result<Entry, StoreError> {
        let mut inner = self.lock()?;
        let entry = Entry {
            id: Uuid::new_v4().to_string(),
            project_id: row.project_id,
            kind: row.kind,
            note: row.note,
            media_path: row.media_path,
            taken_at: Utc::now(),
        };
        inner.entries.push(entry.clone());
        Ok(entry)
    }

    async fn list_entries(&self, project_id: &str) -> Result<Vec<Entry>, StoreError> {
        let inner = self.lock()?;
        let mut rows: Vec<Entry> = inner
            .entries
            .iter()
            .filter(|e| e.project_id == project_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.taken_at.cmp(&b.taken_at));
        Ok(rows)
    }

    async fn get_entry(&self, id: &str) -> Result<Option<Entry>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.entries.iter().find(|e| e.id == id).cloned())
    }

    async fn delete_entry(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.entries.retain(|e| e.id != id);
        Ok(())
    }

    async fn insert_share(&self, row: NewShare) -> Result<Share, StoreError> {
        let mut inner = self.lock()?;
        if inner.shares.iter().any(|s| s.slug == row.slug) {
            return Err(StoreError::Conflict(format!(
                "duplicate key value violates unique constraint: slug {}",
                row.slug
            )));
        }
        let share = Share {
            id: Uuid::new_v4().to_string(),
            user_id: row.user_id,
            slug: row.slug,
            caption: row.caption,
            media_path: row.media_path,
            is_public: row.is_public,
            attribution_name: row.attribution_name,
            attribution_url: row.attribution_url,
            show_attribution: row.show_attribution,
            created_at: Utc::now(),
        };
        inner.shares.push(share.clone());
        Ok(share)
    }

    async fn list_shares(&self, owner_id: &str) -> Result<Vec<Share>, StoreError> {
        let inner = self.lock()?;
        let mut rows: Vec<Share> = inner
            .shares
            .iter()
            .filter(|s| s.user_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn get_share(&self, owner_id: &str, id: &str) -> Result<Option<Share>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .shares
            .iter()
            .find(|s| s.id == id && s.user_id == owner_id)
            .cloned())
    }

    async fn find_public_share_by_slug(&self, slug: &str) -> Result<Option<Share>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .shares
            .iter()
            .find(|s| s.slug == slug && s.is_public)
            .cloned())
    }

    async fn set_share_visibility(&self, id: &str, is_public: bool) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        match inner.shares.iter_mut().find(|s| s.id == id) {
            Some(share) => {
                share.is_public = is_public;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete_share(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.shares.retain(|s| s.id != id);
        Ok(())
    }

    async fn insert_pair(&self, row: NewPair) -> Result<Pair, StoreError> {
        let mut inner = self.lock()?;
        inner.next_pair_id += 1;
        let pair = Pair {
            id: inner.next_pair_id,
            user_id: row.user_id,
            caption: row.caption,
            before_path: row.before_path,
            after_path: row.after_path,
            is_public: row.is_public,
            created_at: Utc::now(),
        };
        inner.pairs.push(pair.clone());
        Ok(pair)
    }

    async fn get_pair(&self, id: i64) -> Result<Option<Pair>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.pairs.iter().find(|p| p.id == id).cloned())
    }

    async fn delete_pair(&self, id: i64) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.pairs.retain(|p| p.id != id);
        Ok(())
    }

    async fn public_shares(&self, query: &FeedQuery) -> Result<Vec<Share>, StoreError> {
        let inner = self.lock()?;
        let mut rows: Vec<Share> = inner
            .shares
            .iter()
            .filter(|s| s.is_public)
            .filter(|s| Self::matches_feed(&s.caption, query))
            .filter(|s| query.before.map(|b| s.created_at < b).unwrap_or(true))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(query.limit);
        Ok(rows)
    }

    async fn public_pairs(&self, query: &FeedQuery) -> Result<Vec<Pair>, StoreError> {
        let inner = self.lock()?;
        let mut rows: Vec<Pair> = inner
            .pairs
            .iter()
            .filter(|p| p.is_public)
            .filter(|p| Self::matches_feed(&p.caption, query))
            .filter(|p| query.before.map(|b| p.created_at < b).unwrap_or(true))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(query.limit);
        Ok(rows)
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<(String, String), (Bytes, String)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<(String, String), (Bytes, String)>>, StorageError>
    {
        self.objects
            .lock()
            .map_err(|e| StorageError::Request(e.to_string()))
    }
}

#[async_trait]
impl ObjectStore for MemoryStorage {
    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("memory://public/{}/{}", bucket, path)
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        ttl_secs: u32,
    ) -> Result<String, StorageError> {
        let objects = self.lock()?;
        if !objects.contains_key(&(bucket.to_string(), path.to_string())) {
            return Err(StorageError::Signing {
                path: path.to_string(),
                message: "object not found".to_string(),
            });
        }
        Ok(format!(
            "memory://signed/{}/{}?exp={}",
            bucket, path, ttl_secs
        ))
    }

    async fn create_signed_urls(
        &self,
        bucket: &str,
        paths: &[String],
        ttl_secs: u32,
    ) -> Result<Vec<Option<String>>, StorageError> {
        let objects = self.lock()?;
        Ok(paths
            .iter()
            .map(|path| {
                objects
                    .contains_key(&(bucket.to_string(), path.clone()))
                    .then(|| format!("memory://signed/{}/{}?exp={}", bucket, path, ttl_secs))
            })
            .collect())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
        overwrite: bool,
    ) -> Result<(), StorageError> {
        let mut objects = self.lock()?;
        let key = (bucket.to_string(), path.to_string());
        if !overwrite && objects.contains_key(&key) {
            return Err(StorageError::Request(format!(
                "object already exists: {}/{}",
                bucket, path
            )));
        }
        objects.insert(key, (data, content_type.to_string()));
        Ok(())
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Bytes, StorageError> {
        let objects = self.lock()?;
        objects
            .get(&(bucket.to_string(), path.to_string()))
            .map(|(data, _)| data.clone())
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", bucket, path)))
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError> {
        let mut objects = self.lock()?;
        for path in paths {
            objects.remove(&(bucket.to_string(), path.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    #[tokio::test]
    async fn auth_round_trip() {
        let auth = MemoryAuth::new();
        let outcome = auth
            .sign_up("a@example.com", "secret", "http://localhost")
            .await
            .unwrap();
        let session = outcome.session.unwrap();

        let user = auth.get_user(&session.access_token).await.unwrap();
        assert_eq!(user.email.as_deref(), Some("a@example.com"));

        auth.sign_out(&session.access_token).await.unwrap();
        assert!(auth.get_user(&session.access_token).await.is_err());
    }

    #[tokio::test]
    async fn sign_in_rejects_wrong_password() {
        let auth = MemoryAuth::new();
        auth.sign_up("a@example.com", "secret", "http://localhost")
            .await
            .unwrap();
        let err = auth.sign_in("a@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn duplicate_slug_conflicts() {
        let store = MemoryStore::new();
        let row = NewShare {
            user_id: "u1".to_string(),
            slug: "my-share-abc123".to_string(),
            caption: None,
            media_path: "u1/x.jpg".to_string(),
            is_public: true,
            attribution_name: None,
            attribution_url: None,
            show_attribution: false,
        };
        store.insert_share(row.clone()).await.unwrap();
        let err = store.insert_share(row).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn feed_query_filters_and_paginates() {
        let store = MemoryStore::new();
        for caption in ["kitchen redo", "garden fence", "kitchen shelf"] {
            store
                .insert_pair(NewPair {
                    user_id: "u1".to_string(),
                    caption: Some(caption.to_string()),
                    before_path: "u1/1/before-a.jpg".to_string(),
                    after_path: "u1/1/after-a.jpg".to_string(),
                    is_public: true,
                })
                .await
                .unwrap();
        }

        let rows = store
            .public_pairs(&FeedQuery {
                filter: Some("Kitchen".to_string()),
                before: None,
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);

        let one = store
            .public_pairs(&FeedQuery {
                filter: None,
                before: None,
                limit: 1,
            })
            .await
            .unwrap();
        assert_eq!(one.len(), 1);
    }

    #[tokio::test]
    async fn private_projects_are_owner_scoped() {
        let store = MemoryStore::new();
        let mine = store
            .insert_project(NewProject {
                owner_id: "u1".to_string(),
                title: "Kitchen".to_string(),
                category: Category::Home,
            })
            .await
            .unwrap();

        assert!(store.get_project("u1", &mine.id).await.unwrap().is_some());
        assert!(store.get_project("u2", &mine.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn storage_signing_requires_existing_object() {
        let storage = MemoryStorage::new();
        assert!(storage.create_signed_url("media", "u1/x.jpg", 60).await.is_err());

        storage
            .upload("media", "u1/x.jpg", Bytes::from_static(b"img"), "image/jpeg", false)
            .await
            .unwrap();
        let url = storage.create_signed_url("media", "u1/x.jpg", 60).await.unwrap();
        assert!(url.starts_with("memory://signed/media/"));

        storage
            .remove("media", &["u1/x.jpg".to_string(), "u1/gone.jpg".to_string()])
            .await
            .unwrap();
        assert!(storage.download("media", "u1/x.jpg").await.is_err());
    }
}
