//! The publishing pipeline: validate, normalize, upload, then record.
//! Rows are only ever written after their objects exist, and objects are
//! removed before their rows, so a reference in the store always points
//! at a live object.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

use crate::collaborators::{ObjectStore, StorageError, StoreError, VaultStore};
use crate::config::AppConfig;
use crate::models::{
    Entry, EntryKind, NewEntry, NewPair, NewProject, NewShare, Category, Pair, Project, Share,
};
use crate::services::normalizer::{self, NormalizedImage};
use crate::services::paths;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("{0}")]
    Validation(String),

    #[error("file is {size} bytes, limit is {max}")]
    TooLarge { size: usize, max: usize },

    #[error("file is not a supported image")]
    NotAnImage,

    #[error("nothing to share: entry has no photo")]
    NothingToShare,

    #[error("project not found")]
    ProjectNotFound,

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("publish pipeline error: {0}")]
    Pipeline(String),
}

/// Stages of a publish, in the only order they may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    Validating,
    Normalizing,
    UploadingPrivate,
    UploadingPublic,
    Recording,
    Done,
}

impl PublishStage {
    fn may_advance_to(self, next: PublishStage) -> bool {
        use PublishStage::*;
        matches!(
            (self, next),
            (Validating, Normalizing)
                | (Normalizing, UploadingPrivate)
                | (UploadingPrivate, UploadingPublic)
                | (UploadingPrivate, Recording)
                | (UploadingPublic, Recording)
                | (Recording, Done)
        )
    }
}

/// Tracks pipeline progress for one publish; illegal jumps are refused.
struct Progress {
    operation: &'static str,
    stage: PublishStage,
}

impl Progress {
    fn start(operation: &'static str) -> Self {
        tracing::debug!(operation, stage = ?PublishStage::Validating, "publish started");
        Self {
            operation,
            stage: PublishStage::Validating,
        }
    }

    fn advance(&mut self, next: PublishStage) -> Result<(), PublishError> {
        if !self.stage.may_advance_to(next) {
            return Err(PublishError::Pipeline(format!(
                "illegal stage transition {:?} -> {:?} in {}",
                self.stage, next, self.operation
            )));
        }
        tracing::debug!(operation = self.operation, stage = ?next, "publish stage");
        self.stage = next;
        Ok(())
    }
}

/// An uploaded file as it arrives from the HTTP layer.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

pub struct NewShareRequest {
    pub caption: Option<String>,
    pub attribution_name: Option<String>,
    pub attribution_url: Option<String>,
    pub show_attribution: bool,
}

pub struct Publisher {
    store: Arc<dyn VaultStore>,
    storage: Arc<dyn ObjectStore>,
    config: AppConfig,
}

impl Publisher {
    pub fn new(store: Arc<dyn VaultStore>, storage: Arc<dyn ObjectStore>, config: AppConfig) -> Self {
        Self {
            store,
            storage,
            config,
        }
    }

    /// Accept only images under the size ceiling. Runs before any byte
    /// leaves the process.
    fn validate_upload(&self, file: &UploadedFile) -> Result<(), PublishError> {
        if file.bytes.is_empty() {
            return Err(PublishError::Validation("empty file".to_string()));
        }
        if file.bytes.len() > self.config.max_upload_size {
            return Err(PublishError::TooLarge {
                size: file.bytes.len(),
                max: self.config.max_upload_size,
            });
        }
        match infer::get(&file.bytes) {
            Some(kind) if kind.mime_type().starts_with("image/") => Ok(()),
            _ => Err(PublishError::NotAnImage),
        }
    }

    fn normalize(&self, file: &UploadedFile) -> NormalizedImage {
        normalizer::normalize(&file.bytes, &self.config.normalize)
    }

    pub async fn create_project(
        &self,
        owner_id: &str,
        title: String,
        category: Category,
    ) -> Result<Project, PublishError> {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(PublishError::Validation("title must not be empty".to_string()));
        }
        Ok(self
            .store
            .insert_project(NewProject {
                owner_id: owner_id.to_string(),
                title,
                category,
            })
            .await?)
    }

    /// Add an entry to a project, optionally with a photo. The photo is
    /// uploaded to the private bucket before the row is written.
    pub async fn create_entry(
        &self,
        owner_id: &str,
        project_id: &str,
        kind: EntryKind,
        note: Option<String>,
        file: Option<UploadedFile>,
    ) -> Result<Entry, PublishError> {
        // Local validation settles before any collaborator round trip.
        if note.as_deref().map(|n| n.trim().is_empty()).unwrap_or(true) && file.is_none() {
            return Err(PublishError::Validation(
                "an entry needs a note or a photo".to_string(),
            ));
        }
        if let Some(file) = &file {
            self.validate_upload(file)?;
        }

        let project = self
            .store
            .get_project(owner_id, project_id)
            .await?
            .ok_or(PublishError::ProjectNotFound)?;

        let mut progress = Progress::start("create_entry");
        let media_path = match file {
            Some(file) => {
                progress.advance(PublishStage::Normalizing)?;
                let normalized = self.normalize(&file);

                progress.advance(PublishStage::UploadingPrivate)?;
                let path = paths::entry_media_path(owner_id, &project.id, &file.file_name);
                self.storage
                    .upload(
                        &self.config.private_bucket,
                        &path,
                        normalized.bytes,
                        &normalized.content_type,
                        false,
                    )
                    .await?;
                Some(path)
            }
            None => {
                progress.advance(PublishStage::Normalizing)?;
                progress.advance(PublishStage::UploadingPrivate)?;
                None
            }
        };

        progress.advance(PublishStage::Recording)?;
        let entry = self
            .store
            .insert_entry(NewEntry {
                project_id: project.id,
                kind,
                note: note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
                media_path: media_path.clone(),
            })
            .await
            .inspect_err(|_| {
                // The uploaded object is now orphaned; tolerable, but traceable.
                if let Some(path) = &media_path {
                    tracing::warn!(%path, "entry insert failed after upload");
                }
            })?;
        progress.advance(PublishStage::Done)?;
        Ok(entry)
    }

    /// Create a before/after pair. Both files are validated before either
    /// is uploaded, so a bad second file costs nothing.
    pub async fn create_pair(
        &self,
        owner_id: &str,
        caption: Option<String>,
        is_public: bool,
        before: UploadedFile,
        after: UploadedFile,
    ) -> Result<Pair, PublishError> {
        let mut progress = Progress::start("create_pair");
        self.validate_upload(&before)?;
        self.validate_upload(&after)?;

        progress.advance(PublishStage::Normalizing)?;
        let before_img = self.normalize(&before);
        let after_img = self.normalize(&after);

        progress.advance(PublishStage::UploadingPrivate)?;
        let (before_path, after_path) =
            paths::pair_media_paths(owner_id, &before.file_name, &after.file_name);
        let bucket = &self.config.private_bucket;
        let (up_before, up_after) = tokio::join!(
            self.storage.upload(
                bucket,
                &before_path,
                before_img.bytes,
                &before_img.content_type,
                false
            ),
            self.storage.upload(
                bucket,
                &after_path,
                after_img.bytes,
                &after_img.content_type,
                false
            ),
        );
        up_before?;
        up_after?;

        progress.advance(PublishStage::Recording)?;
        let pair = self
            .store
            .insert_pair(NewPair {
                user_id: owner_id.to_string(),
                caption: caption.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
                before_path: before_path.clone(),
                after_path: after_path.clone(),
                is_public,
            })
            .await
            .inspect_err(|_| {
                tracing::warn!(%before_path, %after_path, "pair insert failed after uploads");
            })?;
        progress.advance(PublishStage::Done)?;
        Ok(pair)
    }

    /// Republish a private entry photo to the community. The image is
    /// copied into the public bucket; the private original never becomes
    /// world-readable.
    pub async fn share_entry(
        &self,
        owner_id: &str,
        entry_id: &str,
        request: NewShareRequest,
    ) -> Result<Share, PublishError> {
        let entry = self
            .store
            .get_entry(entry_id)
            .await?
            .ok_or(PublishError::NotFound)?;
        self.store
            .get_project(owner_id, &entry.project_id)
            .await?
            .ok_or(PublishError::NotFound)?;

        let media_path = entry.media_path.ok_or(PublishError::NothingToShare)?;

        let mut progress = Progress::start("share_entry");
        progress.advance(PublishStage::Normalizing)?;
        let original = self
            .storage
            .download(&self.config.private_bucket, &media_path)
            .await?;
        let normalized = normalizer::normalize(&original, &self.config.normalize);

        progress.advance(PublishStage::UploadingPrivate)?;
        progress.advance(PublishStage::UploadingPublic)?;
        let extension = normalizer::extension_for(&normalized.content_type);
        let public_path = paths::public_share_path(owner_id, entry_id, extension);
        self.storage
            .upload(
                &self.config.public_bucket,
                &public_path,
                normalized.bytes,
                &normalized.content_type,
                false,
            )
            .await?;

        progress.advance(PublishStage::Recording)?;
        let share = self
            .insert_share_with_slug_retry(owner_id, &public_path, &request)
            .await?;
        progress.advance(PublishStage::Done)?;
        Ok(share)
    }

    /// One retry with a fresh slug on a uniqueness conflict; a second
    /// conflict propagates.
    async fn insert_share_with_slug_retry(
        &self,
        owner_id: &str,
        public_path: &str,
        request: &NewShareRequest,
    ) -> Result<Share, PublishError> {
        let row = |slug: String| NewShare {
            user_id: owner_id.to_string(),
            slug,
            caption: request.caption.clone(),
            media_path: public_path.to_string(),
            is_public: true,
            attribution_name: request.attribution_name.clone(),
            attribution_url: request.attribution_url.clone(),
            show_attribution: request.show_attribution,
        };

        let caption = request.caption.as_deref();
        match self.store.insert_share(row(paths::new_slug(caption))).await {
            Ok(share) => Ok(share),
            Err(StoreError::Conflict(_)) => {
                tracing::debug!("slug collision, retrying with a fresh candidate");
                Ok(self.store.insert_share(row(paths::new_slug(caption))).await?)
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Withdraw a share from the community. Visibility is revoked first;
    /// removing the public copy is best effort after that.
    pub async fn unshare(&self, owner_id: &str, share_id: &str) -> Result<(), PublishError> {
        let share = self
            .store
            .get_share(owner_id, share_id)
            .await?
            .ok_or(PublishError::NotFound)?;

        self.store.set_share_visibility(&share.id, false).await?;

        if let Err(err) = self
            .storage
            .remove(&self.config.public_bucket, &[share.media_path.clone()])
            .await
        {
            // The share is already invisible; an orphaned object is
            // acceptable, a visible share with no object is not.
            tracing::warn!(share_id, error = %err, "could not remove unshared object");
        }
        Ok(())
    }

    /// Delete a share and its public object. Storage goes first: if the
    /// object cannot be removed the row stays, and the share remains
    /// consistent.
    pub async fn delete_share(&self, owner_id: &str, share_id: &str) -> Result<(), PublishError> {
        let share = self
            .store
            .get_share(owner_id, share_id)
            .await?
            .ok_or(PublishError::NotFound)?;

        self.storage
            .remove(&self.config.public_bucket, &[share.media_path.clone()])
            .await?;
        self.store.delete_share(&share.id).await?;
        Ok(())
    }

    /// Delete an entry and its photo, storage first.
    pub async fn delete_entry(&self, owner_id: &str, entry_id: &str) -> Result<(), PublishError> {
        let entry = self
            .store
            .get_entry(entry_id)
            .await?
            .ok_or(PublishError::NotFound)?;
        self.store
            .get_project(owner_id, &entry.project_id)
            .await?
            .ok_or(PublishError::NotFound)?;

        if let Some(path) = &entry.media_path {
            self.storage
                .remove(&self.config.private_bucket, &[path.clone()])
                .await?;
        }
        self.store.delete_entry(&entry.id).await?;
        Ok(())
    }

    /// Delete a pair and both of its photos, storage first.
    pub async fn delete_pair(&self, owner_id: &str, pair_id: i64) -> Result<(), PublishError> {
        let pair = self
            .store
            .get_pair(pair_id)
            .await?
            .ok_or(PublishError::NotFound)?;
        if pair.user_id != owner_id {
            return Err(PublishError::NotFound);
        }

        self.storage
            .remove(
                &self.config.private_bucket,
                &[pair.before_path.clone(), pair.after_path.clone()],
            )
            .await?;
        self.store.delete_pair(pair.id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MemoryStorage, MemoryStore};
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn png_file(name: &str) -> UploadedFile {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            64,
            64,
            image::Rgb([120, 40, 200]),
        ));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        UploadedFile {
            file_name: name.to_string(),
            bytes: Bytes::from(out.into_inner()),
        }
    }

    fn text_file(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            bytes: Bytes::from_static(b"definitely not an image"),
        }
    }

    struct Fixture {
        publisher: Publisher,
        store: Arc<MemoryStore>,
        storage: Arc<MemoryStorage>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(MemoryStorage::new());
        let publisher = Publisher::new(
            store.clone(),
            storage.clone(),
            AppConfig::development(),
        );
        Fixture {
            publisher,
            store,
            storage,
        }
    }

    async fn project(f: &Fixture) -> Project {
        f.publisher
            .create_project("u1", "Kitchen".to_string(), Category::Home)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn entry_photo_lands_in_private_bucket_before_row() {
        let f = fixture();
        let p = project(&f).await;

        let entry = f
            .publisher
            .create_entry("u1", &p.id, EntryKind::Before, None, Some(png_file("day 0.png")))
            .await
            .unwrap();

        let path = entry.media_path.unwrap();
        assert!(path.starts_with("u1/"));
        assert!(f.storage.download("media", &path).await.is_ok());
    }

    #[tokio::test]
    async fn rejected_upload_leaves_no_row() {
        let f = fixture();
        let p = project(&f).await;

        let err = f
            .publisher
            .create_entry("u1", &p.id, EntryKind::Before, None, Some(text_file("x.png")))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::NotAnImage));
        assert!(f.store.list_entries(&p.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn note_only_entry_needs_no_file() {
        let f = fixture();
        let p = project(&f).await;

        let entry = f
            .publisher
            .create_entry("u1", &p.id, EntryKind::Update, Some("week two".to_string()), None)
            .await
            .unwrap();
        assert!(entry.media_path.is_none());
        assert_eq!(entry.note.as_deref(), Some("week two"));
    }

    #[tokio::test]
    async fn bad_file_is_rejected_before_the_project_lookup() {
        let f = fixture();
        // No such project; the file rejection must win anyway.
        let err = f
            .publisher
            .create_entry("u1", "no-such-project", EntryKind::Before, None, Some(text_file("x.png")))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::NotAnImage));

        let err = f
            .publisher
            .create_entry("u1", "no-such-project", EntryKind::Before, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Validation(_)));
    }

    #[tokio::test]
    async fn empty_entry_is_rejected() {
        let f = fixture();
        let p = project(&f).await;
        let err = f
            .publisher
            .create_entry("u1", &p.id, EntryKind::Update, Some("   ".to_string()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Validation(_)));
    }

    #[tokio::test]
    async fn pair_rejects_bad_file_before_any_upload() {
        let f = fixture();
        let err = f
            .publisher
            .create_pair("u1", None, true, png_file("b.png"), text_file("a.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::NotAnImage));
        // Nothing was uploaded for the good side either.
        assert!(f
            .store
            .public_pairs(&crate::collaborators::FeedQuery {
                filter: None,
                before: None,
                limit: 10
            })
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn pair_uploads_both_then_records() {
        let f = fixture();
        let pair = f
            .publisher
            .create_pair(
                "u1",
                Some("deck rebuild".to_string()),
                true,
                png_file("b.png"),
                png_file("a.png"),
            )
            .await
            .unwrap();

        assert!(f.storage.download("media", &pair.before_path).await.is_ok());
        assert!(f.storage.download("media", &pair.after_path).await.is_ok());
        assert!(pair.is_public);
    }

    #[tokio::test]
    async fn share_republishes_into_public_bucket() {
        let f = fixture();
        let p = project(&f).await;
        let entry = f
            .publisher
            .create_entry("u1", &p.id, EntryKind::After, None, Some(png_file("done.png")))
            .await
            .unwrap();

        let share = f
            .publisher
            .share_entry(
                "u1",
                &entry.id,
                NewShareRequest {
                    caption: Some("All done".to_string()),
                    attribution_name: None,
                    attribution_url: None,
                    show_attribution: false,
                },
            )
            .await
            .unwrap();

        assert!(share.media_path.starts_with("u1/"));
        assert!(f.storage.download("community", &share.media_path).await.is_ok());
        // Private original untouched
        assert!(f
            .storage
            .download("media", &entry.media_path.unwrap())
            .await
            .is_ok());
        assert!(share.slug.starts_with("all-done-"));
    }

    #[tokio::test]
    async fn sharing_a_note_only_entry_fails() {
        let f = fixture();
        let p = project(&f).await;
        let entry = f
            .publisher
            .create_entry("u1", &p.id, EntryKind::Update, Some("note".to_string()), None)
            .await
            .unwrap();

        let err = f
            .publisher
            .share_entry(
                "u1",
                &entry.id,
                NewShareRequest {
                    caption: None,
                    attribution_name: None,
                    attribution_url: None,
                    show_attribution: false,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::NothingToShare));
    }

    /// VaultStore wrapper that forces a slug conflict on the first insert.
    struct ConflictOnce<S> {
        inner: S,
        conflicts: AtomicUsize,
    }

    #[async_trait]
    impl<S: VaultStore> VaultStore for ConflictOnce<S> {
        async fn insert_share(&self, row: crate::models::NewShare) -> Result<Share, StoreError> {
            if self.conflicts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(StoreError::Conflict("slug taken".to_string()));
            }
            self.inner.insert_share(row).await
        }

        async fn insert_project(
            &self,
            row: crate::models::NewProject,
        ) -> Result<Project, StoreError> {
            self.inner.insert_project(row).await
        }
        async fn list_projects(&self, owner_id: &str) -> Result<Vec<Project>, StoreError> {
            self.inner.list_projects(owner_id).await
        }
        async fn get_project(
            &self,
            owner_id: &str,
            id: &str,
        ) -> Result<Option<Project>, StoreError> {
            self.inner.get_project(owner_id, id).await
        }
        async fn insert_entry(&self, row: crate::models::NewEntry) -> Result<Entry, StoreError> {
            self.inner.insert_entry(row).await
        }
        async fn list_entries(&self, project_id: &str) -> Result<Vec<Entry>, StoreError> {
            self.inner.list_entries(project_id).await
        }
        async fn get_entry(&self, id: &str) -> Result<Option<Entry>, StoreError> {
            self.inner.get_entry(id).await
        }
        async fn delete_entry(&self, id: &str) -> Result<(), StoreError> {
            self.inner.delete_entry(id).await
        }
        async fn list_shares(&self, owner_id: &str) -> Result<Vec<Share>, StoreError> {
            self.inner.list_shares(owner_id).await
        }
        async fn get_share(&self, owner_id: &str, id: &str) -> Result<Option<Share>, StoreError> {
            self.inner.get_share(owner_id, id).await
        }
        async fn find_public_share_by_slug(&self, slug: &str) -> Result<Option<Share>, StoreError> {
            self.inner.find_public_share_by_slug(slug).await
        }
        async fn set_share_visibility(&self, id: &str, is_public: bool) -> Result<(), StoreError> {
            self.inner.set_share_visibility(id, is_public).await
        }
        async fn delete_share(&self, id: &str) -> Result<(), StoreError> {
            self.inner.delete_share(id).await
        }
        async fn insert_pair(&self, row: crate::models::NewPair) -> Result<Pair, StoreError> {
            self.inner.insert_pair(row).await
        }
        async fn get_pair(&self, id: i64) -> Result<Option<Pair>, StoreError> {
            self.inner.get_pair(id).await
        }
        async fn delete_pair(&self, id: i64) -> Result<(), StoreError> {
            self.inner.delete_pair(id).await
        }
        async fn public_shares(
            &self,
            query: &crate::collaborators::FeedQuery,
        ) -> Result<Vec<Share>, StoreError> {
            self.inner.public_shares(query).await
        }
        async fn public_pairs(
            &self,
            query: &crate::collaborators::FeedQuery,
        ) -> Result<Vec<Pair>, StoreError> {
            self.inner.public_pairs(query).await
        }
    }

    #[tokio::test]
    async fn slug_conflict_is_retried_once() {
        let store = Arc::new(ConflictOnce {
            inner: MemoryStore::new(),
            conflicts: AtomicUsize::new(0),
        });
        let storage = Arc::new(MemoryStorage::new());
        let publisher = Publisher::new(store.clone(), storage, AppConfig::development());

        let p = publisher
            .create_project("u1", "Kitchen".to_string(), Category::Home)
            .await
            .unwrap();
        let entry = publisher
            .create_entry("u1", &p.id, EntryKind::After, None, Some(png_file("x.png")))
            .await
            .unwrap();

        let share = publisher
            .share_entry(
                "u1",
                &entry.id,
                NewShareRequest {
                    caption: Some("caption".to_string()),
                    attribution_name: None,
                    attribution_url: None,
                    show_attribution: false,
                },
            )
            .await
            .unwrap();
        assert!(share.slug.starts_with("caption-"));
        assert_eq!(store.conflicts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unshare_hides_then_removes() {
        let f = fixture();
        let p = project(&f).await;
        let entry = f
            .publisher
            .create_entry("u1", &p.id, EntryKind::After, None, Some(png_file("x.png")))
            .await
            .unwrap();
        let share = f
            .publisher
            .share_entry(
                "u1",
                &entry.id,
                NewShareRequest {
                    caption: None,
                    attribution_name: None,
                    attribution_url: None,
                    show_attribution: false,
                },
            )
            .await
            .unwrap();

        f.publisher.unshare("u1", &share.id).await.unwrap();

        let found = f.store.find_public_share_by_slug(&share.slug).await.unwrap();
        assert!(found.is_none());
        assert!(f.storage.download("community", &share.media_path).await.is_err());
    }

    /// ObjectStore wrapper whose `remove` always fails.
    struct FailingRemove {
        inner: Arc<MemoryStorage>,
    }

    #[async_trait]
    impl ObjectStore for FailingRemove {
        fn public_url(&self, bucket: &str, path: &str) -> String {
            self.inner.public_url(bucket, path)
        }
        async fn create_signed_url(
            &self,
            bucket: &str,
            path: &str,
            ttl_secs: u32,
        ) -> Result<String, StorageError> {
            self.inner.create_signed_url(bucket, path, ttl_secs).await
        }
        async fn create_signed_urls(
            &self,
            bucket: &str,
            paths: &[String],
            ttl_secs: u32,
        ) -> Result<Vec<Option<String>>, StorageError> {
            self.inner.create_signed_urls(bucket, paths, ttl_secs).await
        }
        async fn upload(
            &self,
            bucket: &str,
            path: &str,
            data: Bytes,
            content_type: &str,
            overwrite: bool,
        ) -> Result<(), StorageError> {
            self.inner.upload(bucket, path, data, content_type, overwrite).await
        }
        async fn download(&self, bucket: &str, path: &str) -> Result<Bytes, StorageError> {
            self.inner.download(bucket, path).await
        }
        async fn remove(&self, _bucket: &str, _paths: &[String]) -> Result<(), StorageError> {
            Err(StorageError::Request("storage unavailable".to_string()))
        }
    }

    fn fixture_with_failing_remove() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let inner = Arc::new(MemoryStorage::new());
        let publisher = Publisher::new(
            store.clone(),
            Arc::new(FailingRemove { inner: inner.clone() }),
            AppConfig::development(),
        );
        Fixture {
            publisher,
            store,
            storage: inner,
        }
    }

    #[tokio::test]
    async fn unshare_survives_a_failing_remove() {
        let f = fixture_with_failing_remove();
        let p = project(&f).await;
        let entry = f
            .publisher
            .create_entry("u1", &p.id, EntryKind::After, None, Some(png_file("x.png")))
            .await
            .unwrap();
        let share = f
            .publisher
            .share_entry(
                "u1",
                &entry.id,
                NewShareRequest {
                    caption: None,
                    attribution_name: None,
                    attribution_url: None,
                    show_attribution: false,
                },
            )
            .await
            .unwrap();

        // Visibility is revoked even though the public copy lingers.
        f.publisher.unshare("u1", &share.id).await.unwrap();

        let row = f.store.get_share("u1", &share.id).await.unwrap().unwrap();
        assert!(!row.is_public);
        assert!(f.storage.download("community", &share.media_path).await.is_ok());
    }

    #[tokio::test]
    async fn delete_entry_keeps_the_row_when_remove_fails() {
        let f = fixture_with_failing_remove();
        let p = project(&f).await;
        let entry = f
            .publisher
            .create_entry("u1", &p.id, EntryKind::Before, None, Some(png_file("x.png")))
            .await
            .unwrap();

        let err = f.publisher.delete_entry("u1", &entry.id).await.unwrap_err();
        assert!(matches!(err, PublishError::Storage(_)));
        assert!(f.store.get_entry(&entry.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_entry_removes_object_first() {
        let f = fixture();
        let p = project(&f).await;
        let entry = f
            .publisher
            .create_entry("u1", &p.id, EntryKind::Before, None, Some(png_file("x.png")))
            .await
            .unwrap();
        let path = entry.media_path.clone().unwrap();

        f.publisher.delete_entry("u1", &entry.id).await.unwrap();
        assert!(f.storage.download("media", &path).await.is_err());
        assert!(f.store.get_entry(&entry.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_pair_is_owner_scoped() {
        let f = fixture();
        let pair = f
            .publisher
            .create_pair("u1", None, true, png_file("b.png"), png_file("a.png"))
            .await
            .unwrap();

        let err = f.publisher.delete_pair("intruder", pair.id).await.unwrap_err();
        assert!(matches!(err, PublishError::NotFound));
        assert!(f.store.get_pair(pair.id).await.unwrap().is_some());

        f.publisher.delete_pair("u1", pair.id).await.unwrap();
        assert!(f.store.get_pair(pair.id).await.unwrap().is_none());
    }

    #[test]
    fn stage_order_is_enforced() {
        let mut progress = Progress::start("test");
        assert!(progress.advance(PublishStage::Recording).is_err());
        assert!(progress.advance(PublishStage::Normalizing).is_ok());
        assert!(progress.advance(PublishStage::UploadingPrivate).is_ok());
        assert!(progress.advance(PublishStage::Recording).is_ok());
        assert!(progress.advance(PublishStage::Done).is_ok());
    }
}
