use crate::errors::{GeocodeError, RepoError, StorageError};
use crate::models::{
    Campground, Comment, GeocodeMatch, HostedImage, ImageUpload, NewCampground, Notification, Review, User,
};
use async_trait::async_trait;
use uuid::Uuid;

/// Storage for campground records.
#[async_trait]
pub trait CampgroundRepository: Send + Sync + 'static { // Send+Sync+'static required for Arc<dyn>
    /// Persists a new campground and returns it with its assigned id.
    async fn create(&self, campground: NewCampground) -> Result<Campground, RepoError>;

    /// Returns Ok(None) if the campground is not found.
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Campground>, RepoError>;

    /// Overwrites the stored record with `campground`. Fails with
    /// `RepoError::NotFound` if the record no longer exists.
    async fn save(&self, campground: &Campground) -> Result<(), RepoError>;

    async fn delete(&self, id: Uuid) -> Result<(), RepoError>;

    /// Lists all campgrounds.
    /// WARNING: This can be inefficient on large datasets. Consider pagination.
    async fn list_all(&self) -> Result<Vec<Campground>, RepoError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError>;

    /// Appends one notification reference to the user's list.
    async fn push_notification(&self, user_id: Uuid, notification_id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync + 'static {
    async fn create(&self, username: &str, campground_id: Uuid) -> Result<Notification, RepoError>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync + 'static {
    /// Ids that no longer resolve are skipped.
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Comment>, RepoError>;

    async fn delete_many(&self, ids: &[Uuid]) -> Result<(), RepoError>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync + 'static {
    /// Ids that no longer resolve are skipped.
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Review>, RepoError>;

    async fn delete_many(&self, ids: &[Uuid]) -> Result<(), RepoError>;
}

/// Remote host for campground images.
#[async_trait]
pub trait ImageHost: Send + Sync + 'static {
    /// Uploads the image and returns its public URL and asset id.
    async fn upload(&self, image: ImageUpload) -> Result<HostedImage, StorageError>;

    async fn destroy(&self, asset_id: &str) -> Result<(), StorageError>;
}

#[async_trait]
pub trait Geocoder: Send + Sync + 'static {
    /// Resolves a free-text address. An empty result means "no match" and is
    /// not an error.
    async fn geocode(&self, address: &str) -> Result<Vec<GeocodeMatch>, GeocodeError>;
}
