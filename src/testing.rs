//! In-memory collaborators for tests.

use crate::{
    domain::{
        CampgroundRepository, CommentRepository, Geocoder, ImageHost, NotificationRepository, ReviewRepository,
        UserRepository,
    },
    errors::{GeocodeError, RepoError, StorageError},
    models::{
        Author, Campground, Comment, GeocodeMatch, GeocodedPlace, HostedImage, ImageUpload, NewCampground,
        Notification, Review, User,
    },
    service::{CampgroundService, Collaborators},
};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use uuid::Uuid;

pub fn boulder() -> GeocodeMatch {
    GeocodeMatch {
        latitude: 40.01499,
        longitude: -105.27055,
        formatted_address: "Boulder, CO, USA".to_string(),
    }
}

#[derive(Default)]
pub struct MemoryStore {
    campgrounds: Mutex<HashMap<Uuid, Campground>>,
    users: Mutex<HashMap<Uuid, User>>,
    notifications: Mutex<HashMap<Uuid, Notification>>,
    comments: Mutex<HashMap<Uuid, Comment>>,
    reviews: Mutex<HashMap<Uuid, Review>>,
    /// Number of repository calls made through the traits.
    pub calls: AtomicUsize,
    notification_inserts: AtomicUsize,
    /// 1-based index of the notification insert that fails; 0 disables.
    pub fail_notification_number: AtomicUsize,
    saves: AtomicUsize,
    /// 1-based index of the campground save that fails; 0 disables.
    pub fail_save_number: AtomicUsize,
    /// Removes the record right before the next save, as a concurrent delete would.
    pub delete_before_save: AtomicBool,
    pub fail_user_lookup_of: Mutex<HashSet<Uuid>>,
}

impl MemoryStore {
    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    pub fn campground(&self, id: Uuid) -> Option<Campground> {
        self.campgrounds.lock().unwrap().get(&id).cloned()
    }

    pub fn put_campground(&self, campground: Campground) {
        self.campgrounds.lock().unwrap().insert(campground.id, campground);
    }

    pub fn campground_count(&self) -> usize {
        self.campgrounds.lock().unwrap().len()
    }

    pub fn user(&self, id: Uuid) -> Option<User> {
        self.users.lock().unwrap().get(&id).cloned()
    }

    pub fn put_user(&self, user: User) {
        self.users.lock().unwrap().insert(user.id, user);
    }

    pub fn notification(&self, id: Uuid) -> Option<Notification> {
        self.notifications.lock().unwrap().get(&id).cloned()
    }

    pub fn notification_count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }

    pub fn has_comment(&self, id: Uuid) -> bool {
        self.comments.lock().unwrap().contains_key(&id)
    }

    pub fn has_review(&self, id: Uuid) -> bool {
        self.reviews.lock().unwrap().contains_key(&id)
    }
}

#[async_trait]
impl CampgroundRepository for MemoryStore {
    async fn create(&self, campground: NewCampground) -> Result<Campground, RepoError> {
        self.touch();
        let campground = campground.into_campground(Uuid::new_v4());
        self.put_campground(campground.clone());
        Ok(campground)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Campground>, RepoError> {
        self.touch();
        Ok(self.campground(id))
    }

    async fn save(&self, campground: &Campground) -> Result<(), RepoError> {
        self.touch();
        let n = self.saves.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_save_number.load(Ordering::SeqCst) {
            return Err(RepoError::BackendError(anyhow::anyhow!("injected failure on save {}", n)));
        }
        let mut campgrounds = self.campgrounds.lock().unwrap();
        if self.delete_before_save.swap(false, Ordering::SeqCst) {
            campgrounds.remove(&campground.id);
        }
        if !campgrounds.contains_key(&campground.id) {
            return Err(RepoError::NotFound(campground.id));
        }
        campgrounds.insert(campground.id, campground.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        self.touch();
        self.campgrounds.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Campground>, RepoError> {
        self.touch();
        Ok(self.campgrounds.lock().unwrap().values().cloned().collect())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        self.touch();
        if self.fail_user_lookup_of.lock().unwrap().contains(&id) {
            return Err(RepoError::BackendError(anyhow::anyhow!("injected failure loading user {}", id)));
        }
        Ok(self.user(id))
    }

    async fn push_notification(&self, user_id: Uuid, notification_id: Uuid) -> Result<(), RepoError> {
        self.touch();
        let mut users = self.users.lock().unwrap();
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| RepoError::DataCorruption(format!("no user {}", user_id)))?;
        user.notifications.push(notification_id);
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn create(&self, username: &str, campground_id: Uuid) -> Result<Notification, RepoError> {
        self.touch();
        let n = self.notification_inserts.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_notification_number.load(Ordering::SeqCst) {
            return Err(RepoError::BackendError(anyhow::anyhow!("injected failure on insert {}", n)));
        }
        let notification = Notification {
            id: Uuid::new_v4(),
            username: username.to_string(),
            campground_id,
            is_read: false,
            created_at: Utc::now(),
        };
        self.notifications
            .lock()
            .unwrap()
            .insert(notification.id, notification.clone());
        Ok(notification)
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Comment>, RepoError> {
        self.touch();
        let comments = self.comments.lock().unwrap();
        Ok(ids.iter().filter_map(|id| comments.get(id).cloned()).collect())
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<(), RepoError> {
        self.touch();
        let mut comments = self.comments.lock().unwrap();
        for id in ids {
            comments.remove(id);
        }
        Ok(())
    }
}

#[async_trait]
impl ReviewRepository for MemoryStore {
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Review>, RepoError> {
        self.touch();
        let reviews = self.reviews.lock().unwrap();
        Ok(ids.iter().filter_map(|id| reviews.get(id).cloned()).collect())
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<(), RepoError> {
        self.touch();
        let mut reviews = self.reviews.lock().unwrap();
        for id in ids {
            reviews.remove(id);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeImageHost {
    assets: Mutex<HashMap<String, HostedImage>>,
    next_asset: AtomicUsize,
    pub calls: AtomicUsize,
    pub fail_upload: AtomicBool,
    pub fail_destroy_of: Mutex<HashSet<String>>,
}

impl FakeImageHost {
    pub fn contains(&self, asset_id: &str) -> bool {
        self.assets.lock().unwrap().contains_key(asset_id)
    }

    pub fn asset_count(&self) -> usize {
        self.assets.lock().unwrap().len()
    }

    pub fn insert(&self, asset_id: &str) -> HostedImage {
        let image = HostedImage {
            url: format!("https://images.test/{}", asset_id),
            asset_id: asset_id.to_string(),
        };
        self.assets
            .lock()
            .unwrap()
            .insert(asset_id.to_string(), image.clone());
        image
    }
}

#[async_trait]
impl ImageHost for FakeImageHost {
    async fn upload(&self, image: ImageUpload) -> Result<HostedImage, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed(format!("rejected {}", image.file_name)));
        }
        let n = self.next_asset.fetch_add(1, Ordering::SeqCst);
        Ok(self.insert(&format!("campgrounds/asset-{}", n)))
    }

    async fn destroy(&self, asset_id: &str) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_destroy_of.lock().unwrap().contains(asset_id) {
            return Err(StorageError::BackendError(anyhow::anyhow!("cannot destroy {}", asset_id)));
        }
        self.assets.lock().unwrap().remove(asset_id);
        Ok(())
    }
}

/// Knows a fixed set of addresses; anything else has no match.
pub struct FakeGeocoder {
    known: HashMap<String, GeocodeMatch>,
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub delay: Mutex<Option<Duration>>,
}

impl Default for FakeGeocoder {
    fn default() -> Self {
        Self {
            known: HashMap::from([("Boulder, CO".to_string(), boulder())]),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            delay: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, address: &str) -> Result<Vec<GeocodeMatch>, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(GeocodeError::Provider {
                status: "REQUEST_DENIED".to_string(),
                message: "injected".to_string(),
            });
        }
        Ok(self.known.get(address).cloned().into_iter().collect())
    }
}

/// A service wired to in-memory collaborators, plus seeding helpers.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub images: Arc<FakeImageHost>,
    pub geocoder: Arc<FakeGeocoder>,
    pub service: CampgroundService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(5))
    }

    pub fn with_timeout(call_timeout: Duration) -> Self {
        let store = Arc::new(MemoryStore::default());
        let images = Arc::new(FakeImageHost::default());
        let geocoder = Arc::new(FakeGeocoder::default());
        let service = CampgroundService::new(
            Collaborators {
                campgrounds: store.clone(),
                users: store.clone(),
                notifications: store.clone(),
                comments: store.clone(),
                reviews: store.clone(),
                images: images.clone(),
                geocoder: geocoder.clone(),
            },
            call_timeout,
        );
        Self {
            store,
            images,
            geocoder,
            service,
        }
    }

    pub fn add_user(&self, username: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            followers: Vec::new(),
            notifications: Vec::new(),
        };
        self.store.put_user(user.clone());
        user
    }

    pub fn follow(&self, user_id: Uuid, follower_id: Uuid) {
        let mut user = self.store.user(user_id).expect("followed user exists");
        user.followers.push(follower_id);
        self.store.put_user(user);
    }

    pub fn author(&self, user: &User) -> Author {
        Author {
            id: user.id,
            username: user.username.clone(),
        }
    }

    pub fn seed_campground(&self, owner: &User, asset_id: Option<&str>) -> Campground {
        let campground = Campground {
            id: Uuid::new_v4(),
            name: "Pine Ridge".to_string(),
            description: "Tall pines and a creek".to_string(),
            place: GeocodedPlace {
                location: "Old Road, Boulder, CO, USA".to_string(),
                lat: 40.0,
                lng: -105.0,
            },
            image: asset_id.map(|id| self.images.insert(id)),
            author: self.author(owner),
            rating: 3.5,
            comments: Vec::new(),
            reviews: Vec::new(),
        };
        self.store.put_campground(campground.clone());
        campground
    }

    pub fn add_comment(&self, author: &User, age_days: i64) -> Uuid {
        let comment = Comment {
            id: Uuid::new_v4(),
            text: "Great spot".to_string(),
            author: self.author(author),
            created_at: Utc::now() - ChronoDuration::days(age_days),
        };
        let id = comment.id;
        self.store.comments.lock().unwrap().insert(id, comment);
        id
    }

    pub fn add_review(&self, author: &User, age_days: i64) -> Uuid {
        let review = Review {
            id: Uuid::new_v4(),
            rating: 4,
            text: "Would camp again".to_string(),
            author: self.author(author),
            created_at: Utc::now() - ChronoDuration::days(age_days),
        };
        let id = review.id;
        self.store.reviews.lock().unwrap().insert(id, review);
        id
    }
}
