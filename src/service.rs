use crate::{
    domain::{
        CampgroundRepository, CommentRepository, Geocoder, ImageHost, NotificationRepository, ReviewRepository,
        UserRepository,
    },
    errors::{GeocodeError, RepoError, WorkflowError},
    fanout::{settle_each, Settled},
    models::{
        Author, Campground, CampgroundChanges, CampgroundDetail, CampgroundForm, GeocodedPlace, HostedImage,
        ImageUpload, NewCampground,
    },
};
use std::{future::Future, sync::Arc, time::Duration};
use tracing;
use uuid::Uuid;

/// The external collaborators the campground workflow talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub campgrounds: Arc<dyn CampgroundRepository>,
    pub users: Arc<dyn UserRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub images: Arc<dyn ImageHost>,
    pub geocoder: Arc<dyn Geocoder>,
}

/// Per-follower result of the creation fan-out, keyed by follower id. Ok holds
/// the notification id, or None when the follower record no longer exists.
pub type FanOutOutcome = Settled<Uuid, Option<Uuid>, WorkflowError>;

pub fn notified_count(outcomes: &[FanOutOutcome]) -> usize {
    outcomes.iter().filter(|s| matches!(s.outcome, Ok(Some(_)))).count()
}

#[derive(Debug)]
pub struct CreatedCampground {
    pub campground: Campground,
    pub fan_out: Vec<FanOutOutcome>,
}

/// Create, update, delete and read operations over campgrounds.
///
/// Every external call is bounded by `call_timeout`; expiry counts as a
/// failure of that call. Nothing is retried. Ownership is checked by the
/// caller before `update` and `delete`.
///
/// Concurrent updates of the same campground are not serialized here; the
/// last save wins. A save never recreates a campground deleted meanwhile.
#[derive(Clone)]
pub struct CampgroundService {
    deps: Collaborators,
    call_timeout: Duration,
}

impl CampgroundService {
    pub fn new(deps: Collaborators, call_timeout: Duration) -> Self {
        tracing::info!(?call_timeout, "Initializing CampgroundService");
        Self { deps, call_timeout }
    }

    /// Runs `fut` under the call timeout without interpreting its result.
    async fn within_timeout<T>(&self, what: &str, fut: impl Future<Output = T>) -> Result<T, WorkflowError> {
        tokio::time::timeout(self.call_timeout, fut).await.map_err(|elapsed| {
            tracing::error!(call = what, timeout = ?self.call_timeout, "External call timed out");
            WorkflowError::dependency(format!("{} timed out", what), elapsed)
        })
    }

    /// Runs `fut` under the call timeout, mapping any failure to a dependency error.
    async fn call<T, E>(&self, what: &str, fut: impl Future<Output = Result<T, E>>) -> Result<T, WorkflowError>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.within_timeout(what, fut).await?.map_err(|e| {
            tracing::error!(call = what, error = %e, "External call failed");
            WorkflowError::dependency(format!("{} failed", what), e)
        })
    }

    /// Saves over an existing record. A record deleted in the meantime is
    /// reported as not found rather than recreated.
    async fn save_record(&self, what: &str, campground: &Campground) -> Result<(), WorkflowError> {
        match self.within_timeout(what, self.deps.campgrounds.save(campground)).await? {
            Ok(()) => Ok(()),
            Err(RepoError::NotFound(_)) => Err(WorkflowError::NotFound(campground.id)),
            Err(e) => {
                tracing::error!(call = what, error = %e, "External call failed");
                Err(WorkflowError::dependency(format!("{} failed", what), e))
            }
        }
    }

    // --- Write workflow ---

    /// Validates the input before any external call, then uploads the image,
    /// geocodes, persists and notifies the actor's followers. Nothing that
    /// happens after the record is persisted fails the call.
    pub async fn create(
        &self,
        form: CampgroundForm,
        actor: Author,
        image: Option<ImageUpload>,
    ) -> Result<CreatedCampground, WorkflowError> {
        let changes = validate_form(form)?;
        if let Some(upload) = &image {
            validate_image(upload)?;
        }

        let hosted = match image {
            Some(upload) => Some(self.upload_image(upload).await?),
            None => None,
        };

        // No compensation past this point: a failure leaves the uploaded image behind.
        let log_orphan = |reason: &str| {
            if let Some(img) = &hosted {
                tracing::warn!(asset_id = %img.asset_id, url = %img.url, reason, "Orphaned campground image needs cleanup");
            }
        };

        let place = match self.resolve_place(&changes.location).await {
            Ok(place) => place,
            Err(e) => {
                log_orphan("geocoding failed after upload");
                return Err(e);
            }
        };

        let pending = NewCampground {
            name: changes.name,
            description: changes.description,
            place,
            image: hosted.clone(),
            author: actor,
        };
        let campground = match self.call("Saving campground", self.deps.campgrounds.create(pending)).await {
            Ok(cg) => cg,
            Err(e) => {
                log_orphan("saving campground failed after upload");
                return Err(e);
            }
        };
        tracing::info!(campground_id = %campground.id, author = %campground.author.username, "Campground created");

        let follower_ids = self.follower_ids_of(campground.author.id).await;
        let fan_out = self.notify_followers(&campground, follower_ids).await;
        Ok(CreatedCampground { campground, fan_out })
    }

    /// Follower ids of `user_id`. A missing or unreadable user record means
    /// there is nobody to notify.
    async fn follower_ids_of(&self, user_id: Uuid) -> Vec<Uuid> {
        match self.call("Loading user", self.deps.users.get_by_id(user_id)).await {
            Ok(Some(user)) => user.followers,
            Ok(None) => {
                tracing::warn!(%user_id, "Authenticated user has no user record; no followers to notify");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "Could not load user; no followers notified");
                Vec::new()
            }
        }
    }

    /// One notification per follower. Each follower is loaded, notified and
    /// settled on its own; failures are logged and kept in the returned
    /// outcomes, never propagated.
    async fn notify_followers(&self, campground: &Campground, follower_ids: Vec<Uuid>) -> Vec<FanOutOutcome> {
        let this = self;
        let username = campground.author.username.as_str();
        let campground_id = campground.id;

        let settled: Vec<FanOutOutcome> = settle_each(
            follower_ids,
            |follower_id| *follower_id,
            move |follower_id| async move {
                let Some(follower) = this
                    .call("Loading follower", this.deps.users.get_by_id(follower_id))
                    .await?
                else {
                    tracing::debug!(%follower_id, %campground_id, "Skipping unknown follower");
                    return Ok(None);
                };
                let notification = this
                    .call("Creating notification", this.deps.notifications.create(username, campground_id))
                    .await?;
                this.call(
                    "Appending notification to follower",
                    this.deps.users.push_notification(follower.id, notification.id),
                )
                .await?;
                Ok::<_, WorkflowError>(Some(notification.id))
            },
        )
        .await;

        let failed = settled.iter().filter(|s| !s.is_ok()).count();
        for s in settled.iter() {
            if let Err(e) = &s.outcome {
                tracing::warn!(follower_id = %s.key, %campground_id, error = %e, "Failed to notify follower");
            }
        }
        tracing::debug!(%campground_id, notified = notified_count(&settled), failed, "Follower fan-out complete");
        settled
    }

    pub async fn update(
        &self,
        id: Uuid,
        form: CampgroundForm,
        image: Option<ImageUpload>,
    ) -> Result<Campground, WorkflowError> {
        let changes = validate_form(form)?;
        if let Some(upload) = &image {
            validate_image(upload)?;
        }

        // Resolve the address before touching the stored record. Any geocoder
        // failure is reported to the user as an invalid address.
        let place = match self.resolve_place(&changes.location).await {
            Ok(place) => place,
            Err(e @ WorkflowError::Dependency { .. }) => {
                tracing::warn!(campground_id = %id, error = ?e, "Geocoder unavailable during update");
                return Err(WorkflowError::validation("Invalid address"));
            }
            Err(e) => return Err(e),
        };

        let previous = self.load(id).await?;
        let mut campground = previous.clone();
        apply_changes(&mut campground, changes, place);

        match image {
            None => {
                self.save_record("Saving campground", &campground).await?;
            }
            Some(upload) => {
                campground.image = Some(self.upload_image(upload).await?);
                self.save_with_replaced_image(&previous, &campground).await?;
            }
        }

        tracing::info!(campground_id = %id, "Campground updated");
        Ok(campground)
    }

    /// Saves `updated`, which references a freshly uploaded image, then
    /// destroys the image `previous` referenced. Any failure restores the
    /// previous record and removes the fresh upload, so a stored campground
    /// never points at a destroyed asset.
    async fn save_with_replaced_image(&self, previous: &Campground, updated: &Campground) -> Result<(), WorkflowError> {
        let Some(fresh) = &updated.image else {
            return self.save_record("Saving campground", updated).await;
        };

        if let Err(e) = self.save_record("Saving campground", updated).await {
            self.discard_image(fresh).await;
            return Err(e);
        }

        let Some(old) = &previous.image else {
            return Ok(());
        };
        let Err(e) = self.call("Destroying previous image", self.deps.images.destroy(&old.asset_id)).await else {
            return Ok(());
        };

        match self.save_record("Restoring campground", previous).await {
            Ok(()) => self.discard_image(fresh).await,
            Err(restore_err) => {
                tracing::error!(
                    campground_id = %previous.id,
                    error = %restore_err,
                    "Could not restore campground after image replacement failed; keeping new image"
                );
            }
        }
        Err(e)
    }

    /// Best-effort removal of an image no record references.
    async fn discard_image(&self, image: &HostedImage) {
        if let Err(e) = self.call("Destroying unused image", self.deps.images.destroy(&image.asset_id)).await {
            tracing::warn!(asset_id = %image.asset_id, error = %e, "Orphaned campground image needs cleanup");
        }
    }

    /// Deletes the campground, its hosted image, and every comment and review
    /// it lists. If the image cannot be destroyed nothing else is removed.
    pub async fn delete(&self, id: Uuid) -> Result<Campground, WorkflowError> {
        let campground = self.load(id).await?;

        if let Some(img) = &campground.image {
            self.call("Destroying campground image", self.deps.images.destroy(&img.asset_id))
                .await?;
        }
        self.call("Deleting comments", self.deps.comments.delete_many(&campground.comments))
            .await?;
        self.call("Deleting reviews", self.deps.reviews.delete_many(&campground.reviews))
            .await?;
        self.call("Deleting campground", self.deps.campgrounds.delete(id)).await?;

        tracing::info!(
            campground_id = %id,
            comments = campground.comments.len(),
            reviews = campground.reviews.len(),
            "Campground deleted"
        );
        Ok(campground)
    }

    // --- Read side ---

    /// All campgrounds, or those whose name contains `search` (case-insensitive).
    pub async fn list(&self, search: Option<&str>) -> Result<Vec<Campground>, WorkflowError> {
        let all = self.call("Listing campgrounds", self.deps.campgrounds.list_all()).await?;

        let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(all);
        };
        let needle = term.to_lowercase();
        let matches: Vec<Campground> = all
            .into_iter()
            .filter(|cg| cg.name.to_lowercase().contains(&needle))
            .collect();

        if matches.is_empty() {
            tracing::debug!(search = %term, "No campground matched search");
            return Err(WorkflowError::NoSearchResults("Campground not found".to_string()));
        }
        Ok(matches)
    }

    /// A campground with its comments and its reviews, newest review first.
    pub async fn show(&self, id: Uuid) -> Result<CampgroundDetail, WorkflowError> {
        let campground = self.load(id).await?;
        let comment_list = self
            .call("Loading comments", self.deps.comments.find_by_ids(&campground.comments))
            .await?;
        let mut review_list = self
            .call("Loading reviews", self.deps.reviews.find_by_ids(&campground.reviews))
            .await?;
        review_list.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(CampgroundDetail {
            campground,
            comment_list,
            review_list,
        })
    }

    pub async fn find(&self, id: Uuid) -> Result<Campground, WorkflowError> {
        self.load(id).await
    }

    // --- Helpers ---

    async fn load(&self, id: Uuid) -> Result<Campground, WorkflowError> {
        self.call("Loading campground", self.deps.campgrounds.get_by_id(id))
            .await?
            .ok_or(WorkflowError::NotFound(id))
    }

    async fn upload_image(&self, upload: ImageUpload) -> Result<HostedImage, WorkflowError> {
        let file_name = upload.file_name.clone();
        self.within_timeout("Uploading image", self.deps.images.upload(upload))
            .await?
            .map_err(|e| {
                tracing::warn!(%file_name, error = %e, "Image upload rejected");
                WorkflowError::validation("Only image file types are supported")
            })
    }

    /// Geocodes `address` and takes the first match.
    async fn resolve_place(&self, address: &str) -> Result<GeocodedPlace, WorkflowError> {
        let matches = self
            .within_timeout("Geocoding address", self.deps.geocoder.geocode(address))
            .await?
            .map_err(|e: GeocodeError| {
                tracing::error!(%address, error = %e, "Geocoding failed");
                WorkflowError::dependency("Geocoding address failed", e)
            })?;

        match matches.into_iter().next() {
            Some(first) => Ok(first.into()),
            None => {
                tracing::debug!(%address, "Geocoder returned no match");
                Err(WorkflowError::validation("Invalid address"))
            }
        }
    }
}

fn validate_form(form: CampgroundForm) -> Result<CampgroundChanges, WorkflowError> {
    let changes = form.into_changes();
    for (field, value) in [
        ("name", &changes.name),
        ("description", &changes.description),
        ("location", &changes.location),
    ] {
        if value.is_empty() {
            return Err(WorkflowError::validation(format!("Campground {} is required", field)));
        }
    }
    Ok(changes)
}

fn validate_image(upload: &ImageUpload) -> Result<(), WorkflowError> {
    if upload.image_extension().is_none() {
        return Err(WorkflowError::validation("Only image files are allowed!"));
    }
    if upload.data.is_empty() {
        return Err(WorkflowError::validation("Image file is empty"));
    }
    Ok(())
}

/// Rating, author and the comment/review lists are never touched here.
fn apply_changes(campground: &mut Campground, changes: CampgroundChanges, place: GeocodedPlace) {
    campground.name = changes.name;
    campground.description = changes.description;
    campground.place = place;
}
