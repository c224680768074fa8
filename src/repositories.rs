use crate::{
    domain::{CampgroundRepository, CommentRepository, NotificationRepository, ReviewRepository, UserRepository},
    errors::RepoError,
    models::{Author, Campground, Comment, GeocodedPlace, HostedImage, NewCampground, Notification, Review, User},
};
use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_dynamodb::{
    types::{AttributeValue, DeleteRequest, WriteRequest},
    Client as DynamoDbClient,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{self, info};
use uuid::Uuid;

type Item = HashMap<String, AttributeValue>;

/// DynamoDB caps BatchWriteItem at 25 requests.
const BATCH_WRITE_LIMIT: usize = 25;

// --- Campgrounds ---

#[derive(Debug, Clone)]
pub struct DynamoDbCampgroundRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoDbCampgroundRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        info!(%table_name, "Initializing DynamoDbCampgroundRepository");
        Self { client, table_name }
    }

    async fn put(&self, campground: &Campground, mode: PutMode) -> Result<(), RepoError> {
        let condition = match mode {
            PutMode::Insert => "attribute_not_exists(id)",
            PutMode::Overwrite => "attribute_exists(id)",
        };
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(campground_to_item(campground)))
            .condition_expression(condition)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if mode == PutMode::Overwrite
                    && e
                        .as_service_error()
                        .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                tracing::warn!(campground_id = %campground.id, table_name = %self.table_name, "DynamoDB: Campground vanished before save");
                Err(RepoError::NotFound(campground.id))
            }
            Err(e) => Err(RepoError::BackendError(anyhow::Error::new(e).context(format!(
                "DynamoDB (table: {}): Failed to put campground (id: {})",
                self.table_name, campground.id
            )))),
        }
    }
}

/// `Overwrite` only succeeds while the record still exists, so a save racing
/// a delete cannot bring the campground back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PutMode {
    Insert,
    Overwrite,
}

#[async_trait]
impl CampgroundRepository for DynamoDbCampgroundRepository {
    async fn create(&self, campground: NewCampground) -> Result<Campground, RepoError> {
        let campground = campground.into_campground(Uuid::new_v4());
        self.put(&campground, PutMode::Insert).await?;
        tracing::debug!(campground_id = %campground.id, table_name = %self.table_name, "DynamoDB: Campground created");
        Ok(campground)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Campground>, RepoError> {
        match get_item(&self.client, &self.table_name, id).await? {
            Some(item) => item_to_campground(&item).map(Some).ok_or_else(|| {
                tracing::error!(campground_id = %id, table_name = %self.table_name, "DynamoDB: Retrieved item but failed to parse into Campground");
                RepoError::DataCorruption(format!(
                    "Failed to parse campground retrieved from DynamoDB table '{}' for id {}",
                    self.table_name, id
                ))
            }),
            None => Ok(None),
        }
    }

    async fn save(&self, campground: &Campground) -> Result<(), RepoError> {
        self.put(campground, PutMode::Overwrite).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        tracing::debug!(campground_id = %id, table_name = %self.table_name, "DynamoDB: Deleting item");
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("id", AttributeValue::S(id.to_string()))
            .send()
            .await
            .context(format!("DynamoDB (table: {}): Failed to delete campground (id: {})", self.table_name, id))
            .map_err(RepoError::BackendError)?;
        Ok(())
    }

    /// Lists all campgrounds using DynamoDB Scan. Handles pagination.
    async fn list_all(&self) -> Result<Vec<Campground>, RepoError> {
        tracing::debug!("DynamoDB: Scanning table '{}' for all campgrounds", self.table_name);
        let mut campgrounds = Vec::new();
        let mut last_evaluated_key: Option<Item> = None;

        loop {
            let resp = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_exclusive_start_key(last_evaluated_key)
                .send()
                .await
                .context(format!("DynamoDB: Failed to scan table '{}'", self.table_name))
                .map_err(RepoError::BackendError)?;

            for item in resp.items.unwrap_or_default() {
                match item_to_campground(&item) {
                    Some(cg) => campgrounds.push(cg),
                    None => {
                        let item_id = get_s(&item, "id");
                        tracing::error!(item.id = ?item_id, table_name = %self.table_name, "DynamoDB: Failed to parse item from scan into Campground");
                        return Err(RepoError::DataCorruption(format!(
                            "DynamoDB: Failed to parse item {:?} during scan of table '{}'",
                            item_id, self.table_name
                        )));
                    }
                }
            }

            last_evaluated_key = resp.last_evaluated_key;
            if last_evaluated_key.is_none() {
                break;
            }
            tracing::debug!("DynamoDB Scan (table: {}): Continuing with LastEvaluatedKey...", self.table_name);
        }

        tracing::info!("DynamoDB (table: {}): Listed {} campgrounds", self.table_name, campgrounds.len());
        Ok(campgrounds)
    }
}

// --- Users ---

#[derive(Debug, Clone)]
pub struct DynamoDbUserRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoDbUserRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        info!(%table_name, "Initializing DynamoDbUserRepository");
        Self { client, table_name }
    }
}

#[async_trait]
impl UserRepository for DynamoDbUserRepository {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        match get_item(&self.client, &self.table_name, id).await? {
            Some(item) => item_to_user(&item).map(Some).ok_or_else(|| {
                RepoError::DataCorruption(format!(
                    "Failed to parse user retrieved from DynamoDB table '{}' for id {}",
                    self.table_name, id
                ))
            }),
            None => Ok(None),
        }
    }

    /// A single `list_append` update, so concurrent appends to the same user
    /// never overwrite each other.
    async fn push_notification(&self, user_id: Uuid, notification_id: Uuid) -> Result<(), RepoError> {
        self.client
            .update_item()
            .table_name(&self.table_name)
            .key("id", AttributeValue::S(user_id.to_string()))
            .update_expression("SET notifications = list_append(if_not_exists(notifications, :empty), :new)")
            .condition_expression("attribute_exists(id)")
            .expression_attribute_values(":empty", AttributeValue::L(Vec::new()))
            .expression_attribute_values(":new", id_list(&[notification_id]))
            .send()
            .await
            .context(format!(
                "DynamoDB (table: {}): Failed to append notification {} to user {}",
                self.table_name, notification_id, user_id
            ))
            .map_err(RepoError::BackendError)?;
        Ok(())
    }
}

// --- Notifications ---

#[derive(Debug, Clone)]
pub struct DynamoDbNotificationRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoDbNotificationRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        info!(%table_name, "Initializing DynamoDbNotificationRepository");
        Self { client, table_name }
    }
}

#[async_trait]
impl NotificationRepository for DynamoDbNotificationRepository {
    async fn create(&self, username: &str, campground_id: Uuid) -> Result<Notification, RepoError> {
        let notification = Notification {
            id: Uuid::new_v4(),
            username: username.to_string(),
            campground_id,
            is_read: false,
            created_at: Utc::now(),
        };
        self.client
            .put_item()
            .table_name(&self.table_name)
            .item("id", AttributeValue::S(notification.id.to_string()))
            .item("username", AttributeValue::S(notification.username.clone()))
            .item("campground_id", AttributeValue::S(campground_id.to_string()))
            .item("is_read", AttributeValue::Bool(false))
            .item("created_at", AttributeValue::S(notification.created_at.to_rfc3339()))
            .send()
            .await
            .context(format!(
                "DynamoDB (table: {}): Failed to put notification for campground {}",
                self.table_name, campground_id
            ))
            .map_err(RepoError::BackendError)?;
        Ok(notification)
    }
}

// --- Comments and reviews ---

#[derive(Debug, Clone)]
pub struct DynamoDbCommentRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoDbCommentRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        info!(%table_name, "Initializing DynamoDbCommentRepository");
        Self { client, table_name }
    }
}

#[async_trait]
impl CommentRepository for DynamoDbCommentRepository {
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Comment>, RepoError> {
        let mut comments = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(item) = get_item(&self.client, &self.table_name, *id).await? {
                let comment = item_to_comment(&item).ok_or_else(|| {
                    RepoError::DataCorruption(format!("Failed to parse comment {} in table '{}'", id, self.table_name))
                })?;
                comments.push(comment);
            }
        }
        Ok(comments)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<(), RepoError> {
        delete_items(&self.client, &self.table_name, ids).await
    }
}

#[derive(Debug, Clone)]
pub struct DynamoDbReviewRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoDbReviewRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        info!(%table_name, "Initializing DynamoDbReviewRepository");
        Self { client, table_name }
    }
}

#[async_trait]
impl ReviewRepository for DynamoDbReviewRepository {
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Review>, RepoError> {
        let mut reviews = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(item) = get_item(&self.client, &self.table_name, *id).await? {
                let review = item_to_review(&item).ok_or_else(|| {
                    RepoError::DataCorruption(format!("Failed to parse review {} in table '{}'", id, self.table_name))
                })?;
                reviews.push(review);
            }
        }
        Ok(reviews)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<(), RepoError> {
        delete_items(&self.client, &self.table_name, ids).await
    }
}

// --- Shared DynamoDB calls ---

async fn get_item(client: &DynamoDbClient, table_name: &str, id: Uuid) -> Result<Option<Item>, RepoError> {
    let resp = client
        .get_item()
        .table_name(table_name)
        .key("id", AttributeValue::S(id.to_string()))
        .send()
        .await
        .context(format!("DynamoDB (table: {}): Failed to get item (id: {})", table_name, id))
        .map_err(RepoError::BackendError)?;
    Ok(resp.item)
}

/// Deletes the given ids with BatchWriteItem. Missing ids are not an error.
async fn delete_items(client: &DynamoDbClient, table_name: &str, ids: &[Uuid]) -> Result<(), RepoError> {
    for chunk in ids.chunks(BATCH_WRITE_LIMIT) {
        let requests = chunk
            .iter()
            .map(|id| {
                let delete = DeleteRequest::builder()
                    .key("id", AttributeValue::S(id.to_string()))
                    .build()
                    .context("Failed to build DynamoDB delete request")?;
                Ok(WriteRequest::builder().delete_request(delete).build())
            })
            .collect::<Result<Vec<_>, anyhow::Error>>()
            .map_err(RepoError::BackendError)?;

        let resp = client
            .batch_write_item()
            .request_items(table_name, requests)
            .send()
            .await
            .context(format!("DynamoDB (table: {}): Failed to batch delete {} items", table_name, chunk.len()))
            .map_err(RepoError::BackendError)?;

        let unprocessed = resp
            .unprocessed_items
            .as_ref()
            .and_then(|m| m.get(table_name))
            .map_or(0, Vec::len);
        if unprocessed > 0 {
            return Err(RepoError::BackendError(anyhow::anyhow!(
                "DynamoDB (table: {}): {} deletes left unprocessed",
                table_name,
                unprocessed
            )));
        }
        tracing::debug!(table_name, deleted = chunk.len(), "DynamoDB: Batch delete complete");
    }
    Ok(())
}

// --- Item mapping ---

fn id_list(ids: &[Uuid]) -> AttributeValue {
    AttributeValue::L(ids.iter().map(|id| AttributeValue::S(id.to_string())).collect())
}

fn get_s<'a>(item: &'a Item, key: &str) -> Option<&'a str> {
    item.get(key)?.as_s().ok().map(String::as_str)
}

fn get_uuid(item: &Item, key: &str) -> Option<Uuid> {
    Uuid::parse_str(get_s(item, key)?).ok()
}

fn get_f64(item: &Item, key: &str) -> Option<f64> {
    item.get(key)?.as_n().ok()?.parse().ok()
}

/// Review ratings are whole numbers from 1 to 5.
fn get_rating(item: &Item) -> Option<u8> {
    let raw: i64 = item.get("rating")?.as_n().ok()?.trim().parse().ok()?;
    u8::try_from(raw).ok().filter(|r| (1..=5).contains(r))
}

fn get_time(item: &Item, key: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(get_s(item, key)?)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// A missing list attribute reads as empty.
fn get_id_list(item: &Item, key: &str) -> Option<Vec<Uuid>> {
    match item.get(key) {
        None => Some(Vec::new()),
        Some(value) => value
            .as_l()
            .ok()?
            .iter()
            .map(|v| v.as_s().ok().and_then(|s| Uuid::parse_str(s).ok()))
            .collect(),
    }
}

fn get_author(item: &Item) -> Option<Author> {
    Some(Author {
        id: get_uuid(item, "author_id")?,
        username: get_s(item, "author_username")?.to_string(),
    })
}

fn campground_to_item(cg: &Campground) -> Item {
    let mut item = HashMap::from([
        ("id".to_string(), AttributeValue::S(cg.id.to_string())),
        ("name".to_string(), AttributeValue::S(cg.name.clone())),
        ("description".to_string(), AttributeValue::S(cg.description.clone())),
        ("location".to_string(), AttributeValue::S(cg.place.location.clone())),
        ("lat".to_string(), AttributeValue::N(cg.place.lat.to_string())),
        ("lng".to_string(), AttributeValue::N(cg.place.lng.to_string())),
        ("author_id".to_string(), AttributeValue::S(cg.author.id.to_string())),
        ("author_username".to_string(), AttributeValue::S(cg.author.username.clone())),
        ("rating".to_string(), AttributeValue::N(cg.rating.to_string())),
        ("comments".to_string(), id_list(&cg.comments)),
        ("reviews".to_string(), id_list(&cg.reviews)),
    ]);
    if let Some(image) = &cg.image {
        item.insert("image_url".to_string(), AttributeValue::S(image.url.clone()));
        item.insert("image_id".to_string(), AttributeValue::S(image.asset_id.clone()));
    }
    item
}

fn item_to_campground(item: &Item) -> Option<Campground> {
    let image = match (get_s(item, "image_url"), get_s(item, "image_id")) {
        (Some(url), Some(asset_id)) => Some(HostedImage {
            url: url.to_string(),
            asset_id: asset_id.to_string(),
        }),
        _ => None,
    };

    Some(Campground {
        id: get_uuid(item, "id")?,
        name: get_s(item, "name")?.to_string(),
        description: get_s(item, "description")?.to_string(),
        place: GeocodedPlace {
            location: get_s(item, "location")?.to_string(),
            lat: get_f64(item, "lat")?,
            lng: get_f64(item, "lng")?,
        },
        image,
        author: get_author(item)?,
        rating: get_f64(item, "rating").unwrap_or(0.0),
        comments: get_id_list(item, "comments")?,
        reviews: get_id_list(item, "reviews")?,
    })
}

fn item_to_user(item: &Item) -> Option<User> {
    Some(User {
        id: get_uuid(item, "id")?,
        username: get_s(item, "username")?.to_string(),
        followers: get_id_list(item, "followers")?,
        notifications: get_id_list(item, "notifications")?,
    })
}

fn item_to_comment(item: &Item) -> Option<Comment> {
    Some(Comment {
        id: get_uuid(item, "id")?,
        text: get_s(item, "text")?.to_string(),
        author: get_author(item)?,
        created_at: get_time(item, "created_at")?,
    })
}

fn item_to_review(item: &Item) -> Option<Review> {
    Some(Review {
        id: get_uuid(item, "id")?,
        rating: get_rating(item)?,
        text: get_s(item, "text")?.to_string(),
        author: get_author(item)?,
        created_at: get_time(item, "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Campground {
        Campground {
            id: Uuid::new_v4(),
            name: "Pine Ridge".into(),
            description: "Tall pines".into(),
            place: GeocodedPlace {
                location: "Boulder, CO, USA".into(),
                lat: 40.01499,
                lng: -105.27055,
            },
            image: Some(HostedImage {
                url: "https://bucket.s3.amazonaws.com/campgrounds/a.png".into(),
                asset_id: "campgrounds/a.png".into(),
            }),
            author: Author {
                id: Uuid::new_v4(),
                username: "alice".into(),
            },
            rating: 4.5,
            comments: vec![Uuid::new_v4(), Uuid::new_v4()],
            reviews: vec![],
        }
    }

    #[test]
    fn campground_item_keeps_image_and_place_together() {
        let cg = sample();
        let item = campground_to_item(&cg);
        assert_eq!(get_s(&item, "image_id"), Some("campgrounds/a.png"));
        assert_eq!(item_to_campground(&item), Some(cg));
    }

    #[test]
    fn campground_without_image_omits_image_attributes() {
        let mut cg = sample();
        cg.image = None;
        let item = campground_to_item(&cg);
        assert!(!item.contains_key("image_url"));
        assert!(!item.contains_key("image_id"));
        assert_eq!(item_to_campground(&item).unwrap().image, None);
    }

    #[test]
    fn campground_missing_coordinates_is_rejected() {
        let mut item = campground_to_item(&sample());
        item.remove("lng");
        assert_eq!(item_to_campground(&item), None);
    }

    #[test]
    fn user_without_lists_reads_as_empty() {
        let id = Uuid::new_v4();
        let item = HashMap::from([
            ("id".to_string(), AttributeValue::S(id.to_string())),
            ("username".to_string(), AttributeValue::S("bob".into())),
        ]);
        let user = item_to_user(&item).unwrap();
        assert_eq!(user.id, id);
        assert!(user.followers.is_empty());
        assert!(user.notifications.is_empty());
    }

    #[test]
    fn malformed_id_list_is_rejected() {
        let mut item = campground_to_item(&sample());
        item.insert("reviews".into(), AttributeValue::L(vec![AttributeValue::S("not-a-uuid".into())]));
        assert_eq!(item_to_campground(&item), None);
    }

    fn review_item(rating: &str) -> Item {
        HashMap::from([
            ("id".to_string(), AttributeValue::S(Uuid::new_v4().to_string())),
            ("rating".to_string(), AttributeValue::N(rating.into())),
            ("text".to_string(), AttributeValue::S("Would camp again".into())),
            ("author_id".to_string(), AttributeValue::S(Uuid::new_v4().to_string())),
            ("author_username".to_string(), AttributeValue::S("bob".into())),
            ("created_at".to_string(), AttributeValue::S("2024-05-01T12:00:00Z".into())),
        ])
    }

    #[test]
    fn review_rating_must_be_whole_and_in_range() {
        assert_eq!(item_to_review(&review_item("4")).map(|r| r.rating), Some(4));
        assert_eq!(item_to_review(&review_item("5")).map(|r| r.rating), Some(5));
        for bad in ["4.5", "0", "6", "300", "-1", "NaN"] {
            assert!(item_to_review(&review_item(bad)).is_none(), "rating {bad} accepted");
        }
    }
}
