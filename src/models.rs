use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Snapshot of the creating user, copied onto the record at creation time.
/// Later username changes do not touch existing snapshots.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: Uuid,
    pub username: String,
}

/// A geocoded location. The formatted address and its coordinates are only
/// ever stored together.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GeocodedPlace {
    pub location: String,
    pub lat: f64,
    pub lng: f64,
}

/// An image stored on the asset host.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HostedImage {
    pub url: String,
    /// Opaque handle used to destroy the asset later.
    pub asset_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Campground {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(flatten)]
    pub place: GeocodedPlace,
    pub image: Option<HostedImage>,
    pub author: Author,
    pub rating: f64,
    pub comments: Vec<Uuid>,
    pub reviews: Vec<Uuid>,
}

/// A campground that has not been persisted yet. The store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCampground {
    pub name: String,
    pub description: String,
    pub place: GeocodedPlace,
    pub image: Option<HostedImage>,
    pub author: Author,
}

impl NewCampground {
    pub fn into_campground(self, id: Uuid) -> Campground {
        Campground {
            id,
            name: self.name,
            description: self.description,
            place: self.place,
            image: self.image,
            author: self.author,
            rating: 0.0,
            comments: Vec::new(),
            reviews: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub followers: Vec<Uuid>,
    pub notifications: Vec<Uuid>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub username: String,
    pub campground_id: Uuid,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: Uuid,
    pub text: String,
    pub author: Author,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Review {
    pub id: Uuid,
    pub rating: u8,
    pub text: String,
    pub author: Author,
    pub created_at: DateTime<Utc>,
}

/// A campground with its comments and reviews resolved, for the detail view.
#[derive(Serialize, Debug, Clone)]
pub struct CampgroundDetail {
    #[serde(flatten)]
    pub campground: Campground,
    pub comment_list: Vec<Comment>,
    pub review_list: Vec<Review>,
}

/// Raw form input for create and update.
///
/// `rating` is accepted so that a submitted value can be recognised, but it
/// is never applied to a stored campground.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CampgroundForm {
    pub name: String,
    pub description: String,
    pub location: String,
    #[serde(default)]
    pub rating: Option<f64>,
}

/// The subset of a form that an update may apply.
#[derive(Debug, Clone, PartialEq)]
pub struct CampgroundChanges {
    pub name: String,
    pub description: String,
    pub location: String,
}

impl CampgroundForm {
    /// Drops `rating` and trims the remaining fields.
    pub fn into_changes(self) -> CampgroundChanges {
        if self.rating.is_some() {
            tracing::debug!("Discarding rating submitted with campground form");
        }
        CampgroundChanges {
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            location: self.location.trim().to_string(),
        }
    }
}

/// An uploaded image file as received from the client.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

impl ImageUpload {
    /// Lower-cased extension of the file name, if it is a recognised image type.
    pub fn image_extension(&self) -> Option<String> {
        let (_, ext) = self.file_name.rsplit_once('.')?;
        let ext = ext.to_ascii_lowercase();
        IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
    }
}

/// One geocoder match.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeMatch {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: String,
}

impl From<GeocodeMatch> for GeocodedPlace {
    fn from(m: GeocodeMatch) -> Self {
        GeocodedPlace {
            location: m.formatted_address,
            lat: m.latitude,
            lng: m.longitude,
        }
    }
}
