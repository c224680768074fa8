use crate::{
    auth::AuthenticatedUser,
    errors::AppError,
    models::{Campground, CampgroundDetail, CampgroundForm, ImageUpload},
    service::notified_count,
    AppState,
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing;
use uuid::Uuid;

#[derive(Deserialize, Debug, Default)]
pub struct ListQuery {
    pub search: Option<String>,
}

fn detail_path(id: Uuid) -> String {
    format!("/campgrounds/{}", id)
}

/// Accepts both `name` and `campground[name]` style field names.
fn form_key(field_name: &str) -> &str {
    field_name
        .strip_prefix("campground[")
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(field_name)
}

/// Reads the campground fields and the optional image from a multipart body.
/// An image part with no file name or no bytes counts as "no image".
async fn read_campground_form(mut multipart: Multipart) -> Result<(CampgroundForm, Option<ImageUpload>), AppError> {
    let mut form = CampgroundForm::default();
    let mut image = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = match field.name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        match form_key(&field_name) {
            "name" => form.name = field.text().await?,
            "description" => form.description = field.text().await?,
            "location" => form.location = field.text().await?,
            "rating" => form.rating = field.text().await?.trim().parse().ok(),
            "image" => {
                let file_name = field.file_name().map(|s| s.to_string()).unwrap_or_default();
                let content_type = field.content_type().map(|m| m.to_string());
                let data = field.bytes().await?.to_vec();
                if file_name.is_empty() && data.is_empty() {
                    tracing::debug!("Empty image part, treating as no image");
                    continue;
                }
                image = Some(ImageUpload {
                    file_name,
                    content_type,
                    data,
                });
            }
            _ => tracing::debug!("Ignoring unknown multipart field: {}", field_name),
        }
    }
    Ok((form, image))
}

/// GET /campgrounds?search=
pub async fn list_campgrounds(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Campground>>, AppError> {
    let campgrounds = state.campgrounds.list(query.search.as_deref()).await?;
    tracing::debug!("Handler retrieved {} campgrounds", campgrounds.len());
    Ok(Json(campgrounds))
}

/// POST /campgrounds
pub async fn create_campground(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (form, image) = read_campground_form(multipart).await?;
    let created = state.campgrounds.create(form, user.as_author(), image).await?;

    let notified = notified_count(&created.fan_out);
    tracing::info!(
        campground_id = %created.campground.id,
        notified,
        followers = created.fan_out.len(),
        "Campground created via handler"
    );
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, detail_path(created.campground.id))],
        Json(created.campground),
    ))
}

/// GET /campgrounds/{id}
pub async fn show_campground(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<Json<CampgroundDetail>, AppError> {
    let id = Uuid::parse_str(&id_str)?;
    tracing::debug!(campground_id = %id, "Fetching campground details via handler");
    Ok(Json(state.campgrounds.show(id).await?))
}

/// PUT /campgrounds/{id}
pub async fn update_campground(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id_str): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let id = Uuid::parse_str(&id_str)?;
    user.ensure_owner(&state.campgrounds.find(id).await?)?;

    let (form, image) = read_campground_form(multipart).await?;
    let updated = state.campgrounds.update(id, form, image).await?;

    Ok(([(header::LOCATION, detail_path(id))], Json(updated)))
}

/// DELETE /campgrounds/{id}
pub async fn delete_campground(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id_str): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = Uuid::parse_str(&id_str)?;
    user.ensure_owner(&state.campgrounds.find(id).await?)?;

    state.campgrounds.delete(id).await?;
    tracing::info!(campground_id = %id, "Campground deleted via handler");
    Ok(StatusCode::NO_CONTENT)
}
