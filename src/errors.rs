use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use uuid::Uuid;

// --- Adapter Errors ---

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("Stored record is malformed: {0}")]
    DataCorruption(String),

    #[error("Record not found: {0}")]
    NotFound(Uuid),

    #[error("Database backend error: {0}")]
    BackendError(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File upload failed: {0}")]
    UploadFailed(String),

    #[error("Storage backend error: {0}")]
    BackendError(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("Geocoding provider returned status {status}: {message}")]
    Provider { status: String, message: String },

    #[error("Geocoding request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

// --- Workflow Errors ---

#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Bad user input. The message is shown to the user as is.
    #[error("{0}")]
    Validation(String),

    /// A store, asset-host or geocoder call failed or timed out.
    #[error("{context}")]
    Dependency {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Campground not found with ID: {0}")]
    NotFound(Uuid),

    #[error("{0}")]
    NoSearchResults(String),
}

impl WorkflowError {
    pub fn validation(msg: impl Into<String>) -> Self {
        WorkflowError::Validation(msg.into())
    }

    pub fn dependency(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        WorkflowError::Dependency {
            context: context.into(),
            source: source.into(),
        }
    }
}

// --- Web Layer Error ---

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Error processing multipart form data: {0}")]
    MultipartError(#[from] axum::extract::multipart::MultipartError),
    #[error("Invalid campground ID format: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("Authentication required: {0}")]
    Unauthorized(String),
    #[error("You don't have permission to do that")]
    Forbidden,

    #[error("Campground not found with ID: {0}")]
    CampgroundNotFound(Uuid),
    #[error("{0}")]
    NotFound(String),
    #[error("Could not complete campground operation")]
    DependencyError(#[source] WorkflowError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Initialization error: {0}")]
    InitError(String),
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Validation(msg) => AppError::InvalidInput(msg),
            WorkflowError::NotFound(id) => AppError::CampgroundNotFound(id),
            WorkflowError::NoSearchResults(msg) => AppError::NotFound(msg),
            e @ WorkflowError::Dependency { .. } => AppError::DependencyError(e),
        }
    }
}

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InitError(err.to_string())
    }
}

// --- Axum Response Implementation ---

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            // 4xx Client Errors
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::MultipartError(e) => (StatusCode::BAD_REQUEST, format!("Invalid multipart form data: {}", e)),
            AppError::InvalidUuid(e) => (StatusCode::BAD_REQUEST, format!("Invalid ID format: {}", e)),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "You need to be logged in to do that".to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::CampgroundNotFound(id) => (StatusCode::NOT_FOUND, format!("Campground not found with ID: {}", id)),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),

            // 5xx Server Errors
            AppError::DependencyError(e) => {
                tracing::error!(error.source = ?e, "Dependency error occurred");
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
            AppError::ConfigError(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server configuration error".to_string())
            }
            AppError::InitError(msg) => {
                tracing::error!("Initialization error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server initialization error".to_string())
            }
        };

        tracing::warn!(error.message = %error_message, error.detail = %self, "Responding with error");

        let body = Json(serde_json::json!({ "error": error_message }));
        (status, body).into_response()
    }
}
