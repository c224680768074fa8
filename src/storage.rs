use crate::{
    domain::ImageHost,
    errors::StorageError,
    models::{HostedImage, ImageUpload},
};
use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_s3::{primitives::ByteStream, Client as S3Client};
use tracing;
use uuid::Uuid;

/// Prefix under which campground images are stored in the bucket.
const KEY_PREFIX: &str = "campgrounds";

/// Campground images in an S3 bucket. The object key is the asset id.
#[derive(Debug, Clone)]
pub struct S3ImageHost {
    client: S3Client,
    bucket_name: String,
    public_base_url: String,
}

impl S3ImageHost {
    pub fn new(client: S3Client, bucket_name: String, public_base_url: String) -> Self {
        let public_base_url = public_base_url.trim_end_matches('/').to_string();
        tracing::info!(%bucket_name, %public_base_url, "Initializing S3ImageHost");
        Self {
            client,
            bucket_name,
            public_base_url,
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

fn object_key(upload: &ImageUpload) -> Result<String, StorageError> {
    let extension = upload
        .image_extension()
        .ok_or_else(|| StorageError::UploadFailed(format!("unsupported image type: {}", upload.file_name)))?;
    Ok(format!("{}/{}.{}", KEY_PREFIX, Uuid::new_v4(), extension))
}

#[async_trait]
impl ImageHost for S3ImageHost {
    /// Uploads data to S3 using PutObject. Sets Content-Type.
    async fn upload(&self, image: ImageUpload) -> Result<HostedImage, StorageError> {
        let key = object_key(&image)?;
        let content_type = image
            .content_type
            .clone()
            .filter(|ct| ct.starts_with("image/"))
            .or_else(|| mime_guess::from_path(&key).first_raw().map(|s| s.to_string()))
            .unwrap_or_else(|| "application/octet-stream".to_string());
        tracing::debug!(s3_key = %key, bucket = %self.bucket_name, %content_type, "S3: Uploading image");

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .body(ByteStream::from(image.data))
            .content_type(content_type)
            .send()
            .await
            .context(format!("S3: Failed to upload object with key '{}'", key))
            .map_err(|e| StorageError::UploadFailed(format!("{:#}", e)))?;

        tracing::debug!(s3_key = %key, bucket = %self.bucket_name, "S3: Upload successful");
        Ok(HostedImage {
            url: self.public_url(&key),
            asset_id: key,
        })
    }

    /// Deletes an object from S3 using DeleteObject.
    async fn destroy(&self, asset_id: &str) -> Result<(), StorageError> {
        tracing::debug!(s3_key = %asset_id, bucket = %self.bucket_name, "S3: Deleting object");

        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(asset_id)
            .send()
            .await
            .map_err(|sdk_err| {
                // DeleteObject succeeds even if the object doesn't exist, so any error here is real.
                tracing::error!(s3_key = %asset_id, bucket = %self.bucket_name, error = %sdk_err, "S3: Error deleting object");
                StorageError::BackendError(
                    anyhow::Error::new(sdk_err).context(format!("S3: Failed to delete object with key '{}'", asset_id)),
                )
            })?;

        tracing::debug!(s3_key = %asset_id, bucket = %self.bucket_name, "S3: Delete request successful");
        Ok(())
    }
}
