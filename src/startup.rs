use crate::config::TableNames;
use crate::errors::AppError;
use aws_sdk_dynamodb::{
    error::SdkError as DynamoSdkError,
    types::{AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType},
    Client as DynamoDbClient,
};
use aws_sdk_s3::{
    error::SdkError as S3SdkError,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
    Client as S3Client,
};
use aws_smithy_types::error::operation::BuildError;
use tracing;

fn build_error(what: &str) -> impl FnOnce(BuildError) -> AppError + '_ {
    move |e| AppError::InitError(format!("Failed to build {}: {}", what, e))
}

/// Creates a table keyed by the string attribute `id`, unless it already exists.
async fn create_table_if_not_exists(client: &DynamoDbClient, table_name: &str) -> Result<(), AppError> {
    let result = client
        .create_table()
        .table_name(table_name)
        .attribute_definitions(
            AttributeDefinition::builder()
                .attribute_name("id")
                .attribute_type(ScalarAttributeType::S)
                .build()
                .map_err(build_error("attribute definition"))?,
        )
        .key_schema(
            KeySchemaElement::builder()
                .attribute_name("id")
                .key_type(KeyType::Hash)
                .build()
                .map_err(build_error("key schema"))?,
        )
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await;
    match result {
        Ok(_) => {
            tracing::info!("Startup: Table '{}' created successfully or setup initiated.", table_name);
            Ok(())
        }
        Err(e) => {
            if let DynamoSdkError::ServiceError(service_err) = &e {
                if service_err.err().is_resource_in_use_exception() {
                    tracing::info!("Startup: Table '{}' already exists, no action needed.", table_name);
                    return Ok(());
                }
                tracing::error!("Startup: Service error creating DynamoDB table '{}': {:?}", table_name, service_err);
            }
            Err(AppError::InitError(format!(
                "Startup: Failed to create DynamoDB table '{}': {}",
                table_name, e
            )))
        }
    }
}

/// Ensures the S3 bucket exists, creating it with the correct location constraint if needed.
async fn ensure_s3_bucket_exists(client: &S3Client, bucket_name: &str, region_str: &str) -> Result<(), AppError> {
    let mut create_bucket_req_builder = client.create_bucket().bucket(bucket_name);
    if region_str != "us-east-1" {
        create_bucket_req_builder = create_bucket_req_builder.create_bucket_configuration(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(region_str))
                .build(),
        );
    }

    match create_bucket_req_builder.send().await {
        Ok(_) => {
            tracing::info!("Startup: S3 bucket '{}' created.", bucket_name);
            Ok(())
        }
        Err(sdk_err) => {
            if let S3SdkError::ServiceError(service_err) = &sdk_err {
                let code = service_err.err().meta().code();
                if code == Some("BucketAlreadyOwnedByYou") || code == Some("BucketAlreadyExists") {
                    tracing::info!("Startup: S3 bucket '{}' already exists.", bucket_name);
                    return Ok(());
                }
                tracing::error!("Startup: Service error creating S3 bucket '{}': {:?}", bucket_name, service_err);
            }
            Err(AppError::InitError(format!(
                "Startup: Failed to create S3 bucket '{}': {}",
                bucket_name, sdk_err
            )))
        }
    }
}

/// Initializes required AWS resources (DynamoDB tables, S3 bucket).
pub async fn init_resources(
    db_client: &DynamoDbClient,
    s3_client: &S3Client,
    tables: &TableNames,
    bucket_name: &str,
    region_str: &str,
) -> Result<(), AppError> {
    tracing::info!("Startup: Initializing AWS resources...");
    for table_name in tables.all() {
        create_table_if_not_exists(db_client, table_name).await?;
    }
    ensure_s3_bucket_exists(s3_client, bucket_name, region_str).await?;
    tracing::info!("Startup: AWS resource initialization complete.");
    Ok(())
}
