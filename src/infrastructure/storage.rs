use crate::config::AppConfig;
use crate::services::storage::{LocalStorageService, S3StorageService, StorageService};
use aws_sdk_s3::config::Region;
use std::env;
use std::sync::Arc;
use tracing::info;

/// S3-compatible storage when `MINIO_ENDPOINT` is set, local media root otherwise.
pub async fn setup_storage(config: &AppConfig) -> anyhow::Result<Arc<dyn StorageService>> {
    match env::var("MINIO_ENDPOINT") {
        Ok(endpoint_url) => Ok(setup_s3(endpoint_url).await?),
        Err(_) => {
            info!("📁 Local Storage: {}", config.media_root);
            tokio::fs::create_dir_all(&config.media_root).await?;
            Ok(Arc::new(LocalStorageService::new(&config.media_root)))
        }
    }
}

async fn setup_s3(endpoint_url: String) -> anyhow::Result<Arc<dyn StorageService>> {
    let access_key = env::var("MINIO_ACCESS_KEY")?;
    let secret_key = env::var("MINIO_SECRET_KEY")?;
    let bucket = env::var("MINIO_BUCKET").unwrap_or_else(|_| "media".to_string());

    info!("☁️  S3 Storage: {} (Bucket: {})", endpoint_url, bucket);

    let aws_config = aws_config::from_env()
        .endpoint_url(&endpoint_url)
        .region(Region::new("us-east-1"))
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            access_key, secret_key, None, None, "static",
        ))
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(true)
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    // Ensure bucket exists
    match s3_client.head_bucket().bucket(&bucket).send().await {
        Ok(_) => info!("✅ Bucket '{}' is ready", bucket),
        Err(_) => {
            info!("🪣 Bucket '{}' not found, creating...", bucket);
            if let Err(e) = s3_client.create_bucket().bucket(&bucket).send().await {
                tracing::error!("❌ Failed to create bucket '{}': {}", bucket, e);
            } else {
                info!("✅ Bucket '{}' created successfully", bucket);
            }
        }
    }

    Ok(Arc::new(S3StorageService::new(s3_client, bucket)))
}
