use qdrant_client::{config::QdrantConfig, Qdrant};
use std::time::Duration;
use tracing::{error, info};

use super::vector_db::VectorDBError;

/// Qdrant's REST port is 6333; the client speaks gRPC on 6334.
pub fn grpc_url(url: &str) -> String {
    let clean_url = match url.split_once("://") {
        Some((_, rest)) => rest,
        None => url,
    }
    .trim_end_matches('/');

    let grpc_url = match clean_url.strip_suffix(":6333") {
        Some(host) => format!("{}:6334", host),
        None => clean_url.to_string(),
    };

    format!("http://{}", grpc_url)
}

pub async fn create_qdrant_client(url: &str) -> Result<Qdrant, VectorDBError> {
    let url_with_scheme = grpc_url(url);
    info!("Attempting to connect to Qdrant with URL: {}", url_with_scheme);

    let mut config = QdrantConfig::from_url(&url_with_scheme);
    config.timeout = Duration::from_secs(30);
    config.connect_timeout = Duration::from_secs(10);

    let client = Qdrant::new(config).map_err(|e| VectorDBError::Connection(e.to_string()))?;

    match client.list_collections().await {
        Ok(_) => {
            info!("Successfully connected to Qdrant");
            Ok(client)
        }
        Err(e) => {
            error!("Connection test failed: {}", e);
            Err(VectorDBError::Connection(format!(
                "Failed to connect to Qdrant: {}",
                e
            )))
        }
    }
}
