//! Download a finished export artifact from the cache
//!
//! Returns `None` for unknown job ids and for artifacts whose TTL has
//! expired; both look the same to the client.

use std::sync::Arc;
use uuid::Uuid;

use crate::cache::ArtifactCache;

/// The filename offered in the Content-Disposition header.
pub fn artifact_filename(job_id: Uuid) -> String {
    format!("vehicle_export_{}.csv", job_id)
}

pub async fn handle(cache: &ArtifactCache, job_id: Uuid) -> Option<Arc<String>> {
    cache.get(job_id).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_artifact_filename() {
        let id = Uuid::parse_str("0192aeb6-6d1a-7e00-8000-000000000001").unwrap();
        assert_eq!(
            artifact_filename(id),
            "vehicle_export_0192aeb6-6d1a-7e00-8000-000000000001.csv"
        );
    }

    #[tokio::test]
    async fn test_unknown_job_id_is_none() {
        let cache = ArtifactCache::new();
        assert!(handle(&cache, Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_cached_artifact_is_served() {
        let cache = ArtifactCache::new();
        let id = Uuid::new_v4();
        cache
            .put(id, "id,vin\n1,VIN001\n".to_string(), Duration::from_secs(60))
            .await;
        let artifact = handle(&cache, id).await.unwrap();
        assert!(artifact.starts_with("id,vin"));
    }
}
