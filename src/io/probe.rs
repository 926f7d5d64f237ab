use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client as S3Client;

use super::uri::StorageUri;
use crate::error::PipelineError;
use crate::sql::literal::AwsRegion;
use crate::sql::load::{JsonPathRule, StagingSources};

/// Read-only view of object storage used to check sources before a load
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether at least one object exists under the location's prefix
    async fn has_objects(&self, uri: &StorageUri) -> Result<bool>;
}

/// ObjectStore implementation backed by S3
#[derive(Clone)]
pub struct S3ObjectStore {
    s3_client: S3Client,
}

impl S3ObjectStore {
    /// Build a client from the default AWS credential chain for `region`
    pub async fn new(region: &AwsRegion) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.as_str().to_string()))
            .load()
            .await;
        Self {
            s3_client: S3Client::new(&aws_config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn has_objects(&self, uri: &StorageUri) -> Result<bool> {
        let response = self
            .s3_client
            .list_objects_v2()
            .bucket(uri.bucket())
            .prefix(uri.prefix())
            .max_keys(1)
            .send()
            .await
            .context("Failed to list S3 objects")?;

        Ok(!response.contents().is_empty())
    }
}

/// Check every configured source location before the bulk load runs
///
/// Runs before any connection is opened, so a failure leaves the warehouse
/// untouched.
pub async fn preflight(store: &dyn ObjectStore, sources: &StagingSources) -> Result<(), PipelineError> {
    let mut locations = vec![&sources.log_data, &sources.song_data];
    if let JsonPathRule::Mapping(uri) = &sources.log_jsonpath {
        locations.push(uri);
    }

    for uri in locations {
        let found = store
            .has_objects(uri)
            .await
            .map_err(|source| PipelineError::StorageUnavailable {
                uri: uri.to_string(),
                source,
            })?;

        if !found {
            return Err(PipelineError::StorageUnavailable {
                uri: uri.to_string(),
                source: anyhow::anyhow!("no objects found under prefix"),
            });
        }

        tracing::info!(%uri, "source location reachable");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::literal::IamRole;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Mock ObjectStore for testing
    struct MockObjectStore {
        populated: HashSet<String>,
        unreachable: HashSet<String>,
        probed: Mutex<Vec<String>>,
    }

    impl MockObjectStore {
        fn new(populated: &[&str], unreachable: &[&str]) -> Self {
            Self {
                populated: populated.iter().map(|s| s.to_string()).collect(),
                unreachable: unreachable.iter().map(|s| s.to_string()).collect(),
                probed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ObjectStore for MockObjectStore {
        async fn has_objects(&self, uri: &StorageUri) -> Result<bool> {
            let key = uri.to_string();
            self.probed.lock().unwrap().push(key.clone());
            if self.unreachable.contains(&key) {
                anyhow::bail!("access denied");
            }
            Ok(self.populated.contains(&key))
        }
    }

    fn sources(jsonpath: &str) -> StagingSources {
        StagingSources {
            log_data: StorageUri::parse("s3://bucket/log_data").unwrap(),
            log_jsonpath: JsonPathRule::parse(jsonpath).unwrap(),
            song_data: StorageUri::parse("s3://bucket/song_data").unwrap(),
            iam_role: IamRole::parse("arn:aws:iam::123456789012:role/dwhRole").unwrap(),
            region: AwsRegion::parse("us-west-2").unwrap(),
        }
    }

    #[tokio::test]
    async fn test_preflight_checks_all_locations() {
        let store = MockObjectStore::new(
            &[
                "s3://bucket/log_data",
                "s3://bucket/song_data",
                "s3://bucket/log_json_path.json",
            ],
            &[],
        );

        preflight(&store, &sources("s3://bucket/log_json_path.json"))
            .await
            .unwrap();

        let probed = store.probed.lock().unwrap();
        assert_eq!(probed.len(), 3);
        assert!(probed.contains(&"s3://bucket/log_json_path.json".to_string()));
    }

    #[tokio::test]
    async fn test_preflight_skips_jsonpath_for_auto() {
        let store = MockObjectStore::new(&["s3://bucket/log_data", "s3://bucket/song_data"], &[]);

        preflight(&store, &sources("auto")).await.unwrap();

        assert_eq!(store.probed.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_preflight_fails_on_empty_prefix() {
        let store = MockObjectStore::new(&["s3://bucket/log_data"], &[]);

        let err = preflight(&store, &sources("auto")).await.unwrap_err();
        match err {
            PipelineError::StorageUnavailable { uri, .. } => {
                assert_eq!(uri, "s3://bucket/song_data");
            }
            other => panic!("Expected StorageUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_preflight_fails_on_unreachable_location() {
        let store = MockObjectStore::new(&["s3://bucket/song_data"], &["s3://bucket/log_data"]);

        let err = preflight(&store, &sources("auto")).await.unwrap_err();
        assert!(matches!(err, PipelineError::StorageUnavailable { ref uri, .. } if uri == "s3://bucket/log_data"));
        // Stops at the first failure
        assert_eq!(store.probed.lock().unwrap().len(), 1);
    }
}
