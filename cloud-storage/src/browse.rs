use std::time::Duration;

use cloud_profile::StorageConfig;
use tracing::instrument;

use crate::{CloudAdapter, StorageResult};

const SECONDS_PER_HOUR: u64 = 3600;

impl CloudAdapter {
    /// One `"<key>  (<size> MB)"` line per object under `prefix`.
    #[instrument(skip(self, profile))]
    pub async fn list_bucket(
        &self,
        prefix: &str,
        max_results: Option<usize>,
        profile: Option<StorageConfig>,
    ) -> StorageResult<String> {
        let max_results = self
            .config()
            .check_list_results(max_results.unwrap_or(self.config().default_list_results))?;
        let conn = self.connect(profile).await?;
        let full_prefix = conn.config.full_key(prefix);

        let objects = conn
            .storage
            .list_objects(conn.bucket(), &full_prefix, max_results)
            .await?;

        Ok(objects
            .iter()
            .map(|o| o.display_line())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Time-limited download link for sharing an object.
    #[instrument(skip(self, profile))]
    pub async fn presigned_url(
        &self,
        key: &str,
        expires_hours: Option<u64>,
        profile: Option<StorageConfig>,
    ) -> StorageResult<String> {
        let hours = self
            .config()
            .check_expires_hours(expires_hours.unwrap_or(self.config().default_expires_hours))?;
        let conn = self.connect(profile).await?;
        let full_key = conn.config.full_key(key);

        conn.storage
            .presign_get(
                conn.bucket(),
                &full_key,
                Duration::from_secs(hours * SECONDS_PER_HOUR),
            )
            .await
    }
}
