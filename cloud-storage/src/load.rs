use std::sync::atomic::{AtomicU64, Ordering};

use cloud_profile::StorageConfig;
use tracing::{debug, info, instrument, warn};

use crate::keys::{file_name, load_key};
use crate::media::{decode_image, ImageTensor, Mask};
use crate::model_cache::{CachedModel, ModelDirectories, ModelType, ProgressReporter};
use crate::{CloudAdapter, StorageResult};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

impl CloudAdapter {
    /// Fetch an image into the pipeline as an RGB tensor plus mask.
    /// A key starting with `/` is used as-is, without the profile prefix.
    #[instrument(skip(self, profile))]
    pub async fn load_image(
        &self,
        key: &str,
        profile: Option<StorageConfig>,
    ) -> StorageResult<(ImageTensor, Mask)> {
        let conn = self.connect(profile).await?;
        let full_key = load_key(&conn.config, key);

        let data = conn.storage.get_object(conn.bucket(), &full_key).await?;
        decode_image(&data)
    }

    /// Entity tag of the object [`load_image`](Self::load_image) would read,
    /// so the host can tell when to run again. Any failure yields `""`.
    pub async fn image_fingerprint(&self, key: &str, profile: Option<StorageConfig>) -> String {
        let result = async {
            let conn = self.connect(profile).await?;
            let full_key = load_key(&conn.config, key);
            conn.storage.head_object(conn.bucket(), &full_key).await
        }
        .await;

        match result {
            Ok(head) => head.etag,
            Err(err) => {
                debug!(key = %key, error = %err, "image fingerprint unavailable");
                String::new()
            }
        }
    }

    /// Download a model into the host's directory for `model_type` and
    /// return its local file name. A previous download is reused while its
    /// recorded entity tag still matches the remote object.
    #[instrument(skip(self, dirs, progress, profile))]
    pub async fn load_model(
        &self,
        model_type: ModelType,
        key: &str,
        force_redownload: bool,
        dirs: &dyn ModelDirectories,
        progress: &dyn ProgressReporter,
        profile: Option<StorageConfig>,
    ) -> StorageResult<String> {
        let conn = self.connect(profile).await?;
        let bucket = conn.bucket();
        let full_key = conn.config.full_key(key);
        let cached = CachedModel::locate(dirs, model_type, file_name(&full_key))?;

        let mut remote_head = None;
        if !force_redownload && cached.exists().await {
            match conn.storage.head_object(bucket, &full_key).await {
                Ok(head) => {
                    if cached.cached_etag().await.as_deref() == Some(head.etag.as_str()) {
                        info!(path = %cached.local_path.display(), "Model cached");
                        return Ok(cached.filename);
                    }
                    remote_head = Some(head);
                }
                // Wrong credentials must surface even with a local copy.
                Err(err) if err.is_credential_error() => return Err(err),
                // Remote unreachable or gone: the local copy is still usable.
                Err(err) => {
                    warn!(
                        path = %cached.local_path.display(),
                        error = %err,
                        "could not verify cached model, using local copy"
                    );
                    return Ok(cached.filename);
                }
            }
        }

        let head = match remote_head {
            Some(head) => head,
            None => conn.storage.head_object(bucket, &full_key).await?,
        };
        let total = head.size_bytes;

        info!(
            bucket = %bucket,
            key = %full_key,
            size_gb = %format!("{:.2}", total as f64 / GIB),
            "Downloading model"
        );

        tokio::fs::create_dir_all(cached.directory()).await?;

        let downloaded = AtomicU64::new(0);
        let on_chunk = |n: u64| {
            let done = downloaded.fetch_add(n, Ordering::Relaxed) + n;
            progress.update_absolute(done, total);
        };

        let transfer = conn
            .storage
            .download_to_path(bucket, &full_key, &cached.temp_path, &on_chunk)
            .await;
        let committed = match transfer {
            Ok(_) => cached.commit().await,
            Err(err) => Err(err),
        };
        if let Err(err) = committed {
            cached.discard_partial().await;
            return Err(err);
        }

        if !head.etag.is_empty() {
            cached.record_etag(&head.etag).await?;
        }

        info!(path = %cached.local_path.display(), "Model downloaded");
        Ok(cached.filename)
    }
}
