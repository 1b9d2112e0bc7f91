use bytes::Bytes;
use cloud_profile::StorageConfig;
use tracing::{info, instrument};

use crate::keys::{batch_key, s3_uri, single_key};
use crate::media::{encode_image, AudioSource, ImageTensor, VideoSource, WorkflowMetadata};
use crate::{CloudAdapter, SaveAudioRequest, SaveImageRequest, SaveVideoRequest, StorageResult};

impl CloudAdapter {
    fn embedded<'a>(&self, metadata: Option<&'a WorkflowMetadata>) -> Option<&'a WorkflowMetadata> {
        metadata.filter(|_| self.config().embed_metadata)
    }

    /// Upload each image of a batch. Returns one `s3://bucket/key` per image,
    /// in batch order.
    #[instrument(skip_all, fields(count = images.len(), format = %request.format))]
    pub async fn save_images(
        &self,
        images: &[ImageTensor],
        request: &SaveImageRequest,
        metadata: Option<&WorkflowMetadata>,
        profile: Option<StorageConfig>,
    ) -> StorageResult<Vec<String>> {
        let quality = self.config().check_quality(request.quality)?;
        let conn = self.connect(profile).await?;
        let metadata = self.embedded(metadata);
        let ext = request.format.extension();

        let mut uploaded = Vec::with_capacity(images.len());
        for (batch_idx, image) in images.iter().enumerate() {
            let encoded = encode_image(image, request.format, quality, metadata)?;
            let key = batch_key(&conn.config, &request.key_prefix, &request.filename, batch_idx, ext);
            let size = encoded.len();

            conn.storage
                .put_object(
                    conn.bucket(),
                    &key,
                    Bytes::from(encoded),
                    Some(request.format.mime_type()),
                )
                .await?;

            info!(key = %key, size_bytes = size, "Uploaded image");
            uploaded.push(s3_uri(conn.bucket(), &key));
        }

        Ok(uploaded)
    }

    /// Have the host encode a video and upload it under the container's
    /// extension.
    #[instrument(skip_all, fields(container = %request.format.container))]
    pub async fn save_video(
        &self,
        source: &dyn VideoSource,
        request: &SaveVideoRequest,
        metadata: Option<&WorkflowMetadata>,
        profile: Option<StorageConfig>,
    ) -> StorageResult<String> {
        let conn = self.connect(profile).await?;
        let container_metadata = self
            .embedded(metadata)
            .and_then(WorkflowMetadata::container_metadata);

        let encoded = source.encode(&request.format, container_metadata.as_ref())?;
        let key = single_key(&conn.config, &request.key_prefix, &request.filename, &encoded.extension);
        let size = encoded.bytes.len();

        conn.storage
            .put_object(conn.bucket(), &key, encoded.bytes, encoded.content_type.as_deref())
            .await?;

        info!(key = %key, size_bytes = size, "Uploaded video");
        Ok(s3_uri(conn.bucket(), &key))
    }

    #[instrument(skip_all, fields(format = %request.format))]
    pub async fn save_audio(
        &self,
        source: &dyn AudioSource,
        request: &SaveAudioRequest,
        profile: Option<StorageConfig>,
    ) -> StorageResult<String> {
        let conn = self.connect(profile).await?;
        let encoded = source.encode(request.format)?;
        let key = single_key(
            &conn.config,
            &request.key_prefix,
            &request.filename,
            request.format.extension(),
        );
        let size = encoded.len();

        conn.storage
            .put_object(conn.bucket(), &key, encoded, Some(request.format.mime_type()))
            .await?;

        info!(key = %key, size_bytes = size, "Uploaded audio");
        Ok(s3_uri(conn.bucket(), &key))
    }
}
