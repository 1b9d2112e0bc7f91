//! Object key shaping.
//!
//! Every key is `path_prefix` (from the profile) followed by whatever the
//! node asked for. Prefixes are concatenated verbatim, so a prefix meant as
//! a folder must end in `/`.

use cloud_profile::StorageConfig;

/// Placeholder replaced by the image's index within its batch.
pub const BATCH_NUM_PLACEHOLDER: &str = "%batch_num%";

/// `path_prefix + key_prefix + filename(%batch_num% → index) + "." + ext`
pub fn batch_key(
    config: &StorageConfig,
    key_prefix: &str,
    filename: &str,
    batch_index: usize,
    ext: &str,
) -> String {
    let name = filename.replace(BATCH_NUM_PLACEHOLDER, &batch_index.to_string());
    config.full_key(&format!("{key_prefix}{name}.{ext}"))
}

/// `path_prefix + key_prefix + filename + "." + ext`
pub fn single_key(config: &StorageConfig, key_prefix: &str, filename: &str, ext: &str) -> String {
    config.full_key(&format!("{key_prefix}{filename}.{ext}"))
}

/// Key for reading an image. A leading `/` opts out of the profile prefix.
pub fn load_key(config: &StorageConfig, key: &str) -> String {
    if key.starts_with('/') {
        key.to_string()
    } else {
        config.full_key(key)
    }
}

/// Last path segment of a key.
pub fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// `s3://bucket/key`, as shown to the user after an upload.
pub fn s3_uri(bucket: &str, key: &str) -> String {
    format!("s3://{bucket}/{key}")
}
