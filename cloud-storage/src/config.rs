use std::ops::RangeInclusive;

use crate::{StorageError, StorageResult};

/// Node defaults and input limits for a [`CloudAdapter`](crate::CloudAdapter)
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Embed workflow metadata in saved PNGs and videos. Mirrors the
    /// host's global "disable metadata" switch.
    pub embed_metadata: bool,

    /// Objects listed when the caller gives no count
    pub default_list_results: usize,

    /// Allowed `max_results` for a bucket listing
    pub list_results_range: RangeInclusive<usize>,

    /// Presigned URL lifetime when the caller gives none
    pub default_expires_hours: u64,

    /// Allowed presigned URL lifetimes (S3 caps signatures at 7 days)
    pub expires_hours_range: RangeInclusive<u64>,

    /// Allowed JPEG quality
    pub quality_range: RangeInclusive<u8>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            embed_metadata: true,
            default_list_results: 100,
            list_results_range: 1..=1000,
            default_expires_hours: 24,
            expires_hours_range: 1..=168,
            quality_range: 1..=100,
        }
    }
}

impl AdapterConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop embedding workflow metadata in outputs
    pub fn disable_metadata(mut self) -> Self {
        self.embed_metadata = false;
        self
    }

    /// Set the listing size used when none is given
    pub fn with_default_list_results(mut self, count: usize) -> Self {
        self.default_list_results = count;
        self
    }

    /// Set the presigned URL lifetime used when none is given
    pub fn with_default_expires_hours(mut self, hours: u64) -> Self {
        self.default_expires_hours = hours;
        self
    }

    pub(crate) fn check_list_results(&self, count: usize) -> StorageResult<usize> {
        check_range("max_results", count, &self.list_results_range)
    }

    pub(crate) fn check_expires_hours(&self, hours: u64) -> StorageResult<u64> {
        check_range("expires_hours", hours, &self.expires_hours_range)
    }

    pub(crate) fn check_quality(&self, quality: u8) -> StorageResult<u8> {
        check_range("quality", quality, &self.quality_range)
    }
}

fn check_range<T>(name: &str, value: T, range: &RangeInclusive<T>) -> StorageResult<T>
where
    T: PartialOrd + Copy + std::fmt::Display,
{
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(StorageError::invalid(format!(
            "{name} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        )))
    }
}
