//! Provider registry: how each S3-compatible provider's endpoint is derived.

/// Immutable endpoint-derivation rule for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderPreset {
    pub name: &'static str,
    /// `{region}` / `{account_id}` placeholders; empty means the client's
    /// built-in endpoint resolution.
    pub endpoint_template: &'static str,
    /// May be `"auto"` for providers without real regions.
    pub default_region: &'static str,
    /// Bucket goes in the URL path instead of the host name.
    pub force_path_style: bool,
}

pub const CUSTOM_PROVIDER: &str = "Custom";

/// Every supported provider, in display order. `Custom` is last.
pub static PROVIDERS: [ProviderPreset; 8] = [
    ProviderPreset {
        name: "AWS S3",
        endpoint_template: "",
        default_region: "us-east-1",
        force_path_style: false,
    },
    ProviderPreset {
        name: "Backblaze B2",
        endpoint_template: "https://s3.{region}.backblazeb2.com",
        default_region: "us-west-004",
        force_path_style: false,
    },
    ProviderPreset {
        name: "Cloudflare R2",
        endpoint_template: "https://{account_id}.r2.cloudflarestorage.com",
        default_region: "auto",
        force_path_style: false,
    },
    ProviderPreset {
        name: "MinIO",
        endpoint_template: "http://localhost:9000",
        default_region: "us-east-1",
        force_path_style: true,
    },
    ProviderPreset {
        name: "Wasabi",
        endpoint_template: "https://s3.{region}.wasabisys.com",
        default_region: "us-east-1",
        force_path_style: false,
    },
    ProviderPreset {
        name: "DigitalOcean Spaces",
        endpoint_template: "https://{region}.digitaloceanspaces.com",
        default_region: "nyc3",
        force_path_style: false,
    },
    ProviderPreset {
        name: "GCS (S3 interop)",
        endpoint_template: "https://storage.googleapis.com",
        default_region: "auto",
        force_path_style: false,
    },
    ProviderPreset {
        name: CUSTOM_PROVIDER,
        endpoint_template: "",
        default_region: "",
        force_path_style: false,
    },
];

/// Provider names in display order.
pub fn provider_names() -> Vec<&'static str> {
    PROVIDERS.iter().map(|p| p.name).collect()
}

/// Exact-name lookup; unknown names get the `Custom` preset.
pub fn lookup(name: &str) -> &'static ProviderPreset {
    PROVIDERS
        .iter()
        .find(|p| p.name == name)
        .unwrap_or(&PROVIDERS[PROVIDERS.len() - 1])
}

/// Derive the endpoint URL. An explicit endpoint always wins; an empty
/// result means "let the client resolve it".
pub fn derive_endpoint(
    preset: &ProviderPreset,
    explicit_endpoint: &str,
    region: &str,
    account_id: &str,
) -> String {
    if !explicit_endpoint.is_empty() {
        return explicit_endpoint.to_string();
    }
    if preset.endpoint_template.is_empty() {
        return String::new();
    }
    preset
        .endpoint_template
        .replace("{region}", region)
        .replace("{account_id}", account_id)
}

impl ProviderPreset {
    /// The caller's region, or this provider's default when empty.
    pub fn effective_region<'a>(&'a self, region: &'a str) -> &'a str {
        if region.is_empty() {
            self.default_region
        } else {
            region
        }
    }

    pub fn is_custom(&self) -> bool {
        self.name == CUSTOM_PROVIDER
    }
}
