use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cloud_profile::{
    ClientSettings, Overrides, ProfileResolver, ProfileSelector, StorageConfig, ENV_ONLY_LABEL,
    FROM_PROFILE_LABEL,
};
use cloud_storage::keys::file_name;
use cloud_storage::{
    AdapterConfig, AudioFormat, ClientFactory, CloudAdapter, ImageFileFormat, ModelType,
    ObjectStorage, ProgressReporter, S3ClientFactory, StaticModelDirectories,
};

#[derive(Parser, Debug)]
#[command(name = "cloud-storage")]
#[command(about = "Inspect cloud storage profiles and buckets")]
struct Args {
    /// Directory holding profiles.json (default: ~/.comfyui-cloud-storage)
    #[arg(long, value_name = "DIR", global = true)]
    profiles_dir: Option<PathBuf>,

    /// Named profile, or "(env vars)" for environment only
    #[arg(long, default_value = ENV_ONLY_LABEL, global = true)]
    profile: String,

    /// Provider override
    #[arg(long, default_value = FROM_PROFILE_LABEL, global = true)]
    provider: String,

    /// Bucket override
    #[arg(long, default_value = "", global = true)]
    bucket: String,

    /// Key prefix for all operations
    #[arg(long, default_value = "", global = true)]
    path_prefix: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List profile names and where they are stored
    Profiles,

    /// Print the resolved configuration with credentials masked
    Show,

    /// List bucket contents
    Ls {
        #[arg(default_value = "")]
        prefix: String,

        #[arg(long, default_value = "100")]
        max_results: usize,
    },

    /// Print a time-limited download URL
    Presign {
        key: String,

        #[arg(long, default_value = "24")]
        expires_hours: u64,
    },

    /// Print an object's entity tag
    Fingerprint { key: String },

    /// Upload a local file
    Put {
        file: PathBuf,

        /// Object key (default: the file name)
        key: Option<String>,
    },

    /// Download an object to a local file
    Get {
        key: String,

        /// Destination (default: the key's file name)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Download a model into a local models directory
    FetchModel {
        /// checkpoints, loras, vae, text_encoders, controlnet,
        /// diffusion_models, upscale_models, embeddings or clip_vision
        #[arg(long, default_value = "checkpoints")]
        model_type: ModelType,

        key: String,

        /// Root holding one directory per model type
        #[arg(long, default_value = "models")]
        models_dir: PathBuf,

        #[arg(long)]
        force: bool,
    },
}

/// Logs download progress every 10%.
struct LogProgress;

impl ProgressReporter for LogProgress {
    fn update_absolute(&self, downloaded: u64, total: u64) {
        if total == 0 {
            return;
        }
        let percent = downloaded * 100 / total;
        let previous = downloaded.saturating_sub(1) * 100 / total;
        if downloaded == total || percent / 10 != previous / 10 {
            tracing::info!(downloaded, total, percent, "download progress");
        }
    }
}

/// Content type from a file extension, for the formats the nodes write.
fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    if let Ok(format) = ext.parse::<ImageFileFormat>() {
        return Some(format.mime_type());
    }
    if let Ok(format) = ext.parse::<AudioFormat>() {
        return Some(format.mime_type());
    }
    match ext.to_ascii_lowercase().as_str() {
        "mp4" => Some("video/mp4"),
        "webm" => Some("video/webm"),
        "json" => Some("application/json"),
        _ => None,
    }
}

fn print_config(config: &StorageConfig) {
    let settings = ClientSettings::from_config(config);
    println!("provider:     {}", config.provider);
    println!("access_key:   {}", config.access_key);
    println!("secret_key:   {}", config.secret_key);
    println!("region:       {}", settings.region);
    println!("bucket:       {}", config.bucket);
    println!(
        "endpoint:     {}",
        settings.endpoint_url.as_deref().unwrap_or("(provider default)")
    );
    println!("path_style:   {}", settings.force_path_style);
    println!("path_prefix:  {}", config.path_prefix);
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let resolver = ProfileResolver::system(args.profiles_dir.as_deref());
    let adapter = CloudAdapter::new(resolver, S3ClientFactory, AdapterConfig::default());

    let selector = ProfileSelector::from(args.profile.as_str());
    let overrides = Overrides::new()
        .with_provider(args.provider.as_str())
        .with_bucket(args.bucket)
        .with_path_prefix(args.path_prefix);

    match args.command {
        Command::Profiles => {
            println!("# {}", adapter.resolver().profiles_location());
            for name in adapter.resolver().list_profile_names() {
                println!("{name}");
            }
        }
        Command::Show => {
            // Print even when incomplete
            let config = adapter.resolver().resolve(&selector, &overrides);
            print_config(&config);
            if let Err(err) = adapter.resolver().validate(&config) {
                eprintln!("\n{err}");
            }
        }
        Command::Ls {
            prefix,
            max_results,
        } => {
            let config = adapter.profile(&selector, &overrides)?;
            let listing = adapter
                .list_bucket(&prefix, Some(max_results), Some(config))
                .await?;
            if !listing.is_empty() {
                println!("{listing}");
            }
        }
        Command::Presign { key, expires_hours } => {
            let config = adapter.profile(&selector, &overrides)?;
            let url = adapter
                .presigned_url(&key, Some(expires_hours), Some(config))
                .await?;
            println!("{url}");
        }
        Command::Fingerprint { key } => {
            let config = adapter.profile(&selector, &overrides)?;
            println!("{}", adapter.image_fingerprint(&key, Some(config)).await);
        }
        Command::Put { file, key } => {
            let config = adapter.profile(&selector, &overrides)?;
            let key = match key {
                Some(key) => key,
                None => file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .context("file has no usable name; pass a key")?
                    .to_string(),
            };
            let full_key = config.full_key(&key);
            let body = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;

            let storage = S3ClientFactory
                .connect(&ClientSettings::from_config(&config))
                .await?;
            storage
                .put_object(&config.bucket, &full_key, body.into(), content_type_for(&file))
                .await?;
            println!("s3://{}/{}", config.bucket, full_key);
        }
        Command::Get { key, out } => {
            let config = adapter.profile(&selector, &overrides)?;
            let full_key = config.full_key(&key);
            let out = out.unwrap_or_else(|| PathBuf::from(file_name(&full_key)));

            let storage = S3ClientFactory
                .connect(&ClientSettings::from_config(&config))
                .await?;
            let written = storage
                .download_to_path(&config.bucket, &full_key, &out, &|_: u64| {})
                .await?;
            println!("{} ({written} bytes)", out.display());
        }
        Command::FetchModel {
            model_type,
            key,
            models_dir,
            force,
        } => {
            let config = adapter.profile(&selector, &overrides)?;
            let dirs = StaticModelDirectories::under_root(&models_dir);
            let filename = adapter
                .load_model(model_type, &key, force, &dirs, &LogProgress, Some(config))
                .await
                .with_context(|| format!("failed to fetch model {key}"))?;
            println!("{}", models_dir.join(model_type.as_str()).join(filename).display());
        }
    }

    Ok(())
}
