//! Crop Streamer - on-demand image crops.
//!
//! This binary starts the HTTP server and runs the maintenance commands.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crop_streamer::{
    codec::{CropOptions, PathCodec},
    config::{
        Cli, Command, DiskLocation, PurgeConfig, ResetConfig, ServeConfig, SignConfig, StorageArgs,
    },
    create_s3_client,
    crop::CropHandler,
    io::{Disk, LocalDisk, S3Disk},
    server::{create_router, RouterConfig},
    store::Storage,
    transcode::CwebpTranscoder,
    transform::{ImageEngine, TransformConfig},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Sign(config) => run_sign(config),
        Command::Purge(config) => run_purge(config).await,
        Command::Reset(config) => run_reset(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Crop Streamer v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    log_storage(&config.storage);
    info!("  URL prefix: {}", config.url_prefix);
    if config.storage.max_crops == 0 {
        info!("  Crops per source: unlimited");
    } else {
        info!("  Crops per source: {}", config.storage.max_crops);
    }
    info!("  JPEG quality: {}", config.jpeg_quality);
    info!("  Max dimension: {}px", config.max_dimension);

    if config.signing_key.is_some() {
        info!("  Signing: enabled");
    } else {
        warn!("  Signing: DISABLED - anyone can create crops of any size");
        warn!("        Enable for production: --signing-key=<secret>");
    }

    let storage = match build_storage(&config.storage).await {
        Ok(storage) => storage,
        Err(e) => {
            error!("Failed to open storage: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut codec = PathCodec::new(&config.url_prefix).with_max_dimension(config.max_dimension);
    if let Some(ref public_url) = config.crops_public_url {
        codec = codec.with_public_url(public_url);
    }
    if let Some(ref key) = config.signing_key {
        codec = codec.with_signing_key(key);
    }

    let engine = ImageEngine::new(TransformConfig {
        jpeg_quality: config.jpeg_quality,
        upscale: config.upscale,
        max_dimension: config.max_dimension,
    });

    let mut handler = CropHandler::new(codec, storage).with_engine(engine);
    match config.cwebp_path {
        Some(ref binary) => {
            info!(
                "  WebP: {} (quality {})",
                binary.display(),
                config.cwebp_quality
            );
            handler = handler.with_transcoder(CwebpTranscoder::new(binary, config.cwebp_quality));
        }
        None => info!("  WebP: disabled (.webp requests serve the primary crop)"),
    }

    let router = create_router(handler, build_router_config(&config));

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    crop-streamer sign <image> -W 200 -H 100");
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "crop_streamer=debug,tower_http=debug"
    } else {
        "crop_streamer=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new().with_cache_max_age(config.cache_max_age);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}

fn log_storage(args: &StorageArgs) {
    for (name, location) in [
        ("Sources", args.source_location()),
        ("Crops", args.crops_location()),
    ] {
        match location {
            Ok(DiskLocation::Local(dir)) => info!("  {}: {}", name, dir.display()),
            Ok(DiskLocation::S3 { bucket, prefix }) => info!(
                "  {}: s3://{}/{}",
                name,
                bucket,
                prefix.unwrap_or_default()
            ),
            Err(_) => {}
        }
    }
    if let Some(ref endpoint) = args.s3_endpoint {
        info!("  S3 endpoint: {}", endpoint);
    }
}

// =============================================================================
// Storage
// =============================================================================

/// Open the source and crops disks described by `args`.
async fn build_storage(args: &StorageArgs) -> Result<Storage, String> {
    let client = if args.needs_s3() {
        Some(create_s3_client(args.s3_endpoint.as_deref(), &args.s3_region).await)
    } else {
        None
    };

    let src = open_disk(args.source_location()?, client.as_ref(), false).await?;
    let crops = open_disk(args.crops_location()?, client.as_ref(), true).await?;

    Ok(Storage::new(src, crops)
        .with_max_crops(args.max_crops)
        .with_known_crops_capacity(args.known_crops))
}

async fn open_disk(
    location: DiskLocation,
    client: Option<&aws_sdk_s3::Client>,
    create: bool,
) -> Result<Arc<dyn Disk>, String> {
    match location {
        DiskLocation::Local(dir) => {
            if create {
                tokio::fs::create_dir_all(&dir)
                    .await
                    .map_err(|e| format!("cannot create {}: {}", dir.display(), e))?;
            } else if !dir.is_dir() {
                return Err(format!("{} is not a directory", dir.display()));
            }
            Ok(Arc::new(LocalDisk::new(dir)))
        }
        DiskLocation::S3 { bucket, prefix } => {
            let client = client.ok_or_else(|| "S3 client not configured".to_string())?;
            Ok(Arc::new(S3Disk::new(
                client.clone(),
                bucket,
                prefix.as_deref(),
            )))
        }
    }
}

// =============================================================================
// Sign Command
// =============================================================================

fn run_sign(config: SignConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let mut codec = PathCodec::new(&config.url_prefix);
    if let Some(ref key) = config.signing_key {
        codec = codec.with_signing_key(key);
    }

    let options = CropOptions::parse(&config.options_segment());
    let path = codec.generate(&config.source, config.width, config.height, &options);

    match config.base_url {
        Some(ref base_url) => println!("{}{}", base_url.trim_end_matches('/'), path),
        None => println!("{}", path),
    }

    if !codec.signing_enabled() {
        eprintln!();
        eprintln!("Tip: Use --signing-key to add a token");
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Maintenance Commands
// =============================================================================

async fn run_purge(config: PurgeConfig) -> ExitCode {
    init_logging(config.verbose);

    let storage = match open_maintenance_storage(&config.storage).await {
        Some(storage) => storage,
        None => return ExitCode::FAILURE,
    };

    match storage.purge(config.dry_run).await {
        Ok(keys) => {
            for key in &keys {
                println!("{}", key);
            }
            let verb = if config.dry_run { "Would delete" } else { "Deleted" };
            info!("{} {} orphaned crop(s)", verb, keys.len());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Purge failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_reset(config: ResetConfig) -> ExitCode {
    init_logging(config.verbose);

    let storage = match open_maintenance_storage(&config.storage).await {
        Some(storage) => storage,
        None => return ExitCode::FAILURE,
    };

    let source = config.source.trim_start_matches('/');
    match storage.delete_crops(source).await {
        Ok(keys) => {
            for key in &keys {
                println!("{}", key);
            }
            info!("Deleted {} crop(s) of {}", keys.len(), source);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Reset failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn open_maintenance_storage(args: &StorageArgs) -> Option<Storage> {
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        return None;
    }

    match build_storage(args).await {
        Ok(storage) => Some(storage),
        Err(e) => {
            error!("Failed to open storage: {}", e);
            None
        }
    }
}
