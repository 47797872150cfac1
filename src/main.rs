use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use portfolio_preload::i18n::{self, MessageCatalog, Routing};
use portfolio_preload::preload::{batcher, manifest};
use portfolio_preload::{
    DecodeLoader, EffectiveConnectionType, Environment, HttpFetchLoader, ImageDescriptor,
    ImageLoader, ImagePreloader, NetworkInfo, PreloadSnapshot, SiteConfig, StaticEnvironment,
};

#[derive(Parser)]
#[command(name = "portfolio-preload")]
#[command(about = "Image preloading and locale routing for the portfolio site", long_about = None)]
struct Cli {
    /// Config file (defaults to the per-user config if it exists)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one preload session and report the result
    Preload(PreloadArgs),

    /// Show how a request path would be routed
    Route {
        path: String,

        /// Accept-Language header value
        #[arg(long)]
        accept_language: Option<String>,

        /// Preferred-locale cookie value
        #[arg(long)]
        cookie: Option<String>,
    },

    /// Print a translated message
    Translate {
        locale: String,

        /// Dotted message key, e.g. nav.home
        key: String,
    },
}

#[derive(Args)]
struct PreloadArgs {
    /// JSON file with an array of `{"cover": "..."}` descriptors
    #[arg(short, long, conflicts_with = "dir")]
    manifest: Option<PathBuf>,

    /// Folder to scan for images instead of a manifest
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Fetch over HTTP and request optimized variants
    #[arg(long)]
    production: bool,

    /// Origin that site-relative paths are fetched from
    #[arg(long)]
    base_url: Option<String>,

    /// Preloads per batch
    #[arg(long)]
    concurrent: Option<usize>,

    /// Per-image timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Request the original files even in production
    #[arg(long)]
    no_optimized: bool,

    /// Simulated connection type (slow-2g, 2g, 3g, 4g)
    #[arg(long)]
    effective_type: Option<EffectiveConnectionType>,

    /// Simulated viewport width in pixels
    #[arg(long)]
    viewport_width: Option<u32>,

    /// Print a JSON report instead of a summary
    #[arg(long)]
    json: bool,
}

/// Outcome of one CLI preload session
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionReport {
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    duration_ms: i64,
    production: bool,
    concurrency: usize,
    urls: Vec<String>,
    #[serde(flatten)]
    snapshot: PreloadSnapshot,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = SiteConfig::load_or_default(cli.config.as_deref()).context("failed to load config")?;

    match cli.command {
        Command::Preload(args) => run_preload(config, args).await,
        Command::Route {
            path,
            accept_language,
            cookie,
        } => {
            match i18n::route(
                &config.locales,
                &path,
                accept_language.as_deref(),
                cookie.as_deref(),
            ) {
                Routing::Pass => println!("pass {path}"),
                Routing::Redirect(target) => println!("redirect {target}"),
            }
            Ok(())
        }
        Command::Translate { locale, key } => {
            let mut catalog = MessageCatalog::new(
                &config.messages_dir,
                config.locales.clone(),
                config.catalog_capacity,
            );
            let message = catalog
                .translate(&locale, &key)
                .with_context(|| format!("failed to translate '{key}'"))?;
            println!("{message}");
            Ok(())
        }
    }
}

async fn run_preload(mut config: SiteConfig, args: PreloadArgs) -> anyhow::Result<()> {
    if args.production {
        config.production = true;
    }
    if let Some(base_url) = args.base_url {
        config.base_url = Some(base_url);
    }
    if let Some(concurrent) = args.concurrent {
        config.preload.concurrent = concurrent;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.preload.timeout_ms = timeout_ms;
    }
    if args.no_optimized {
        config.preload.use_optimized_paths = false;
    }

    let images = match (&args.manifest, &args.dir) {
        (Some(manifest), _) => read_manifest(manifest)?,
        (None, Some(dir)) => {
            config.asset_root = dir.clone();
            manifest::scan_folder(dir)
        }
        (None, None) => bail!("either --manifest or --dir is required"),
    };

    let mut env = if config.production {
        StaticEnvironment::production()
    } else {
        StaticEnvironment::new()
    };
    if let Some(effective_type) = args.effective_type {
        env = env.with_network(NetworkInfo::new(effective_type));
    }
    if let Some(width) = args.viewport_width {
        env = env.with_viewport_width(width);
    }
    let env: Arc<dyn Environment> = Arc::new(env);

    let loader = build_loader(&config)?;
    let preloader = ImagePreloader::builder(Arc::clone(&env), loader)
        .options(config.preload.clone())
        .optimized_paths(config.optimized_paths.clone())
        .images(&images)
        .build();

    let concurrency = batcher::effective_concurrency(config.preload.concurrent, env.as_ref());
    tracing::info!(
        images = images.len(),
        production = config.production,
        concurrency,
        "preloading"
    );

    let started_at = Utc::now();
    preloader.preload_all_images().await;
    let finished_at = Utc::now();

    let report = SessionReport {
        started_at,
        finished_at,
        duration_ms: (finished_at - started_at).num_milliseconds(),
        production: config.production,
        concurrency,
        urls: preloader.urls(),
        snapshot: preloader.snapshot(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Preloaded {}/{} images ({} failed) in {} ms",
            report.snapshot.loaded_count,
            report.snapshot.total_count,
            report.snapshot.failed_count,
            report.duration_ms
        );
    }
    Ok(())
}

/// HTTP fetches in production, fetch-and-decode otherwise
fn build_loader(config: &SiteConfig) -> anyhow::Result<Arc<dyn ImageLoader>> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("portfolio-preload/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    if config.production {
        let mut loader = HttpFetchLoader::new(client);
        if let Some(base_url) = &config.base_url {
            loader = loader.with_base_url(base_url)?;
        }
        Ok(Arc::new(loader))
    } else {
        let mut loader = DecodeLoader::new(client, &config.asset_root);
        if let Some(base_url) = &config.base_url {
            loader = loader.with_base_url(base_url)?;
        }
        Ok(Arc::new(loader))
    }
}

fn read_manifest(path: &Path) -> anyhow::Result<Vec<ImageDescriptor>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let images = serde_json::from_str(&json)
        .with_context(|| format!("invalid manifest {}", path.display()))?;
    Ok(images)
}
