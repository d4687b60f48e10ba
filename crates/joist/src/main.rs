//! Joist CLI - static site build tool.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use joist_build::{BuildOptions, SiteBuilder};

#[derive(Parser)]
#[command(name = "joist")]
#[command(about = "Build a static site from a manifest and sitemap")]
#[command(version)]
struct Cli {
    /// The source files/templates folder
    #[arg(long, default_value = "src")]
    src: PathBuf,

    /// The target site folder
    #[arg(long, default_value = "site")]
    tgt: PathBuf,

    /// The site manifest file
    #[arg(long, default_value = "manifest.yaml")]
    manifest: PathBuf,

    /// The sitemap file
    #[arg(long, default_value = "sitemap.yaml")]
    sitemap: PathBuf,

    /// URL prefix assigned to the site root
    #[arg(long, default_value = "/")]
    site_root: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let mut opts = BuildOptions::new(cli.src, cli.manifest, cli.sitemap, cli.tgt);
    opts.site_root = cli.site_root;

    let report = SiteBuilder::new(opts).build()?;

    tracing::info!(
        "Built {} pages and {} assets in {}ms",
        report.pages,
        report.assets,
        report.duration_ms
    );
    tracing::info!("Output: {}", report.target_root.display());

    Ok(())
}
