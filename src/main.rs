//! CLI entry point for jamsite

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jamsite::Site;

#[derive(Parser)]
#[command(name = "jamsite")]
#[command(version)]
#[command(about = "A static site generator for blogs backed by a headless CMS", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new site
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        folder: PathBuf,
    },

    /// Fetch content and generate static files
    #[command(alias = "g")]
    Generate {
        /// Fail when any content fetch fails instead of rendering placeholders
        #[arg(long)]
        strict: bool,
    },

    /// Start a local server
    #[command(alias = "s")]
    Server {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// IP address to bind to
        #[arg(short, long, default_value = "localhost")]
        ip: String,

        /// Open browser automatically
        #[arg(short, long)]
        open: bool,

        /// Enable static mode (no revalidation or live reload)
        #[arg(long)]
        r#static: bool,
    },

    /// Clean the public folder
    Clean,

    /// List CMS content
    List {
        /// Type of content to list (post, id, page, home, tag)
        #[arg(default_value = "post")]
        r#type: String,
    },

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "jamsite=debug,info"
    } else {
        "jamsite=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine base directory
    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Init { folder } => {
            let target_dir = if folder.is_absolute() {
                folder
            } else {
                base_dir.join(folder)
            };
            tracing::info!("Initializing site in {:?}", target_dir);
            jamsite::commands::init::init_site(&target_dir)?;
            println!("Initialized site in {:?}", target_dir);
            println!("Add your CMS credentials to .env (see .env.example).");
        }

        Commands::Generate { strict } => {
            let site = Site::new(&base_dir)?;
            let fetcher = site.fetcher(site.connect()?);
            tracing::info!("Generating static files...");

            jamsite::commands::generate::run_with_options(&site, &fetcher, strict).await?;
            println!("Generated successfully!");
        }

        Commands::Server {
            port,
            ip,
            open,
            r#static,
        } => {
            let site = Site::new(&base_dir)?;
            let fetcher = site.fetcher(site.connect()?);

            // Generate first
            tracing::info!("Generating static files...");
            site.generate(&fetcher).await?;

            let revalidate = match site.config.revalidate {
                0 => None,
                _ if r#static => None,
                secs => Some(Duration::from_secs(secs)),
            };

            tracing::info!("Starting server at http://{}:{}", ip, port);
            jamsite::server::start(&site, fetcher, &ip, port, revalidate, open).await?;
        }

        Commands::Clean => {
            let site = Site::new(&base_dir)?;
            tracing::info!("Cleaning public folder...");
            site.clean()?;
            println!("Cleaned successfully!");
        }

        Commands::List { r#type } => {
            let site = Site::new(&base_dir)?;
            let fetcher = site.fetcher(site.connect()?);
            jamsite::commands::list::run(&site, &fetcher, &r#type).await?;
        }

        Commands::Version => {
            println!("jamsite version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
