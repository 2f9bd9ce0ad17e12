use clap::{Args, Parser, Subcommand};
use langallery::config::{self, GalleryConfig};
use langallery::index::GalleryIndex;
use langallery::{logging, output, server};
use std::path::PathBuf;

/// `1.2.0` on a release tag, otherwise `dev@<commit>` with `+dirty` for
/// uncommitted changes.
fn version_string() -> &'static str {
    if env!("LANGALLERY_RELEASE") == "true" {
        return env!("CARGO_PKG_VERSION");
    }
    let commit = env!("LANGALLERY_COMMIT");
    if commit.is_empty() {
        return "dev@unknown";
    }
    let dirty = if env!("LANGALLERY_DIRTY") == "true" { "+dirty" } else { "" };
    // Leaked once; clap needs a 'static str
    Box::leak(format!("dev@{commit}{dirty}").into_boxed_str())
}

#[derive(Parser)]
#[command(name = "langallery")]
#[command(about = "Serve a folder of photos to your local network")]
#[command(long_about = "\
Serve a folder of photos to your local network

Every directory that directly contains images becomes a gallery folder.
Folders are listed newest first; each shows a cover image and a count.
Thumbnails are generated on first request and cached on disk.

  photos/
  ├── beach.jpg          # shown under the root folder
  ├── album/             # folder \"album\"
  │   ├── new.png
  │   └── z-cover.jpg    # cover: greatest file name
  └── trip/
      └── a.jpg

Settings are layered: built-in defaults, then --config FILE, then flags.
Run 'langallery gen-config' to generate a documented config.toml.

Set LANGALLERY_LOG=debug for verbose logs.")]
#[command(version = version_string())]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the gallery over HTTP
    Serve(ServeArgs),
    /// Index the gallery once and print its folders
    Scan(ScanArgs),
    /// Print a stock config.toml with all options documented
    GenConfig,
}

/// Flags shared by every command that indexes a gallery.
#[derive(Args, Clone, Default)]
struct GalleryArgs {
    /// Local image folder
    #[arg(long)]
    gallery_dir: Option<PathBuf>,

    /// Recursively scan subfolders
    #[arg(long, overrides_with = "no_recursive")]
    recursive: bool,

    /// Only index images directly in the gallery folder
    #[arg(long, overrides_with = "recursive")]
    no_recursive: bool,

    /// Comma-separated allowed image extensions, e.g. "jpg,png"
    #[arg(long)]
    extensions: Option<String>,
}

#[derive(Args)]
struct ServeArgs {
    #[command(flatten)]
    gallery: GalleryArgs,

    /// Host to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to bind
    #[arg(long)]
    port: Option<u16>,

    /// Seconds before a snapshot is rebuilt in the background
    #[arg(long)]
    index_ttl: Option<u64>,

    /// Thumbnail max edge in pixels
    #[arg(long)]
    thumb_size: Option<u32>,

    /// Thumbnail JPEG quality (1-100)
    #[arg(long)]
    thumb_quality: Option<u32>,

    /// Serve originals where thumbnails would go
    #[arg(long)]
    no_thumbnails: bool,

    /// Where cached thumbnails are written
    #[arg(long)]
    thumb_cache_dir: Option<PathBuf>,

    /// Built web UI to serve at / (e.g. frontend/dist)
    #[arg(long)]
    frontend_dist: Option<PathBuf>,
}

#[derive(Args)]
struct ScanArgs {
    #[command(flatten)]
    gallery: GalleryArgs,

    /// Print the folder listing as JSON instead of text
    #[arg(long)]
    json: bool,
}

/// Builds the CLI layer as a TOML table: only flags the user passed appear.
#[derive(Default)]
struct Overrides(toml::Table);

impl Overrides {
    fn set(&mut self, section: &str, key: &str, value: impl Into<toml::Value>) {
        let table = self
            .0
            .entry(section)
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        if let toml::Value::Table(table) = table {
            table.insert(key.to_string(), value.into());
        }
    }

    fn gallery(&mut self, args: &GalleryArgs) -> Result<(), config::ConfigError> {
        if let Some(dir) = &args.gallery_dir {
            self.set("gallery", "root", dir.to_string_lossy().to_string());
        }
        if args.recursive {
            self.set("gallery", "recursive", true);
        }
        if args.no_recursive {
            self.set("gallery", "recursive", false);
        }
        if let Some(raw) = &args.extensions {
            let exts: Vec<toml::Value> = config::parse_extensions(raw)?
                .into_iter()
                .map(toml::Value::String)
                .collect();
            self.set("gallery", "extensions", exts);
        }
        Ok(())
    }

    fn into_value(self) -> toml::Value {
        toml::Value::Table(self.0)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init();

    match cli.command {
        Command::Serve(args) => {
            let mut overrides = Overrides::default();
            overrides.gallery(&args.gallery)?;
            if let Some(host) = args.host {
                overrides.set("server", "host", host);
            }
            if let Some(port) = args.port {
                overrides.set("server", "port", i64::from(port));
            }
            if let Some(ttl) = args.index_ttl {
                overrides.set("index", "ttl_seconds", i64::try_from(ttl)?);
            }
            if let Some(size) = args.thumb_size {
                overrides.set("thumbnails", "size", i64::from(size));
            }
            if let Some(quality) = args.thumb_quality {
                overrides.set("thumbnails", "quality", i64::from(quality));
            }
            if args.no_thumbnails {
                overrides.set("thumbnails", "enabled", false);
            }
            if let Some(dir) = args.thumb_cache_dir {
                overrides.set("thumbnails", "cache_dir", dir.to_string_lossy().to_string());
            }
            if let Some(dist) = args.frontend_dist {
                overrides.set("server", "frontend_dist", dist.to_string_lossy().to_string());
            }

            let config = config::load_config(cli.config.as_deref(), overrides.into_value())?;
            server::run(&config)?;
        }
        Command::Scan(args) => {
            let mut overrides = Overrides::default();
            overrides.gallery(&args.gallery)?;
            let config = config::load_config(cli.config.as_deref(), overrides.into_value())?;
            scan(&config, args.json)?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// One synchronous build, printed as text or JSON.
fn scan(config: &GalleryConfig, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let index = GalleryIndex::from_config(config)?;
    let snapshot = index.refresh_sync()?;

    if json {
        println!("{}", serde_json::to_string_pretty(snapshot.folders())?);
    } else {
        output::print_scan_output(&snapshot);
        println!();
        output::print_status(&index.status());
    }
    Ok(())
}
