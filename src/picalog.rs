use std::path::PathBuf;

use clap::Parser;

mod catalog;
mod config;
mod debounce;
mod gui;
mod rows;
mod selection;
mod thumbs;
mod viewport;
mod virtual_list;

/// One catalog entry as the list sees it. `resolved_path` is `None` when the
/// catalog knows the name but could not locate the file; such items still
/// render (name only) but never reach the thumbnail pipeline.
#[derive(Debug, Clone)]
pub struct ItemRecord {
    pub display_name: String,
    pub resolved_path: Option<PathBuf>,
    pub thumbnails_enabled: bool,
}

// --- CLI Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about = "Browses large image catalogs.", long_about = None)]
struct Cli {
    /// Directory to scan for images. Defaults to the last browsed
    /// directory, then the current one.
    path: Option<PathBuf>,

    /// Disable thumbnail loading (names only)
    #[arg(long)]
    no_thumbnails: bool,

    /// Thumbnail cache capacity (entries)
    #[arg(long)]
    cache_size: Option<usize>,

    /// Row height in points
    #[arg(long)]
    row_height: Option<f32>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = match config::load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("picalog: config unusable ({e}), using defaults");
            config::GuiConfig::default()
        }
    };

    if cli.no_thumbnails {
        cfg.show_thumbnails = Some(false);
    }
    if let Some(n) = cli.cache_size {
        cfg.thumb_cache_size = Some(n.max(1));
    }
    if let Some(h) = cli.row_height {
        cfg.row_height = Some(h.max(8.0));
    }

    let root = cli
        .path
        .or_else(|| cfg.last_directory.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let root = root
        .canonicalize()
        .unwrap_or(root);
    anyhow::ensure!(root.is_dir(), "not a directory: {}", root.display());

    cfg.last_directory = Some(root.clone());

    let app = gui::app::GuiApp::new(cfg, root);
    app.run().map_err(|e| anyhow::anyhow!("gui failed: {e}"))
}
