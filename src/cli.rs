use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

pub const DEFAULT_PROXY_SUFFIX: &str = ".proxy.lib.duke.edu";
pub const DEFAULT_PROMO_MARKER: &str = "/ybio/?";
pub const DEFAULT_DELIMITER: &str = r"\.\s*";

#[derive(Parser, Debug)]
#[command(
    name = "yearbook",
    version,
    about = "Offline capture and cleaning of Yearbook of International Organizations entries"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load saved subject listing pages into the master organization table.
    Listing(ListingArgs),
    /// Capture saved organization pages into the raw table.
    Capture(CaptureArgs),
    /// Clean raw records into the final relational tables.
    Clean(CleanArgs),
    /// Print the parsed membership list of one organization as JSON.
    Membership(MembershipArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ListingArgs {
    #[arg(long, default_value = ".cache/yearbook")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long = "page", required = true)]
    pub pages: Vec<PathBuf>,

    #[arg(long)]
    pub subject: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CaptureArgs {
    #[arg(long, default_value = ".cache/yearbook")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub pages_dir: Option<PathBuf>,

    #[arg(long)]
    pub json_dir: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CleanArgs {
    #[arg(long, default_value = ".cache/yearbook")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, default_value = DEFAULT_PROXY_SUFFIX)]
    pub proxy_suffix: String,

    #[arg(long, default_value = DEFAULT_PROMO_MARKER)]
    pub promo_marker: String,

    #[arg(long, default_value = DEFAULT_DELIMITER)]
    pub delimiter: String,

    #[arg(long)]
    pub failure_log: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct MembershipArgs {
    #[arg(long, default_value = ".cache/yearbook")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub org_id: i64,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/yearbook")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

pub fn resolve_db_path(data_root: &Path, db_path: Option<&PathBuf>) -> PathBuf {
    db_path
        .cloned()
        .unwrap_or_else(|| data_root.join("yearbook.sqlite"))
}
