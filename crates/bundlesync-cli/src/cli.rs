use clap::{ArgAction, Parser, Subcommand, ValueHint};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Disable progress bars
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Provide custom config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<String>,

    /// Set proxy
    #[arg(required = false, long, short = 'P', global = true)]
    pub proxy: Option<String>,

    /// Set request headers
    #[arg(required = false, long, short = 'H', global = true)]
    pub header: Option<Vec<String>>,

    /// Set user agent
    #[arg(required = false, long, short = 'A', global = true)]
    pub user_agent: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the manifest and refresh the cached package if it changed
    #[clap(name = "sync", visible_alias = "s")]
    Sync {
        /// Manifest URL to use instead of the configured one
        #[arg(required = false, short, long, value_hint = ValueHint::Url)]
        manifest: Option<String>,

        /// Resource to select instead of the one the manifest names
        #[arg(required = false, short, long)]
        resource: Option<String>,

        /// Re-hash the cached package before trusting it
        #[arg(required = false, long)]
        verify: bool,
    },

    /// Sync repeatedly until interrupted
    #[clap(name = "watch", visible_alias = "w")]
    Watch {
        /// Time between syncs, e.g. `30s` or `5m`
        #[arg(required = false, short, long)]
        interval: Option<String>,
    },

    /// Show the state of the cache slot
    #[clap(name = "status")]
    Status,

    /// List the resources of the cached package
    #[clap(name = "inspect")]
    Inspect {
        /// Resource name to test selection against
        #[arg(required = false, short, long)]
        resource: Option<String>,
    },

    /// Remove the cached package and its record
    #[clap(name = "clean")]
    Clean,

    /// Generate default config
    #[clap(name = "defconfig")]
    DefConfig,

    /// Print the effective configuration
    #[clap(name = "config")]
    Config,
}
