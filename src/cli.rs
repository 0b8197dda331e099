use clap::{Args, Parser, Subcommand, ValueEnum};
use launchkit::{Domain, ServiceType};

#[derive(Parser)]
#[command(name = "lanyard")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Inspect and control launchd services and system extensions", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List discovered services
    List(ListArgs),

    /// Fuzzy-search services by label, name, and description
    Search(SearchArgs),

    /// Show detail for one service
    Info(LabelArg),

    /// Start a service
    Start(ActionArgs),

    /// Stop a service
    Stop(ActionArgs),

    /// Enable a service
    Enable(ActionArgs),

    /// Disable a service
    Disable(ActionArgs),

    /// Unload a service from its domain
    Unload(ActionArgs),

    /// Restart a service in place
    Reload(ActionArgs),

    /// Continuously refresh the service list
    Watch(WatchArgs),

    /// Show the resolved config path and effective values
    Config,
}

// ============================================================================
// Arguments
// ============================================================================

#[derive(Args)]
pub struct ListArgs {
    /// Only show services of this type
    #[arg(short = 't', long = "type", value_enum)]
    pub kind: Option<KindArg>,

    /// Only show services in this domain
    #[arg(short, long, value_enum)]
    pub domain: Option<DomainArg>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Search pattern
    pub pattern: String,

    /// Maximum number of results
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

#[derive(Args)]
pub struct LabelArg {
    /// Service label (e.g., com.example.agent)
    pub label: String,
}

#[derive(Args)]
pub struct ActionArgs {
    /// Service label (e.g., com.example.agent)
    pub label: String,

    /// Show the command that would run without running it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Read the administrator password from stdin
    #[arg(long)]
    pub password_stdin: bool,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Fuzzy filter applied to every refresh
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Disable the auto-refresh timer (refresh only on Enter)
    #[arg(long)]
    pub no_auto_refresh: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    Daemon,
    Agent,
    Extension,
}

impl From<KindArg> for ServiceType {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Daemon => Self::Daemon,
            KindArg::Agent => Self::Agent,
            KindArg::Extension => Self::Extension,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum DomainArg {
    System,
    User,
    Gui,
}

impl From<DomainArg> for Domain {
    fn from(domain: DomainArg) -> Self {
        match domain {
            DomainArg::System => Self::System,
            DomainArg::User => Self::User,
            DomainArg::Gui => Self::Gui,
        }
    }
}
