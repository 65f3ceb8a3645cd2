use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pingone-provider")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative provider for PingOne environments", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Provider config file (defaults to ~/.config/pingone/provider.toml)
    #[arg(long, global = true, env = "PINGONE_PROVIDER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the managed resource types
    Types,

    /// Describe the attributes of a resource type
    Schema {
        /// Resource type, e.g. pingone_resource_scope
        type_name: String,
    },

    /// Check a configuration document against its type's schema
    Validate {
        /// Resource type
        type_name: String,
        /// Configuration as JSON or TOML
        file: PathBuf,
    },

    /// Preview the change a configuration makes to prior state
    Plan(PlanArgs),

    /// Read an existing remote object into state
    Import {
        /// Resource type
        type_name: String,
        /// Import identifier, e.g. <environment_id>/<resource_id>
        id: String,
    },

    /// Show the resolved provider configuration
    Config,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct PlanArgs {
    /// Resource type
    pub type_name: String,

    /// Desired configuration as JSON or TOML; omit to plan a destroy
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// Last observed state as JSON
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// Record address shown in the plan
    #[arg(long, default_value = "this")]
    pub name: String,
}
