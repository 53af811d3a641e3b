use crate::domain::contract::OperationType;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Parser)]
#[command(name = "dcs-broker")]
#[command(about = "Service broker for the distributed cache service")]
pub struct CliConfig {
    /// Path to the broker TOML configuration
    #[arg(short, long, default_value = "broker.toml")]
    pub config: String,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct PlanArgs {
    #[arg(long)]
    pub service_id: String,

    #[arg(long)]
    pub plan_id: String,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List the plans in the configured catalog
    Catalog,

    /// Create a cache instance
    Provision {
        #[arg(long)]
        instance_id: String,
        #[command(flatten)]
        plan: PlanArgs,
        /// JSON parameters, or @path to a JSON file
        #[arg(long)]
        parameters: Option<String>,
    },

    /// Modify a cache instance
    Update {
        #[arg(long)]
        instance_id: String,
        #[command(flatten)]
        plan: PlanArgs,
        /// JSON parameters, or @path to a JSON file
        #[arg(long)]
        parameters: Option<String>,
    },

    /// Delete a cache instance
    Deprovision {
        #[arg(long)]
        instance_id: String,
        #[command(flatten)]
        plan: PlanArgs,
    },

    /// Print connection credentials for an instance
    Bind {
        #[arg(long)]
        instance_id: String,
        #[arg(long)]
        binding_id: String,
        #[command(flatten)]
        plan: PlanArgs,
        /// JSON parameters, or @path to a JSON file
        #[arg(long)]
        parameters: Option<String>,
    },

    Unbind {
        #[arg(long)]
        instance_id: String,
        #[arg(long)]
        binding_id: String,
        #[command(flatten)]
        plan: PlanArgs,
    },

    /// Report the state of the last operation on an instance
    LastOperation {
        #[arg(long)]
        instance_id: String,
        #[arg(long, value_enum, default_value = "provision")]
        operation: OperationArg,
    },

    /// Print the parameter schemas of a plan
    Schemas {
        #[command(flatten)]
        plan: PlanArgs,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OperationArg {
    Provision,
    Update,
    Deprovision,
}

impl From<OperationArg> for OperationType {
    fn from(arg: OperationArg) -> Self {
        match arg {
            OperationArg::Provision => OperationType::Provision,
            OperationArg::Update => OperationType::Update,
            OperationArg::Deprovision => OperationType::Deprovision,
        }
    }
}
