use anyhow::Context;
use clap::Parser;
use dcs_broker::config::broker_config::NetworkConfig;
use dcs_broker::config::cli::{Command, PlanArgs};
use dcs_broker::domain::contract::{
    BindDetails, DeprovisionDetails, OperationDetails, PreviousValues, ProvisionDetails,
    UnbindDetails, UpdateDetails,
};
use dcs_broker::utils::error::ErrorCategory;
use dcs_broker::utils::{logger, validation::Validate};
use dcs_broker::{
    BrokerConfig, BrokerError, Catalog, CliConfig, DcsBroker, HttpProviderClient, ServiceBroker,
    StaticCatalog,
};
use serde::Serialize;
use serde_json::Value;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting dcs-broker");
    tracing::info!("📁 Loading configuration from: {}", cli.config);

    let config = match BrokerConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    let broker = DcsBroker::new(
        HttpProviderClient::from_config(&config),
        StaticCatalog::new(config.services.clone()),
        config.network.clone(),
        config.region(),
    );

    if let Err(e) = run(&broker, cli.command).await {
        match e.downcast_ref::<BrokerError>() {
            Some(err) => {
                tracing::error!(
                    "❌ Operation failed: {} (Category: {:?})",
                    err,
                    err.category()
                );
                eprintln!("❌ {}", err);
                eprintln!("💡 {}", err.recovery_suggestion());
                std::process::exit(exit_code(err.category()));
            }
            None => return Err(e),
        }
    }

    Ok(())
}

fn exit_code(category: ErrorCategory) -> i32 {
    match category {
        ErrorCategory::Request => 2,
        ErrorCategory::Configuration => 3,
        ErrorCategory::Provider => 4,
        ErrorCategory::Internal => 1,
    }
}

type Broker = DcsBroker<HttpProviderClient, StaticCatalog, NetworkConfig>;

async fn run(broker: &Broker, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Catalog => {
            let catalog = broker.catalog();
            for (service_id, plan_id) in catalog.plan_ids() {
                match catalog.find_plan(&service_id, &plan_id) {
                    Ok(plan) => println!(
                        "{}\t{}\t{}/{}\t{}",
                        service_id, plan_id, plan.service_name, plan.plan_name, plan.engine
                    ),
                    Err(e) => println!("{}\t{}\t<invalid: {}>", service_id, plan_id, e),
                }
            }
        }
        Command::Provision {
            instance_id,
            plan,
            parameters,
        } => {
            let details = ProvisionDetails {
                service_id: plan.service_id,
                plan_id: plan.plan_id,
                raw_parameters: read_parameters(parameters.as_deref())?,
                ..Default::default()
            };
            print_json(&broker.provision(&instance_id, details, false).await?)?;
        }
        Command::Update {
            instance_id,
            plan,
            parameters,
        } => {
            let details = UpdateDetails {
                previous_values: PreviousValues {
                    service_id: plan.service_id.clone(),
                    plan_id: plan.plan_id.clone(),
                },
                service_id: plan.service_id,
                plan_id: plan.plan_id,
                raw_parameters: read_parameters(parameters.as_deref())?,
            };
            print_json(&broker.update(&instance_id, details, false).await?)?;
        }
        Command::Deprovision { instance_id, plan } => {
            let PlanArgs {
                service_id,
                plan_id,
            } = plan;
            let details = DeprovisionDetails {
                service_id,
                plan_id,
            };
            print_json(&broker.deprovision(&instance_id, details, false).await?)?;
        }
        Command::Bind {
            instance_id,
            binding_id,
            plan,
            parameters,
        } => {
            let details = BindDetails {
                service_id: plan.service_id,
                plan_id: plan.plan_id,
                raw_parameters: read_parameters(parameters.as_deref())?,
                ..Default::default()
            };
            print_json(&broker.bind(&instance_id, &binding_id, details).await?)?;
        }
        Command::Unbind {
            instance_id,
            binding_id,
            plan,
        } => {
            let details = UnbindDetails {
                service_id: plan.service_id,
                plan_id: plan.plan_id,
            };
            broker.unbind(&instance_id, &binding_id, details).await?;
            println!("✅ Unbound {} from {}", binding_id, instance_id);
        }
        Command::LastOperation {
            instance_id,
            operation,
        } => {
            let details = OperationDetails {
                operation_type: operation.into(),
                service_id: String::new(),
                plan_id: String::new(),
            };
            print_json(&broker.last_operation(&instance_id, details).await?)?;
        }
        Command::Schemas { plan } => {
            print_json(&broker.plan_schemas(&plan.service_id, &plan.plan_id)?)?;
        }
    }

    Ok(())
}

/// Inline JSON, or `@path` to a JSON file.
fn read_parameters(arg: Option<&str>) -> anyhow::Result<Option<Value>> {
    let Some(arg) = arg else {
        return Ok(None);
    };

    let raw = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read parameters file {}", path))?,
        None => arg.to_string(),
    };

    let value = serde_json::from_str(&raw).context("parameters are not valid JSON")?;
    Ok(Some(value))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
