use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;

use cairn_core::differ::{Diff, diff};
use cairn_core::parameter::{
    Parameter, ParameterSet, RESERVED_MEMORY_PARAMETER, RESERVED_MEMORY_PERCENT_PARAMETER,
    ReconciliationResult, reconcile,
};
use cairn_core::provider::{Provider, ResourceType};
use cairn_core::resource::{Resource, ResourceId, State};
use cairn_core::waiter::Shutdown;
use cairn_provider_aws::{AwsProvider, ParameterGroupType, ProviderConfig};

#[derive(Parser)]
#[command(name = "cairn")]
#[command(about = "Converge ElastiCache and App Runner resources on a declared state", long_about = None)]
struct Cli {
    /// AWS region (defaults to AWS_REGION or the active profile)
    #[arg(long, global = true)]
    region: Option<String>,

    /// Provider configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parameter set commands
    Parameters {
        #[command(subcommand)]
        command: ParameterCommands,
    },
    /// Show the current state of a resource
    Read {
        /// Resource type (e.g. elasticache.serverless_cache)
        resource_type: String,
        /// Remote identifier (name or ARN)
        identifier: String,
    },
    /// Create or update a resource to match a JSON declaration
    Apply {
        /// Path to resource .json file
        file: PathBuf,

        /// Remote identifier of an existing resource (defaults to its `name` attribute)
        #[arg(long)]
        identifier: Option<String>,
    },
    /// Delete a resource
    Destroy {
        /// Resource type (e.g. elasticache.parameter_group)
        resource_type: String,
        /// Remote identifier (name or ARN)
        identifier: String,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
}

#[derive(Subcommand)]
enum ParameterCommands {
    /// Show which parameters would be reset and which written
    Diff {
        /// Parameters currently applied (JSON list of {name, value})
        #[arg(long)]
        old: PathBuf,
        /// Parameters now desired (JSON list of {name, value})
        #[arg(long)]
        new: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parameters {
            command: ParameterCommands::Diff { old, new },
        } => run_parameters_diff(&old, &new),
        Commands::Read {
            resource_type,
            identifier,
        } => match get_provider(cli.region, cli.config.as_deref()).await {
            Ok(provider) => run_read(&provider, &resource_type, &identifier).await,
            Err(e) => Err(e),
        },
        Commands::Apply { file, identifier } => {
            match get_provider(cli.region, cli.config.as_deref()).await {
                Ok(provider) => run_apply(&provider, &file, identifier).await,
                Err(e) => Err(e),
            }
        }
        Commands::Destroy {
            resource_type,
            identifier,
            auto_approve,
        } => match get_provider(cli.region, cli.config.as_deref()).await {
            Ok(provider) => {
                run_destroy(&provider, &resource_type, &identifier, auto_approve).await
            }
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<ProviderConfig, String> {
    match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
            serde_json::from_str(&content)
                .map_err(|e| format!("Invalid configuration in {}: {}", path.display(), e))
        }
        None => Ok(ProviderConfig::default()),
    }
}

/// Build the provider; Ctrl-C cancels any wait in progress
async fn get_provider(region: Option<String>, config: Option<&Path>) -> Result<AwsProvider, String> {
    let mut config = load_config(config)?;
    if region.is_some() {
        config.region = region;
    }

    let (tx, shutdown) = Shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling pending waits");
            let _ = tx.send(true);
        }
    });

    if let Some(region) = &config.region {
        println!("{}", format!("Using AWS provider (region: {})", region).cyan());
    }
    Ok(AwsProvider::new(config).await.with_shutdown(shutdown))
}

fn load_parameters(path: &Path) -> Result<ParameterSet, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let parameters: Vec<Parameter> = serde_json::from_str(&content)
        .map_err(|e| format!("Invalid parameter list in {}: {}", path.display(), e))?;
    ParameterSet::from_parameters(parameters).map_err(|e| format!("{}: {}", path.display(), e))
}

fn run_parameters_diff(old: &Path, new: &Path) -> Result<(), String> {
    let old = load_parameters(old)?;
    let new = load_parameters(new)?;
    print_reconciliation(&old, &reconcile(&old, &new));
    Ok(())
}

fn print_reconciliation(old: &ParameterSet, result: &ReconciliationResult) {
    if result.is_empty() {
        println!("{}", "No changes. Parameters are up-to-date.".green());
        return;
    }

    println!("{}", "Parameter changes:".cyan().bold());
    println!();
    for parameter in &result.to_remove {
        println!(
            "  {} {} {}",
            "-".red().bold(),
            parameter.name,
            format!("(reset from {})", parameter.value).dimmed()
        );
    }
    for parameter in &result.to_add_or_update {
        match old.get(&parameter.name) {
            Some(previous) => println!(
                "  {} {}: {} -> {}",
                "~".yellow().bold(),
                parameter.name,
                previous,
                parameter.value
            ),
            None => println!("  {} {}", "+".green().bold(), parameter),
        }
    }

    if result
        .to_remove
        .iter()
        .any(|p| p.name == RESERVED_MEMORY_PARAMETER)
    {
        println!();
        println!(
            "  {}",
            format!(
                "Note: {} cannot be reset directly; {} is cycled instead.",
                RESERVED_MEMORY_PARAMETER, RESERVED_MEMORY_PERCENT_PARAMETER
            )
            .yellow()
        );
    }
}

async fn run_read(
    provider: &AwsProvider,
    resource_type: &str,
    identifier: &str,
) -> Result<(), String> {
    let id = ResourceId::new(resource_type, identifier);
    let state = provider
        .read(&id, Some(identifier))
        .await
        .map_err(|e| e.to_string())?;

    if !state.exists {
        println!("{}", format!("{} {} does not exist.", resource_type, identifier).yellow());
        return Ok(());
    }
    print_state(&state)
}

fn print_state(state: &State) -> Result<(), String> {
    let json = serde_json::to_string_pretty(state).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

fn load_resource(path: &Path) -> Result<Resource, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("Invalid resource in {}: {}", path.display(), e))
}

/// Identifier to look the resource up by: explicit, else its `name`
fn resolve_identifier(resource: &Resource, explicit: Option<String>) -> Option<String> {
    explicit.or_else(|| {
        let name = resource.attributes.get("name").and_then(|v| v.as_str())?;
        // Parameter groups are created under the lowercased name
        if resource.id.resource_type == ParameterGroupType.name() {
            Some(name.to_lowercase())
        } else {
            Some(name.to_string())
        }
    })
}

async fn run_apply(
    provider: &AwsProvider,
    file: &Path,
    identifier: Option<String>,
) -> Result<(), String> {
    let resource = load_resource(file)?;
    let identifier = resolve_identifier(&resource, identifier);
    let label = format!("{}.{}", resource.id.resource_type, resource.id.name);

    let current = provider
        .read(&resource.id, identifier.as_deref())
        .await
        .map_err(|e| e.to_string())?;

    let state = match diff(&resource, &current) {
        Diff::NoChange(_) => {
            println!("{}", "No changes. Resource is up-to-date.".green());
            return Ok(());
        }
        Diff::Create(resource) => {
            println!("{}", format!("Creating {}...", label).cyan().bold());
            provider.create(&resource).await
        }
        Diff::Update {
            id,
            from,
            to,
            changed_attributes,
        } => {
            println!(
                "{}",
                format!("Updating {} ({})...", label, changed_attributes.join(", "))
                    .cyan()
                    .bold()
            );
            let identifier = from
                .identifier
                .clone()
                .or(identifier)
                .ok_or_else(|| format!("No identifier known for {}", label))?;
            provider.update(&id, &identifier, &from, &to).await
        }
    };

    match state {
        Ok(state) => {
            println!("  {} {}", "✓".green(), label);
            println!();
            print_state(&state)
        }
        Err(e) => {
            println!("  {} {} - {}", "✗".red(), label, e);
            Err(format!("Apply of {} failed", label))
        }
    }
}

async fn run_destroy(
    provider: &AwsProvider,
    resource_type: &str,
    identifier: &str,
    auto_approve: bool,
) -> Result<(), String> {
    let id = ResourceId::new(resource_type, identifier);
    let current = provider
        .read(&id, Some(identifier))
        .await
        .map_err(|e| e.to_string())?;
    if !current.exists {
        println!("{}", "No resources to destroy.".green());
        return Ok(());
    }

    if !auto_approve {
        println!(
            "{}",
            format!("Do you really want to destroy {} {}?", resource_type, identifier)
                .yellow()
                .bold()
        );
        println!(
            "  {}",
            "This action cannot be undone. Type 'yes' to confirm.".yellow()
        );
        print!("\n  Enter a value: ");
        std::io::Write::flush(&mut std::io::stdout()).map_err(|e| e.to_string())?;

        let mut input = String::new();
        std::io::stdin()
            .read_line(&mut input)
            .map_err(|e| e.to_string())?;

        if input.trim() != "yes" {
            println!();
            println!("{}", "Destroy cancelled.".yellow());
            return Ok(());
        }
        println!();
    }

    println!("{}", "Destroying...".red().bold());
    match provider.delete(&id, identifier).await {
        Ok(()) => {
            println!("  {} {} {}", "✓".green(), resource_type, identifier);
            Ok(())
        }
        Err(e) => {
            println!("  {} {} {} - {}", "✗".red(), resource_type, identifier, e);
            Err(format!("Destroy of {} failed", identifier))
        }
    }
}
