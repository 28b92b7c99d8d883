//! gatemap CLI entrypoint
//! Parses command-line arguments and dispatches to the core compiler.

// Internal imports (std, crate)
use std::path::PathBuf;

// External imports (alphabetized)
use anyhow::Context;
use clap::Parser;
use gatemap_core::parameter::{
    header_param, multi_value_query_param, query_param, ParameterDescriptor, ParameterKind,
};
use gatemap_core::{compile, merge_path_params, Config, LiteralHeader};
use tokio::fs;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Environment variable consulted when `--api-key` is not given
const API_KEY_ENV: &str = "GATEMAP_API_KEY";

#[derive(Parser)]
#[command(name = "gatemap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Plan the API of a configuration file and print the plan as JSON
    Compile {
        /// Path to the route configuration (YAML, or JSON with a .json extension)
        #[arg(long)]
        config: PathBuf,
        /// Literal API key sent to the upstream (default: $GATEMAP_API_KEY)
        #[arg(long)]
        api_key: Option<String>,
        /// Write the plan to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Compile the parameter mappings of a single route template
    Params {
        /// Route template, e.g. /orders/{id}
        #[arg(long)]
        path: String,
        /// Query string parameter
        #[arg(long = "query")]
        query: Vec<String>,
        /// Multi-value query string parameter
        #[arg(long = "multi")]
        multi: Vec<String>,
        /// Request header
        #[arg(long = "header")]
        header: Vec<String>,
        /// Authorizer context field forwarded as an authorizer-<name> header
        #[arg(long = "context")]
        context: Vec<String>,
        /// Mark the named parameters as optional
        #[arg(long = "optional")]
        optional: Vec<String>,
        /// Header carrying the upstream API key
        #[arg(long, default_value = gatemap_core::compiler::DEFAULT_API_KEY_HEADER)]
        api_key_header: String,
        /// Literal API key sent to the upstream (default: $GATEMAP_API_KEY)
        #[arg(long)]
        api_key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging; stdout is reserved for JSON output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Compile {
            config,
            api_key,
            output,
        } => {
            let api_key = resolve_api_key(api_key)?;
            let cfg = Config::from_file(&config)
                .await
                .with_context(|| format!("Failed to load config {}", config.display()))?;
            info!(api = %cfg.name, routes = cfg.routes.len(), "Loaded configuration");

            let plan = cfg.plan_api(api_key).context("Failed to plan API")?;
            let json = serde_json::to_string_pretty(&plan)?;

            match output {
                Some(path) => {
                    fs::write(&path, json)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!(
                        "Wrote {} methods and {} usage plans to {}",
                        plan.methods.len(),
                        plan.usage_plans.len(),
                        path.display()
                    );
                }
                None => println!("{json}"),
            }
        }
        Commands::Params {
            path,
            query,
            multi,
            header,
            context,
            optional,
            api_key_header,
            api_key,
        } => {
            let api_key = resolve_api_key(api_key)?;
            let explicit = explicit_params(&query, &multi, &header, &context)?;
            let descriptors = mark_optional(merge_path_params(&path, &explicit)?, &optional)?;
            debug!(count = descriptors.len(), "Compiling descriptors for {path}");

            let set = compile(&descriptors, &LiteralHeader::new(api_key_header, api_key))?;
            println!("{}", serde_json::to_string_pretty(&set)?);
        }
    }
    Ok(())
}

fn resolve_api_key(flag: Option<String>) -> anyhow::Result<String> {
    match flag {
        Some(key) => Ok(key),
        None => std::env::var(API_KEY_ENV)
            .with_context(|| format!("No --api-key given and ${API_KEY_ENV} is not set")),
    }
}

fn explicit_params(
    query: &[String],
    multi: &[String],
    header: &[String],
    context: &[String],
) -> gatemap_core::Result<Vec<ParameterDescriptor>> {
    let mut params = Vec::new();
    for name in query {
        params.push(query_param(name.as_str())?);
    }
    for name in multi {
        params.push(multi_value_query_param(name.as_str())?);
    }
    for name in header {
        params.push(header_param(name.as_str())?);
    }
    for name in context {
        params.push(ParameterDescriptor::new(
            ParameterKind::AuthorizerContextInjection,
            name.as_str(),
            true,
        )?);
    }
    Ok(params)
}

/// Relax every descriptor named in `optional`. Each name must match at least
/// one descriptor.
fn mark_optional(
    descriptors: Vec<ParameterDescriptor>,
    optional: &[String],
) -> anyhow::Result<Vec<ParameterDescriptor>> {
    if let Some(unknown) = optional
        .iter()
        .find(|name| !descriptors.iter().any(|p| p.name() == name.as_str()))
    {
        anyhow::bail!("--optional {unknown} does not name any parameter of this route");
    }
    Ok(descriptors
        .into_iter()
        .map(|p| {
            if optional.iter().any(|name| name == p.name()) {
                p.optional()
            } else {
                p
            }
        })
        .collect())
}
