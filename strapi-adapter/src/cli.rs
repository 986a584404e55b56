/// # strapi-adapter CLI Interface (Module)
///
/// Command parsing and orchestration for the `strapi-adapter` binary. Every
/// command reads from or writes to the CMS through
/// [`strapi_adapter_core::StrapiContext`] and prints the result as pretty JSON
/// on stdout. Logs go to stderr.
///
/// ## How To Use
/// - For command-line users: run the binary with `--help`.
/// - For programmatic/integration use: call [`run`] or [`execute`] with a constructed [`Cli`].
///
/// ## Extending
/// Add a variant to [`Commands`] and a match arm in [`execute`]. Keep request
/// building and response handling inside `strapi-adapter-core`.
use crate::load_config::{load_config, CliConfig};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use strapi_adapter_core::{ReqwestTransport, StrapiContext};

/// CLI for strapi-adapter: read and write collections, entries and single types of a Strapi CMS.
#[derive(Debug, Parser)]
#[clap(
    name = "strapi-adapter",
    version,
    about = "Read and write collections, entries and single types of a Strapi CMS as JSON"
)]
pub struct Cli {
    /// Path to the YAML config file. Without it the CMS location comes from STRAPI_API_LOCATION.
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Flatten `{id, attributes}` envelopes and relation wrappers in the output
    #[clap(long, global = true)]
    pub normalize: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch one page of a collection
    Collection {
        name: String,
        /// Query string in bracket notation, e.g. `filters[slug][$eq]=home&populate=*`
        #[clap(long, default_value = "")]
        query: String,
        #[clap(long, default_value_t = 1)]
        page: u32,
        /// Defaults to the configured page size
        #[clap(long)]
        page_size: Option<u32>,
    },
    /// Fetch every page of a collection, merged in page order
    All {
        name: String,
        #[clap(long, default_value = "")]
        query: String,
    },
    /// Fetch one entry by id
    Entry {
        name: String,
        id: String,
        #[clap(long, default_value = "")]
        query: String,
    },
    /// Fetch the first entry whose slug matches
    Slug {
        name: String,
        slug: String,
        #[clap(long, default_value = "")]
        query: String,
    },
    /// Fetch a single type
    Single {
        name: String,
        #[clap(long, default_value = "")]
        query: String,
    },
    /// Create an entry from a JSON object of attributes
    Create {
        name: String,
        #[clap(long)]
        data: String,
        #[clap(long, default_value = "")]
        query: String,
    },
    /// Update an entry, or a single type when no id is given
    Update {
        name: String,
        id: Option<String>,
        #[clap(long)]
        data: String,
        #[clap(long, default_value = "")]
        query: String,
    },
    /// Delete an entry by id
    Delete { name: String, id: String },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Collection { .. } => "collection",
            Commands::All { .. } => "all",
            Commands::Entry { .. } => "entry",
            Commands::Slug { .. } => "slug",
            Commands::Single { .. } => "single",
            Commands::Create { .. } => "create",
            Commands::Update { .. } => "update",
            Commands::Delete { .. } => "delete",
        }
    }

    /// Commands whose output keeps the `{data, meta}` envelope.
    fn is_paged(&self) -> bool {
        matches!(self, Commands::Collection { .. } | Commands::All { .. })
    }
}

/// Async CLI entrypoint for main() and integration tests. Prints the result to stdout.
pub async fn run(cli: Cli) -> Result<()> {
    let command = cli.command.name();
    match execute(cli).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            tracing::info!(command, "Command complete");
            Ok(())
        }
        Err(e) => {
            tracing::error!(command, error = %e, "Command failed");
            Err(e)
        }
    }
}

/// Runs the command and returns the JSON that [`run`] would print.
pub async fn execute(cli: Cli) -> Result<Value> {
    let config = load_config(cli.config.as_deref())?;
    let normalize = cli.normalize || config.strapi.normalize_strapi_data;
    let ctx = context(config)?;
    tracing::info!(command = cli.command.name(), normalize, "Executing command");
    let paged = cli.command.is_paged();

    let output = match cli.command {
        Commands::Collection {
            name,
            query,
            page,
            page_size,
        } => {
            let page_size = page_size.unwrap_or(ctx.config().default_page_size);
            let page = ctx
                .get_collection(&name, page, page_size, query.as_str())
                .await
                .with_context(|| format!("Failed to fetch page {page} of {name}"))?;
            to_json(&page)?
        }
        Commands::All { name, query } => {
            let full = ctx
                .get_full_collection(&name, query.as_str())
                .await
                .with_context(|| format!("Failed to fetch collection {name}"))?;
            if !full.is_complete() {
                tracing::warn!(collection = %name, missing_pages = ?full.missing_pages, "Collection is incomplete");
            }
            to_json(&full)?
        }
        Commands::Entry { name, id, query } => {
            let entry = ctx
                .get_entry(&name, &id, query.as_str())
                .await
                .with_context(|| format!("Failed to fetch entry {name}/{id}"))?;
            to_json(&entry)?
        }
        Commands::Slug { name, slug, query } => {
            let entry = ctx
                .get_entry_by_slug(&name, &slug, query.as_str())
                .await
                .with_context(|| format!("Failed to fetch entry by slug {name}/{slug}"))?;
            to_json(&entry)?
        }
        Commands::Single { name, query } => {
            let entry = ctx
                .get_single(&name, query.as_str())
                .await
                .with_context(|| format!("Failed to fetch single type {name}"))?;
            to_json(&entry)?
        }
        Commands::Create { name, data, query } => {
            let entry = ctx
                .create(&name, parse_data(&data)?, query.as_str())
                .await
                .with_context(|| format!("Failed to create entry in {name}"))?;
            to_json(&entry)?
        }
        Commands::Update {
            name,
            id,
            data,
            query,
        } => {
            let data = parse_data(&data)?;
            let entry = match &id {
                Some(id) => ctx.update(&name, id, data, query.as_str()).await,
                None => ctx.update_single(&name, data, query.as_str()).await,
            }
            .with_context(|| format!("Failed to update {name}"))?;
            to_json(&entry)?
        }
        Commands::Delete { name, id } => {
            let entry = ctx
                .delete(&name, &id)
                .await
                .with_context(|| format!("Failed to delete entry {name}/{id}"))?;
            to_json(&entry)?
        }
    };

    if !normalize {
        return Ok(output);
    }
    // Paged output keeps `meta` and `missingPages`; only the entries are flattened.
    Ok(match output {
        Value::Object(mut envelope) if paged => {
            if let Some(data) = envelope.get_mut("data") {
                *data = ctx.normalize(data);
            }
            Value::Object(envelope)
        }
        other => ctx.normalize(&other),
    })
}

fn context(config: CliConfig) -> Result<StrapiContext<ReqwestTransport>> {
    let mut transport = ReqwestTransport::new(config.strapi.api_location.clone());
    if let Some(token) = config.bearer_token {
        transport = transport.with_bearer_token(token);
    }
    StrapiContext::new(config.strapi, transport).context("Failed to create Strapi context")
}

fn parse_data(data: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(data).context("--data is not valid JSON")?;
    if !value.is_object() {
        anyhow::bail!("--data must be a JSON object of attributes");
    }
    Ok(value)
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).context("Failed to serialize response")
}
