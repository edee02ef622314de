//! CLI commands and argument parsing
//!
//! This module defines the command-line interface structure using clap,
//! including all commands, subcommands, and their arguments.

use crate::auth::provider::{AzureAuthProvider, DefaultAzureCredentialProvider};
use crate::channel::{
    AzureStorageChannel, CopySource, StorageChannel, StorageContext, StorageCredentials,
    StorageManagementClient,
};
use crate::config::Config;
use crate::copy::models::{BlobHandle, CopyStatus};
use crate::copy::resolve::{split_blob_path, BlobIdentityResolver};
use crate::copy::{CopyAborter, CopyInitiator, CopyStatusPoller, LocalCopyOrchestrator};
use crate::error::{BlobCopyError, Result};
use crate::utils::format::{format_size, format_table, OutputFormat};
use crate::utils::interactive::PromptConfirmation;
use crate::utils::progress::ConsoleProgress;
use clap::{Parser, Subcommand};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tabled::{Table, Tabled};
use url::Url;

/// Get the full version string with build information
fn get_version() -> &'static str {
    env!("VERSION_WITH_GIT")
}

/// Get build information for display
pub fn get_build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        build_number: env!("BUILD_NUMBER"),
        git_hash: env!("GIT_HASH"),
        git_branch: env!("GIT_BRANCH"),
        build_time: env!("BUILD_TIME"),
        full_version: env!("FULL_VERSION"),
    }
}

#[derive(Debug)]
pub struct BuildInfo {
    pub version: &'static str,
    pub build_number: &'static str,
    pub git_hash: &'static str,
    pub git_branch: &'static str,
    pub build_time: &'static str,
    pub full_version: &'static str,
}

#[derive(Parser)]
#[command(name = "bcp")]
#[command(about = "A command-line tool for coordinating Azure Blob Storage copy operations")]
#[command(version = get_version(), author)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a server-side blob copy (alias: start)
    #[command(name = "start-copy", alias = "start")]
    StartCopy {
        /// Source container name
        #[arg(long)]
        source_container: Option<String>,
        /// Source blob name
        #[arg(long)]
        source_blob: Option<String>,
        /// Source blob URI (alternative to container/blob)
        #[arg(long)]
        source_uri: Option<String>,
        /// Destination container name
        #[arg(long)]
        dest_container: String,
        /// Destination blob name (defaults to the source blob name)
        #[arg(long)]
        dest_blob: Option<String>,
        /// Destination storage account (defaults to the configured account)
        #[arg(long)]
        dest_account: Option<String>,
        /// Destination account access key
        #[arg(long)]
        dest_key: Option<String>,
        /// Destination SAS token
        #[arg(long)]
        dest_sas: Option<String>,
        /// Overwrite an existing destination blob without confirmation
        #[arg(short, long)]
        force: bool,
    },
    /// Show the copy status of one or more blobs (alias: state)
    #[command(name = "copy-state", alias = "state")]
    CopyState {
        /// Container name
        #[arg(long)]
        container: String,
        /// Blob name (repeatable)
        #[arg(long = "blob", required = true)]
        blobs: Vec<String>,
        /// Block until every pending copy reaches a terminal state
        #[arg(long)]
        wait_for_complete: bool,
    },
    /// Abort an in-progress blob copy (alias: stop)
    #[command(name = "stop-copy", alias = "stop")]
    StopCopy {
        /// Container name
        #[arg(long)]
        container: String,
        /// Blob name
        #[arg(long)]
        blob: String,
        /// Copy-id to abort (discovered from the blob when omitted)
        #[arg(long)]
        copy_id: Option<String>,
        /// Abort without confirmation, using the service's current copy-id
        #[arg(short, long)]
        force: bool,
    },
    /// Copy a blob between accounts with explicit destination credentials
    #[command(name = "copy-blob")]
    CopyBlob {
        /// Source blob URI (public or pre-signed)
        #[arg(long)]
        source_uri: String,
        /// Destination blob or container URI
        #[arg(long)]
        dest_uri: String,
        /// Destination account access key (looked up via the management API when omitted)
        #[arg(long)]
        dest_key: Option<String>,
        /// Resource group of the destination account, for key lookup
        #[arg(long)]
        resource_group: Option<String>,
        /// Overwrite an existing destination blob without confirmation
        #[arg(long)]
        overwrite: bool,
    },
    /// Configuration management commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Show detailed version and build information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the current configuration
    Show,
    /// Show the configuration file path
    Path,
    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// New value
        value: String,
    },
}

impl Cli {
    pub async fn execute(self, mut config: Config) -> Result<()> {
        if self.debug {
            config.debug = true;
        }
        config.output_json = self.format == OutputFormat::Json;

        match self.command {
            Commands::StartCopy {
                source_container,
                source_blob,
                source_uri,
                dest_container,
                dest_blob,
                dest_account,
                dest_key,
                dest_sas,
                force,
            } => {
                execute_start_copy(
                    source_container,
                    source_blob,
                    source_uri,
                    &dest_container,
                    dest_blob,
                    dest_account,
                    dest_key,
                    dest_sas,
                    force,
                    &config,
                )
                .await
            }
            Commands::CopyState {
                container,
                blobs,
                wait_for_complete,
            } => execute_copy_state(&container, blobs, wait_for_complete, &config).await,
            Commands::StopCopy {
                container,
                blob,
                copy_id,
                force,
            } => execute_stop_copy(&container, &blob, copy_id, force, &config).await,
            Commands::CopyBlob {
                source_uri,
                dest_uri,
                dest_key,
                resource_group,
                overwrite,
            } => {
                execute_copy_blob(
                    &source_uri,
                    &dest_uri,
                    dest_key,
                    resource_group,
                    overwrite,
                    &config,
                )
                .await
            }
            Commands::Config { command } => execute_config_command(command, config).await,
            Commands::Version => execute_version_command().await,
        }
    }
}

/// Build the auth provider used for bearer tokens and key lookup
fn create_auth_provider() -> Result<Arc<dyn AzureAuthProvider>> {
    Ok(Arc::new(DefaultAzureCredentialProvider::new()?) as Arc<dyn AzureAuthProvider>)
}

/// Credentials for the configured storage account
fn credentials_from_config(config: &Config) -> Result<StorageCredentials> {
    if !config.access_key.is_empty() {
        Ok(StorageCredentials::SharedKey {
            key: config.access_key.clone(),
        })
    } else if !config.sas_token.is_empty() {
        Ok(StorageCredentials::SasToken {
            token: config.sas_token.clone(),
        })
    } else {
        Ok(StorageCredentials::Bearer {
            provider: create_auth_provider()?,
        })
    }
}

/// Channel bound to the configured storage account
fn create_default_channel(config: &Config) -> Result<Arc<dyn StorageChannel>> {
    let context = StorageContext::new(
        &config.storage_account,
        &config.endpoint_suffix,
        credentials_from_config(config)?,
    );
    Ok(Arc::new(AzureStorageChannel::new(context)?) as Arc<dyn StorageChannel>)
}

/// Split a blob endpoint host into (account, endpoint suffix)
fn split_account_host(host: &str) -> Result<(String, String)> {
    match host.split_once(".blob.") {
        Some((account, suffix)) if !account.is_empty() && !suffix.is_empty() => {
            Ok((account.to_string(), suffix.to_string()))
        }
        _ => Err(BlobCopyError::invalid_argument(format!(
            "'{host}' is not a blob endpoint host (expected <account>.blob.<suffix>)"
        ))),
    }
}

/// Set a flag on Ctrl-C so polling loops can exit between fetches
fn spawn_force_quit_watcher() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.store(true, Ordering::Relaxed);
        }
    });
    stop
}

#[derive(Tabled)]
struct CopyStateRow {
    #[tabled(rename = "Container")]
    container: String,
    #[tabled(rename = "Blob")]
    blob: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Progress")]
    progress: String,
    #[tabled(rename = "Copy ID")]
    copy_id: String,
}

fn copy_state_row(handle: &BlobHandle) -> CopyStateRow {
    match &handle.copy_state {
        Some(state) => {
            let progress = match (state.bytes_copied, state.total_bytes) {
                (Some(copied), Some(total)) => format!(
                    "{} / {} ({}%)",
                    format_size(copied),
                    format_size(total),
                    state.percent()
                ),
                _ => "-".to_string(),
            };
            CopyStateRow {
                container: handle.container.clone(),
                blob: handle.name.clone(),
                status: state.status.as_str().to_string(),
                progress,
                copy_id: state.copy_id.clone(),
            }
        }
        None => CopyStateRow {
            container: handle.container.clone(),
            blob: handle.name.clone(),
            status: "none".to_string(),
            progress: "-".to_string(),
            copy_id: "-".to_string(),
        },
    }
}

fn print_handles(handles: &[BlobHandle], config: &Config) -> Result<()> {
    if handles.is_empty() {
        return Ok(());
    }

    if config.output_json {
        let json_output = serde_json::to_string_pretty(handles)?;
        println!("{json_output}");
    } else {
        let rows: Vec<CopyStateRow> = handles.iter().map(copy_state_row).collect();
        let table = Table::new(&rows);
        println!("{}", format_table(table, config.no_color));
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn execute_start_copy(
    source_container: Option<String>,
    source_blob: Option<String>,
    source_uri: Option<String>,
    dest_container: &str,
    dest_blob: Option<String>,
    dest_account: Option<String>,
    dest_key: Option<String>,
    dest_sas: Option<String>,
    force: bool,
    config: &Config,
) -> Result<()> {
    let source_channel = create_default_channel(config)?;
    let resolver = BlobIdentityResolver::new(source_channel.clone());

    // Resolve the source from whichever parameter set was supplied
    let source = match (&source_container, &source_blob, &source_uri) {
        (Some(container), Some(blob), None) => {
            resolver.resolve_source_container(container).await?;
            resolver.resolve_source_blob(container, blob).await?
        }
        (None, None, Some(uri)) => {
            let url = Url::parse(uri).map_err(|e| {
                BlobCopyError::invalid_argument(format!("Invalid source URI '{uri}': {e}"))
            })?;
            resolver.resolve_source_by_uri(&url).await?
        }
        _ => {
            return Err(BlobCopyError::invalid_argument(
                "Specify either --source-container with --source-blob, or --source-uri",
            ))
        }
    };

    // A destination with its own account or credentials gets its own
    // channel; otherwise the source channel is shared.
    let dest_channel: Arc<dyn StorageChannel> =
        if dest_account.is_some() || dest_key.is_some() || dest_sas.is_some() {
            let account = dest_account.unwrap_or_else(|| config.storage_account.clone());
            let credentials = if let Some(key) = dest_key {
                StorageCredentials::SharedKey { key }
            } else if let Some(sas) = dest_sas {
                StorageCredentials::SasToken {
                    token: sas.trim_start_matches('?').to_string(),
                }
            } else {
                credentials_from_config(config)?
            };
            let context = StorageContext::new(account, &config.endpoint_suffix, credentials);
            Arc::new(AzureStorageChannel::new(context)?)
        } else {
            source_channel.clone()
        };

    let confirmation = PromptConfirmation::new();
    let initiator = CopyInitiator::new(dest_channel, &confirmation);

    match initiator
        .start(&source, dest_container, dest_blob.as_deref(), force)
        .await?
    {
        Some(handle) => {
            println!(
                "✅ Copy registered for blob '{}' in container '{}'",
                handle.name, handle.container
            );
            print_handles(std::slice::from_ref(&handle), config)?;
        }
        None => {
            println!("Copy cancelled.");
        }
    }

    Ok(())
}

async fn execute_copy_state(
    container: &str,
    blobs: Vec<String>,
    wait_for_complete: bool,
    config: &Config,
) -> Result<()> {
    let channel = create_default_channel(config)?;
    let stop = spawn_force_quit_watcher();
    let mut poller = CopyStatusPoller::new(
        channel,
        config.poll_slot_count,
        Duration::from_secs(config.poll_interval_secs),
        stop,
    );

    let mut results = Vec::new();
    for blob in &blobs {
        if let Some(handle) = poller.check_one(container, blob, wait_for_complete).await? {
            results.push(handle);
        }
    }

    if poller.queued() > 0 {
        println!(
            "Waiting for {} pending cop(ies) to complete...",
            poller.queued()
        );
        let mut progress = ConsoleProgress::new(config.poll_slot_count);
        let resolved = poller.wait_for_completion(&mut progress).await?;
        results.extend(resolved);
    }

    print_handles(&results, config)?;

    let summary = poller.summary();
    println!(
        "\nTotal: {}, Finished: {}, Failed: {}, Pending: {}",
        summary.total, summary.finished, summary.failed, summary.started
    );

    Ok(())
}

async fn execute_stop_copy(
    container: &str,
    blob: &str,
    copy_id: Option<String>,
    force: bool,
    config: &Config,
) -> Result<()> {
    let channel = create_default_channel(config)?;
    let confirmation = PromptConfirmation::new();
    let aborter = CopyAborter::new(channel, &confirmation);

    match aborter
        .stop(container, blob, copy_id.as_deref(), force)
        .await?
    {
        Some(copy_id) => {
            println!(
                "✅ Aborted copy {copy_id} on blob '{blob}' in container '{container}'"
            );
        }
        None => {
            println!("Abort cancelled.");
        }
    }

    Ok(())
}

async fn execute_copy_blob(
    source_uri: &str,
    dest_uri: &str,
    dest_key: Option<String>,
    resource_group: Option<String>,
    overwrite: bool,
    config: &Config,
) -> Result<()> {
    let source_url = Url::parse(source_uri).map_err(|e| {
        BlobCopyError::invalid_argument(format!("Invalid source URI '{source_uri}': {e}"))
    })?;
    let dest_url = Url::parse(dest_uri).map_err(|e| {
        BlobCopyError::invalid_argument(format!("Invalid destination URI '{dest_uri}': {e}"))
    })?;

    let dest_host = dest_url.host_str().ok_or_else(|| {
        BlobCopyError::invalid_argument(format!("Destination URI '{dest_uri}' has no host"))
    })?;
    let (dest_account, endpoint_suffix) = split_account_host(dest_host)?;

    // A container-only destination URI defaults the blob name to the
    // source blob's own name.
    let (dest_container, dest_blob) = match split_blob_path(&dest_url) {
        Ok((container, blob)) => (container, Some(blob)),
        Err(_) => {
            let container = dest_url
                .path_segments()
                .and_then(|mut segments| segments.find(|s| !s.is_empty()).map(str::to_string))
                .ok_or_else(|| {
                    BlobCopyError::invalid_argument(format!(
                        "Destination URI '{dest_uri}' does not address a container"
                    ))
                })?;
            (container, None)
        }
    };

    let credentials = resolve_destination_credentials(
        &dest_account,
        dest_key,
        dest_url.query(),
        resource_group,
        config,
    )
    .await?;

    let context = StorageContext::new(&dest_account, &endpoint_suffix, credentials);
    let dest_channel: Arc<dyn StorageChannel> = Arc::new(AzureStorageChannel::new(context)?);

    let confirmation = PromptConfirmation::new();
    let stop = spawn_force_quit_watcher();
    let orchestrator = LocalCopyOrchestrator::new(
        dest_channel,
        &confirmation,
        Duration::from_secs(config.poll_interval_secs),
        stop,
    );

    // The source URI stays opaque: the service resolves it with whatever
    // access (public or pre-signed) the URI itself carries.
    let source = CopySource::Uri(source_url);
    let mut progress = ConsoleProgress::new(1);

    match orchestrator
        .run(
            &source,
            &dest_container,
            dest_blob.as_deref(),
            overwrite,
            &mut progress,
        )
        .await?
    {
        Some(handle) => {
            match handle.copy_state.as_ref().map(|s| s.status) {
                Some(CopyStatus::Success) => println!(
                    "✅ Copied to blob '{}' in container '{}' on account '{}'",
                    handle.name, handle.container, dest_account
                ),
                status => println!(
                    "Copy to blob '{}' in container '{}' ended with status {}",
                    handle.name,
                    handle.container,
                    status.map(|s| s.as_str()).unwrap_or("unknown")
                ),
            }
            print_handles(std::slice::from_ref(&handle), config)?;
        }
        None => {
            println!("Copy cancelled.");
        }
    }

    Ok(())
}

/// Destination credentials: explicit key, SAS carried by the URI, or a
/// management-API key lookup.
async fn resolve_destination_credentials(
    dest_account: &str,
    dest_key: Option<String>,
    dest_query: Option<&str>,
    resource_group: Option<String>,
    config: &Config,
) -> Result<StorageCredentials> {
    if let Some(key) = dest_key {
        return Ok(StorageCredentials::SharedKey { key });
    }

    if let Some(query) = dest_query {
        if !query.is_empty() {
            return Ok(StorageCredentials::SasToken {
                token: query.to_string(),
            });
        }
    }

    let resource_group = resource_group
        .filter(|rg| !rg.is_empty())
        .or_else(|| Some(config.resource_group.clone()).filter(|rg| !rg.is_empty()))
        .ok_or_else(|| {
            BlobCopyError::config(
                "Destination key lookup requires --resource-group or a configured resource group",
            )
        })?;

    if config.subscription_id.is_empty() {
        return Err(BlobCopyError::config(
            "Destination key lookup requires a subscription ID. Set AZURE_SUBSCRIPTION_ID or pass --dest-key.",
        ));
    }

    let management =
        StorageManagementClient::new(create_auth_provider()?, config.subscription_id.clone())?;
    let keys = management
        .list_account_keys(&resource_group, dest_account)
        .await?;
    let key = keys
        .into_iter()
        .next()
        .map(|k| k.value)
        .ok_or_else(|| {
            BlobCopyError::azure_api(format!(
                "Storage account '{dest_account}' returned no usable access key"
            ))
        })?;

    Ok(StorageCredentials::SharedKey { key })
}

async fn execute_config_command(command: ConfigCommands, config: Config) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            if config.output_json {
                let json_output = serde_json::to_string_pretty(&config)?;
                println!("{json_output}");
            } else {
                let table = Table::new([&config]);
                println!("{}", format_table(table, config.no_color));
            }
            Ok(())
        }
        ConfigCommands::Path => {
            println!("{}", Config::get_config_path()?.display());
            Ok(())
        }
        ConfigCommands::Set { key, value } => {
            let mut config = config;
            config.set_value(&key, &value)?;
            config.save().await?;
            println!("✅ Set {key}");
            Ok(())
        }
    }
}

async fn execute_version_command() -> Result<()> {
    let info = get_build_info();
    println!("bcp {}", info.full_version);
    println!("  Version:      {}", info.version);
    println!("  Build:        {}", info.build_number);
    println!("  Git hash:     {}", info.git_hash);
    println!("  Git branch:   {}", info.git_branch);
    println!("  Built:        {}", info.build_time);
    Ok(())
}
