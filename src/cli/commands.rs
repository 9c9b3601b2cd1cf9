use crate::admission::{AdmissionControl, AlwaysAdmit, AlwaysDeny};
use crate::dispatcher::Dispatcher;
use crate::logging::{init_logging_with_config, LogConfig};
use crate::runtime::{ObjectMeta, Resource};
use crate::runtime_config::RuntimeConfig;
use crate::server::{AppService, HttpServer};
use crate::storage::{Capability, MemoryStorage};
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Command-line interface for brrtrest
#[derive(Parser, Debug)]
#[command(name = "brrtrest")]
#[command(about = "Resource-oriented REST dispatch server", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve in-memory storages over HTTP
    Serve {
        /// Address and port to bind the server to
        #[arg(long, default_value = "0.0.0.0:8080")]
        addr: String,

        /// API prefix; self links start with it
        #[arg(long, env = "BRRTR_API_PREFIX")]
        prefix: Option<String>,

        /// Resource names to serve, one in-memory storage each
        #[arg(long, value_delimiter = ',', default_value = "widgets")]
        kinds: Vec<String>,

        /// Default wait for mutations before answering 202 (e.g. `5s`, `250ms`)
        #[arg(long, value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,

        /// Capabilities every storage advertises (default: all five)
        #[arg(long, value_delimiter = ',', value_parser = parse_capability)]
        capabilities: Vec<Capability>,

        /// Deliver mutation results after this delay
        #[arg(long, value_parser = humantime::parse_duration)]
        completion_delay: Option<Duration>,

        /// Reject every mutation at admission
        #[arg(long, default_value_t = false)]
        deny_mutations: bool,
    },
}

/// Free-form resource served by the CLI: standard metadata plus any other fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Resource for Item {
    const KIND: &'static str = "Item";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

fn parse_capability(name: &str) -> Result<Capability, String> {
    Capability::from_name(name).ok_or_else(|| {
        format!("unknown capability {name:?}, expected one of list, get, create, update, delete")
    })
}

fn build_dispatcher(
    config: &RuntimeConfig,
    kinds: &[String],
    capabilities: &[Capability],
    completion_delay: Option<Duration>,
    deny_mutations: bool,
) -> Dispatcher {
    let admission: Arc<dyn AdmissionControl> = if deny_mutations {
        Arc::new(AlwaysDeny)
    } else {
        Arc::new(AlwaysAdmit)
    };
    let mut dispatcher = Dispatcher::from_config(config).with_admission(admission);
    for kind in kinds.iter().map(|k| k.trim()).filter(|k| !k.is_empty()) {
        let mut storage = MemoryStorage::<Item>::new();
        if !capabilities.is_empty() {
            storage = storage.with_capabilities(capabilities);
        }
        if let Some(delay) = completion_delay {
            storage = storage.with_completion_delay(delay);
        }
        dispatcher.register_storage(kind, Arc::new(storage));
    }
    dispatcher
}

/// Execute the CLI command provided by the user
///
/// # Errors
///
/// Returns an error if logging cannot be initialized or the server fails to start.
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            addr,
            prefix,
            kinds,
            timeout,
            capabilities,
            completion_delay,
            deny_mutations,
        } => {
            init_logging_with_config(&LogConfig::from_env())?;

            let mut config = RuntimeConfig::from_env();
            if let Some(prefix) = prefix {
                config.api_prefix = prefix;
            }
            if let Some(timeout) = timeout {
                config.default_timeout = timeout;
            }
            may::config().set_stack_size(config.stack_size);

            let dispatcher = build_dispatcher(
                &config,
                &kinds,
                &capabilities,
                completion_delay,
                deny_mutations,
            );
            info!(
                addr = %addr,
                prefix = %config.api_prefix,
                resources = ?dispatcher.resources(),
                default_timeout_ms = config.default_timeout.as_millis() as u64,
                "Starting server"
            );

            let service = AppService::new(Arc::new(dispatcher));
            let handle = HttpServer(service)
                .start(addr.as_str())
                .with_context(|| format!("failed to bind {addr}"))?;
            handle
                .join()
                .map_err(|e| anyhow::anyhow!("server coroutine panicked: {e:?}"))?;
            Ok(())
        }
    }
}

#[cfg(test)]
pub(super) fn dispatcher_for_tests(
    kinds: &[String],
    capabilities: &[Capability],
    deny_mutations: bool,
) -> Dispatcher {
    build_dispatcher(&RuntimeConfig::default(), kinds, capabilities, None, deny_mutations)
}
