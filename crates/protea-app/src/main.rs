//! Protea application binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Open the SQLite protein store
//! 3. Build the chat agents and the query dispatcher
//! 4. Serve the axum API until Ctrl-C or SIGTERM
//! 5. Close the database

mod cli;

use std::sync::Arc;

use clap::Parser;

use protea_api::state::AppState;
use protea_chat::{
    CallPolicy, ChatCompletion, ConversationResponder, DatabaseQueryAgent, InputClassifier,
    LlmClassifier, LlmQueryAgent, LlmResponder, OpenAiClient, QueryDispatcher, RuleClassifier,
    UnconfiguredAgent,
};
use protea_core::config::{ClassifierKind, ProteaConfig};
use protea_storage::{Database, ProteinRepository};

use crate::cli::{expand_home, CliArgs};

/// Build the dispatcher from config. Returns whether the LLM agents have a key.
fn build_dispatcher(
    config: &ProteaConfig,
    proteins: Arc<ProteinRepository>,
) -> (QueryDispatcher, bool) {
    let llm: Option<Arc<dyn ChatCompletion>> = match config.llm.api_key() {
        Some(key) => match OpenAiClient::new(&config.llm, key) {
            Ok(client) => {
                tracing::info!(
                    endpoint = %client.endpoint(),
                    model = %config.llm.model,
                    "LLM client ready"
                );
                Some(Arc::new(client) as Arc<dyn ChatCompletion>)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to build LLM client");
                None
            }
        },
        None => {
            tracing::warn!(
                env = %config.llm.api_key_env,
                "No LLM API key found; /query/ will answer with the fallback response"
            );
            None
        }
    };

    let configured = llm.is_some();
    let policy = CallPolicy::from(&config.llm);

    let responder: Arc<dyn ConversationResponder>;
    let query_agent: Arc<dyn DatabaseQueryAgent>;
    let llm_classifier: Arc<dyn InputClassifier>;
    match llm {
        Some(llm) => {
            responder = Arc::new(LlmResponder::new(Arc::clone(&llm)));
            query_agent = Arc::new(
                LlmQueryAgent::new(Arc::clone(&llm), proteins, config.chat.max_result_rows)
                    .with_query_timeout(policy.timeout),
            );
            llm_classifier = Arc::new(LlmClassifier::new(llm));
        }
        None => {
            let unconfigured = Arc::new(UnconfiguredAgent::new(format!(
                "{} is not set",
                config.llm.api_key_env
            )));
            responder = unconfigured.clone();
            query_agent = unconfigured.clone();
            llm_classifier = unconfigured;
        }
    }

    let classifier: Arc<dyn InputClassifier> = match config.chat.classifier {
        ClassifierKind::Rules => Arc::new(RuleClassifier::new()),
        ClassifierKind::Llm => llm_classifier,
    };
    tracing::info!(classifier = ?config.chat.classifier, "Query dispatcher ready");

    let dispatcher = QueryDispatcher::new(classifier, responder, query_agent)
        .with_policy(policy)
        .with_fallback(config.chat.fallback_response.clone());

    (dispatcher, configured)
}

/// Resolve when Ctrl-C or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing so the file can set the log level.
    let config_file = args.resolve_config_path();
    let loaded = if config_file.exists() {
        Some(ProteaConfig::load(&config_file))
    } else {
        None
    };

    let log_level = args
        .resolve_log_level()
        .or_else(|| match &loaded {
            Some(Ok(c)) => Some(c.general.log_level.clone()),
            _ => None,
        })
        .unwrap_or_else(|| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    tracing::info!("Starting Protea v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match loaded {
        Some(Ok(config)) => {
            tracing::info!(path = %config_file.display(), "Configuration loaded");
            config
        }
        Some(Err(e)) => {
            tracing::warn!(
                path = %config_file.display(),
                error = %e,
                "Invalid config file, using defaults"
            );
            ProteaConfig::default()
        }
        None => {
            tracing::info!(path = %config_file.display(), "No config file, using defaults");
            ProteaConfig::default()
        }
    };

    config.server.host = args.resolve_host(&config.server.host);
    config.server.port = args.resolve_port(config.server.port);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    config.general.log_level = log_level;

    // Storage.
    let data_dir = expand_home(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join(&config.storage.db_file);
    let db = Arc::new(Database::new(&db_path)?);
    let proteins = Arc::new(ProteinRepository::new(Arc::clone(&db)));
    tracing::info!(path = %db_path.display(), proteins = proteins.count()?, "Protein store opened");

    // Agents.
    let (dispatcher, llm_configured) = build_dispatcher(&config, Arc::clone(&proteins));

    // API server.
    let state = AppState::new(config.clone(), proteins, dispatcher, llm_configured);
    let served = protea_api::start_server(&config, state, shutdown_signal()).await;
    if let Err(ref e) = served {
        tracing::error!(error = %e, "API server failed");
    }

    // Every handle held by the router is gone once serve returns.
    match Arc::try_unwrap(db) {
        Ok(db) => match db.close() {
            Ok(()) => tracing::info!("Database closed"),
            Err(e) => tracing::warn!(error = %e, "Failed to close database cleanly"),
        },
        Err(_) => tracing::warn!("Database still shared at shutdown; dropping"),
    }

    served?;
    Ok(())
}
