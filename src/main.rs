//! Binary entry point: one process hosting the HTTP API and the worker pool
//! against a shared in-process broker.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

use askgraph::broker::Broker;
use askgraph::config::Settings;
use askgraph::graph::GraphRuntime;
use askgraph::llm::{LanguageModel, UnconfiguredModel};
use askgraph::server::{self, AppContext};
use askgraph::session::SessionService;
use askgraph::store;
use askgraph::tools::backends::StaticRetriever;
use askgraph::tools::ToolAdapters;
use askgraph::worker::Worker;

#[tokio::main]
async fn main() -> miette::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let settings = Arc::new(Settings::from_env().map_err(|e| miette::Report::new(e))?);
    info!(model = %settings.llm_model, workers = settings.worker_count, "starting askgraph");

    let (checkpoints, feedback) = store::open_stores(&settings)
        .await
        .map_err(|e| miette::Report::new(e))?;
    let sessions = SessionService::new(checkpoints);
    let broker = Broker::from_settings(&settings);
    let mut tools = ToolAdapters::from_settings(&settings);
    if let Some(path) = &settings.retriever_index_path {
        match StaticRetriever::from_index_file(path) {
            Ok(retriever) => {
                info!(path, "internal retrieval index loaded");
                tools = tools.with_retriever(Arc::new(retriever));
            }
            Err(err) => warn!(path, error = %err, "retriever index unavailable"),
        }
    }
    // The web search provider client is deployment-specific; the key alone
    // doesn't conjure one.
    if settings.web_search_key.is_some() {
        warn!("WEB_SEARCH_KEY is set but no search backend is registered");
    }
    let tools = Arc::new(tools);

    // The provider client is deployment-specific; without one the pipeline
    // still serves calculator and crawl-routed queries and reports the gap
    // on /health.
    let llm: Arc<dyn LanguageModel> = Arc::new(UnconfiguredModel);
    if !llm.configured() {
        warn!("no language model configured; model-dependent stages will fail cleanly");
    }

    let runtime = Arc::new(GraphRuntime::standard(settings.clone()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut worker_handles = Vec::new();
    for index in 0..settings.worker_count.max(1) {
        let worker = Worker::new(
            broker.clone(),
            sessions.clone(),
            runtime.clone(),
            llm.clone(),
            tools.clone(),
            settings.clone(),
        );
        let shutdown = shutdown_rx.clone();
        worker_handles.push(tokio::spawn(async move {
            info!(worker = index, "worker started");
            worker.run(shutdown).await;
            info!(worker = index, "worker stopped");
        }));
    }

    let ctx = AppContext {
        settings: settings.clone(),
        broker,
        sessions,
        feedback,
        llm,
        tools,
    };
    let router = server::router(ctx);
    let listener = TcpListener::bind(&settings.bind_addr)
        .await
        .map_err(|e| miette::miette!("bind {} failed: {e}", settings.bind_addr))?;
    info!(addr = %settings.bind_addr, "serving API");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .map_err(|e| miette::miette!("server error: {e}"))?;

    let _ = shutdown_tx.send(true);
    for handle in worker_handles {
        let _ = handle.await;
    }
    Ok(())
}
