//! Pitwall API Gateway
//!
//! The HTTP entry point for the Formula 1 knowledge assistant.
//! Handles:
//! - Document ingestion and management
//! - Hybrid search and grounded chat
//! - Rate limiting
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use pitwall_common::{
    config::AppConfig,
    db::{MemoryRepository, Repository},
    embeddings::{create_embedder, Embedder},
    llm::{create_generator, TextGenerator},
    metrics,
    retry::RetryPolicy,
};
use pitwall_ingestion::IngestionProcessor;
use pitwall_search::{AnswerSynthesizer, HybridRetriever, SynthesisOptions};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use middleware::rate_limit::{create_rate_limiter, rate_limit_middleware, RateLimitState};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repository: Arc<dyn Repository>,
    pub processor: Arc<IngestionProcessor>,
    pub retriever: Arc<HybridRetriever>,
    pub synthesizer: Arc<AnswerSynthesizer>,
}

impl AppState {
    /// Wire the pipeline over an in-memory corpus
    pub fn new(
        config: Arc<AppConfig>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let repository: Arc<dyn Repository> = Arc::new(MemoryRepository::new());

        let processor = Arc::new(IngestionProcessor::from_config(
            repository.clone(),
            embedder.clone(),
            &config,
        ));
        let retriever = Arc::new(HybridRetriever::from_config(
            repository.clone(),
            embedder,
            generator.clone(),
            &config,
        ));
        let synthesizer = Arc::new(AnswerSynthesizer::new(
            retriever.clone(),
            generator,
            RetryPolicy::from_config(&config.retry),
            SynthesisOptions::from_config(&config),
        ));

        Self {
            config,
            repository,
            processor,
            retriever,
            synthesizer,
        }
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    init_tracing(&config);
    info!("Starting Pitwall API Gateway v{}", pitwall_common::VERSION);

    // Initialize metrics
    if config.observability.metrics_port > 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .set_buckets(metrics::LATENCY_BUCKETS)?
            .set_buckets_for_metric(
                Matcher::Suffix("embedding_duration_seconds".to_string()),
                metrics::PROVIDER_BUCKETS,
            )?
            .set_buckets_for_metric(
                Matcher::Suffix("generation_duration_seconds".to_string()),
                metrics::PROVIDER_BUCKETS,
            )?
            .install()?;
        info!(%metrics_addr, "Prometheus exporter listening");
    }
    metrics::register_metrics();

    // Initialize providers
    let embedder = create_embedder(&config.embedding)?;
    let generator = create_generator(&config.generation)?;
    info!(
        embedding_model = embedder.model_name(),
        generation_model = generator.model_name(),
        "Providers initialized"
    );

    let rate_limit = if config.rate_limit.enabled {
        Some(create_rate_limiter(
            config.rate_limit.requests_per_second,
            config.rate_limit.burst,
        )?)
    } else {
        None
    };

    let config = Arc::new(config);
    let state = AppState::new(config.clone(), embedder, generator);

    // Build the router
    let app = create_router(state, rate_limit);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber from observability settings
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState, rate_limit: Option<RateLimitState>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let mut api_routes = Router::new()
        .route("/health", get(handlers::health::health))
        // Document endpoints
        .route(
            "/documents",
            post(handlers::documents::create_document).get(handlers::documents::list_documents),
        )
        .route(
            "/documents/embed-missing",
            post(handlers::documents::embed_missing),
        )
        .route(
            "/documents/{id}",
            get(handlers::documents::get_document).delete(handlers::documents::delete_document),
        )
        // Retrieval endpoints
        .route("/search", post(handlers::search::search))
        .route("/chat", post(handlers::chat::chat))
        .route_layer(axum::middleware::from_fn(middleware::metrics::track_requests));

    if let Some(rate_limit) = rate_limit {
        api_routes = api_routes.layer(axum::middleware::from_fn_with_state(
            rate_limit,
            rate_limit_middleware,
        ));
    }

    let timeout = TimeoutLayer::new(state.config.request_timeout());

    // Compose the app
    Router::new()
        .nest("/v1", api_routes)
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use pitwall_common::embeddings::MockEmbedder;
    use pitwall_common::llm::MockGenerator;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const MONACO: &str = "Monaco rewards track position above all else. \
        Overtaking on the narrow streets is nearly impossible, \
        so teams favour a one-stop tire strategy. \
        The undercut is powerful because the out-lap on fresh tires is much faster.";

    fn test_app(generator: MockGenerator) -> Router {
        let mut config = AppConfig::default();
        config.retry.base_delay_ms = 0;
        let state = AppState::new(
            Arc::new(config),
            Arc::new(MockEmbedder::new(64)),
            Arc::new(generator),
        );
        create_router(state, None)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_monaco(app: &Router) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/v1/documents",
            Some(json!({
                "title": "Monaco Grand Prix strategy",
                "content": MONACO,
                "type": "analysis",
                "source": "Pit wall notes",
                "url": "https://example.com/monaco"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["document"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_reports_counts() {
        let app = test_app(MockGenerator::default());
        create_monaco(&app).await;

        let (status, body) = send(&app, "GET", "/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["documents"], 1);
        assert_eq!(body["chunks"], body["embedded_chunks"]);
    }

    #[tokio::test]
    async fn test_create_and_search() {
        let app = test_app(MockGenerator::default());
        let id = create_monaco(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            "/v1/search",
            Some(json!({ "query": "Monaco tire strategy", "top_k": 3 })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let results = body["results"].as_array().unwrap();
        assert!(!results.is_empty() && results.len() <= 3);
        assert_eq!(results[0]["document_id"], id.as_str());
        assert_eq!(body["mode"], "hybrid");
        assert_eq!(body["query_variants"][0], "Monaco tire strategy");
    }

    #[tokio::test]
    async fn test_search_empty_corpus() {
        let app = test_app(MockGenerator::default());
        let (status, body) =
            send(&app, "POST", "/v1/search", Some(json!({ "query": "undercut" }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "empty_corpus");
        assert_eq!(body["total_results"], 0);
    }

    #[tokio::test]
    async fn test_get_list_and_delete_document() {
        let app = test_app(MockGenerator::default());
        let id = create_monaco(&app).await;
        let uri = format!("/v1/documents/{}", id);

        let (status, body) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "analysis");
        assert_eq!(body["content"], MONACO);
        assert_eq!(body["source"], "Pit wall notes");
        assert_eq!(body["url"], "https://example.com/monaco");

        let (_, list) = send(&app, "GET", "/v1/documents", None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert!(list[0].get("content").is_none());

        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let app = test_app(MockGenerator::default());

        let (status, _) = send(&app, "POST", "/v1/search", Some(json!({ "query": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            "/v1/search",
            Some(json!({ "query": "drs", "top_k": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            "/v1/documents",
            Some(json!({ "title": "", "content": "text", "type": "news" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_answers_with_sources() {
        let app = test_app(MockGenerator::new("Teams run one stop at Monaco [1]."));
        create_monaco(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            "/v1/chat",
            Some(json!({
                "message": "What tire strategy works at Monaco?",
                "history": [
                    { "role": "user", "content": "Hi" },
                    { "role": "assistant", "content": "Hello! Ask me about F1." }
                ]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"]["role"], "assistant");
        assert_eq!(body["message"]["content"], "Teams run one stop at Monaco [1].");
        assert_eq!(body["cited"], json!([1]));
        assert_eq!(body["sources"][0]["title"], "Monaco Grand Prix strategy");
    }

    #[tokio::test]
    async fn test_embed_missing_with_nothing_pending() {
        let app = test_app(MockGenerator::default());
        create_monaco(&app).await;

        let (status, body) = send(&app, "POST", "/v1/documents/embed-missing", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["attempted"], 0);
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_excess() {
        let state = AppState::new(
            Arc::new(AppConfig::default()),
            Arc::new(MockEmbedder::new(32)),
            Arc::new(MockGenerator::default()),
        );
        let app = create_router(state, Some(create_rate_limiter(1, 1).unwrap()));

        let (status, _) = send(&app, "GET", "/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "GET", "/v1/health", None).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }
}
