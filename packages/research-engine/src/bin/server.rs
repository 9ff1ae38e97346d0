//! Control-surface HTTP entrypoint: boots the durable stores, the
//! fetch ladder, the inference gateway, the pipeline engine, and the
//! scheduler that admits work into it, then serves every control
//! command as a route.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use domain_policy::store::DomainPolicyStore;
use domain_policy::trust::TrustPolicy;
use evidence_graph::store::GraphStore;
use fetcher::rungs::archive::ArchiveFetcher;
use fetcher::rungs::browser::{BrowserBackend, HeadfulBrowserFetcher, HeadlessBrowserFetcher};
use fetcher::rungs::direct_http::DirectHttpFetcher;
use fetcher::rungs::tor_http::TorHttpFetcher;
use fetcher::validator::UrlValidator;
use fetcher::{EscalatingFetcher, FetchResult, Rung};
use inference_gateway::calibration::CalibrationParams;
use inference_gateway::credentials::ProviderCredentials;
use inference_gateway::openai_gateway::OpenAiGateway;
use inference_gateway::InferenceGateway;
use openai_client::OpenAIClient;
use pipeline::PipelineDeps;

use research_engine::config::Config;
use research_engine::control;
use research_engine::error::ControlError;
use research_engine::state::EngineContext;
use research_engine::store::ResearchStore;
use research_engine::tap::SearchResultTap;
use research_engine::types::*;

/// Browser automation is out of this crate's scope (the fetch ladder's
/// headless/headful rungs exist so the escalation order is complete,
/// but no CDP client is wired in here); this backend reports itself as
/// permanently unready so those rungs always escalate past it to the
/// archive rung instead of hanging.
struct UnimplementedBrowserBackend;

#[async_trait]
impl BrowserBackend for UnimplementedBrowserBackend {
    async fn is_ready(&self) -> bool {
        false
    }

    async fn ensure_started(&self) -> FetchResult<()> {
        Err(fetcher::error::FetchError::Cancelled {
            url: "<browser backend not configured>".to_string(),
        })
    }

    async fn render(&self, _url: &str, _headful: bool) -> FetchResult<(Vec<u8>, String)> {
        Err(fetcher::error::FetchError::Cancelled {
            url: "<browser backend not configured>".to_string(),
        })
    }
}

fn build_fetcher(config: &Config) -> Result<EscalatingFetcher> {
    let validator = UrlValidator::new();
    let direct_client = reqwest::Client::new();
    let browser_backend = Arc::new(UnimplementedBrowserBackend);

    let tor = TorHttpFetcher::new(&config.tor_proxy_url, validator.clone())
        .context("building tor http fetcher")?;

    Ok(EscalatingFetcher::builder()
        .rung(
            Rung::DirectHttp,
            Box::new(DirectHttpFetcher::new(direct_client.clone(), validator.clone())
                .with_default_timeout(config.fetch_rung_timeout)),
        )
        .rung(Rung::TorHttp, Box::new(tor))
        .rung(
            Rung::BrowserHeadless,
            Box::new(HeadlessBrowserFetcher::new(browser_backend.clone())),
        )
        .rung(
            Rung::BrowserHeadful,
            Box::new(HeadfulBrowserFetcher::new(browser_backend)),
        )
        .rung(
            Rung::Archive,
            Box::new(ArchiveFetcher::new(
                direct_client,
                config.archive_availability_api_base.clone(),
            )),
        )
        .build())
}

fn build_gateway(config: &Config) -> Arc<dyn InferenceGateway> {
    let llm = OpenAIClient::new(config.llm_api_key.clone());
    let embed_credentials = ProviderCredentials::new(config.llm_api_key.clone(), config.llm_model.clone());
    Arc::new(
        OpenAiGateway::new(
            llm,
            config.llm_model.clone(),
            config.embed_url.clone(),
            config.rerank_url.clone(),
            config.nli_url.clone(),
            embed_credentials,
        )
        .with_nli_calibration(CalibrationParams::default()),
    )
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let status = match self.code {
            research_engine::error::ErrorCode::InvalidParams => axum::http::StatusCode::BAD_REQUEST,
            research_engine::error::ErrorCode::TaskNotFound => axum::http::StatusCode::NOT_FOUND,
            research_engine::error::ErrorCode::BudgetExhausted => axum::http::StatusCode::CONFLICT,
            research_engine::error::ErrorCode::AuthRequired => axum::http::StatusCode::CONFLICT,
            research_engine::error::ErrorCode::AllEnginesBlocked => axum::http::StatusCode::SERVICE_UNAVAILABLE,
            research_engine::error::ErrorCode::Timeout => axum::http::StatusCode::GATEWAY_TIMEOUT,
            research_engine::error::ErrorCode::PipelineError
            | research_engine::error::ErrorCode::CalibrationError
            | research_engine::error::ErrorCode::Internal => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

async fn health() -> &'static str {
    "ok"
}

macro_rules! route_handler {
    ($name:ident, $req:ty, $resp:ty, $handler:path) => {
        async fn $name(
            State(ctx): State<EngineContext>,
            Json(req): Json<$req>,
        ) -> Result<Json<$resp>, ControlError> {
            $handler(&ctx, req).await.map(Json)
        }
    };
}

route_handler!(create_task_handler, CreateTaskRequest, CreateTaskResponse, control::create_task);
route_handler!(queue_targets_handler, QueueTargetsRequest, QueueTargetsResponse, control::queue_targets);
route_handler!(
    queue_reference_candidates_handler,
    QueueReferenceCandidatesRequest,
    QueueReferenceCandidatesResponse,
    control::queue_reference_candidates
);
route_handler!(get_status_handler, GetStatusRequest, GetStatusResponse, control::get_status);
route_handler!(stop_task_handler, StopTaskRequest, StopTaskResponse, control::stop_task);
route_handler!(vector_search_handler, VectorSearchRequest, VectorSearchResponse, control::vector_search);
route_handler!(query_view_handler, QueryViewRequest, QueryViewResponse, control::query_view);
route_handler!(resolve_auth_handler, ResolveAuthRequest, ResolveAuthResponse, control::resolve_auth);
route_handler!(get_auth_queue_handler, GetAuthQueueRequest, GetAuthQueueResponse, control::get_auth_queue);
route_handler!(feedback_handler, FeedbackRequest, FeedbackResponse, control::feedback);
route_handler!(
    calibration_metrics_handler,
    CalibrationMetricsRequest,
    CalibrationMetricsResponse,
    control::calibration_metrics
);
route_handler!(
    calibration_rollback_handler,
    CalibrationRollbackRequest,
    CalibrationRollbackResponse,
    control::calibration_rollback
);

fn build_router(ctx: EngineContext) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tasks", post(create_task_handler))
        .route("/tasks/targets", post(queue_targets_handler))
        .route("/tasks/reference-candidates", post(queue_reference_candidates_handler))
        .route("/tasks/status", post(get_status_handler))
        .route("/tasks/stop", post(stop_task_handler))
        .route("/search/vector", post(vector_search_handler))
        .route("/views", post(query_view_handler))
        .route("/auth-queue/resolve", post(resolve_auth_handler))
        .route("/auth-queue", post(get_auth_queue_handler))
        .route("/feedback", post(feedback_handler))
        .route("/calibration/metrics", post(calibration_metrics_handler))
        .route("/calibration/rollback", post(calibration_rollback_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,research_engine=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting research engine control surface");

    let config = Config::from_env().context("failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    let store = Arc::new(ResearchStore::from_pool(pool.clone()).await?);
    let graph_store = GraphStore::from_pool(pool).await?;
    let graph = Arc::new(evidence_graph::EvidenceGraph::new(graph_store));

    let fetcher = Arc::new(build_fetcher(&config)?);
    let gateway = build_gateway(&config);
    let domain_policy = DomainPolicyStore::new();
    let trust_policy = TrustPolicy::sensible_default();

    let auth_queue = Arc::new(research_engine::auth_queue::AuthWaitQueue::new(store.clone()));
    let tap = SearchResultTap::new(store.clone(), auth_queue);

    let deps = PipelineDeps {
        fetcher,
        domain_policy,
        trust_policy,
        gateway: gateway.clone(),
        graph: graph.clone(),
        serp_url_template: config.serp_url_template.clone(),
        academic_url_template: config.academic_url_template.clone(),
        step_timeout: config.step_timeout,
        semantic_weight: 0.6,
        rank_limit: config.serp_max_pages as usize,
        nli_calibration: CalibrationParams::default(),
    };

    let pipeline_handle = pipeline::build_engine_with_tap(deps, config.default_task_max_pages, tap);

    let ctx = EngineContext::new(Arc::new(config.clone()), store, graph, pipeline_handle, gateway);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("failed to bind to address")?;
    tracing::info!(%addr, "listening");

    let app = build_router(ctx);
    axum::serve(listener, app)
        .await
        .context("server error")?;

    Ok(())
}
