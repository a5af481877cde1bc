//! Greate accounts registers community members and activates their accounts.

#![forbid(unsafe_code)]
pub mod account;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod mail;
mod router;
pub mod telemetry;
pub mod template;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::{get, post};
use axum::{Router, middleware as AxumMiddleware};
use error::ServerError;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

use crate::account::{
    AccountService, ActivationLink, MemoryUserStore, PgUserStore, UserStore,
};
use crate::mail::{MailManager, Notifier};
use crate::template::{TemplateRenderer, Templates};

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    app.oneshot(
        Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Events captured by [`capture_events`], as `(level, fields)`.
#[cfg(test)]
pub type CapturedEvents = std::sync::Arc<
    std::sync::Mutex<
        Vec<(tracing::Level, std::collections::BTreeMap<String, String>)>,
    >,
>;

/// Record every event emitted on the current thread until the guard drops.
#[cfg(test)]
pub fn capture_events() -> (CapturedEvents, tracing::subscriber::DefaultGuard)
{
    use std::collections::BTreeMap;
    use std::fmt;

    use tracing::field::{Field, Visit};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::Layer;
    use tracing_subscriber::layer::{Context, SubscriberExt};

    struct CapturingLayer(CapturedEvents);

    struct FieldVisitor<'a>(&'a mut BTreeMap<String, String>);

    impl Visit for FieldVisitor<'_> {
        fn record_str(&mut self, field: &Field, value: &str) {
            self.0.insert(field.name().to_owned(), value.to_owned());
        }

        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.0.insert(field.name().to_owned(), format!("{value:?}"));
        }
    }

    impl<S: Subscriber> Layer<S> for CapturingLayer {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = BTreeMap::new();
            event.record(&mut FieldVisitor(&mut fields));
            self.0
                .lock()
                .unwrap()
                .push((*event.metadata().level(), fields));
        }
    }

    let events = CapturedEvents::default();
    let subscriber = tracing_subscriber::registry()
        .with(CapturingLayer(std::sync::Arc::clone(&events)));
    (events, tracing::subscriber::set_default(subscriber))
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub accounts: AccountService,
    pub metrics: Option<PrometheusHandle>,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Remove senstive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any),
        );

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        .route("/metrics", get(router::status::metrics))
        // `POST /register` goes to `register`.
        .route("/register", post(router::register::handler))
        // `GET /activation/:ID/:CODE` is the link sent by email.
        .route(
            "/activation/{user_id}/{code}",
            get(router::activation::handler),
        )
        // `GET /users/:ID` goes to `users`.
        .route("/users/{user_id}", get(router::users::handler))
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state(
    metrics: Option<PrometheusHandle>,
) -> Result<AppState, ServerError> {
    // read configuration file.  let it in memory.
    let path = std::env::var("CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_default();
    let config = config::Configuration::default().path(path).read()?;

    if config.url.is_empty() {
        tracing::warn!(
            "missing `url` entry on `config.yaml` file, activation links are relative"
        );
    }

    let store: Arc<dyn UserStore> = match config.postgres {
        Some(ref postgres) => {
            let db = database::Database::from_config(postgres).await?;
            // execute migrations scripts on start.
            db.migrate().await?;
            Arc::new(PgUserStore::new(db.postgres))
        },
        None => {
            tracing::warn!(
                "missing `postgres` entry on `config.yaml` file, accounts are kept in memory"
            );
            Arc::new(MemoryUserStore::new())
        },
    };

    // handle mail sender.
    let notifier: Arc<dyn Notifier> = match &config.mail {
        Some(cfg) => Arc::new(MailManager::new(cfg).await?),
        None => {
            tracing::warn!(
                "missing `mail` entry on `config.yaml` file, activation emails are dropped"
            );
            Arc::new(MailManager::default())
        },
    };

    let templates: Arc<dyn TemplateRenderer> = match &config.templates {
        Some(dir) => Arc::new(Templates::load(dir)?),
        None => Arc::new(Templates::default()),
    };

    let accounts = AccountService::new(
        store,
        notifier,
        templates,
        ActivationLink::new(config.domain(), &config.context_path),
    );

    Ok(AppState {
        config,
        accounts,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;

    #[tokio::test]
    async fn test_initialize_state_warns_without_url() {
        let (events, _guard) = capture_events();

        let state = initialize_state(None).await.unwrap();
        assert!(state.config.url.is_empty());

        let events = events.lock().unwrap();
        assert!(events.iter().any(|(level, fields)| {
            *level == Level::WARN
                && fields.get("message").is_some_and(|m| m.contains("`url`"))
        }));
    }
}
