//! Provisa lets administrators create user accounts, assign them a role and
//! persist a profile record.

#[forbid(unsafe_code)]
#[deny(missing_docs, unused_mut)]
mod database;

pub mod config;
pub mod error;
pub mod identity;
pub mod profile;
mod router;
pub mod telemetry;
pub mod token;
pub mod user;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode, header};
use axum::routing::{get, post};
use axum::{Router, middleware as AxumMiddleware};
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

pub use error::ServerError;

#[cfg(test)]
pub(crate) const TEST_PRIVATE_KEY: &str =
    include_str!("../fixtures/token_es384.pem");
#[cfg(test)]
pub(crate) const TEST_PUBLIC_KEY: &str =
    include_str!("../fixtures/token_es384.pub.pem");

/// MUST NEVER be used in production.
#[cfg(test)]
pub(crate) fn test_state() -> (
    AppState,
    Arc<user::fakes::MemoryIdentity>,
    Arc<user::fakes::MemoryProfiles>,
) {
    let identity = Arc::new(user::fakes::MemoryIdentity::default());
    let profiles = Arc::new(user::fakes::MemoryProfiles::default());
    let token =
        token::TokenManager::new("provisa", TEST_PUBLIC_KEY, TEST_PRIVATE_KEY)
            .expect("cannot build token manager");

    let state = AppState {
        config: Arc::new(config::Configuration::default()),
        token,
        provisioner: user::Provisioner::new(
            Arc::clone(&identity) as Arc<dyn identity::IdentityProvider>,
            Arc::clone(&profiles) as Arc<dyn profile::ProfileStore>,
        ),
    };
    (state, identity, profiles)
}

/// MUST NEVER be used in production.
#[cfg(test)]
pub(crate) async fn make_request(
    state: &AppState,
    app: Router,
    method: Method,
    path: &str,
    role: Option<&str>,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(role) = role {
        let token = state
            .token
            .create("root", Some(role))
            .expect("cannot create JWT");
        builder =
            builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    app.oneshot(builder.body(axum::body::Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub token: token::TokenManager,
    pub provisioner: user::Provisioner,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(
                    DefaultOnResponse::new()
                        .latency_unit(LatencyUnit::Micros),
                ),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(10),
        ))
        // Remove sensitive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    let provision_router = Router::new()
        // `POST /createUserByAdmin` goes to `provision`.
        .route("/", post(router::provision::handler))
        .route_layer(AxumMiddleware::from_fn_with_state(
            state.clone(),
            router::caller,
        ));

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        .nest("/createUserByAdmin", provision_router)
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>>
{
    // read configuration file. let it in memory.
    let config = config::Configuration::default().read()?;

    let db = match config.postgres {
        Some(ref config) => {
            database::Database::new(
                &config.address,
                &config
                    .username
                    .clone()
                    .unwrap_or(database::DEFAULT_CREDENTIALS.into()),
                &config
                    .password
                    .clone()
                    .unwrap_or(database::DEFAULT_CREDENTIALS.into()),
                &config
                    .database
                    .clone()
                    .unwrap_or(database::DEFAULT_DATABASE_NAME.into()),
                config.pool_size.unwrap_or(database::DEFAULT_POOL_SIZE),
            )
            .await?
        },
        None => {
            tracing::error!("missing `postgres` entry on `config.yaml` file");
            std::process::exit(0);
        },
    };

    // execute migrations scripts on start.
    sqlx::migrate!().run(&db.postgres).await?;

    // handle identity provider client.
    let Some(identity) = &config.identity else {
        tracing::error!("missing `identity` entry on `config.yaml` file");
        std::process::exit(0);
    };
    let identity = Arc::new(identity::RestIdentityProvider::new(identity)?);

    // handle caller token verification.
    let Some(token) = &config.token else {
        tracing::warn!("missing `token` entry on `config.yaml` file");
        std::process::exit(0);
    };
    let mut token = token::TokenManager::new(
        &config.name,
        &token.public_key_pem,
        &token.private_key_pem,
    )?;

    if let Some(audience) =
        config.token.as_ref().and_then(|t| t.audience.as_ref())
    {
        token.audience(audience);
    }

    let provisioner = user::Provisioner::new(
        identity,
        Arc::new(profile::PgProfileStore::new(db.postgres.clone())),
    );

    Ok(AppState {
        config,
        token,
        provisioner,
    })
}
