/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tasklane_api::{app::{build_router, AppState}, config::Config};
/// use tasklane_shared::events::RealtimeHub;
/// use tasklane_shared::notifications::Notifier;
/// use tasklane_worker::ReminderWorker;
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let notifier = Notifier::new(pool.clone(), Arc::new(RealtimeHub::new()));
/// let worker = ReminderWorker::start(pool.clone(), notifier.clone()).await?;
/// let state = AppState::new(pool, config, notifier, worker.scheduler());
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{rate_limit::RateLimiter, security::SecurityHeadersLayer},
    routes,
};
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tasklane_shared::{
    auth::{jwt::JwtSecrets, lockout::LockoutTracker, middleware::create_jwt_middleware},
    events::RealtimeHub,
    notifications::Notifier,
};
use tasklane_worker::scheduler::ReminderScheduler;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Upper bound on request handling time
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How often stale lockout and rate-limit entries are dropped
pub const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Access and refresh signing secrets
    pub secrets: JwtSecrets,

    /// Failed-login tracker
    pub lockout: Arc<LockoutTracker>,

    /// Per-IP request counters
    pub limiter: Arc<RateLimiter>,

    /// Persists notifications and pushes them to connected clients
    pub notifier: Notifier,

    /// Reminder jobs
    pub scheduler: Arc<ReminderScheduler>,
}

impl AppState {
    /// Creates new application state
    pub fn new(
        db: PgPool,
        config: Config,
        notifier: Notifier,
        scheduler: Arc<ReminderScheduler>,
    ) -> Self {
        let secrets = config.jwt.secrets();
        let limiter = RateLimiter::new(!config.is_production());

        Self {
            db,
            config: Arc::new(config),
            secrets,
            lockout: Arc::new(LockoutTracker::new()),
            limiter: Arc::new(limiter),
            notifier,
            scheduler,
        }
    }

    pub fn hub(&self) -> &Arc<RealtimeHub> {
        self.notifier.hub()
    }
}

/// Periodically drops expired lockout and rate-limit entries until
/// `shutdown` is cancelled
pub async fn run_maintenance(state: AppState, period: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let lockouts = state.lockout.cleanup();
                let windows = state.limiter.cleanup();
                tracing::debug!(lockouts, windows, "Maintenance: stale entries removed");
            }
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET  /health                          (public)
/// ├── POST /auth/register|login|refresh     (public)
/// ├── GET  /ws?token=                       (token in query)
/// └── everything else                       (Bearer access token)
///     ├── POST /auth/logout
///     ├── /user/profile, /user/password
///     ├── /task-lists, /task-lists/join, /task-lists/:id[/members|tasks|projects|requesters]
///     ├── /tasks/:id[/reminders[/:reminder_id]]
///     ├── /reminders/missed
///     ├── /projects/:id, /requesters/:id
///     ├── /users/:user_id/queue[/reorder|/:task_id]
///     └── /notifications[...]
/// ```
///
/// # Middleware Stack
///
/// Outermost first: security headers, request id, CORS, tracing, 30 s
/// timeout, rate limiting, then authentication on protected routes.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh))
        .route("/ws", get(routes::realtime::ws_handler));

    let protected_routes = Router::new()
        .route("/auth/logout", post(routes::auth::logout))
        .route(
            "/user/profile",
            get(routes::users::get_profile).put(routes::users::update_profile),
        )
        .route("/user/password", put(routes::users::change_password))
        .route(
            "/task-lists",
            get(routes::task_lists::list_task_lists).post(routes::task_lists::create_task_list),
        )
        .route("/task-lists/join", post(routes::task_lists::join_task_list))
        .route("/task-lists/:id", delete(routes::task_lists::delete_task_list))
        .route("/task-lists/:id/members", get(routes::task_lists::list_members))
        .route(
            "/task-lists/:id/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/task-lists/:id/projects",
            get(routes::labels::list_projects).post(routes::labels::create_project),
        )
        .route(
            "/task-lists/:id/requesters",
            get(routes::labels::list_requesters).post(routes::labels::create_requester),
        )
        .route("/projects/:id", delete(routes::labels::delete_project))
        .route("/requesters/:id", delete(routes::labels::delete_requester))
        .route(
            "/tasks/:id",
            put(routes::tasks::update_task).delete(routes::tasks::delete_task),
        )
        .route(
            "/tasks/:id/reminders",
            get(routes::reminders::list_reminders).post(routes::reminders::create_reminders),
        )
        .route(
            "/tasks/:id/reminders/:reminder_id",
            delete(routes::reminders::delete_reminder),
        )
        .route("/reminders/missed", get(routes::reminders::missed_reminders))
        .route(
            "/users/:user_id/queue",
            get(routes::queue::get_queue).post(routes::queue::add_to_queue),
        )
        .route("/users/:user_id/queue/reorder", put(routes::queue::reorder_queue))
        .route(
            "/users/:user_id/queue/:task_id",
            delete(routes::queue::remove_from_queue),
        )
        .route("/notifications", get(routes::notifications::list_notifications))
        .route(
            "/notifications/unread-count",
            get(routes::notifications::unread_count),
        )
        .route(
            "/notifications/mark-all-read",
            put(routes::notifications::mark_all_read),
        )
        .route(
            "/notifications/clear-all",
            delete(routes::notifications::clear_all),
        )
        .route("/notifications/:id/read", put(routes::notifications::mark_read))
        .route(
            "/notifications/:id",
            delete(routes::notifications::delete_notification),
        )
        .layer(middleware::from_fn(create_jwt_middleware(
            state.secrets.access.clone(),
        )));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::rate_limit::rate_limit_middleware,
        ))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(SecurityHeadersLayer::new(state.config.is_production()))
        .with_state(state)
}
