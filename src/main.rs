use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::panic;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tasklane_realtime::clients::app_service_client::AppServiceClient;
use tasklane_realtime::config::{self, Config};
use tasklane_realtime::docs::ApiDoc;
use tasklane_realtime::routes::api::create_api_routes;
use tasklane_realtime::services::authorizer::{AllowAllAuthorizer, RoomAuthorizer};
use tasklane_realtime::state::AppState;
use tasklane_realtime::store::{MemoryStore, RedisStore, SharedStore};
use tasklane_realtime::websocket::handler::websocket_handler;
use tasklane_realtime::ws::RelayListener;

#[tokio::main]
async fn main() {
    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Default to info level, but allow debug for our app
            "tasklane_realtime=debug,tower_http=debug,axum::rejection=trace,info".into()
        }))
        .init();

    info!("Starting server...");

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });
    config::init_config(config.clone());

    // Connect the shared store if a URL is provided
    let store: Arc<dyn SharedStore> = match &config.redis_url {
        Some(url) => match RedisStore::connect(url).await {
            Ok(store) => {
                info!("Shared store connected");
                Arc::new(store)
            }
            Err(e) => {
                error!("Failed to connect shared store: {}", e);
                warn!("Falling back to in-process store - locks and presence are local to this process");
                Arc::new(MemoryStore::new())
            }
        },
        None => {
            warn!("No REDIS_URL configured - locks and presence are local to this process");
            Arc::new(MemoryStore::new())
        }
    };

    // Wire the room authorizer against the application service
    let authorizer: Arc<dyn RoomAuthorizer> =
        match (&config.app_service_url, &config.cloud_auth_jwt_secret) {
            (Some(url), Some(secret)) => Arc::new(AppServiceClient::new(
                url.clone(),
                secret.clone(),
                config.cloud_service_name.clone(),
            )),
            _ => Arc::new(AllowAllAuthorizer::new()),
        };

    let app_state = AppState::build(config.clone(), store.clone(), authorizer);

    // Start the cross-process relay listener
    let _relay = match RelayListener::start(
        store,
        app_state.registry.clone(),
        app_state.broadcaster.clone(),
        app_state.broadcaster.origin(),
    )
    .await
    {
        Ok(listener) => Some(listener),
        Err(e) => {
            warn!("Relay listener unavailable, delivery is local only: {}", e);
            None
        }
    };

    // Create API routes
    let api_routes = create_api_routes(app_state.clone());

    // Combine all routes
    let app_routes = Router::new()
        // Mount the WebSocket endpoint
        .route("/ws", get(websocket_handler))
        .with_state(app_state)
        // Mount API routes
        .nest("/api", api_routes)
        // Mount Swagger UI
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add tracing layer
        .layer(TraceLayer::new_for_http());

    // Start the HTTP server
    let listener = tokio::net::TcpListener::bind(config.server_address())
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to {}", config.server_address()));

    info!("🚀 Server running on http://{}", config.server_address());
    info!(
        "📡 WebSocket available at ws://{}/ws",
        config.server_address()
    );
    info!(
        "📚 Swagger UI available at http://{}/swagger",
        config.server_address()
    );

    axum::serve(
        listener,
        app_routes.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server failed to start");
}
