use axum::{
    routing::{get, post},
    Router,
};
use dotenvy::dotenv;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config_store;
mod db;
mod error;
mod external;
mod state;


use config_store::ConfigStore;
use external::PgLotSource;
use state::AppState;

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Coleta backend...");

    let database_path = env::var("COLETA_DB").unwrap_or_else(|_| "coleta_estoque.db".to_string());
    let pool = match db::init_pool(&database_path).await {
        Ok(pool) => {
            if let Err(e) = db::init_database(&pool).await {
                tracing::error!("Failed to create count schema: {}", e);
                return;
            }
            tracing::info!("Count database ready at {}", database_path);
            pool
        }
        Err(e) => {
            tracing::error!("Failed to open count database: {}", e);
            return;
        }
    };

    let config_path = env::var("COLETA_DB_CONFIG").unwrap_or_else(|_| "db_config.json".to_string());
    let config = Arc::new(ConfigStore::new(config_path));

    let app_state = AppState {
        pool,
        config: config.clone(),
        lots: Arc::new(PgLotSource::new(config)),
    };

    let app = Router::new()
        .route("/", get(commands::settings::index))
        .route(
            "/settings",
            get(commands::settings::get_settings).post(commands::settings::save_settings),
        )
        .route("/search_product", post(commands::count::search_product))
        .route("/add_to_count", post(commands::count::add_to_count))
        // Same handler: selecting a lot in the UI and scanning it are one flow.
        .route("/add_to_selected_lot", post(commands::count::add_to_count))
        .route(
            "/add_to_last_counted_lot",
            post(commands::count::add_to_last_counted_lot),
        )
        .route(
            "/get_counted_products",
            get(commands::count::get_counted_products),
        )
        .route(
            "/update_counted_product",
            post(commands::count::update_counted_product),
        )
        .route(
            "/delete_counted_product",
            post(commands::count::delete_counted_product),
        )
        .route(
            "/clear_counted_products",
            post(commands::count::clear_counted_products),
        )
        .route(
            "/generate_import_file",
            get(commands::export::generate_import_file),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state);

    let port = env::var("PORT").unwrap_or_else(|_| "5000".to_string());
    let addr_str = format!("0.0.0.0:{}", port);
    let addr = addr_str.parse::<SocketAddr>().expect("Invalid address");

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
