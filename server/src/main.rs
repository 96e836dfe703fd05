use std::sync::Arc;

use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use antrian_server::config::Config;
use antrian_server::queue::{QueueCalendar, QueueService, SystemClock};
use antrian_server::routes::create_routes;
use antrian_server::state::AppState;
use antrian_server::store::PgTicketStore;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "antrian_server=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    let store = PgTicketStore::new(pool, config.allocation_timeout);
    let calendar = QueueCalendar::new(Arc::new(SystemClock), config.utc_offset);
    let queue = QueueService::new(Arc::new(store), calendar, config.allocation_timeout);

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState {
        queue,
        config: Arc::new(config),
    };
    let app: Router = create_routes(state);

    tracing::info!("Server running at http://{}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
