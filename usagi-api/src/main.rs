use std::net::SocketAddr;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use crate::{app_state::AppState, config::read_config, domain::search::SolrIndexClient};

mod app_state;
mod auth;
mod config;
mod domain;
mod repositories;
mod router;
mod routes;
#[cfg(test)]
mod test_support;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::from_filename("./usagi-api/.env.local").ok();
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,usagi_api=debug,solr=debug,tower_http=info".into()),
        )
        .init();

    let config = read_config()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect_with(config.database.with_db())
        .await?;
    sqlx::migrate!().run(&pool).await?;
    tracing::info!(database = %config.database.database_name, "Connected to database");

    let solr = solr::SolrClient::new(
        config.search.solr_url.clone(),
        config.search.core.clone(),
        config.search.timeout(),
    )?;
    let index = SolrIndexClient::new(solr, config.search.max_results);

    let app_state = AppState::new(pool, index, config.search.mapping_settings());
    let app = router::create(app_state, &config);

    let addr: SocketAddr = format!("{}:{}", config.application.host, config.application.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
