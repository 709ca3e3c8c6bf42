use std::sync::Arc;

use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use mealmate_shared::clients::{GoTrueClient, IdentityProvider, RemoteData, RestClient};
use mealmate_shared::middleware::RevokedTokens;
use mealmate_shared::QueryCache;
use mealmate_web::config::{AppConfig, DataSource};
use mealmate_web::{fixtures, router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mealmate_shared::middleware::init_tracing("mealmate-web");

    let config = AppConfig::load()?;
    let port = config.port;

    let metrics_handle = mealmate_shared::middleware::init_metrics()?;

    let (remote, identity): (Arc<dyn RemoteData>, Arc<dyn IdentityProvider>) = match config.data_source {
        DataSource::Remote => {
            tracing::info!(url = %config.supabase_url, "using hosted data store");
            let remote: Arc<dyn RemoteData> =
                Arc::new(RestClient::new(&config.supabase_url, &config.supabase_anon_key));
            let identity: Arc<dyn IdentityProvider> =
                Arc::new(GoTrueClient::new(&config.supabase_url, &config.supabase_anon_key));
            (remote, identity)
        }
        DataSource::Memory => {
            tracing::warn!("using in-memory demo data; nothing is persisted");
            let store = fixtures::demo_store().await;
            let identity = fixtures::demo_identity(&config.jwt_secret, store.clone()).await?;
            let remote: Arc<dyn RemoteData> = Arc::new(store);
            let identity: Arc<dyn IdentityProvider> = Arc::new(identity);
            (remote, identity)
        }
    };

    let state = Arc::new(AppState {
        config,
        remote,
        identity,
        cache: QueryCache::new(),
        revoked: RevokedTokens::new(),
        metrics_handle: Some(metrics_handle),
    });

    let app = router(state)
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "mealmate-web starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
