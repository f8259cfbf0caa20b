mod api;
mod explorer;
mod generator;
mod middleware;
mod videos;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    generator::RecipeGenerator,
    middleware::AuthState,
    videos::VideoDataService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(chefclip_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = chefclip_db::PoolConfig {
        max_connections: config.db_max_connections,
        min_connections: config.db_min_connections,
        acquire_timeout_secs: config.db_acquire_timeout_secs,
    };
    let pool = chefclip_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = chefclip_db::run_migrations(&pool).await?;
    tracing::info!(applied, "database migrations up to date");

    let prompt = Arc::new(chefclip_core::load_prompt_config(&config.prompt_path)?);

    let youtube = Arc::new(
        chefclip_youtube::YoutubeClient::new(
            config.youtube_request_timeout_secs,
            &config.youtube_user_agent,
        )?
        .with_retry_policy(
            config.youtube_max_retries,
            config.youtube_retry_backoff_base_ms,
        ),
    );

    let gemini_api_key = config
        .gemini_api_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY is required to run the server"))?;
    let gemini = Arc::new(chefclip_gemini::GeminiClient::new(
        &gemini_api_key,
        &config.gemini_model,
        config.gemini_request_timeout_secs,
    )?);

    let videos = Arc::new(VideoDataService::new(
        pool.clone(),
        youtube,
        config.youtube_max_comments,
        config.transcript_language.clone(),
    ));
    let generator = Arc::new(RecipeGenerator::new(
        pool.clone(),
        Arc::clone(&videos),
        gemini,
        prompt,
    ));

    let auth = AuthState::from_env(matches!(
        config.env,
        chefclip_core::Environment::Development
    ))?;
    let app = build_app(
        AppState {
            pool,
            generator,
            videos,
        },
        auth,
        default_rate_limit_state(),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "chefclip server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
