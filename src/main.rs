use quiz_engine::{
    config::{get_config, init_config},
    database::pool::create_pool,
    utils::time::now,
    AppState,
};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    init_config()?;
    let config = get_config();
    info!("Grading policy: {}", config.grading);

    let pool = create_pool().await?;
    let app_state = AppState::new(pool, config.grading);

    let sweeper = {
        let state = app_state.clone();
        let interval = Duration::from_secs(config.sweep_interval_secs.max(1));
        let grace_secs = config.abandon_grace_secs;
        tokio::spawn(async move {
            loop {
                match state.attempt_service.abandon_expired(now(), grace_secs).await {
                    Ok(0) => {}
                    Ok(n) => info!("Abandoned {} expired attempt(s)", n),
                    Err(e) => tracing::error!("Expiry sweep error: {:?}", e),
                }
                tokio::time::sleep(interval).await;
            }
        })
    };

    info!(
        "Attempt expiry sweeper running every {}s (grace {}s)",
        config.sweep_interval_secs, config.abandon_grace_secs
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    sweeper.abort();
    app_state.pool.close().await;

    Ok(())
}
