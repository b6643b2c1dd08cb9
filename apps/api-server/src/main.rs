//! # TheJury Notification Server
//!
//! Actix-web entry point: rate-limited event intake that fans out to
//! user-registered webhooks.

use actix_web::{App, HttpServer, web};
use tracing_actix_web::TracingLogger;

mod background;
mod config;
mod handlers;
mod middleware;
mod state;
mod telemetry;

use background::{Scheduler, SchedulerConfig};
use config::AppConfig;
use state::AppState;
use telemetry::TelemetryConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env();

    tracing::info!(
        "Starting TheJury API Server on {}:{}",
        config.host,
        config.port
    );

    let (state, backends) = AppState::build(&config).await?;

    let mut scheduler = start_scheduler(&config, &backends).await;

    HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(|cfg| handlers::configure_routes(cfg, &state))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    if let Some(scheduler) = scheduler.as_mut() {
        if let Err(e) = scheduler.shutdown().await {
            tracing::error!("Failed to stop scheduler: {}", e);
        }
    }

    tracing::info!(
        in_flight = backends.webhooks.in_flight(),
        "Draining webhook deliveries"
    );
    backends.webhooks.drain(config.shutdown_grace).await;

    Ok(())
}

/// Schedule the idle bucket sweep when rate limits live in process memory.
async fn start_scheduler(config: &AppConfig, backends: &state::Backends) -> Option<Scheduler> {
    let limiter = backends.memory_limiter.clone()?;

    let scheduler = match Scheduler::new(SchedulerConfig::from_env()).await {
        Ok(scheduler) => scheduler,
        Err(e) => {
            tracing::error!("Failed to create scheduler: {}", e);
            return None;
        }
    };

    let settings = config.rate_limits;
    let registered = background::register_rate_limit_sweep(
        &scheduler,
        limiter,
        settings.cleanup_period,
        settings.max_age,
    )
    .await;

    if let Err(e) = registered {
        tracing::error!("Failed to register rate limit sweep: {}", e);
        return None;
    }

    if let Err(e) = scheduler.start().await {
        tracing::error!("Failed to start scheduler: {}", e);
        return None;
    }

    Some(scheduler)
}
