use anyhow::Context;
use clap::Parser;
use loyaltyd::accrual::AccrualClient;
use loyaltyd::auth::{self, SessionTokens};
use loyaltyd::config::Config;
use loyaltyd::db::Database;
use loyaltyd::gateway::{self, state::AppState};
use loyaltyd::logging;
use loyaltyd::pipeline::Dispatcher;
use loyaltyd::service::{BalanceService, OrderService, UserService};
use loyaltyd::store::Store;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    let _log_guard = logging::init_logging(&config);
    debug!("config and logging ready");

    let secret = match config.token_secret.clone() {
        Some(secret) => secret,
        None => {
            warn!("no token secret configured; sessions will not survive a restart");
            auth::generate_secret()
        }
    };

    let db = Database::connect(&config.database_uri, config.db_pool_size)
        .await
        .context("connecting database")?;
    db.run_migrations().await.context("applying migrations")?;
    let db = Arc::new(db);

    let store = Arc::new(Store::new(db.pool().clone(), config.db_timeout()));
    let tokens = Arc::new(SessionTokens::new(secret, config.token_ttl()));
    let users = UserService::new(store.clone(), tokens);
    let orders = OrderService::new(store.clone());
    let balances = BalanceService::new(store);

    let dispatcher = Dispatcher::new(
        orders.clone(),
        AccrualClient::new(config.accrual_addr.clone()),
        config.workers,
        config.ping_interval(),
    );
    let stop = dispatcher.stop_handle();
    let pipeline = tokio::spawn(dispatcher.run());

    let state = AppState {
        db,
        users,
        orders,
        balances,
    };
    let app = gateway::build_router(state);

    let listener = TcpListener::bind(&config.run_addr)
        .await
        .with_context(|| format!("binding {}", config.run_addr))?;
    info!(
        addr = %config.run_addr,
        accrual = %config.accrual_addr,
        workers = config.workers,
        "loyaltyd starting"
    );

    // One shared shutdown signal: the HTTP server drains on it, and the main
    // task sequences the pipeline stop after it.
    let (signal_tx, mut signal_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = signal_tx.send(true);
    });

    let mut http_signal = signal_rx.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = http_signal.wait_for(|fired| *fired).await;
            })
            .await
    });

    tokio::select! {
        _ = signal_rx.wait_for(|fired| *fired) => {
            info!("shutdown signal received");
            match tokio::time::timeout(config.shutdown_grace(), &mut server).await {
                Ok(Ok(Ok(()))) => debug!("http server drained"),
                Ok(Ok(Err(err))) => warn!(error = %err, "http server exited with error"),
                Ok(Err(err)) => warn!(error = %err, "http server task failed"),
                Err(_) => warn!("http drain exceeded its budget, abandoning open connections"),
            }
        }
        res = &mut server => {
            // The server died without a signal; shut the pipeline down and
            // report the failure.
            stop.stop();
            let _ = tokio::time::timeout(config.shutdown_ceiling(), pipeline).await;
            match res {
                Ok(Ok(())) => anyhow::bail!("http server exited unexpectedly"),
                Ok(Err(err)) => return Err(err).context("http server error"),
                Err(err) => anyhow::bail!("http server task failed: {err}"),
            }
        }
    }

    info!("stopping accrual pipeline");
    stop.stop();
    match tokio::time::timeout(config.shutdown_ceiling(), pipeline).await {
        Ok(Ok(())) => info!("shutdown complete"),
        Ok(Err(err)) => anyhow::bail!("pipeline task failed: {err}"),
        Err(_) => anyhow::bail!("shutdown ceiling elapsed before the pipeline drained"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
