use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use happynest_core::{
    api::{self, AppState},
    scheduler::SchedulerService,
    storage::Database,
    AppConfig, DigestService,
};

/// Run the HTTP server (and the scheduled digest, if enabled) until Ctrl+C
pub async fn run(db: Database, config: Arc<AppConfig>) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let digest = match DigestService::from_config(&config, db.clone()) {
        Ok(service) => Some(Arc::new(service)),
        Err(e) => {
            warn!("Digest endpoints disabled: {}", e);
            None
        }
    };

    let scheduler = digest.as_ref().map(|service| {
        let scheduler = SchedulerService::new(service.clone(), &config.digest);
        tokio::spawn(scheduler.run(shutdown_rx.clone()))
    });

    let app = api::router(AppState { db, digest }, &config);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    println!("HappyNest serving on http://{}. Press Ctrl+C to stop.", addr);

    let mut server_shutdown = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    if let Some(handle) = scheduler {
        handle.await?;
    }

    println!("Server stopped.");
    Ok(())
}
