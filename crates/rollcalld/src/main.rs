use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod clock;
mod config;
mod dbus_interface;
mod error;
mod evaluator;
mod images;
mod reconciler;
mod service;
mod store;

use dbus_interface::{AttendanceService, BUS_NAME, OBJECT_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("rollcalld starting");

    let config = config::Config::load()?;
    tracing::info!(
        db = %config.db_path.display(),
        images = %config.image_dir.display(),
        threshold = config.match_threshold,
        descriptor_dim = config.descriptor_dim,
        "configuration loaded"
    );

    let store = store::Store::open(&config.db_path).await?;
    let service = service::Service::new(store, Arc::new(clock::LocalClock), &config);

    let builder = if config.session_bus {
        zbus::connection::Builder::session()?
    } else {
        zbus::connection::Builder::system()?
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, AttendanceService::new(service))?
        .build()
        .await?;

    tracing::info!(bus = BUS_NAME, path = OBJECT_PATH, "rollcalld ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("rollcalld shutting down");

    Ok(())
}
