mod codes;
mod config;
mod deadline;
mod docgen;
mod export;
mod ledger;
mod service;
mod session;
mod stagnation;
mod store;

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(config::Config::load()?);

    let store = match &config.snapshot_path {
        Some(path) => store::JsonFileStore::open_shared(path)?,
        None => store::InMemoryStore::new_shared(),
    };
    let sessions = session::SessionStore::new_shared();
    let fetcher = docgen::HttpImageFetcher::new_shared(config.image_fetch_timeout())?;

    let svc_ctl = service::ServiceControl::new();

    ctrlc::set_handler({
        let svc_ctl = svc_ctl.clone();
        move || {
            eprintln!("Stopping all services...");
            svc_ctl.stop_all();
        }
    })?;

    let state = service::http::AppState {
        store: store.clone(),
        sessions,
        fetcher,
        config: config.clone(),
    };

    for handle in [
        svc_ctl.spawn_loop(service::http::HttpService::new(state)?),
        svc_ctl.spawn_loop(service::snapshot::SnapshotService::new(
            store.clone(),
            config.snapshot_interval(),
        )),
    ] {
        handle.join()?
    }

    // one last flush so a clean shutdown never loses accepted bids
    store.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests;
