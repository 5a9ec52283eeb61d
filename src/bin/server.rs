//! fandian-server: the shared list store.
//!
//! Usage: fandian-server [--config <path>]
//!
//! Port, backend and data file can also be set with `FANDIAN_PORT`,
//! `FANDIAN_BACKEND` and `FANDIAN_DATA_FILE`.

use std::path::PathBuf;

use anyhow::{bail, Result};
use fandian::config::Config;
use fandian::{server, storage};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = match config_arg()? {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };
    config.server.apply_env();

    let store = storage::open_server_store(&config.server, &config.storage)?;
    server::serve(&config.server, store).await
}

fn config_arg() -> Result<Option<PathBuf>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => Ok(None),
        [flag, path] if flag == "--config" => Ok(Some(PathBuf::from(path))),
        _ => bail!("Usage: fandian-server [--config <path>]"),
    }
}
