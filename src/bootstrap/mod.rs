//! Connection Bootstrap
//!
//! Run once at startup: parse the connection string, pick a strategy,
//! load keys when needed and open the node connection.

pub mod address;
pub mod keys;
pub mod strategy;

pub use address::{ConnectionTarget, Host, RemoteAddress, DEFAULT_NODE_PORT};
pub use keys::{KeyFileProvider, KeyPair, KeyProvider, KEY_FILE_NAME};
pub use strategy::{establish, select_strategy, Connection, ConnectionStrategy};

use log::info;

use crate::config::AppConfig;
use crate::error::BootstrapResult;
use crate::rpc::LndcConnector;

/// Connect to the node described by `config`
pub async fn connect(config: &AppConfig) -> BootstrapResult<Connection> {
    let target = ConnectionTarget::parse(&config.connection)?;
    let connector = LndcConnector::default();
    let keys = KeyFileProvider::new(&config.data_dir);

    let connection = establish(&target, &config.data_dir, &connector, &keys).await?;
    info!(
        "Connected to node {} ({})",
        connection.client.remote_address(),
        connection.strategy
    );
    Ok(connection)
}
