// lit-af: desktop shell for a lit node.
//
// Startup connects to the node, republishes its RPC on a local websocket
// proxy and opens the GUI window pointed at that proxy.

// Declare modules
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod lndc;
pub mod proxy;
pub mod rpc;
pub mod shell;

use anyhow::Context;
use log::{error, info};
use tokio::runtime::Runtime;

use config::AppConfig;
use proxy::ProxyHandle;

/// Process entry point: parse flags, bootstrap, serve, show the window.
/// Any bootstrap failure exits with status 1.
pub fn run() {
    let config = match AppConfig::from_args(std::env::args_os()) {
        Ok(config) => config,
        Err(e) => e.exit(),
    };
    init_logging(config.debug);

    if let Err(e) = run_app(config) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `-d`
fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn run_app(config: AppConfig) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let connection = runtime.block_on(bootstrap::connect(&config))?;

    let proxy = match runtime.block_on(proxy::start_proxy(connection.client.clone(), &config.proxy)) {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!(
                "Websocket proxy could not listen on {}:{}: {}",
                config.proxy.bind_host, config.proxy.bind_port, e
            );
            None
        }
    };

    run_shell(&runtime, &config, proxy)
}

#[cfg(feature = "desktop")]
fn run_shell(runtime: &Runtime, config: &AppConfig, proxy: Option<ProxyHandle>) -> anyhow::Result<()> {
    tauri::async_runtime::set(runtime.handle().clone());
    info!("Opening window at {}", config.homepage_url());
    shell::run_window(config, config.proxy.bind_port, proxy)
}

#[cfg(not(feature = "desktop"))]
fn run_shell(runtime: &Runtime, _config: &AppConfig, proxy: Option<ProxyHandle>) -> anyhow::Result<()> {
    info!("No window in this build; serving until Ctrl-C");
    runtime.block_on(async {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
        if let Some(proxy) = proxy {
            proxy.shutdown().await;
        }
        info!("Shut down");
        Ok(())
    })
}
