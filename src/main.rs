use {
    candle_feeder::{Cli, Shutdown, run_app},
    clap::Parser,
    std::panic,
    tokio::sync::broadcast,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::force_capture();
        log::error!("CRITICAL PANIC:\n{}\nStack Trace:\n{}", info, backtrace);
    }));

    let (global_level, my_code_level) = if cfg!(debug_assertions) {
        (log::LevelFilter::Warn, log::LevelFilter::Debug)
    } else {
        (log::LevelFilter::Warn, log::LevelFilter::Info)
    };

    let mut builder = env_logger::Builder::new();
    builder
        .filter(None, global_level)
        .filter(Some("candle_feeder"), my_code_level)
        .parse_default_env()
        .init();

    let args = Cli::parse();

    let (notify_shutdown, _) = broadcast::channel(1);
    let shutdown = Shutdown::new(notify_shutdown.subscribe());
    tokio::spawn(async move {
        wait_for_signal().await;
        log::info!("Shutdown requested");
        let _ = notify_shutdown.send(());
    });

    run_app(args, shutdown).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            log::warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
