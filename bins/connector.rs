use dotenvy::dotenv;
use tracing::{error, info, warn};
use uuid::Uuid;

fn main() -> std::process::ExitCode {
    // .env first so RUST_LOG, CONFIG_PATH and MULTIMAP_ENDPOINT apply
    dotenv().ok();

    let loaded = connector::bootstrap::load_config();
    let format = loaded
        .as_ref()
        .map(|(cfg, _)| cfg.logging.format.clone())
        .unwrap_or_else(|_| "compact".to_string());
    common::utils::logging::init_logging(&format);
    info!(service = "connector", event = "logger_init", "tracing subscriber initialized");

    let cfg = match loaded {
        Ok((cfg, fallback)) => {
            if let Some(reason) = fallback {
                warn!(service = "connector", event = "config_fallback", %reason, "config file not loaded; using defaults and environment");
            }
            cfg
        }
        Err(e) => {
            error!(service = "connector", event = "config_invalid", error = %e, "cannot start without a valid configuration");
            return std::process::ExitCode::FAILURE;
        }
    };

    let service_id = Uuid::new_v4();
    let pid = std::process::id();
    let version = env!("CARGO_PKG_VERSION");

    std::panic::set_hook(Box::new({
        let service_id = service_id;
        move |info| {
            error!(
                service = "connector",
                event = "panic",
                %service_id,
                pid,
                message = %info,
                "unhandled panic occurred"
            );
        }
    }));

    let workers = cfg.connector.workers;
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "connector", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return std::process::ExitCode::FAILURE;
        }
    };

    info!(
        service = "connector",
        event = "start",
        %service_id,
        pid,
        version,
        endpoint = %cfg.connector.endpoint,
        workers,
        "connector starting"
    );

    rt.block_on(async move {
        let run = tokio::spawn(connector::bootstrap::run(cfg));

        tokio::select! {
            res = run => match res {
                Ok(Ok(stats)) => {
                    info!(
                        service = "connector",
                        event = "stop",
                        %service_id,
                        pid,
                        processed = stats.processed,
                        failed = stats.failed,
                        responses = stats.responses,
                        "input drained, connector stopped"
                    );
                    std::process::ExitCode::SUCCESS
                }
                Ok(Err(e)) => {
                    error!(service = "connector", event = "run_failed", error = %e, "connector run returned error");
                    std::process::ExitCode::FAILURE
                }
                Err(e) => {
                    error!(service = "connector", event = "task_join_error", error = %e, "connector task join error");
                    std::process::ExitCode::FAILURE
                }
            },
            _ = tokio::signal::ctrl_c() => {
                // in-flight messages are abandoned with the runtime
                info!(service = "connector", event = "shutdown_signal", %service_id, pid, "received Ctrl+C, shutting down");
                std::process::ExitCode::SUCCESS
            }
        }
    })
}
