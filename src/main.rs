//! lambda-bootstrap - Example runtime binary
//!
//! Runs an uppercase handler on JSON string payloads against the control
//! plane named by `AWS_LAMBDA_RUNTIME_API`.

use lambda_bootstrap::prelude::*;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[bootstrap_handler(name = "uppercase", description = "Uppercases a JSON string")]
async fn uppercase(input: String, metadata: &InvocationMetadata) -> Result<String, HandlerError> {
    tracing::debug!(
        "Handling {} ({}ms left)",
        metadata.request_id,
        metadata.remaining_time().as_millis()
    );
    Ok(input.to_uppercase())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match BootstrapConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let handler = UppercaseHandler::new();
    tracing::info!(
        "Starting bootstrap for handler '{}' of {} against {} ({:?})",
        handler.name(),
        config.function_name.as_deref().unwrap_or("unknown function"),
        config.base_url(),
        config.initialization_type
    );

    let invoker = HandlerInvoker::with_serializer(handler, JsonSerializer);
    let mut bootstrap = Bootstrap::from_config(config, invoker).with_initializer(|hooks| async move {
        hooks.register_before_snapshot(hook_fn(|| async {
            tracing::info!("Flushing state before snapshot");
            Ok::<(), BoxError>(())
        }));
        hooks.register_after_restore(hook_fn(|| async {
            tracing::info!("Refreshing state after restore");
            Ok::<(), BoxError>(())
        }));
        Ok::<(), BoxError>(())
    });

    let _signals = bootstrap.shutdown_handle().listen_for_signals();

    match bootstrap.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
