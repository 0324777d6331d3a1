use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};

use sms_relay::broker::{AmqpBroker, AmqpProbe};
use sms_relay::config::RelayConfig;
use sms_relay::consumer::Consumer;
use sms_relay::discovery::ServiceRegistry;
use sms_relay::error::Result;
use sms_relay::gateway::{SmsGateway, TwilioClient};
use sms_relay::health::{GatewayProbe, HealthState, health_routes};
use sms_relay::pipeline::{Dispatcher, EventClassifier};

/// Which shells this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Consume,
    Health,
    All,
}

impl Mode {
    fn from_args() -> Option<Self> {
        match std::env::args().nth(1).as_deref() {
            None | Some("all") => Some(Self::All),
            Some("consume") => Some(Self::Consume),
            Some("health") => Some(Self::Health),
            Some(_) => None,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let Some(mode) = Mode::from_args() else {
        eprintln!("Usage: sms-relay [consume|health|all]");
        return ExitCode::FAILURE;
    };

    match run(mode).await.context("SMS relay terminated") {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(mode: Mode) -> Result<()> {
    let config = RelayConfig::from_env()?;
    info!(version = env!("CARGO_PKG_VERSION"), mode = ?mode, "Starting SMS relay");

    let gateway: Option<Arc<dyn SmsGateway>> = match &config.gateway {
        Some(gateway_config) => {
            info!(account_sid = %gateway_config.account_sid, "Twilio configured");
            Some(Arc::new(TwilioClient::new(gateway_config)))
        }
        None => {
            warn!("Twilio not configured - SMS will only be logged");
            None
        }
    };

    match mode {
        Mode::Consume => run_consumer(&config, gateway).await,
        Mode::Health => run_health_server(&config, gateway).await,
        Mode::All => {
            let health_config = config.clone();
            let health_gateway = gateway.clone();
            tokio::spawn(async move {
                if let Err(e) = run_health_server(&health_config, health_gateway).await {
                    error!(error = %e, "Health server stopped");
                }
            });
            run_consumer(&config, gateway).await
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_consumer(config: &RelayConfig, gateway: Option<Arc<dyn SmsGateway>>) -> Result<()> {
    let registry = config
        .discovery
        .enabled
        .then(|| ServiceRegistry::new(&config.discovery));
    if let Some(registry) = &registry {
        match registry.register().await {
            Ok(()) => info!(
                agent = %config.discovery.agent_url(),
                "Registered with Consul as sms-service"
            ),
            Err(e) => error!(error = %e, "Failed to register with Consul"),
        }
    }

    let broker = AmqpBroker::connect(&config.broker).await?;

    let from_number = config
        .gateway
        .as_ref()
        .and_then(|g| g.from_number.clone());
    let dispatcher = match gateway {
        Some(gateway) => Dispatcher::new(gateway, from_number),
        None => Dispatcher::simulated(),
    };
    let classifier = EventClassifier::new(&config.recipients);

    let result = Consumer::new(broker, classifier, dispatcher)
        .run_until(shutdown_signal())
        .await;

    if let Some(registry) = &registry {
        if let Err(e) = registry.deregister().await {
            warn!(error = %e, "Failed to deregister from Consul");
        } else {
            info!("Deregistered from Consul");
        }
    }

    result?;
    Ok(())
}

async fn run_health_server(
    config: &RelayConfig,
    gateway: Option<Arc<dyn SmsGateway>>,
) -> Result<()> {
    let state = HealthState::new(
        Arc::new(AmqpProbe::new(config.broker.url.clone())),
        Arc::new(GatewayProbe::new(gateway)),
    );
    let app = health_routes(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http.port)).await?;
    info!(port = config.http.port, "Health server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Stopped by signal");
}
