use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use tracing::info;
use vaultd_core::backend::data_service::{MockDataService, UnixDataService};
use vaultd_core::backend::notification_service::MockNotificationService;
use vaultd_core::backend::random_service::OsRandomService;
use vaultd_core::backend::DataServiceClient;
use vaultd_core::{serve_clients, serve_control, Instance, InstanceConfig};
use vaultd_wire::EntityId;

/// Runs a vaultd agent: accepts client connections on `--client-addr` and
/// administrative connections on `--control-addr`.
#[derive(Debug, Parser)]
struct Args {
	/// Placeholder entity id used only until the supervisor installs the
	/// real identity over the control channel via `PRIVATE_KEY_SET`.
	/// Generated randomly if omitted.
	#[arg(long)]
	agent_id: Option<String>,

	#[arg(long, default_value = "127.0.0.1:2930")]
	client_addr: SocketAddr,

	#[arg(long, default_value = "127.0.0.1:2931")]
	control_addr: SocketAddr,

	/// Unix socket for the real data service. Falls back to an in-memory
	/// mock when omitted, useful for local development.
	#[arg(long)]
	data_service_socket: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.init();

	let args = Args::parse();
	let agent_id = match args.agent_id {
		Some(raw) => EntityId::from(uuid::Uuid::parse_str(&raw).wrap_err("invalid --agent-id")?),
		None => EntityId::random(),
	};
	info!(%agent_id, "starting vaultd");

	let data_service: Arc<dyn DataServiceClient> = match &args.data_service_socket {
		Some(path) => Arc::new(
			UnixDataService::connect(path)
				.await
				.wrap_err("failed to connect to data service")?,
		),
		None => {
			info!("no --data-service-socket given, using in-memory mock data service");
			Arc::new(MockDataService::new())
		}
	};

	let instance = Instance::new(InstanceConfig {
		agent_id,
		data_service,
		notification_service: Arc::new(MockNotificationService::new()),
		random_service: Arc::new(OsRandomService),
	});

	let client_listener = tokio::net::TcpListener::bind(args.client_addr)
		.await
		.wrap_err("failed to bind client address")?;
	info!(addr = %args.client_addr, "listening for client connections");

	let control_listener = tokio::net::TcpListener::bind(args.control_addr)
		.await
		.wrap_err("failed to bind control address")?;
	info!(addr = %args.control_addr, "listening for control connections");

	let _: ((), ()) = tokio::try_join!(
		async { serve_clients(Arc::clone(&instance), client_listener).await.map_err(Into::into) },
		async { serve_control(instance, control_listener).await.map_err(Into::into) },
	)?;

	Ok(())
}
