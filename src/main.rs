#[macro_use]
extern crate tracing;

mod cli;
mod net;

use clap::Parser;
use std::sync::Arc;

use quasar_core::cnf::Config;
use quasar_core::meta::{Catalog, JobManager, MetaCache, SnapshotCoordinator};
use quasar_core::store::StorageNode;

fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = cli::Cli::parse();
	match args.command {
		cli::Command::Version => {
			println!("quasar {}", env!("CARGO_PKG_VERSION"));
			Ok(())
		}
		cli::Command::Start {
			config,
			bind,
			data_dir,
		} => {
			let config = match config {
				Some(path) => Config::from_file(path)?,
				None => Config::default(),
			};
			init_tracing(&config);
			let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
			runtime.block_on(serve(config, bind, data_dir))
		}
	}
}

fn init_tracing(config: &Config) {
	use tracing_subscriber::EnvFilter;
	let level = config.get_str("log_level").unwrap_or("info").to_string();
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
	tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn serve(
	config: Config,
	bind: String,
	data_dir: std::path::PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
	// The in-process cluster: catalog, cache, one storage node, and
	// the snapshot coordinator over them
	let catalog = Arc::new(Catalog::new());
	let cache = Arc::new(MetaCache::new(catalog.clone())?);
	let jobs = Arc::new(JobManager::new());
	let _coordinator = SnapshotCoordinator::new(catalog.clone(), jobs);

	let addr = config.get_str("storage_addr").unwrap_or("127.0.0.1:44500").to_string();
	catalog.register_host(&addr)?;
	let _node = Arc::new(StorageNode::new(addr, cache.clone(), data_dir));
	cache.refresh()?;

	let state = net::AdminState {
		cache,
		http: reqwest::Client::new(),
	};
	let listener = tokio::net::TcpListener::bind(&bind).await?;
	info!("admin surface listening on {bind}");
	axum::serve(listener, net::router(state))
		.with_graceful_shutdown(async {
			let _ = tokio::signal::ctrl_c().await;
			info!("shutting down");
		})
		.await?;
	Ok(())
}
