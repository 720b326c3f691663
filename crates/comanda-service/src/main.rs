//! Main entry point for the Comanda service.
//!
//! Loads the configuration, builds the engine with the configured storage and
//! account implementations, and serves the HTTP API next to the background
//! expiry sweep.

use clap::Parser;
use comanda_config::Config;
use comanda_core::{ComandaBuilder, ComandaEngine, ComandaFactories};
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

use comanda_account::implementations::local::create_auth as create_local_auth;
use comanda_storage::implementations::file::create_storage as create_file_storage;
use comanda_storage::implementations::memory::create_storage as create_memory_storage;

/// Command-line arguments for the Comanda service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", env = "COMANDA_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started comanda");

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = Arc::new(build_engine(config.clone())?);

	match config.api.clone().filter(|api| api.enabled) {
		Some(api_config) => {
			let api_engine = Arc::clone(&engine);

			tokio::select! {
				result = engine.run() => {
					tracing::info!("Engine finished");
					result?;
				}
				result = server::start_server(api_config, api_engine) => {
					tracing::info!("API server finished");
					result?;
				}
			}
		},
		None => {
			tracing::info!("API disabled, running expiry sweep only");
			engine.run().await?;
		},
	}

	tracing::info!("Stopped comanda");
	Ok(())
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

/// Builds the engine with every storage and account implementation available.
fn build_engine(config: Config) -> Result<ComandaEngine, Box<dyn std::error::Error>> {
	let storage_factories = create_factory_map!(
		comanda_storage::StorageInterface,
		comanda_storage::StorageError,
		"file" => create_file_storage,
		"memory" => create_memory_storage,
	);

	let auth_factories = create_factory_map!(
		comanda_account::AuthInterface,
		comanda_account::AuthError,
		"local" => create_local_auth,
	);

	let factories = ComandaFactories {
		storage_factories,
		auth_factories,
	};

	Ok(ComandaBuilder::new(config).build(factories)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	#[test]
	fn test_args_defaults() {
		let args = Args::parse_from(["comanda"]);
		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
	}

	#[test]
	fn test_args_custom_values() {
		let args = Args::parse_from(["comanda", "--config", "prod.toml", "-l", "debug"]);
		assert_eq!(args.config, PathBuf::from("prod.toml"));
		assert_eq!(args.log_level, "debug");
	}

	#[test]
	fn test_create_factory_map_multiple_entries() {
		let factories = create_factory_map!(
			comanda_storage::StorageInterface,
			comanda_storage::StorageError,
			"memory" => create_memory_storage,
			"file" => create_file_storage,
		);

		assert_eq!(factories.len(), 2);
		assert!(factories.contains_key("memory"));
		assert!(factories.contains_key("file"));
	}

	#[tokio::test]
	async fn test_build_engine_from_file_config() {
		let temp_dir = tempdir().unwrap();
		let storage_dir = temp_dir.path().join("storage");
		let config_path = temp_dir.path().join("comanda.toml");
		std::fs::write(
			&config_path,
			format!(
				r#"
[service]
id = "file-backed"

[storage]
primary = "file"
cleanup_interval_seconds = 120
[storage.implementations.file]
storage_path = "{}"

[account]
primary = "local"
[account.implementations.local]
min_password_length = 8

[api]
enabled = true
port = 8080
"#,
				storage_dir.display()
			),
		)
		.unwrap();

		let config = Config::from_file(&config_path).await.unwrap();
		assert_eq!(config.api.as_ref().map(|api| api.port), Some(8080));

		let engine = build_engine(config).unwrap();
		assert_eq!(engine.config().service.id, "file-backed");

		let profile = engine
			.guest("kiosk")
			.create_temp_profile(Default::default())
			.await
			.unwrap();
		assert_eq!(
			engine.guest("kiosk").get_temp_profile().await,
			Some(profile)
		);
	}

	#[test]
	fn test_build_engine_rejects_unknown_primary() {
		let config: Config = r#"
[service]
id = "x"
[storage]
primary = "redis"
[storage.implementations.redis]
[account]
primary = "local"
[account.implementations.local]
"#
		.parse()
		.unwrap();
		assert!(build_engine(config).is_err());
	}
}
