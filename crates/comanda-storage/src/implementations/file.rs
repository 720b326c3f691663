//! File-based storage backend.
//!
//! One file per key under a base directory. Every file starts with a small
//! header carrying the expiry timestamp, so TTLs survive restarts and the
//! cleanup sweep can drop expired guest data without parsing payloads.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use comanda_types::{
	Clock, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, StorageKey,
	SystemClock, ValidationError,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;

/// Fixed-size header written before every payload.
///
/// Layout (32 bytes):
/// - `[0..4]`: magic `"CMDA"`
/// - `[4..6]`: format version, little-endian `u16`
/// - `[6..14]`: expiry as Unix seconds, little-endian `u64`, `0` = never
/// - `[14..32]`: reserved, zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileHeader {
	expires_at: u64,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"CMDA";
	const VERSION: u16 = 1;
	const SIZE: usize = 32;

	fn new(now: u64, ttl: Duration) -> Self {
		let expires_at = if ttl.is_zero() {
			0
		} else {
			now.saturating_add(ttl.as_secs())
		};
		Self { expires_at }
	}

	fn encode(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&Self::VERSION.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.expires_at.to_le_bytes());
		bytes
	}

	/// Splits a file into header and payload.
	fn decode(data: &[u8]) -> Result<(Self, &[u8]), StorageError> {
		if data.len() < Self::SIZE || &data[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("Missing storage header".into()));
		}

		let version = u16::from_le_bytes([data[4], data[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}

		let mut expires = [0u8; 8];
		expires.copy_from_slice(&data[6..14]);
		let header = Self {
			expires_at: u64::from_le_bytes(expires),
		};
		Ok((header, &data[Self::SIZE..]))
	}

	fn is_expired(&self, now: u64) -> bool {
		self.expires_at != 0 && now >= self.expires_at
	}
}

/// Default TTLs per namespace, applied when a write does not pass one.
#[derive(Debug, Clone, Default)]
pub struct TtlConfig {
	ttls: HashMap<StorageKey, Duration>,
}

impl TtlConfig {
	/// Reads `ttl_<namespace>` integers (seconds) from the backend table.
	fn from_config(config: &toml::Value) -> Self {
		let ttls = StorageKey::all()
			.filter_map(|key| {
				config
					.get(format!("ttl_{}", key.as_str()))
					.and_then(|v| v.as_integer())
					.and_then(|secs| u64::try_from(secs).ok())
					.map(|secs| (key, Duration::from_secs(secs)))
			})
			.collect();
		Self { ttls }
	}

	fn ttl_for_key(&self, key: &str) -> Duration {
		// "guest_profiles:device-1" -> "guest_profiles"
		key.split(':')
			.next()
			.and_then(|namespace| namespace.parse::<StorageKey>().ok())
			.and_then(|namespace| self.ttls.get(&namespace).copied())
			.unwrap_or(Duration::ZERO)
	}
}

/// File-based storage implementation.
pub struct FileStorage {
	base_path: PathBuf,
	ttl_config: TtlConfig,
	clock: Arc<dyn Clock>,
}

impl FileStorage {
	pub fn new(base_path: PathBuf, ttl_config: TtlConfig) -> Self {
		Self::with_clock(base_path, ttl_config, Arc::new(SystemClock))
	}

	pub fn with_clock(base_path: PathBuf, ttl_config: TtlConfig, clock: Arc<dyn Clock>) -> Self {
		Self {
			base_path,
			ttl_config,
			clock,
		}
	}

	/// Maps a key to a `.bin` file named after the hex-encoded key, so
	/// distinct keys never share a file.
	fn file_path(&self, key: &str) -> PathBuf {
		self.base_path.join(format!("{}.bin", hex::encode(key)))
	}

	async fn read_entry(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
		let data = match fs::read(self.file_path(key)).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let (header, payload) = FileHeader::decode(&data)?;
		if header.is_expired(self.clock.now()) {
			return Ok(None);
		}
		Ok(Some(payload.to_vec()))
	}

	async fn cleanup_expired_files(&self) -> Result<usize, StorageError> {
		let now = self.clock.now();
		let mut removed = 0;
		let mut entries = match fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new("bin")) {
				continue;
			}

			let data = match fs::read(&path).await {
				Ok(data) => data,
				Err(e) => {
					tracing::debug!("Skipping {:?}: could not be read: {}", path, e);
					continue;
				},
			};

			match FileHeader::decode(&data) {
				Ok((header, _)) if header.is_expired(now) => {
					if let Err(e) = fs::remove_file(&path).await {
						tracing::warn!("Failed to remove expired file {:?}: {}", path, e);
					} else {
						removed += 1;
					}
				},
				Ok(_) => {},
				Err(e) => tracing::debug!("Skipping {:?}: {}", path, e),
			}
		}
		Ok(removed)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.read_entry(key).await?.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let path = self.file_path(key);

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let ttl = ttl.unwrap_or_else(|| self.ttl_config.ttl_for_key(key));
		let header = FileHeader::new(self.clock.now(), ttl);

		let mut file_data = Vec::with_capacity(FileHeader::SIZE + value.len());
		file_data.extend_from_slice(&header.encode());
		file_data.extend_from_slice(&value);

		// Write-then-rename so readers never see a partial file
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, file_data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		match fs::remove_file(self.file_path(key)).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		Ok(self.read_entry(key).await?.is_some())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.cleanup_expired_files().await
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let mut optional_fields = vec![Field::new("storage_path", FieldType::String)
			.with_validator(|v| match v.as_str() {
				Some(path) if !path.trim().is_empty() => Ok(()),
				_ => Err("storage_path cannot be empty".to_string()),
			})];

		for key in StorageKey::all() {
			optional_fields.push(Field::new(
				format!("ttl_{}", key.as_str()),
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			));
		}

		Schema::new(vec![], optional_fields).validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: base directory (default: `"./data/storage"`)
/// - `ttl_<namespace>`: default TTL in seconds for a namespace, e.g.
///   `ttl_guest_profiles` (default: 0, never expires)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage");

	Ok(Box::new(FileStorage::new(
		PathBuf::from(storage_path),
		TtlConfig::from_config(config),
	)))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
