//! Multi-file configuration loading.
//!
//! A main file may pull in other files with `include`. Included files are
//! merged section by section; a top-level section may only be defined once.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

/// Reads a main configuration file together with the files it includes.
pub struct ConfigLoader {
	/// Directory that relative paths are resolved against
	root: PathBuf,
	/// Canonical paths read so far
	visited: HashSet<PathBuf>,
	/// Top-level section name -> file that defined it
	owners: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(root: impl AsRef<Path>) -> Self {
		Self {
			root: root.as_ref().to_path_buf(),
			visited: HashSet::new(),
			owners: HashMap::new(),
		}
	}

	/// Loads `path`, merges its includes and validates the result.
	pub async fn load_config(&mut self, path: impl AsRef<Path>) -> Result<Config, ConfigError> {
		let main_path = self.locate(path.as_ref())?;
		let main_text = self.read_once(&main_path).await?;
		let mut merged: toml::Value = toml::from_str(&main_text)?;

		let includes = extract_includes(&merged)?;
		if includes.is_empty() {
			return main_text.parse();
		}

		if let Some(table) = merged.as_table_mut() {
			table.remove("include");
		}
		self.claim_sections(&merged, &main_path)?;

		for include in includes {
			let include_path = self.locate(&include)?;
			let fragment: toml::Value = toml::from_str(&self.read_once(&include_path).await?)?;
			self.claim_sections(&fragment, &include_path)?;

			if let (Some(target), toml::Value::Table(sections)) = (merged.as_table_mut(), fragment)
			{
				target.extend(sections);
			}
		}

		toml::to_string(&merged)
			.map_err(|e| ConfigError::Parse(format!("Failed to re-encode merged config: {}", e)))?
			.parse()
	}

	/// Reads a file with environment variables resolved, refusing to read
	/// the same file twice.
	async fn read_once(&mut self, path: &Path) -> Result<String, ConfigError> {
		let canonical = path.canonicalize().map_err(|e| {
			ConfigError::Io(io::Error::new(
				io::ErrorKind::NotFound,
				format!("Cannot resolve {}: {}", path.display(), e),
			))
		})?;

		if !self.visited.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"{} is included more than once; it was already loaded",
				canonical.display()
			)));
		}

		resolve_env_vars(&tokio::fs::read_to_string(path).await?)
	}

	/// Records which file owns each top-level section of `value`.
	fn claim_sections(&mut self, value: &toml::Value, source: &Path) -> Result<(), ConfigError> {
		let Some(table) = value.as_table() else {
			return Ok(());
		};
		for section in table.keys() {
			if let Some(owner) = self.owners.get(section) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}': defined in both {} and {}",
					section,
					owner.display(),
					source.display()
				)));
			}
			self.owners.insert(section.clone(), source.to_path_buf());
		}
		Ok(())
	}

	/// Resolves `path` against the root directory and checks that it exists.
	fn locate(&self, path: &Path) -> Result<PathBuf, ConfigError> {
		let candidate = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.root.join(path)
		};

		if candidate.exists() {
			Ok(candidate)
		} else {
			Err(ConfigError::Io(io::Error::new(
				io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", candidate.display()),
			)))
		}
	}
}

/// Reads `include = "a.toml"` or `include = ["a.toml", "b.toml"]`.
fn extract_includes(value: &toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	match value.get("include") {
		None => Ok(Vec::new()),
		Some(toml::Value::String(single)) => Ok(vec![PathBuf::from(single)]),
		Some(toml::Value::Array(items)) => items
			.iter()
			.map(|item| {
				item.as_str().map(PathBuf::from).ok_or_else(|| {
					ConfigError::Validation("Include array must contain only strings".into())
				})
			})
			.collect(),
		Some(_) => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	fn write(dir: &TempDir, name: &str, contents: &str) {
		fs::write(dir.path().join(name), contents).unwrap();
	}

	#[tokio::test]
	async fn test_loads_file_without_includes() {
		let dir = TempDir::new().unwrap();
		write(
			&dir,
			"config.toml",
			r#"
[service]
id = "single"

[storage]
primary = "file"
[storage.implementations.file]
storage_path = "./data"

[account]
primary = "local"
[account.implementations.local]
"#,
		);

		let config = Config::from_file(dir.path().join("config.toml"))
			.await
			.unwrap();
		assert_eq!(config.service.id, "single");
		assert_eq!(config.storage.primary, "file");
	}

	#[tokio::test]
	async fn test_merges_included_sections() {
		let dir = TempDir::new().unwrap();
		write(
			&dir,
			"main.toml",
			r#"
include = ["storage.toml", "account.toml"]
[service]
id = "split"

[guest]
ttl_seconds = 3600
"#,
		);
		write(
			&dir,
			"storage.toml",
			r#"
[storage]
primary = "memory"
cleanup_interval_seconds = 60
[storage.implementations.memory]
"#,
		);
		write(
			&dir,
			"account.toml",
			r#"
[account]
primary = "local"
[account.implementations.local]
min_password_length = 8
"#,
		);

		let config = ConfigLoader::new(dir.path())
			.load_config("main.toml")
			.await
			.unwrap();

		assert_eq!(config.service.id, "split");
		assert_eq!(config.guest.ttl_seconds, 3600);
		assert_eq!(config.storage.cleanup_interval_seconds, 60);
		assert_eq!(config.account.primary, "local");
	}

	#[tokio::test]
	async fn test_section_defined_twice_is_rejected() {
		let dir = TempDir::new().unwrap();
		write(
			&dir,
			"main.toml",
			"include = [\"other.toml\"]\n[service]\nid = \"main\"\n",
		);
		write(&dir, "other.toml", "[service]\nid = \"other\"\n");

		let message = ConfigLoader::new(dir.path())
			.load_config("main.toml")
			.await
			.unwrap_err()
			.to_string();
		assert!(message.contains("Duplicate section 'service'"));
	}

	#[tokio::test]
	async fn test_file_including_itself_is_rejected() {
		let dir = TempDir::new().unwrap();
		write(
			&dir,
			"self.toml",
			"include = \"self.toml\"\n[service]\nid = \"loop\"\n",
		);

		let message = ConfigLoader::new(dir.path())
			.load_config("self.toml")
			.await
			.unwrap_err()
			.to_string();
		assert!(message.contains("already loaded"));
	}

	#[tokio::test]
	async fn test_missing_include_is_io_error() {
		let dir = TempDir::new().unwrap();
		write(
			&dir,
			"main.toml",
			"include = [\"nowhere.toml\"]\n[service]\nid = \"x\"\n",
		);

		let result = ConfigLoader::new(dir.path()).load_config("main.toml").await;
		assert!(matches!(result, Err(ConfigError::Io(_))));
	}

	#[test]
	fn test_include_must_be_strings() {
		let value: toml::Value = toml::from_str("include = [1, 2]").unwrap();
		assert!(extract_includes(&value).is_err());

		let value: toml::Value = toml::from_str("include = 3").unwrap();
		assert!(extract_includes(&value).is_err());
	}
}
