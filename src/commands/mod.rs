// Offline commands
pub mod config;
pub mod plan;
pub mod schema;

// Commands that call the API
pub mod import;

use anyhow::{Context as _, Result, bail};
use pingone_provider::config::{ENV_ACCESS_TOKEN, ProviderConfig};
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::Context;

/// Resolve the provider config: explicit file or the default location, then the environment
pub fn load_config(ctx: &Context) -> Result<ProviderConfig> {
    match &ctx.config {
        Some(path) => {
            let mut config = ProviderConfig::load_from(path)?;
            config.apply_env(|key| std::env::var(key).ok())?;
            Ok(config)
        }
        None => ProviderConfig::load().with_context(|| {
            format!("Could not load provider config (the token may also come from {ENV_ACCESS_TOKEN})")
        }),
    }
}

/// Read a JSON or TOML document, chosen by extension
pub fn load_document(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    let value: Value = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))?,
        _ => serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON format in {}", path.display()))?,
    };
    if !value.is_object() {
        bail!("{} must hold a single object", path.display());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_load_document_toml_and_json() {
        let dir = TempDir::new().unwrap();
        let toml_path = dir.path().join("scope.toml");
        fs::write(&toml_path, "name = \"read\"\nenvironment_id = \"env\"\n").unwrap();
        assert_eq!(
            load_document(&toml_path).unwrap(),
            json!({"name": "read", "environment_id": "env"})
        );

        let json_path = dir.path().join("scope.json");
        fs::write(&json_path, r#"{"name": "write"}"#).unwrap();
        assert_eq!(load_document(&json_path).unwrap(), json!({"name": "write"}));
    }

    #[test]
    fn test_load_document_rejects_non_object() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("list.json");
        fs::write(&path, "[1, 2]").unwrap();
        assert!(load_document(&path).is_err());
    }
}
