//! File-based configuration for the adapters.
//!
//! ```yaml
//! cache:
//!   enable_token_counter: false
//!   default_ttl: 600
//! max_entries: 5000
//! image_output_dir: /var/lib/images
//! openai:
//!   base_url: https://api.openai.com
//!   timeout_secs: 30
//! ```
//!
//! The API key is never read from the file; it comes from the builder or from
//! `OPENAI_API_KEY`.

use crate::adapter::Image;
use crate::backend::{ImageBackend, OpenAiClient};
use crate::cache::{CacheConfig, ExactMatchCache};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub cache: CacheConfig,
    /// Capacity of the in-memory cache built by [`AdapterConfig::build_cache`].
    pub max_entries: usize,
    /// Where cached images requested as `url` are written. Defaults to the
    /// working directory.
    pub image_output_dir: Option<PathBuf>,
    pub openai: OpenAiConfig,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            max_entries: 1000,
            image_output_dir: None,
            openai: OpenAiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: Option<String>,
    pub organization: Option<String>,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            organization: None,
            timeout_secs: 60,
        }
    }
}

impl AdapterConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("Failed to read config: {}", e),
                ErrorContext::new().with_source(path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(Error::configuration_with_context(
                "max_entries must be positive",
                ErrorContext::new().with_field_path("max_entries"),
            ));
        }
        if self.openai.timeout_secs == 0 {
            return Err(Error::configuration_with_context(
                "timeout must be positive",
                ErrorContext::new().with_field_path("openai.timeout_secs"),
            ));
        }
        Ok(())
    }

    pub fn build_cache(&self) -> ExactMatchCache {
        ExactMatchCache::in_memory(self.cache.clone(), self.max_entries)
    }

    /// Image adapter over `backend` writing its files to `image_output_dir`.
    pub fn image_adapter(&self, backend: Arc<dyn ImageBackend>) -> Image {
        let image = Image::new(backend);
        match &self.image_output_dir {
            Some(dir) => image.with_output_dir(dir.clone()),
            None => image,
        }
    }

    pub fn openai_client(&self) -> Result<OpenAiClient> {
        let mut builder = OpenAiClient::builder().timeout_secs(self.openai.timeout_secs);
        if let Some(url) = &self.openai.base_url {
            builder = builder.base_url(url.clone());
        }
        if let Some(org) = &self.openai.organization {
            builder = builder.organization(org.clone());
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn image_adapter_uses_the_configured_directory() {
        let backend: Arc<dyn ImageBackend> = Arc::new(
            OpenAiClient::builder().api_key("sk-test").build().unwrap(),
        );
        let config = AdapterConfig::from_yaml_str("image_output_dir: /srv/images").unwrap();
        let image = config.image_adapter(backend.clone());
        assert_eq!(image.output_dir(), Path::new("/srv/images"));

        let image = AdapterConfig::default().image_adapter(backend);
        assert_eq!(image.output_dir(), Path::new("."));
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config = AdapterConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, AdapterConfig::default());
    }

    #[test]
    fn reads_nested_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "cache:\n  enable_token_counter: false\n  default_ttl: 600\nmax_entries: 5\nimage_output_dir: /tmp/img\nopenai:\n  timeout_secs: 5"
        )
        .unwrap();
        let config = AdapterConfig::from_path(file.path()).unwrap();
        assert!(!config.cache.enable_token_counter);
        assert_eq!(config.cache.default_ttl, Duration::from_secs(600));
        assert_eq!(config.max_entries, 5);
        assert_eq!(config.image_output_dir, Some(PathBuf::from("/tmp/img")));
        assert_eq!(config.openai.timeout_secs, 5);
        assert_eq!(config.openai.base_url, None);
    }

    #[test]
    fn rejects_zero_capacity() {
        let err = AdapterConfig::from_yaml_str("max_entries: 0").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let err = AdapterConfig::from_path("/nonexistent/adapter.yaml").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
