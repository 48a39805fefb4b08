//! Parsing of `--model` arguments

use crate::{
    cache::ModelCache,
    error::{BgRemovalError, Result},
    models::{ModelSource, ModelSpec},
};
use std::path::{Path, PathBuf};

/// Turns user-supplied model strings into [`ModelSpec`]s
pub struct ModelSpecParser;

impl ModelSpecParser {
    /// Parse `model` or `model:variant`
    ///
    /// Existing paths become external models, `HuggingFace` URLs become the
    /// cache id they download to, anything else is taken as a cache id.
    ///
    /// ```rust
    /// use closet_bgremove::{utils::ModelSpecParser, ModelSource};
    ///
    /// let spec = ModelSpecParser::parse("imgly--isnet-general-onnx:fp32");
    /// assert_eq!(spec.source, ModelSource::Downloaded("imgly--isnet-general-onnx".to_string()));
    /// assert_eq!(spec.variant.as_deref(), Some("fp32"));
    ///
    /// let spec = ModelSpecParser::parse("https://huggingface.co/imgly/isnet-general-onnx");
    /// assert_eq!(spec.source, ModelSource::Downloaded("imgly--isnet-general-onnx".to_string()));
    /// ```
    #[must_use]
    pub fn parse(model_arg: &str) -> ModelSpec {
        let is_url = model_arg.starts_with("http://") || model_arg.starts_with("https://");

        if !is_url && !Path::new(model_arg).exists() {
            if let Some((model_part, variant_part)) = model_arg.rsplit_once(':') {
                return ModelSpec {
                    source: Self::source_for(model_part, false),
                    variant: Some(variant_part.to_string()),
                };
            }
        }

        ModelSpec {
            source: Self::source_for(model_arg, is_url),
            variant: None,
        }
    }

    fn source_for(model_arg: &str, is_url: bool) -> ModelSource {
        if is_url {
            ModelSource::Downloaded(ModelCache::url_to_model_id(model_arg))
        } else if Path::new(model_arg).exists() {
            ModelSource::External(PathBuf::from(model_arg))
        } else {
            ModelSource::Downloaded(model_arg.to_string())
        }
    }

    /// Check a spec for obviously invalid values
    ///
    /// An empty cache id is allowed: it means "first cached model".
    ///
    /// # Errors
    /// - External path missing or not a directory
    /// - Cache id or variant with characters outside `[A-Za-z0-9._-]`
    pub fn validate(model_spec: &ModelSpec) -> Result<()> {
        let valid_name =
            |s: &str| s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

        match &model_spec.source {
            ModelSource::External(path) => {
                if !path.is_dir() {
                    return Err(BgRemovalError::invalid_config(format!(
                        "External model path must be an existing directory: {}",
                        path.display()
                    )));
                }
            },
            ModelSource::Downloaded(model_id) => {
                if !valid_name(model_id) {
                    return Err(BgRemovalError::invalid_config(format!(
                        "Invalid characters in model ID: {model_id}"
                    )));
                }
            },
        }

        if let Some(variant) = &model_spec.variant {
            if variant.is_empty() || !valid_name(variant) {
                return Err(BgRemovalError::invalid_config(format!(
                    "Invalid model variant: '{variant}'"
                )));
            }
        }

        Ok(())
    }

    /// Directory name for external models, cache id for downloaded ones
    #[must_use]
    pub fn get_model_name(model_spec: &ModelSpec) -> String {
        match &model_spec.source {
            ModelSource::External(path) => path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned(),
            ModelSource::Downloaded(model_id) => model_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_downloaded() {
        let spec = ModelSpecParser::parse("imgly--isnet-general-onnx");
        assert_eq!(
            spec.source,
            ModelSource::Downloaded("imgly--isnet-general-onnx".to_string())
        );
        assert_eq!(spec.variant, None);

        let spec = ModelSpecParser::parse("imgly--birefnet-portrait:fp16");
        assert_eq!(
            spec.source,
            ModelSource::Downloaded("imgly--birefnet-portrait".to_string())
        );
        assert_eq!(spec.variant.as_deref(), Some("fp16"));
    }

    #[test]
    fn test_parse_url_matches_cache_id() {
        let url = "https://huggingface.co/imgly/isnet-general-onnx";
        let spec = ModelSpecParser::parse(url);
        assert_eq!(
            spec.source,
            ModelSource::Downloaded(ModelCache::url_to_model_id(url))
        );
        assert_eq!(spec.variant, None);
    }

    #[test]
    fn test_parse_existing_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("isnet");
        std::fs::create_dir(&dir).unwrap();
        let dir_str = dir.to_str().unwrap();

        let spec = ModelSpecParser::parse(dir_str);
        assert_eq!(spec.source, ModelSource::External(dir.clone()));

        let spec = ModelSpecParser::parse(&format!("{dir_str}:fp32"));
        assert_eq!(spec.source, ModelSource::External(dir));
        assert_eq!(spec.variant.as_deref(), Some("fp32"));
        assert!(ModelSpecParser::validate(&spec).is_ok());
        assert_eq!(ModelSpecParser::get_model_name(&spec), "isnet");
    }

    #[test]
    fn test_validate() {
        assert!(ModelSpecParser::validate(&ModelSpec::default()).is_ok());
        assert!(ModelSpecParser::validate(&ModelSpecParser::parse("imgly--isnet")).is_ok());
        assert!(ModelSpecParser::validate(&ModelSpecParser::parse("bad id!")).is_err());
        assert!(ModelSpecParser::validate(&ModelSpecParser::parse("imgly--isnet:")).is_err());

        let missing = ModelSpec {
            source: ModelSource::External(PathBuf::from("/definitely/not/here")),
            variant: None,
        };
        assert!(ModelSpecParser::validate(&missing).is_err());
    }
}
