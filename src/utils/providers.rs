//! Backend and execution provider selection strings
//!
//! Format is `backend[:provider]`, e.g. `onnx:cuda`, `tract:cpu`,
//! `threshold:inverted`.

use crate::{
    config::ExecutionProvider,
    error::{BgRemovalError, Result},
    processor::BackendType,
};

/// Availability of one `backend:provider` combination
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub execution_provider: ExecutionProvider,
    pub available: bool,
    pub description: String,
}

/// Parses selection strings and reports what this build can run
pub struct ExecutionProviderManager;

impl ExecutionProviderManager {
    /// Parse a `backend[:provider]` string
    ///
    /// A bare backend name picks its default provider.
    ///
    /// ```rust
    /// use closet_bgremove::{utils::ExecutionProviderManager, BackendType, ExecutionProvider};
    ///
    /// let (backend, provider) = ExecutionProviderManager::parse_provider_string("onnx:cuda").unwrap();
    /// assert_eq!(backend, BackendType::Onnx);
    /// assert_eq!(provider, ExecutionProvider::Cuda);
    ///
    /// let (backend, _) = ExecutionProviderManager::parse_provider_string("threshold:inverted").unwrap();
    /// assert_eq!(backend, BackendType::Threshold { inverted: true });
    /// ```
    ///
    /// # Errors
    /// - Unknown backend, or a provider the backend does not support
    pub fn parse_provider_string(provider_str: &str) -> Result<(BackendType, ExecutionProvider)> {
        let (backend, provider) = match provider_str.split_once(':') {
            Some((backend, provider)) => (backend, Some(provider)),
            None => (provider_str, None),
        };

        match backend {
            "onnx" => {
                let execution_provider = match provider.unwrap_or("auto") {
                    "auto" => ExecutionProvider::Auto,
                    "cpu" => ExecutionProvider::Cpu,
                    "cuda" => ExecutionProvider::Cuda,
                    "coreml" => ExecutionProvider::CoreMl,
                    other => {
                        return Err(BgRemovalError::invalid_config(format!(
                            "Unknown ONNX provider: {other}. Supported: auto, cpu, cuda, coreml"
                        )));
                    },
                };
                Ok((BackendType::Onnx, execution_provider))
            },
            "tract" => match provider.unwrap_or("cpu") {
                "cpu" => Ok((BackendType::Tract, ExecutionProvider::Cpu)),
                other => Err(BgRemovalError::invalid_config(format!(
                    "Unknown Tract provider: {other}. Tract only supports 'cpu'"
                ))),
            },
            "threshold" => {
                let inverted = match provider {
                    None | Some("normal") => false,
                    Some("inverted") => true,
                    Some(other) => {
                        return Err(BgRemovalError::invalid_config(format!(
                            "Unknown threshold mode: {other}. Supported: normal, inverted"
                        )));
                    },
                };
                Ok((BackendType::Threshold { inverted }, ExecutionProvider::Cpu))
            },
            other => Err(BgRemovalError::invalid_config(format!(
                "Unknown backend: {other}. Supported backends: onnx, tract, threshold"
            ))),
        }
    }

    /// Every provider combination with its availability in this build
    #[must_use]
    pub fn list_all_providers() -> Vec<ProviderInfo> {
        let mut providers = Vec::new();

        #[cfg(feature = "onnx")]
        let onnx: Vec<(String, bool, String)> = crate::backends::OnnxBackend::list_providers();
        #[cfg(not(feature = "onnx"))]
        let onnx: Vec<(String, bool, String)> = Vec::new();

        let onnx_available =
            |name: &str| onnx.iter().any(|(n, available, _)| n.eq_ignore_ascii_case(name) && *available);

        for (name, execution_provider, description) in [
            ("auto", ExecutionProvider::Auto, "ONNX Runtime with auto-selected provider"),
            ("cpu", ExecutionProvider::Cpu, "ONNX Runtime CPU execution"),
            ("cuda", ExecutionProvider::Cuda, "ONNX Runtime CUDA GPU acceleration"),
            ("coreml", ExecutionProvider::CoreMl, "ONNX Runtime CoreML (Apple Silicon) acceleration"),
        ] {
            let available = if name == "auto" {
                onnx.iter().any(|(_, available, _)| *available)
            } else {
                onnx_available(name)
            };
            let description = if cfg!(feature = "onnx") {
                description.to_string()
            } else {
                format!("{description} (feature disabled)")
            };
            providers.push(ProviderInfo {
                name: format!("onnx:{name}"),
                backend_type: BackendType::Onnx,
                execution_provider,
                available,
                description,
            });
        }

        #[cfg(feature = "tract")]
        for (name, available, description) in crate::backends::TractBackend::list_providers() {
            providers.push(ProviderInfo {
                name: format!("tract:{}", name.to_lowercase()),
                backend_type: BackendType::Tract,
                execution_provider: ExecutionProvider::Cpu,
                available,
                description,
            });
        }
        #[cfg(not(feature = "tract"))]
        providers.push(ProviderInfo {
            name: "tract:cpu".to_string(),
            backend_type: BackendType::Tract,
            execution_provider: ExecutionProvider::Cpu,
            available: false,
            description: "Pure Rust CPU inference (feature disabled)".to_string(),
        });

        for inverted in [false, true] {
            providers.push(ProviderInfo {
                name: if inverted {
                    "threshold:inverted".to_string()
                } else {
                    "threshold".to_string()
                },
                backend_type: BackendType::Threshold { inverted },
                execution_provider: ExecutionProvider::Cpu,
                available: true,
                description: if inverted {
                    "Otsu luminance threshold, dark subject on light background".to_string()
                } else {
                    "Otsu luminance threshold, light subject on dark background".to_string()
                },
            });
        }

        providers
    }

    /// Whether a provider string names something this build can run
    #[must_use]
    pub fn is_provider_available(provider_str: &str) -> bool {
        Self::list_all_providers()
            .iter()
            .any(|p| p.name == provider_str && p.available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_onnx_providers() {
        for (input, expected) in [
            ("onnx:auto", ExecutionProvider::Auto),
            ("onnx:cpu", ExecutionProvider::Cpu),
            ("onnx:cuda", ExecutionProvider::Cuda),
            ("onnx:coreml", ExecutionProvider::CoreMl),
            ("onnx", ExecutionProvider::Auto),
        ] {
            let (backend, provider) = ExecutionProviderManager::parse_provider_string(input).unwrap();
            assert_eq!(backend, BackendType::Onnx);
            assert_eq!(provider, expected, "{input}");
        }
    }

    #[test]
    fn test_parse_tract_and_threshold() {
        assert_eq!(
            ExecutionProviderManager::parse_provider_string("tract:cpu").unwrap(),
            (BackendType::Tract, ExecutionProvider::Cpu)
        );
        assert_eq!(
            ExecutionProviderManager::parse_provider_string("tract").unwrap().0,
            BackendType::Tract
        );
        assert_eq!(
            ExecutionProviderManager::parse_provider_string("threshold").unwrap().0,
            BackendType::Threshold { inverted: false }
        );
        assert_eq!(
            ExecutionProviderManager::parse_provider_string("threshold:inverted").unwrap().0,
            BackendType::Threshold { inverted: true }
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        for input in ["onnx:tpu", "tract:cuda", "threshold:fuzzy", "mock", "", "rembg:u2net"] {
            let err = ExecutionProviderManager::parse_provider_string(input).unwrap_err();
            assert!(matches!(err, BgRemovalError::InvalidConfig(_)), "{input}");
        }
    }

    #[test]
    fn test_threshold_always_listed_available() {
        assert!(ExecutionProviderManager::is_provider_available("threshold"));
        assert!(ExecutionProviderManager::is_provider_available("threshold:inverted"));

        let providers = ExecutionProviderManager::list_all_providers();
        assert!(providers.iter().any(|p| p.name == "onnx:cuda"));
        assert!(providers.iter().any(|p| p.name == "tract:cpu"));
    }
}
