//! Parsing of `backend:provider` strings used by the CLI and config files

use crate::{
    config::ExecutionProvider,
    error::{BgRemovalError, Result},
    processor::BackendType,
};

/// One selectable backend/provider combination
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub execution_provider: ExecutionProvider,
    /// Whether the backend was compiled into this binary
    pub available: bool,
    pub description: &'static str,
}

/// Utility for parsing and listing execution providers
pub struct ExecutionProviderManager;

impl ExecutionProviderManager {
    /// Parse an execution provider string in `backend:provider` form
    ///
    /// A bare backend name selects that backend's default provider.
    ///
    /// # Examples
    /// ```rust
    /// use bgremove_server::utils::ExecutionProviderManager;
    /// use bgremove_server::{BackendType, ExecutionProvider};
    ///
    /// let (backend, provider) = ExecutionProviderManager::parse_provider_string("tract:cpu").unwrap();
    /// assert_eq!(backend, BackendType::Tract);
    /// assert_eq!(provider, ExecutionProvider::Cpu);
    /// ```
    pub fn parse_provider_string(provider_str: &str) -> Result<(BackendType, ExecutionProvider)> {
        let (backend, provider) = match provider_str.split_once(':') {
            Some((backend, provider)) => (backend, Some(provider)),
            None => (provider_str, None),
        };

        let backend_type = match backend {
            "onnx" => BackendType::Onnx,
            "tract" => BackendType::Tract,
            _ => {
                return Err(BgRemovalError::invalid_config(format!(
                    "Unknown backend: {}. Supported backends: onnx, tract",
                    backend
                )))
            },
        };

        let Some(provider) = provider else {
            return Ok((backend_type, Self::default_provider_for_backend(backend_type)));
        };

        let execution_provider = match (backend_type, provider) {
            (BackendType::Onnx, "auto") => ExecutionProvider::Auto,
            (BackendType::Onnx | BackendType::Tract, "cpu") => ExecutionProvider::Cpu,
            (BackendType::Onnx, "cuda") => ExecutionProvider::Cuda,
            (BackendType::Onnx, "coreml") => ExecutionProvider::CoreMl,
            (BackendType::Onnx, _) => {
                return Err(BgRemovalError::invalid_config(format!(
                    "Unknown ONNX provider: {}. Supported: auto, cpu, cuda, coreml",
                    provider
                )))
            },
            (BackendType::Tract, _) => {
                return Err(BgRemovalError::invalid_config(format!(
                    "Unknown Tract provider: {}. Tract only supports 'cpu'",
                    provider
                )))
            },
        };

        Ok((backend_type, execution_provider))
    }

    #[must_use]
    pub fn default_provider_for_backend(backend_type: BackendType) -> ExecutionProvider {
        match backend_type {
            BackendType::Onnx => ExecutionProvider::Auto,
            BackendType::Tract => ExecutionProvider::Cpu,
        }
    }

    /// Convert backend type and execution provider back to `backend:provider`
    #[must_use]
    pub fn provider_to_string(backend_type: BackendType, provider: ExecutionProvider) -> String {
        format!("{}:{}", backend_type, provider)
    }

    /// Every known combination, flagged by whether its backend was compiled in
    #[must_use]
    pub fn list_all_providers() -> Vec<ProviderInfo> {
        const COMBINATIONS: [(BackendType, ExecutionProvider, &str); 5] = [
            (BackendType::Tract, ExecutionProvider::Cpu, "Pure Rust CPU inference via Tract"),
            (BackendType::Onnx, ExecutionProvider::Auto, "ONNX Runtime with auto-selected provider"),
            (BackendType::Onnx, ExecutionProvider::Cpu, "ONNX Runtime CPU execution"),
            (BackendType::Onnx, ExecutionProvider::Cuda, "ONNX Runtime CUDA GPU acceleration"),
            (BackendType::Onnx, ExecutionProvider::CoreMl, "ONNX Runtime CoreML acceleration"),
        ];

        COMBINATIONS
            .iter()
            .map(|&(backend_type, execution_provider, description)| ProviderInfo {
                name: Self::provider_to_string(backend_type, execution_provider),
                backend_type,
                execution_provider,
                available: backend_type.is_compiled_in(),
                description,
            })
            .collect()
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
        ] {
            let (backend, provider) = ExecutionProviderManager::parse_provider_string(input).unwrap();
            assert_eq!(backend, BackendType::Onnx);
            assert_eq!(provider, expected, "{}", input);
        }
    }

    #[test]
    fn test_parse_tract_providers() {
        let (backend, provider) =
            ExecutionProviderManager::parse_provider_string("tract:cpu").unwrap();
        assert_eq!(backend, BackendType::Tract);
        assert_eq!(provider, ExecutionProvider::Cpu);

        assert!(ExecutionProviderManager::parse_provider_string("tract:cuda").is_err());
        assert!(ExecutionProviderManager::parse_provider_string("tract:auto").is_err());
    }

    #[test]
    fn test_parse_backend_only() {
        let (backend, provider) = ExecutionProviderManager::parse_provider_string("onnx").unwrap();
        assert_eq!((backend, provider), (BackendType::Onnx, ExecutionProvider::Auto));

        let (backend, provider) = ExecutionProviderManager::parse_provider_string("tract").unwrap();
        assert_eq!((backend, provider), (BackendType::Tract, ExecutionProvider::Cpu));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(ExecutionProviderManager::parse_provider_string("invalid").is_err());
        assert!(ExecutionProviderManager::parse_provider_string("onnx:invalid").is_err());
        assert!(ExecutionProviderManager::parse_provider_string("invalid:auto").is_err());
    }

    #[test]
    fn test_provider_to_string() {
        assert_eq!(
            ExecutionProviderManager::provider_to_string(BackendType::Onnx, ExecutionProvider::CoreMl),
            "onnx:coreml"
        );
        assert_eq!(
            ExecutionProviderManager::provider_to_string(BackendType::Tract, ExecutionProvider::Cpu),
            "tract:cpu"
        );
    }

    #[test]
    fn test_list_all_providers() {
        let providers = ExecutionProviderManager::list_all_providers();
        let names: Vec<&str> = providers.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"onnx:auto"));
        assert!(names.contains(&"tract:cpu"));

        for info in &providers {
            let (backend, provider) =
                ExecutionProviderManager::parse_provider_string(&info.name).unwrap();
            assert_eq!(backend, info.backend_type);
            assert_eq!(provider, info.execution_provider);
        }
    }
}
