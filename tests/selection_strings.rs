//! Backend and model selection strings as accepted by `remove-bg`

use closet_bgremove::{
    BackendType, ExecutionProvider, ExecutionProviderManager, ModelSource, ModelSpecParser,
};

#[test]
fn backend_strings_round_trip_through_display() {
    for text in ["onnx", "tract", "threshold", "threshold:inverted"] {
        let (backend, _) = ExecutionProviderManager::parse_provider_string(text).unwrap();
        assert_eq!(backend.to_string(), text);
    }
}

#[test]
fn provider_defaults() {
    assert_eq!(
        ExecutionProviderManager::parse_provider_string("onnx").unwrap(),
        (BackendType::Onnx, ExecutionProvider::Auto)
    );
    assert_eq!(
        ExecutionProviderManager::parse_provider_string("tract").unwrap(),
        (BackendType::Tract, ExecutionProvider::Cpu)
    );
    assert!(ExecutionProviderManager::parse_provider_string("tract:cuda").is_err());
    assert!(ExecutionProviderManager::parse_provider_string("magic").is_err());
}

#[test]
fn threshold_needs_no_model() {
    let (backend, _) = ExecutionProviderManager::parse_provider_string("threshold").unwrap();
    assert!(!backend.requires_model());
    assert!(BackendType::Onnx.requires_model());
}

#[test]
fn model_directory_argument_is_external() {
    let temp = tempfile::TempDir::new().unwrap();
    let spec = ModelSpecParser::parse(temp.path().to_str().unwrap());
    assert_eq!(spec.source, ModelSource::External(temp.path().to_path_buf()));
    assert_eq!(spec.variant, None);
    assert!(ModelSpecParser::validate(&spec).is_ok());
}
