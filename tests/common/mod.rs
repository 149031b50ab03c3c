// Common test utilities and helpers
use std::path::PathBuf;

/// Path to a fixture under test_artifacts/.
pub fn artifact(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("test_artifacts");
    path.push(filename);

    assert!(path.exists(), "Test fixture not found: {}", path.display());
    path
}
