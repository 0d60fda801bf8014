use crate::error::{TracerError, TracerResult};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde_json::{self, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Cache for loaded JSON files to avoid repeated disk reads
static JSON_CACHE: Lazy<Mutex<HashMap<PathBuf, Value>>> = Lazy::new(|| {
    Mutex::new(HashMap::new())
});

/// Cache for embedded JSON strings
static EMBEDDED_CACHE: Lazy<Mutex<HashMap<String, Value>>> = Lazy::new(|| {
    Mutex::new(HashMap::new())
});

// a panic while holding the lock cannot leave a half-written map entry
fn lock<T>(cache: &Mutex<T>) -> MutexGuard<'_, T> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

/// JSON loader for job files and model datasets
pub struct JsonParser;

impl JsonParser {
    /// Load JSON data from a file path, using cache if available
    pub fn load_json<P: AsRef<Path>>(file_path: P) -> TracerResult<Value> {
        let path_buf = file_path.as_ref().to_path_buf();

        if let Some(json) = lock(&JSON_CACHE).get(&path_buf) {
            return Ok(json.clone());
        }

        let json_str = fs::read_to_string(&path_buf).map_err(|e| {
            TracerError::Config(format!("failed to read {}: {}", path_buf.display(), e))
        })?;
        let json: Value = serde_json::from_str(&json_str)?;

        lock(&JSON_CACHE).insert(path_buf, json.clone());
        Ok(json)
    }

    /// Load JSON data from an embedded string, using cache if available
    pub fn load_json_str(key: &str, json_str: &str) -> TracerResult<Value> {
        if let Some(json) = lock(&EMBEDDED_CACHE).get(key) {
            return Ok(json.clone());
        }

        let json: Value = serde_json::from_str(json_str)?;

        lock(&EMBEDDED_CACHE).insert(key.to_string(), json.clone());
        Ok(json)
    }

    /// Load a file and deserialize it into `T`
    pub fn load_typed<T: DeserializeOwned, P: AsRef<Path>>(file_path: P) -> TracerResult<T> {
        let json = Self::load_json(file_path)?;
        Ok(serde_json::from_value(json)?)
    }

    #[cfg(test)]
    fn cache_size() -> (usize, usize) {
        (lock(&JSON_CACHE).len(), lock(&EMBEDDED_CACHE).len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_json_str_caching() {
        let json_str = r#"{
            "name": "periclase",
            "fixed": { "pressure": 200.0 },
            "nested": { "deep": { "label": "tie line" } }
        }"#;

        let first = JsonParser::load_json_str("json_parser_test_key", json_str).unwrap();
        let (_, embedded_after_first) = JsonParser::cache_size();
        let second = JsonParser::load_json_str("json_parser_test_key", json_str).unwrap();
        let (_, embedded_after_second) = JsonParser::cache_size();

        assert_eq!(first, second);
        assert!(embedded_after_first >= 1);
        assert_eq!(embedded_after_first, embedded_after_second);

        assert_eq!(first["fixed"]["pressure"].as_f64(), Some(200.0));
        assert_eq!(first["nested"]["deep"]["label"].as_str(), Some("tie line"));
    }

    #[test]
    fn test_error_handling() {
        let invalid_json = r#"{"broken": "json""#;
        assert!(matches!(
            JsonParser::load_json_str("json_parser_invalid", invalid_json),
            Err(TracerError::Json(_))
        ));

        let non_existent = PathBuf::from("/path/that/does/not/exist.json");
        assert!(matches!(JsonParser::load_json(non_existent), Err(TracerError::Config(_))));
    }

    #[test]
    fn test_load_typed_from_file() {
        let path = std::env::temp_dir().join(format!("json_parser_typed_{}.json", std::process::id()));
        fs::write(&path, r#"{"Fe": 0.25, "Mg": 0.75}"#).unwrap();

        let composition: crate::composition::Composition = JsonParser::load_typed(&path).unwrap();
        assert_eq!(composition.amount("Mg"), 0.75);

        fs::remove_file(&path).ok();
    }
}
