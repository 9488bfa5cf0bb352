use anyhow::{Result, anyhow};
use serde::de::DeserializeOwned;

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str, origin: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = err.path().to_string();
        anyhow!("{origin}: at JSON path {path} → {}", err.into_inner())
    })
}

/// Same as [`from_str_with_path`], for an already parsed document.
pub fn from_value_with_path<T: DeserializeOwned>(
    value: serde_json::Value,
    origin: &str,
) -> Result<T> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(|err| {
        let path = err.path().to_string();
        anyhow!("{origin}: at JSON path {path} → {}", err.into_inner())
    })
}
