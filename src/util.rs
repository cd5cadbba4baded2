//! Small helpers shared by the resource and data source handlers.

use serde_json::Value;

use crate::error::ProviderError;

/// Read an environment variable, treating empty values as unset.
pub fn default_getenv(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

/// Fetch a string attribute from a state object.
pub fn attr_str<'a>(state: &'a Value, name: &str) -> Option<&'a str> {
    state.get(name).and_then(Value::as_str)
}

/// Fetch a required string attribute, or a validation error naming it.
pub fn require_attr_str<'a>(state: &'a Value, name: &str) -> Result<&'a str, ProviderError> {
    attr_str(state, name)
        .ok_or_else(|| ProviderError::Validation(format!("missing required attribute {:?}", name)))
}

/// Fetch a list-of-strings attribute from a state object.
pub fn attr_string_list(state: &Value, name: &str) -> Vec<String> {
    state
        .get(name)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attr_str() {
        let state = json!({"name": "Checkout", "count": 3});
        assert_eq!(attr_str(&state, "name"), Some("Checkout"));
        assert_eq!(attr_str(&state, "count"), None);
        assert_eq!(attr_str(&state, "missing"), None);
    }

    #[test]
    fn test_require_attr_str() {
        let state = json!({"id": "PT4KHLK"});
        assert_eq!(require_attr_str(&state, "id").unwrap(), "PT4KHLK");
        assert!(require_attr_str(&state, "name").is_err());
    }

    #[test]
    fn test_attr_string_list() {
        let state = json!({"services": ["P1", "P2"], "name": "x"});
        assert_eq!(attr_string_list(&state, "services"), vec!["P1", "P2"]);
        assert!(attr_string_list(&state, "name").is_empty());
        assert!(attr_string_list(&state, "missing").is_empty());
    }

}
