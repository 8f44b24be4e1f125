use serde::{Deserialize, Serialize};

/// Engine-wide defaults. Per-node `errMsgs` take precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormConfig {
    #[serde(default = "default_required_message")]
    pub required_message: String,
    #[serde(default = "default_type_message")]
    pub type_message: String,
    #[serde(default = "default_enum_message")]
    pub enum_message: String,
    /// Run a full validation pass over the initial data at construction.
    #[serde(default = "default_validate_on_load")]
    pub validate_on_load: bool,
}

fn default_required_message() -> String {
    "This field is required.".to_string()
}

fn default_type_message() -> String {
    "Value has the wrong type.".to_string()
}

fn default_enum_message() -> String {
    "Value is not one of the allowed options.".to_string()
}

fn default_validate_on_load() -> bool {
    true
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            required_message: default_required_message(),
            type_message: default_type_message(),
            enum_message: default_enum_message(),
            validate_on_load: default_validate_on_load(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: FormConfig = serde_json::from_value(json!({"requiredMessage": "Required"})).unwrap();
        assert_eq!(config.required_message, "Required");
        assert_eq!(config.enum_message, FormConfig::default().enum_message);
        assert!(config.validate_on_load);
    }
}
