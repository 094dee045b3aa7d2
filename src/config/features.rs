//! Feature flags configuration

use serde::Deserialize;

/// Feature flags for enabling/disabling functionality
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Allow conversations without a product or reference image
    #[serde(default)]
    pub no_product_mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_flags_defaults() {
        let flags = FeatureFlags::default();
        assert!(!flags.no_product_mode);
    }

    #[test]
    fn test_feature_flags_deserialization() {
        let flags: FeatureFlags = serde_json::from_str(r#"{"no_product_mode": true}"#).unwrap();
        assert!(flags.no_product_mode);
    }
}
