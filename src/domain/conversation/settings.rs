//! Generation settings attached to a conversation.
//!
//! Settings are chosen when the conversation is created and travel with every
//! generation request. When a conversation is resumed the stored record may
//! omit fields; [`SettingsPatch::overlay`] fills those gaps from the caller's
//! hint while letting stored values win.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Generation backend provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Provider {
    ProviderA,
    ProviderB,
    ProviderBStoryboard,
}

impl Provider {
    /// Wire name used by the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::ProviderA => "providerA",
            Provider::ProviderB => "providerB",
            Provider::ProviderBStoryboard => "providerBStoryboard",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "providerA" => Ok(Provider::ProviderA),
            "providerB" => Ok(Provider::ProviderB),
            "providerBStoryboard" => Ok(Provider::ProviderBStoryboard),
            other => Err(ValidationError::invalid_format(
                "provider",
                format!("unknown provider '{}'", other),
            )),
        }
    }
}

/// Ad placement platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Tiktok,
    Snapchat,
    Facebook,
    Youtube,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Tiktok => "tiktok",
            Platform::Snapchat => "snapchat",
            Platform::Facebook => "facebook",
            Platform::Youtube => "youtube",
        }
    }
}

impl FromStr for Platform {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tiktok" => Ok(Platform::Tiktok),
            "snapchat" => Ok(Platform::Snapchat),
            "facebook" => Ok(Platform::Facebook),
            "youtube" => Ok(Platform::Youtube),
            other => Err(ValidationError::invalid_format(
                "platform",
                format!("unknown platform '{}'", other),
            )),
        }
    }
}

/// Output aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "16:9")]
    Landscape,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Portrait => "9:16",
            AspectRatio::Landscape => "16:9",
        }
    }
}

impl FromStr for AspectRatio {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "9:16" => Ok(AspectRatio::Portrait),
            "16:9" => Ok(AspectRatio::Landscape),
            other => Err(ValidationError::invalid_format(
                "aspect_ratio",
                format!("unsupported aspect ratio '{}'", other),
            )),
        }
    }
}

/// ISO-639-1 language code (two lowercase ASCII letters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn new(code: impl Into<String>) -> Result<Self, ValidationError> {
        let code = code.into();
        if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_lowercase()) {
            return Err(ValidationError::invalid_format(
                "language",
                format!("'{}' is not an ISO-639-1 code", code),
            ));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for LanguageCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LanguageCode> for String {
    fn from(code: LanguageCode) -> Self {
        code.0
    }
}

impl Default for LanguageCode {
    fn default() -> Self {
        Self("en".to_string())
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Complete settings for one generation conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    pub provider: Provider,
    pub duration_seconds: u32,
    pub platform: Platform,
    pub aspect_ratio: AspectRatio,
    pub language: LanguageCode,
}

impl GenerationSettings {
    /// Validates cross-field constraints.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.duration_seconds == 0 {
            return Err(ValidationError::out_of_range(
                "duration_seconds",
                1,
                i32::MAX,
                0,
            ));
        }
        Ok(())
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: Provider::ProviderB,
            duration_seconds: 15,
            platform: Platform::Tiktok,
            aspect_ratio: AspectRatio::Portrait,
            language: LanguageCode::default(),
        }
    }
}

/// Partially-populated settings as stored by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default)]
    pub provider: Option<Provider>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    #[serde(default)]
    pub platform: Option<Platform>,
    #[serde(default)]
    pub aspect_ratio: Option<AspectRatio>,
    #[serde(default)]
    pub language: Option<LanguageCode>,
}

impl SettingsPatch {
    /// Fills gaps in the stored record from `hint`. Stored values always win.
    pub fn overlay(self, hint: &GenerationSettings) -> GenerationSettings {
        GenerationSettings {
            provider: self.provider.unwrap_or(hint.provider),
            duration_seconds: self
                .duration_seconds
                .filter(|secs| *secs > 0)
                .unwrap_or(hint.duration_seconds),
            platform: self.platform.unwrap_or(hint.platform),
            aspect_ratio: self.aspect_ratio.unwrap_or(hint.aspect_ratio),
            language: self.language.unwrap_or_else(|| hint.language.clone()),
        }
    }
}

impl From<&GenerationSettings> for SettingsPatch {
    fn from(settings: &GenerationSettings) -> Self {
        Self {
            provider: Some(settings.provider),
            duration_seconds: Some(settings.duration_seconds),
            platform: Some(settings.platform),
            aspect_ratio: Some(settings.aspect_ratio),
            language: Some(settings.language.clone()),
        }
    }
}
