// Proxy module - provider registry and request translation

pub mod registry;
pub mod translator;

use serde::{Deserialize, Serialize};

pub use registry::{ProviderRegistry, Snapshot};
pub use translator::{translate, TranslatedRequest};

/// Upstream provider family named by the `provider` field of an entry.
///
/// Known families carry a default API base; anything else is `Custom` and
/// must set `apiBase` explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProviderKind {
    Novita,
    SiliconFlow,
    Groq,
    XAi,
    Gemini,
    Custom(String),
}

/// Base URLs used when an entry omits `apiBase`.
/// Format: (kind name, api base)
static KNOWN_PROVIDERS: &[(&str, &str)] = &[
    ("novita", "https://api.novita.ai/v3/openai"),
    ("siliconflow", "https://api.siliconflow.cn/v1"),
    ("groq", "https://api.groq.com/openai/v1"),
    ("xai", "https://api.x.ai/v1"),
    ("gemini", "https://generativelanguage.googleapis.com/v1beta/openai"),
];

impl ProviderKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Novita => "novita",
            Self::SiliconFlow => "siliconflow",
            Self::Groq => "groq",
            Self::XAi => "xai",
            Self::Gemini => "gemini",
            Self::Custom(name) => name,
        }
    }

    /// Default API base for known families, `None` for custom kinds.
    pub fn default_api_base(&self) -> Option<&'static str> {
        if matches!(self, Self::Custom(_)) {
            return None;
        }
        KNOWN_PROVIDERS
            .iter()
            .find(|(name, _)| *name == self.as_str())
            .map(|(_, base)| *base)
    }
}

impl From<String> for ProviderKind {
    fn from(name: String) -> Self {
        match name.trim().to_lowercase().as_str() {
            "novita" => Self::Novita,
            "siliconflow" => Self::SiliconFlow,
            "groq" => Self::Groq,
            "xai" => Self::XAi,
            "gemini" => Self::Gemini,
            _ => Self::Custom(name),
        }
    }
}

impl From<ProviderKind> for String {
    fn from(kind: ProviderKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_kind_names_are_case_insensitive() {
        assert_eq!(ProviderKind::from("xAI".to_string()), ProviderKind::XAi);
        assert_eq!(
            ProviderKind::from("SiliconFlow".to_string()),
            ProviderKind::SiliconFlow
        );
        assert_eq!(
            ProviderKind::from("openrouter".to_string()),
            ProviderKind::Custom("openrouter".to_string())
        );
    }

    #[test]
    fn test_default_api_base() {
        assert_eq!(
            ProviderKind::Novita.default_api_base(),
            Some("https://api.novita.ai/v3/openai")
        );
        assert_eq!(
            ProviderKind::Groq.default_api_base(),
            Some("https://api.groq.com/openai/v1")
        );
        assert_eq!(ProviderKind::Custom("novita".into()).default_api_base(), None);
    }
}
