// Capability responses synthesized from the provider registry

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::ProviderEntry;
use crate::proxy::Snapshot;

const OWNED_BY: &str = "ollama-proxy";
const PROXY_FORMAT: &str = "proxy";
const UNKNOWN_SIZE: &str = "N/A";

const DEFAULT_PARAMETERS: &str = "# No specific parameters defined in proxy config";
const DEFAULT_TEMPLATE: &str =
    "{{ if .System }}System: {{ .System }}{{ end }}\nUser: {{ .Prompt }}\nAssistant: {{ .Response }}";

// OpenAI compatible listing

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ModelsResponse {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

impl ModelsResponse {
    pub fn from_snapshot(snapshot: &Snapshot, now: DateTime<Utc>) -> Self {
        Self {
            object: "list".to_string(),
            data: snapshot
                .list()
                .iter()
                .map(|entry| ModelInfo {
                    id: entry.alias.clone(),
                    object: "model".to_string(),
                    created: now.timestamp(),
                    owned_by: OWNED_BY.to_string(),
                })
                .collect(),
        }
    }
}

// Ollama tag listing

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OllamaModelDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_model: Option<String>,
    pub format: String,
    pub family: String,
    pub families: Vec<String>,
    pub parameter_size: String,
    pub quantization_level: String,
}

impl OllamaModelDetails {
    /// The proxy knows nothing about the upstream weights.
    fn placeholder(with_parent: bool) -> Self {
        Self {
            parent_model: with_parent.then(String::new),
            format: PROXY_FORMAT.to_string(),
            family: PROXY_FORMAT.to_string(),
            families: Vec::new(),
            parameter_size: UNKNOWN_SIZE.to_string(),
            quantization_level: UNKNOWN_SIZE.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct OllamaTag {
    pub name: String,
    pub model: String,
    pub modified_at: String,
    pub size: u64,
    pub digest: String,
    pub details: OllamaModelDetails,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct OllamaTagsResponse {
    pub models: Vec<OllamaTag>,
}

impl OllamaTagsResponse {
    pub fn from_snapshot(snapshot: &Snapshot, now: DateTime<Utc>) -> Self {
        let modified_at = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        Self {
            models: snapshot
                .list()
                .iter()
                .map(|entry| OllamaTag {
                    name: entry.alias.clone(),
                    model: entry.alias.clone(),
                    modified_at: modified_at.clone(),
                    size: 0,
                    digest: String::new(),
                    details: OllamaModelDetails::placeholder(false),
                })
                .collect(),
        }
    }
}

// Ollama show

#[derive(Debug, Deserialize)]
pub struct OllamaShowRequest {
    #[serde(default)]
    pub model: Option<String>,
    /// Older Ollama clients send `name` instead of `model`.
    #[serde(default)]
    pub name: Option<String>,
}

impl OllamaShowRequest {
    pub fn effective_model(&self) -> &str {
        self.model
            .as_deref()
            .filter(|m| !m.is_empty())
            .or(self.name.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct OllamaShowResponse {
    pub license: String,
    pub modelfile: String,
    pub parameters: String,
    pub template: String,
    pub details: OllamaModelDetails,
    pub model_info: Map<String, Value>,
    pub capabilities: Vec<String>,
}

impl OllamaShowResponse {
    /// `None` when no entry has this alias.
    pub fn from_snapshot(snapshot: &Snapshot, alias: &str) -> Option<Self> {
        snapshot.lookup(alias).map(Self::from_entry)
    }

    pub fn from_entry(entry: &ProviderEntry) -> Self {
        let or_default = |value: &Option<String>, default: String| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or(default)
        };

        Self {
            license: String::new(),
            modelfile: or_default(
                &entry.modelfile,
                format!("# Modelfile for {} (proxied)\nFROM scratch", entry.alias),
            ),
            parameters: or_default(&entry.parameters, DEFAULT_PARAMETERS.to_string()),
            template: or_default(&entry.template, DEFAULT_TEMPLATE.to_string()),
            details: OllamaModelDetails::placeholder(true),
            model_info: placeholder_model_info(&entry.alias),
            capabilities: Vec::new(),
        }
    }
}

fn placeholder_model_info(alias: &str) -> Map<String, Value> {
    let info = json!({
        "general.architecture": "llama",
        "general.name": alias,
        "general.file_type": 2,
        "general.parameter_count": 0,
        "llama.context_length": 120000,
        "llama.block_count": 0,
        "llama.embedding_length": 0,
        "llama.attention.head_count": 0,
        "llama.attention.head_count_kv": 0,
        "llama.attention.layer_norm_rms_epsilon": 0.00001,
        "llama.feed_forward_length": 0,
        "llama.rope.dimension_count": 0,
        "llama.rope.freq_base": 500000,
        "llama.vocab_size": 0,
        "tokenizer.ggml.model": "gpt2",
        "tokenizer.ggml.bos_token_id": 0,
        "tokenizer.ggml.eos_token_id": 0
    });

    match info {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProviderRegistry;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn entry(alias: &str) -> ProviderEntry {
        ProviderEntry {
            alias: alias.to_string(),
            provider_kind: None,
            api_base: Some("http://localhost/v1".to_string()),
            upstream_model: format!("{alias}-upstream"),
            api_key: "k".to_string(),
            system_message: None,
            modelfile: None,
            parameters: None,
            template: None,
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_models_echo_aliases_in_order() {
        let registry = ProviderRegistry::new();
        registry.load(vec![entry("b"), entry("a")]);

        let response = ModelsResponse::from_snapshot(&registry.snapshot(), fixed_now());
        assert_eq!(response.object, "list");
        let ids: Vec<_> = response.data.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(response.data[0].object, "model");
        assert_eq!(response.data[0].owned_by, "ollama-proxy");
        assert_eq!(response.data[0].created, fixed_now().timestamp());
    }

    #[test]
    fn test_tags_for_empty_registry_serialize_as_empty_list() {
        let registry = ProviderRegistry::new();
        let response = OllamaTagsResponse::from_snapshot(&registry.snapshot(), fixed_now());
        assert_eq!(serde_json::to_value(&response).unwrap(), json!({ "models": [] }));
    }

    #[test]
    fn test_tag_placeholders() {
        let registry = ProviderRegistry::new();
        registry.load(vec![entry("gpt")]);

        let response = OllamaTagsResponse::from_snapshot(&registry.snapshot(), fixed_now());
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({
                "models": [{
                    "name": "gpt",
                    "model": "gpt",
                    "modified_at": "2024-05-01T12:00:00.000Z",
                    "size": 0,
                    "digest": "",
                    "details": {
                        "format": "proxy",
                        "family": "proxy",
                        "families": [],
                        "parameter_size": "N/A",
                        "quantization_level": "N/A"
                    }
                }]
            })
        );
    }

    #[test]
    fn test_show_defaults() {
        let show = OllamaShowResponse::from_entry(&entry("gpt"));
        assert_eq!(show.modelfile, "# Modelfile for gpt (proxied)\nFROM scratch");
        assert_eq!(show.parameters, DEFAULT_PARAMETERS);
        assert_eq!(show.template, DEFAULT_TEMPLATE);
        assert_eq!(show.details.parent_model.as_deref(), Some(""));
        assert_eq!(show.model_info["general.name"], json!("gpt"));
        assert_eq!(show.model_info["llama.context_length"], json!(120000));
        assert!(show.capabilities.is_empty());
    }

    #[test]
    fn test_show_overrides() {
        let mut e = entry("gpt");
        e.modelfile = Some("FROM custom".to_string());
        e.parameters = Some("temperature 0.1".to_string());
        e.template = Some(String::new());

        let show = OllamaShowResponse::from_entry(&e);
        assert_eq!(show.modelfile, "FROM custom");
        assert_eq!(show.parameters, "temperature 0.1");
        // Empty override falls back to the default.
        assert_eq!(show.template, DEFAULT_TEMPLATE);
    }

    #[test]
    fn test_show_unknown_alias() {
        let registry = ProviderRegistry::new();
        registry.load(vec![entry("gpt")]);
        assert!(OllamaShowResponse::from_snapshot(&registry.snapshot(), "unknown").is_none());
        assert!(OllamaShowResponse::from_snapshot(&registry.snapshot(), "gpt").is_some());
    }

    #[test]
    fn test_show_request_accepts_name() {
        let req: OllamaShowRequest = serde_json::from_str(r#"{"name":"gpt"}"#).unwrap();
        assert_eq!(req.effective_model(), "gpt");
        let req: OllamaShowRequest = serde_json::from_str(r#"{"model":"a","name":"b"}"#).unwrap();
        assert_eq!(req.effective_model(), "a");
        let req: OllamaShowRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.effective_model(), "");
    }
}
