//! watsonx.ai text-generation request and response bodies

use serde::{Deserialize, Serialize};

/// `POST /ml/v1/text/generation` body
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub input: String,
    pub parameters: GenerationParameters,
    pub model_id: String,
    pub project_id: String,
    pub moderations: Moderations,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodingMethod {
    Greedy,
    Sample,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationParameters {
    pub decoding_method: DecodingMethod,
    pub max_new_tokens: u32,
    pub min_new_tokens: u32,
    pub repetition_penalty: f64,
    pub stop_sequences: Vec<String>,
    /// Only sent for sample decoding; the API rejects it for greedy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl GenerationParameters {
    /// Pick the decoding method from the temperature
    pub fn new(max_new_tokens: u32, temperature: f64, repetition_penalty: f64) -> Self {
        let sample = temperature > 0.0;
        Self {
            decoding_method: if sample {
                DecodingMethod::Sample
            } else {
                DecodingMethod::Greedy
            },
            max_new_tokens,
            min_new_tokens: 0,
            repetition_penalty,
            stop_sequences: Vec::new(),
            temperature: sample.then_some(temperature),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Moderations {
    pub hap: ModerationPair,
    pub pii: ModerationPair,
    pub granite_guardian: GuardianModeration,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModerationPair {
    pub input: ModerationFilter,
    pub output: ModerationFilter,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModerationFilter {
    pub enabled: bool,
    pub threshold: f64,
    pub mask: ModerationMask,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModerationMask {
    pub remove_entity_value: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuardianModeration {
    pub input: GuardianFilter,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuardianFilter {
    pub enabled: bool,
    pub threshold: f64,
}

impl ModerationPair {
    fn masked(threshold: f64) -> Self {
        let filter = ModerationFilter {
            enabled: true,
            threshold,
            mask: ModerationMask {
                remove_entity_value: true,
            },
        };
        Self {
            input: filter.clone(),
            output: filter,
        }
    }
}

impl Default for Moderations {
    /// HAP and PII masking on both directions, guardian off
    fn default() -> Self {
        Self {
            hap: ModerationPair::masked(0.5),
            pii: ModerationPair::masked(0.5),
            granite_guardian: GuardianModeration {
                input: GuardianFilter {
                    enabled: false,
                    threshold: 1.0,
                },
            },
        }
    }
}

/// Generation response; only the fields the planner reads
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub results: Option<Vec<GenerationResult>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationResult {
    #[serde(default)]
    pub generated_text: Option<String>,
    #[serde(default)]
    pub generated_token_count: Option<u32>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}
