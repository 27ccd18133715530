//! Health-tip generation against a local Ollama-compatible endpoint.
//!
//! Generation is best-effort: callers degrade gracefully (the tips list
//! simply stays admin-authored) when the provider is unreachable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Patient;

const SYSTEM_PROMPT: &str = "You are a cautious health educator. Produce short, \
practical wellness tips. Never diagnose, never mention medication dosages, and \
always advise seeing a doctor for anything serious. Respond with a JSON array \
of objects with fields: title, summary, content, category.";

const DEFAULT_TIP_COUNT: usize = 3;

#[derive(Error, Debug)]
pub enum TipsError {
    #[error("tips provider unreachable at {0}")]
    Connection(String),

    #[error("tips provider request failed: {0}")]
    Http(String),

    #[error("tips provider returned status {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("could not parse generated tips: {0}")]
    MalformedResponse(String),
}

/// One generated tip before it is persisted as a personalized `HealthTip`.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedTip {
    pub title: String,
    pub summary: String,
    pub content: String,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    "general".to_string()
}

/// Non-identifying profile facts passed to the provider.
#[derive(Debug, Clone)]
pub struct ProfileSummary {
    pub age: u32,
    pub gender: String,
    pub chronic_conditions: Vec<String>,
    pub allergies: Vec<String>,
}

impl ProfileSummary {
    /// Extract only what personalization needs. Name and contact details
    /// never leave the process.
    pub fn from_patient(patient: &Patient, today: chrono::NaiveDate) -> Self {
        Self {
            age: patient.age_at(today),
            gender: patient.gender.as_str().to_string(),
            chronic_conditions: patient.chronic_conditions.clone(),
            allergies: patient.allergies.clone(),
        }
    }

    fn as_prompt(&self, count: usize) -> String {
        let mut facts = vec![format!("age {}", self.age), self.gender.clone()];
        if !self.chronic_conditions.is_empty() {
            facts.push(format!(
                "chronic conditions: {}",
                self.chronic_conditions.join(", ")
            ));
        }
        if !self.allergies.is_empty() {
            facts.push(format!("allergies: {}", self.allergies.join(", ")));
        }
        format!(
            "Generate {count} wellness tips for a patient ({}). JSON array only.",
            facts.join("; ")
        )
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// HTTP client for the tip-generation provider (`/api/generate`).
#[derive(Clone)]
pub struct TipsClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl TipsClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        }
    }

    pub async fn generate_tips(
        &self,
        profile: &ProfileSummary,
    ) -> Result<Vec<GeneratedTip>, TipsError> {
        let url = format!("{}/api/generate", self.base_url);
        let prompt = profile.as_prompt(DEFAULT_TIP_COUNT);
        let body = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            system: SYSTEM_PROMPT,
            stream: false,
        };

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_connect() {
                TipsError::Connection(self.base_url.clone())
            } else {
                TipsError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TipsError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| TipsError::MalformedResponse(e.to_string()))?;
        parse_tips(&generated.response)
    }
}

/// Parse the model's text into tips. Accepts a bare JSON array, an object
/// with a `tips` field, or an array buried in surrounding prose/fences.
pub fn parse_tips(raw: &str) -> Result<Vec<GeneratedTip>, TipsError> {
    #[derive(Deserialize)]
    struct Wrapped {
        tips: Vec<GeneratedTip>,
    }

    let trimmed = raw.trim();
    if let Ok(tips) = serde_json::from_str::<Vec<GeneratedTip>>(trimmed) {
        return Ok(tips);
    }
    if let Ok(wrapped) = serde_json::from_str::<Wrapped>(trimmed) {
        return Ok(wrapped.tips);
    }
    // Models often wrap the array in markdown fences or commentary; take
    // the outermost bracketed span.
    if let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']')) {
        if start < end {
            if let Ok(tips) = serde_json::from_str::<Vec<GeneratedTip>>(&trimmed[start..=end]) {
                return Ok(tips);
            }
        }
    }
    Err(TipsError::MalformedResponse(
        "no JSON tip array in provider output".into(),
    ))
}
