//! Location extraction and filter building.
//!
//! The language-model call is non-deterministic, so its raw output always
//! passes through a normalization layer (`""`/`"unknown"`/`"none"` become
//! `None`, confidence is clamped) and is backed by a deterministic
//! rule-based fallback that finds no location.

use std::sync::OnceLock;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{Result, SearchError};
use crate::models::LocationIntent;

/// Strings the model uses for "not found".
const NULL_MARKERS: [&str; 3] = ["", "unknown", "none"];

/// Treat empty/unknown/none answers as absent.
fn normalize_component(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if NULL_MARKERS.contains(&trimmed.to_lowercase().as_str()) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Raw structured output from the extraction model.
#[derive(Debug, Default, Deserialize)]
pub struct RawExtraction {
    pub city: Option<String>,
    pub state: Option<String>,
    pub neighborhood: Option<String>,
    pub zip_code: Option<String>,
    #[serde(default)]
    pub has_location: bool,
    pub cleaned_query: Option<String>,
    #[serde(default)]
    pub confidence: f64,
}

/// Normalize a raw extraction into a [`LocationIntent`].
#[must_use]
pub fn normalize_extraction(raw: RawExtraction, original_query: &str) -> LocationIntent {
    let city = normalize_component(raw.city);
    let state = normalize_component(raw.state);
    let neighborhood = normalize_component(raw.neighborhood);
    let zip_code = normalize_component(raw.zip_code);
    // The flag is derived from what survived normalization, not from what
    // the model claims.
    let has_location =
        city.is_some() || state.is_some() || neighborhood.is_some() || zip_code.is_some();
    let cleaned_query = raw
        .cleaned_query
        .filter(|q| !q.trim().is_empty())
        .unwrap_or_else(|| original_query.to_string());
    LocationIntent {
        city,
        state,
        neighborhood,
        zip_code,
        has_location,
        cleaned_query,
        confidence: raw.confidence.clamp(0.0, 1.0),
    }
}

/// Extracts location intent from free text.
#[async_trait]
pub trait LocationExtractor: Send + Sync {
    async fn extract(&self, query: &str) -> Result<LocationIntent>;
}

/// Deterministic fallback: currently returns no location, leaving the raw
/// query untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedExtractor;

#[async_trait]
impl LocationExtractor for RuleBasedExtractor {
    async fn extract(&self, query: &str) -> Result<LocationIntent> {
        Ok(LocationIntent::none(query))
    }
}

const EXTRACTION_PROMPT: &str = "Extract location information from the real estate search \
query. Look for city names, state names or abbreviations, neighborhood names, and 5-digit \
ZIP codes. Convert state abbreviations to full names. Respond with JSON: {\"city\": string \
or \"unknown\", \"state\": string or \"unknown\", \"neighborhood\": string or \"unknown\", \
\"zip_code\": string or \"unknown\", \"has_location\": bool, \"cleaned_query\": the query \
with location terms removed, \"confidence\": number between 0 and 1}.";

/// Language-model-backed extractor calling a chat-completions endpoint
/// with a structured JSON response.
pub struct LlmLocationExtractor {
    base_url: String,
    model: String,
    api_key: String,
    client: OnceLock<reqwest::Client>,
}

impl LlmLocationExtractor {
    #[must_use]
    pub fn new(base_url: String, model: String, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> &reqwest::Client {
        self.client.get_or_init(reqwest::Client::new)
    }
}

#[async_trait]
impl LocationExtractor for LlmLocationExtractor {
    async fn extract(&self, query: &str) -> Result<LocationIntent> {
        let response = self
            .client()
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": EXTRACTION_PROMPT },
                    { "role": "user", "content": query },
                ],
                "response_format": { "type": "json_object" },
                "temperature": 0.0,
            }))
            .send()
            .await
            .map_err(|e| SearchError::Extraction(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SearchError::Extraction(format!(
                "extraction endpoint returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::Extraction(e.to_string()))?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| SearchError::Extraction("missing message content".to_string()))?;
        let raw: RawExtraction = serde_json::from_str(content)
            .map_err(|e| SearchError::Extraction(format!("malformed extraction JSON: {e}")))?;

        let intent = normalize_extraction(raw, query);
        debug!(?intent, "location extracted");
        Ok(intent)
    }
}

/// Extract with a fallback: any extractor failure degrades to the
/// rule-based result instead of failing the query.
pub async fn extract_with_fallback(
    extractor: &dyn LocationExtractor,
    query: &str,
) -> LocationIntent {
    match extractor.extract(query).await {
        Ok(intent) => intent,
        Err(e) => {
            warn!(error = %e, "location extraction failed; using rule-based fallback");
            LocationIntent::none(query)
        }
    }
}

/// Builds term filters from extracted intent. Filter translation:
/// city → `address.city` (lowercased), state → `address.state`,
/// neighborhood → `neighborhood.name.keyword`, zip → `address.zip_code`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationFilterBuilder;

impl LocationFilterBuilder {
    #[must_use]
    pub fn build_filters(intent: &LocationIntent) -> Vec<Value> {
        if !intent.has_location {
            return Vec::new();
        }
        let mut filters = Vec::new();
        if let Some(city) = &intent.city {
            filters.push(json!({ "term": { "address.city": city.to_lowercase() } }));
        }
        if let Some(state) = &intent.state {
            filters.push(json!({ "term": { "address.state": state } }));
        }
        if let Some(neighborhood) = &intent.neighborhood {
            filters.push(json!({ "term": { "neighborhood.name.keyword": neighborhood } }));
        }
        if let Some(zip) = &intent.zip_code {
            filters.push(json!({ "term": { "address.zip_code": zip } }));
        }
        filters
    }
}
