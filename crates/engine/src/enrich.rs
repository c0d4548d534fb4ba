//! LLM enrichment of scored crops
//!
//! The recommendation flow depends only on the [`Enricher`] capability, which
//! must answer within a bounded time. The OpenAI implementation applies a
//! request timeout and a single retry, then degrades to the deterministic
//! fallback payload; it never surfaces an error into the request path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_retry::{strategy::FixedInterval, Retry};

use crate::scorer::ScoredCrop;
use crate::types::{Climate, Likelihood, MarketInfo, MarketPoint, PestDisease, RiskItem, Season, Soil, Trend};

const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(12);
const RETRY_DELAY_MS: u64 = 500;

const SYSTEM_PROMPT: &str = "You are an agriculture advisor for Indian farming contexts. \
    Be concise, practical, and avoid guarantees. Respond ONLY with valid JSON.";

/// Request context forwarded to the model
#[derive(Debug, Clone, Serialize)]
pub struct EnrichContext {
    pub soil: Soil,
    pub season: Season,
    pub month: Option<u8>,
    pub climate: Option<Climate>,
}

/// Enrichment fields for one crop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedCrop {
    pub crop: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub best_practices: Vec<String>,
    #[serde(default)]
    pub market: MarketInfo,
    #[serde(default)]
    pub pest_disease: PestDisease,
}

/// Capability interface for crop enrichment. Implementations must return
/// within a bounded time and fall back rather than fail.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, crops: &[ScoredCrop], ctx: &EnrichContext) -> Vec<EnrichedCrop>;
}

/// Deterministic fallback payload for one crop
pub fn fallback_for(crop: &ScoredCrop, ctx: &EnrichContext) -> EnrichedCrop {
    let (y0, y1) = crop.expected_yield_qpa;
    EnrichedCrop {
        crop: crop.crop.clone(),
        explanation: format!(
            "{} suits {} soil in {}. Duration {} days; expected {}-{} q/acre.",
            capitalize(&crop.crop),
            ctx.soil,
            ctx.season,
            crop.duration_days,
            y0,
            y1
        ),
        best_practices: vec![
            "Use certified seeds and recommended spacing.".to_string(),
            "Apply balanced NPK based on soil test.".to_string(),
            "Weed early during the first 3-4 weeks.".to_string(),
        ],
        market: MarketInfo {
            trend: Trend::Steady,
            last6m: (1..=6)
                .map(|m| MarketPoint {
                    month: m,
                    price: 3000.0 + 10.0 * f64::from(m),
                })
                .collect(),
        },
        pest_disease: PestDisease {
            risks: vec![RiskItem {
                name: "General pests".to_string(),
                likelihood: Likelihood::Medium,
                tip: "Scout weekly; keep field clean.".to_string(),
            }],
        },
    }
}

pub fn fallback_items(crops: &[ScoredCrop], ctx: &EnrichContext) -> Vec<EnrichedCrop> {
    crops.iter().map(|c| fallback_for(c, ctx)).collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Enricher that always answers with the fallback payload. Used when no API
/// key is configured and as the test double.
pub struct FallbackEnricher;

#[async_trait]
impl Enricher for FallbackEnricher {
    async fn enrich(&self, crops: &[ScoredCrop], ctx: &EnrichContext) -> Vec<EnrichedCrop> {
        fallback_items(crops, ctx)
    }
}

// OpenAI chat-completions wire types

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct EnrichmentDocument {
    #[serde(default)]
    items: Vec<EnrichedCrop>,
}

/// Parse the model's JSON answer, tolerating markdown code fences, and clamp
/// list sizes defensively.
pub(crate) fn parse_enrichment(content: &str) -> anyhow::Result<Vec<EnrichedCrop>> {
    let mut s = content.trim();
    if s.starts_with("```") {
        s = s.trim_matches('`').trim();
        s = s.strip_prefix("json").unwrap_or(s).trim();
    }

    let doc: EnrichmentDocument = serde_json::from_str(s)?;
    let mut items = doc.items;
    for item in &mut items {
        item.best_practices.truncate(3);
        item.market.last6m.truncate(6);
        item.pest_disease.risks.truncate(3);
    }
    Ok(items)
}

/// OpenAI-backed enricher
pub struct OpenAiEnricher {
    http: reqwest::Client,
    api_key: String,
    model: String,
    api_base_url: String,
}

impl OpenAiEnricher {
    pub fn new(api_key: String, model: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            api_key,
            model,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: String) -> Self {
        self.api_base_url = base_url;
        self
    }

    fn user_prompt(crops: &[ScoredCrop], ctx: &EnrichContext) -> String {
        let crops_json = serde_json::to_string(
            &crops
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "crop": c.crop,
                        "duration_days": c.duration_days,
                        "expected_yield_qpa": c.expected_yield_qpa,
                    })
                })
                .collect::<Vec<_>>(),
        )
        .unwrap_or_else(|_| "[]".to_string());
        let climate_json = serde_json::to_string(&ctx.climate.unwrap_or_default())
            .unwrap_or_else(|_| "{}".to_string());

        format!(
            concat!(
                "Given these inputs, enrich each crop with fields.\n\n",
                "Inputs:\n- soil: {soil}\n- season: {season}\n- month: {month}\n",
                "- climate: {climate}\n- crops: {crops}\n\n",
                "Return EXACT JSON (no commentary) with this schema:\n",
                "{{\"items\": [{{\"crop\": \"string (must match input)\", ",
                "\"explanation\": \"1-2 sentences\", ",
                "\"best_practices\": [\"short bullet\", \"short bullet\", \"short bullet\"], ",
                "\"market\": {{\"trend\": \"rising|steady|falling\", ",
                "\"last6m\": [{{\"month\": 1, \"price\": 0.0}}]}}, ",
                "\"pest_disease\": {{\"risks\": [{{\"name\": \"string\", ",
                "\"likelihood\": \"low|medium|high\", \"tip\": \"short actionable\"}}]}}}}]}}"
            ),
            soil = ctx.soil,
            season = ctx.season,
            month = ctx.month.unwrap_or(6),
            climate = climate_json,
            crops = crops_json,
        )
    }

    async fn request_once(
        &self,
        crops: &[ScoredCrop],
        ctx: &EnrichContext,
    ) -> anyhow::Result<Vec<EnrichedCrop>> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0.2,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": Self::user_prompt(crops, ctx)},
            ],
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("chat completion returned {}", response.status());
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();

        parse_enrichment(content)
    }
}

#[async_trait]
impl Enricher for OpenAiEnricher {
    async fn enrich(&self, crops: &[ScoredCrop], ctx: &EnrichContext) -> Vec<EnrichedCrop> {
        if self.api_key.is_empty() {
            return fallback_items(crops, ctx);
        }

        // One retry, then the deterministic fallback
        let strategy = FixedInterval::from_millis(RETRY_DELAY_MS).take(1);
        match Retry::spawn(strategy, || self.request_once(crops, ctx)).await {
            Ok(items) if !items.is_empty() => items,
            Ok(_) => {
                tracing::warn!("Enrichment returned no items; using fallback");
                fallback_items(crops, ctx)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Enrichment failed; using fallback");
                fallback_items(crops, ctx)
            }
        }
    }
}
