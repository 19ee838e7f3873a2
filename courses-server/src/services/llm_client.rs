//! External classifier client (OpenAI-compatible chat API)
//!
//! Every failure mode (missing API key, network error, timeout, HTTP error
//! status, unparseable response) collapses to `None`. Callers fall back to
//! keyword rules, the default section, or an empty import result; the
//! classifier being down is never an error the user sees.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use courses_common::api::{truncate_chars, ImportEntry};
use courses_common::config::LlmSettings;
use courses_common::db::models::Section;

/// Max length (chars) of an item name sent for single classification
const CLASSIFY_INPUT_MAX_CHARS: usize = 200;
/// Max length (chars) of pasted text sent for import normalization
const IMPORT_INPUT_MAX_CHARS: usize = 4000;

/// Black-box section classifier. Both calls fail closed: any transport or
/// parse problem yields `None`, never an error.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify one item name into a candidate section slug
    async fn classify_one(&self, name: &str, candidates: &[Section]) -> Option<String>;

    /// Normalize pasted free text into structured import entries
    async fn classify_bulk(&self, text: &str, candidates: &[Section])
        -> Option<Vec<ImportEntry>>;
}

/// Classifier backed by an OpenAI-compatible chat completions endpoint
pub struct LlmClient {
    http: reqwest::Client,
    settings: LlmSettings,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    /// One chat completion round-trip. `None` on any failure.
    async fn call(&self, prompt: &str, max_tokens: u32, timeout: Duration) -> Option<String> {
        if self.settings.api_key.trim().is_empty() {
            return None;
        }
        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
        };
        let response = self
            .http
            .post(&self.settings.api_url)
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .timeout(timeout)
            .send()
            .await;
        let response = match response {
            Ok(r) => r,
            Err(e) => {
                warn!("LLM call failed: {}", e);
                return None;
            }
        };
        if !response.status().is_success() {
            warn!("LLM call failed: status {}", response.status());
            return None;
        }
        let body: ChatResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!("LLM response parse failed: {}", e);
                return None;
            }
        };
        body.choices.into_iter().next()?.message?.content
    }
}

/// Render the section catalog as "slug=label, slug=label, ..." for prompts
fn sections_fr(candidates: &[Section]) -> String {
    candidates
        .iter()
        .map(|s| format!("{}={}", s.name_slug, s.label_fr))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Strip the markdown code fences some models wrap around JSON output
fn strip_code_fences(content: &str) -> &str {
    let content = content.trim();
    let Some(stripped) = content.strip_prefix("```") else {
        return content;
    };
    // drop the fence line (possibly "```json"), then the closing fence
    let stripped = match stripped.find('\n') {
        Some(idx) => &stripped[idx + 1..],
        None => stripped,
    };
    stripped.trim_end().trim_end_matches("```").trim()
}

/// Parse and sanitize the bulk normalization response. `None` when the
/// content is not a JSON array; entries with unusable names are dropped and
/// unknown section slugs are nulled out.
fn parse_bulk_content(content: &str, candidates: &[Section]) -> Option<Vec<ImportEntry>> {
    let parsed: serde_json::Value = serde_json::from_str(strip_code_fences(content)).ok()?;
    let entries = parsed.as_array()?;
    let valid_slugs: HashSet<&str> = candidates.iter().map(|s| s.name_slug.as_str()).collect();

    let mut result = Vec::new();
    for entry in entries {
        let Some(obj) = entry.as_object() else {
            continue;
        };
        let name = match obj.get("name") {
            Some(serde_json::Value::String(s)) => s.trim().to_string(),
            _ => continue,
        };
        if name.is_empty() {
            continue;
        }
        let quantity = match obj.get("quantity") {
            Some(serde_json::Value::String(s)) => s.trim().to_string(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let section_slug = obj
            .get("section_slug")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| valid_slugs.contains(s.as_str()));
        result.push(ImportEntry {
            name,
            quantity,
            section_slug,
        });
    }
    Some(result)
}

#[async_trait]
impl Classifier for LlmClient {
    async fn classify_one(&self, name: &str, candidates: &[Section]) -> Option<String> {
        let name = truncate_chars(name.trim(), CLASSIFY_INPUT_MAX_CHARS);
        if name.is_empty() {
            return None;
        }
        let prompt = format!(
            "Tu es un assistant. Voici la liste des sections d'un supermarché (slug=label): {}. \
             Pour l'article suivant, réponds UNIQUEMENT avec le slug de la section appropriée, \
             rien d'autre. Article: « {} »",
            sections_fr(candidates),
            name
        );
        let content = self
            .call(
                &prompt,
                20,
                Duration::from_secs(self.settings.classify_timeout_secs),
            )
            .await?;
        let slug = content.split_whitespace().next()?.to_string();
        debug!(slug = %slug, "LLM classification response");
        Some(slug)
    }

    async fn classify_bulk(
        &self,
        text: &str,
        candidates: &[Section],
    ) -> Option<Vec<ImportEntry>> {
        let text = truncate_chars(text.trim(), IMPORT_INPUT_MAX_CHARS);
        if text.is_empty() {
            return None;
        }
        let prompt = format!(
            "L'utilisateur a collé une liste de courses en texte libre. Elle peut être \
             désordonnée (formats variés : « Nom : quantité », « quantité nom », tirets, \
             numéros, etc.). Certaines lignes peuvent contenir des éléments à ignorer comme \
             le titre d'une section.\n\
             Normalise-la en un tableau JSON. Chaque élément doit être un objet avec exactement :\n\
             - \"name\" : string (nom de l'article normalisé avec une majuscule, sans les détails autour)\n\
             - \"quantity\" : string (quantité, peut être \"\" si aucune)\n\
             - \"section_slug\" : string ou null (un des slugs ci-dessous, ou null si inconnu)\n\
             Sections autorisées (slug=label) : {}.\n\
             Réponds UNIQUEMENT par le tableau JSON minifié, sans markdown, sans explication.\n\n\
             Liste collée par l'utilisateur :\n{}",
            sections_fr(candidates),
            text
        );
        let content = self
            .call(
                &prompt,
                1024,
                Duration::from_secs(self.settings.import_timeout_secs),
            )
            .await?;
        match parse_bulk_content(&content, candidates) {
            Some(items) => {
                info!(count = items.len(), "LLM import normalized");
                Some(items)
            }
            None => {
                warn!("LLM import normalize failed: response is not a JSON array");
                None
            }
        }
    }
}
