/// Prompt augmentation strategies
///
/// A strategy turns raw base text into richer prompt text before
/// composition. The remote-LLM variant is deliberately opaque: the
/// controller only ever sees `augment(base_text) -> text`, so swapping
/// providers never touches the core.
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

/// Prompt augmentation seam.
#[async_trait]
pub trait PromptAugmenter: Send + Sync {
    /// Strategy name.
    fn name(&self) -> &str;

    /// Produce prompt text from base text.
    async fn augment(&self, base_text: &str) -> Result<String>;

    /// Produce several candidate prompts from one base text.
    async fn augment_batch(&self, base_text: &str, count: usize) -> Result<Vec<String>> {
        let mut prompts = Vec::with_capacity(count);
        for _ in 0..count {
            prompts.push(self.augment(base_text).await?);
        }
        Ok(prompts)
    }
}

/// Identity strategy; the composer's local style bank supplies all
/// variety.
pub struct PassthroughAugmenter;

#[async_trait]
impl PromptAugmenter for PassthroughAugmenter {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn augment(&self, base_text: &str) -> Result<String> {
        Ok(base_text.to_string())
    }
}

/// Remote LLM strategy. Sends the base text wrapped in an instruction
/// and returns the model's text verbatim.
pub struct LlmAugmenter {
    api_url: String,
    api_key: String,
    client: reqwest::Client,
    instruction: String,
}

const DEFAULT_INSTRUCTION: &str = "Create one short visual scene prompt for a Stable Diffusion \
video performance based on the text below. It should feel cinematic and match the mood. \
Format the response as one descriptive line.";

impl LlmAugmenter {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            api_url,
            api_key,
            client: reqwest::Client::new(),
            instruction: DEFAULT_INSTRUCTION.to_string(),
        }
    }

    /// Set a custom instruction prefix.
    pub fn with_instruction(mut self, instruction: String) -> Self {
        self.instruction = instruction;
        self
    }
}

#[async_trait]
impl PromptAugmenter for LlmAugmenter {
    fn name(&self) -> &str {
        "llm"
    }

    async fn augment(&self, base_text: &str) -> Result<String> {
        let request_body = serde_json::json!({
            "contents": [{
                "parts": [{
                    "text": format!("{}\n\nText: \"{}\"", self.instruction, base_text),
                }],
            }],
        });

        let response = self
            .client
            .post(&self.api_url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("augmenter request failed: {}", response.status());
        }

        let result: GenerateContentResponse = response.json().await?;
        let text = result
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text.trim().to_string())
            .filter(|t| !t.is_empty());

        match text {
            Some(text) => Ok(text),
            None => anyhow::bail!("augmenter returned no text"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}
