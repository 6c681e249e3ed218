use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{CapabilityError, Summarizer};

/// Character budget per chunk when a transcript exceeds one model call.
const CHUNK_SIZE: usize = 10_000;

/// Instruction-conditioned summarizer over an OpenAI-compatible
/// `/chat/completions` endpoint.
///
/// Long transcripts are split into chunks, each chunk is reduced to notes
/// under the caller's instruction, and the notes are combined into the final
/// summary. Short transcripts go through a single combine call.
pub struct ChatSummarizer {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl ChatSummarizer {
    pub fn new(api_base: String, api_key: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .expect("default reqwest client");

        Self {
            client,
            api_base,
            api_key,
            model,
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, CapabilityError> {
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": "You are an expert in summarizing content."},
                {"role": "user", "content": prompt},
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CapabilityError::Transient(format!("summarization request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(CapabilityError::Transient(format!(
                    "summarization API returned {status}: {text}"
                )));
            }
            return Err(CapabilityError::InputInvalid(format!(
                "summarization API rejected input ({status}): {text}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::Transient(format!("malformed summarization response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CapabilityError::Transient("summarization response had no choices".into()))
    }

    fn map_prompt(instruction: &str, chunk: &str) -> String {
        format!(
            "Analyze the following text based on this specific instruction:\n\
             INSTRUCTION: {instruction}\n\n\
             TEXT: {chunk}\n\n\
             Based on the above instruction, extract the key information and insights."
        )
    }

    fn combine_prompt(instruction: &str, text: &str) -> String {
        format!(
            "Create a detailed summary of the content following this specific instruction:\n\
             INSTRUCTION: {instruction}\n\n\
             Use the following content to create a coherent, well-structured summary:\n{text}\n\n\
             Your summary should be comprehensive, well-organized, and directly address the instruction."
        )
    }
}

/// Split text into chunks of at most `max_len` characters, preferring
/// paragraph boundaries, then line boundaries, then a hard character split.
fn split_into_chunks(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n") {
        let piece = if paragraph.len() > max_len {
            // Paragraph alone exceeds the budget; flush and hard-split it.
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let mut remainder = paragraph;
            while remainder.len() > max_len {
                let mut cut = max_len;
                while !remainder.is_char_boundary(cut) {
                    cut -= 1;
                }
                let window = &remainder[..cut];
                let split_at = window
                    .rfind('\n')
                    .or_else(|| window.rfind(' '))
                    .unwrap_or(cut);
                let (head, tail) = remainder.split_at(split_at.max(1));
                chunks.push(head.to_string());
                remainder = tail.trim_start();
            }
            remainder
        } else {
            paragraph
        };

        if current.len() + piece.len() + 2 > max_len && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(piece);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    async fn summarize(&self, text: &str, instruction: &str) -> Result<String, CapabilityError> {
        if instruction.trim().is_empty() {
            return Err(CapabilityError::InputInvalid(
                "summarization instruction is empty".into(),
            ));
        }
        if text.trim().is_empty() {
            return Err(CapabilityError::InputInvalid("transcript text is empty".into()));
        }

        let chunks = split_into_chunks(text, CHUNK_SIZE);
        tracing::info!(
            "Summarizing transcript ({} chars, {} chunk(s)) with model {}",
            text.len(),
            chunks.len(),
            self.model
        );

        if chunks.len() == 1 {
            return self.complete(&Self::combine_prompt(instruction, &chunks[0])).await;
        }

        let mut notes = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            tracing::debug!("Mapping chunk {}/{}", i + 1, chunks.len());
            notes.push(self.complete(&Self::map_prompt(instruction, chunk)).await?);
        }

        self.complete(&Self::combine_prompt(instruction, &notes.join("\n\n")))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = split_into_chunks("short transcript", 100);
        assert_eq!(chunks, vec!["short transcript".to_string()]);
    }

    #[test]
    fn test_chunks_respect_paragraph_boundaries() {
        let text = format!("{}\n\n{}", "a".repeat(60), "b".repeat(60));
        let chunks = split_into_chunks(&text, 100);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].chars().all(|c| c == 'a'));
        assert!(chunks[1].chars().all(|c| c == 'b'));
    }

    #[test]
    fn test_multibyte_text_splits_on_char_boundaries() {
        let text = "é".repeat(200);
        let chunks = split_into_chunks(&text, 101);
        assert!(chunks.len() > 1);
        assert_eq!(chunks.join(""), text);
    }

    #[test]
    fn test_oversized_paragraph_is_hard_split() {
        let text = "word ".repeat(100);
        let chunks = split_into_chunks(&text, 80);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 80));
    }

    #[tokio::test]
    async fn test_empty_instruction_is_input_invalid() {
        let summarizer =
            ChatSummarizer::new("http://localhost:0".into(), "test-key".into(), "gpt-4o".into());

        let err = summarizer.summarize("some transcript", "   ").await.unwrap_err();
        assert!(matches!(err, CapabilityError::InputInvalid(_)));
    }

    #[tokio::test]
    async fn test_empty_transcript_is_input_invalid() {
        let summarizer =
            ChatSummarizer::new("http://localhost:0".into(), "test-key".into(), "gpt-4o".into());

        let err = summarizer.summarize("", "summarize this").await.unwrap_err();
        assert!(matches!(err, CapabilityError::InputInvalid(_)));
    }
}
