//! Token counting and token-bounded splitting.
//!
//! [`HeuristicCounter`] estimates ~4 characters per token and is always
//! available. With the `tokenizer` feature, [`HfTokenizerCounter`] loads the
//! target model's `tokenizer.json` and splits on real token boundaries.
//!
//! Splitting is pure: the same text and budget always produce the same chunks.

use std::sync::Arc;

use tracing::warn;
use vitalchat_config::SynthesisConfig;

/// A contiguous slice of a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position in the payload; summaries are reassembled in this order.
    pub index: usize,
    /// Byte offset of `text` within the payload.
    pub start: usize,
    pub text: String,
    pub tokens: usize,
}

pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;

    /// Split into chunks of at most `max_tokens` tokens each.
    fn split(&self, text: &str, max_tokens: usize) -> Vec<Chunk>;

    /// Whether counts come from the model's own tokenizer.
    fn is_exact(&self) -> bool;
}

/// ~4 characters per token, rounded up.
#[derive(Debug, Clone)]
pub struct HeuristicCounter;

const CHARS_PER_TOKEN: usize = 4;

impl HeuristicCounter {
    pub fn new() -> Self {
        warn!("Token counts are approximate (chars/4); configure tokenizer_path for exact counts");
        Self
    }
}

impl Default for HeuristicCounter {
    fn default() -> Self {
        Self::new()
    }
}

fn estimate(chars: usize) -> usize {
    chars.div_ceil(CHARS_PER_TOKEN)
}

impl TokenCounter for HeuristicCounter {
    fn count(&self, text: &str) -> usize {
        estimate(text.chars().count())
    }

    fn split(&self, text: &str, max_tokens: usize) -> Vec<Chunk> {
        let max_chars = max_tokens.max(1) * CHARS_PER_TOKEN;
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut chars = 0;

        for (offset, _) in text.char_indices() {
            if chars == max_chars {
                push_chunk(&mut chunks, text, start, offset, estimate(chars));
                start = offset;
                chars = 0;
            }
            chars += 1;
        }
        if chars > 0 {
            push_chunk(&mut chunks, text, start, text.len(), estimate(chars));
        }
        chunks
    }

    fn is_exact(&self) -> bool {
        false
    }
}

fn push_chunk(chunks: &mut Vec<Chunk>, text: &str, start: usize, end: usize, tokens: usize) {
    chunks.push(Chunk {
        index: chunks.len(),
        start,
        text: text[start..end].to_string(),
        tokens,
    });
}

/// Exact counts from a HuggingFace `tokenizer.json`.
#[cfg(feature = "tokenizer")]
pub struct HfTokenizerCounter {
    tokenizer: tokenizers::Tokenizer,
}

#[cfg(feature = "tokenizer")]
impl HfTokenizerCounter {
    pub fn from_file(path: &std::path::Path) -> Result<Self, vitalchat_core::Error> {
        let tokenizer =
            tokenizers::Tokenizer::from_file(path).map_err(|e| vitalchat_core::Error::Config {
                message: format!("Failed to load tokenizer {}: {e}", path.display()),
            })?;
        Ok(Self { tokenizer })
    }

    fn offsets(&self, text: &str) -> Option<Vec<(usize, usize)>> {
        match self.tokenizer.encode(text, false) {
            Ok(encoding) => Some(encoding.get_offsets().to_vec()),
            Err(e) => {
                warn!(error = %e, "Tokenizer failed, falling back to estimate");
                None
            }
        }
    }
}

#[cfg(feature = "tokenizer")]
impl TokenCounter for HfTokenizerCounter {
    fn count(&self, text: &str) -> usize {
        match self.offsets(text) {
            Some(offsets) => offsets.len(),
            None => estimate(text.chars().count()),
        }
    }

    fn split(&self, text: &str, max_tokens: usize) -> Vec<Chunk> {
        let max_tokens = max_tokens.max(1);
        let Some(offsets) = self.offsets(text) else {
            return HeuristicCounter.split(text, max_tokens);
        };

        let mut chunks = Vec::new();
        let mut start = 0;
        for window in offsets.chunks(max_tokens) {
            let next = offsets
                .get((chunks.len() + 1) * max_tokens)
                .map(|&(s, _)| s)
                .filter(|&s| text.is_char_boundary(s))
                .unwrap_or(text.len());
            push_chunk(&mut chunks, text, start, next, window.len());
            start = next;
        }
        if start < text.len() {
            // Trailing text the tokenizer produced no tokens for
            if let Some(last) = chunks.last_mut() {
                last.text.push_str(&text[start..]);
            }
        }
        chunks
    }

    fn is_exact(&self) -> bool {
        true
    }
}

/// The counter named by the configuration.
pub fn counter_from_config(config: &SynthesisConfig) -> Arc<dyn TokenCounter> {
    #[cfg(feature = "tokenizer")]
    if let Some(path) = &config.tokenizer_path {
        match HfTokenizerCounter::from_file(path) {
            Ok(counter) => return Arc::new(counter),
            Err(e) => warn!(error = %e, "Using heuristic token counts"),
        }
    }

    #[cfg(not(feature = "tokenizer"))]
    if let Some(path) = &config.tokenizer_path {
        warn!(
            path = %path.display(),
            "tokenizer_path is set but the tokenizer feature is disabled"
        );
    }

    Arc::new(HeuristicCounter::new())
}
