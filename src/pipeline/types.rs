//! Shared types for the classification pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ClassifyError;

/// Upper bound on normalized email text, in characters.
pub const MAX_CONTENT_CHARS: usize = 50_000;

/// Upper bound on a suggested reply, in characters.
pub const MAX_REPLY_CHARS: usize = 500;

/// Default preview length used in log lines.
pub const PREVIEW_CHARS: usize = 80;

// ── Uploaded file ───────────────────────────────────────────────────

/// A file as handed over by the HTTP layer.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied file name, if any. Logged only.
    pub file_name: Option<String>,
    /// Declared MIME type, if any.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(content_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: None,
            content_type: Some(content_type.into()),
            bytes: bytes.into(),
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }
}

// ── Email content ───────────────────────────────────────────────────

/// Where the email text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    File,
    InlineText,
}

impl Origin {
    pub fn label(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::InlineText => "text",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalized email text ready for classification.
///
/// The text is trimmed, non-empty and at most [`MAX_CONTENT_CHARS`]
/// characters. Those checks run in [`EmailContent::new`] only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    text: String,
    origin: Origin,
}

impl EmailContent {
    pub fn new(text: &str, origin: Origin) -> Result<Self, ClassifyError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ClassifyError::EmptyInput(format!(
                "email {} is empty",
                origin.label()
            )));
        }

        let chars = trimmed.chars().count();
        if chars > MAX_CONTENT_CHARS {
            return Err(ClassifyError::InvalidInput(format!(
                "email text has {chars} characters, limit is {MAX_CONTENT_CHARS}"
            )));
        }

        Ok(Self {
            text: trimmed.to_string(),
            origin,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_from_file(&self) -> bool {
        self.origin == Origin::File
    }

    pub fn is_from_text(&self) -> bool {
        self.origin == Origin::InlineText
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// First `max_chars` characters, with `...` appended when cut short.
    pub fn short_preview(&self, max_chars: usize) -> String {
        let head: String = self.text.chars().take(max_chars).collect();
        let head = head.trim_end();
        if self.char_count() > max_chars {
            format!("{head}...")
        } else {
            head.to_string()
        }
    }
}

// ── Classification result ───────────────────────────────────────────

/// The two classification categories.
///
/// Wire literals are the ones the model is instructed to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "produtivo")]
    Productive,
    #[serde(rename = "improdutivo")]
    Unproductive,
}

impl Category {
    pub const PRODUCTIVE_LITERAL: &'static str = "produtivo";
    pub const UNPRODUCTIVE_LITERAL: &'static str = "improdutivo";

    /// Exact, case-sensitive match against the wire literals.
    pub fn from_literal(value: &str) -> Option<Self> {
        match value {
            Self::PRODUCTIVE_LITERAL => Some(Self::Productive),
            Self::UNPRODUCTIVE_LITERAL => Some(Self::Unproductive),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> &'static str {
        match self {
            Self::Productive => Self::PRODUCTIVE_LITERAL,
            Self::Unproductive => Self::UNPRODUCTIVE_LITERAL,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_literal())
    }
}

/// A validated classification.
///
/// Only [`ClassificationResult::new`] builds one, so every field is always
/// present and in range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    category: Category,
    confidence: f64,
    suggested_reply: String,
    model_name: String,
}

impl ClassificationResult {
    pub fn new(
        category: Category,
        confidence: f64,
        suggested_reply: &str,
        model_name: impl Into<String>,
    ) -> Result<Self, ClassifyError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ClassifyError::MalformedResponse(format!(
                "confidence {confidence} is outside [0, 1]"
            )));
        }

        let reply = suggested_reply.trim();
        if reply.is_empty() {
            return Err(ClassifyError::MalformedResponse(
                "'reply' is empty".to_string(),
            ));
        }
        let reply_chars = reply.chars().count();
        if reply_chars > MAX_REPLY_CHARS {
            return Err(ClassifyError::MalformedResponse(format!(
                "'reply' has {reply_chars} characters, limit is {MAX_REPLY_CHARS}"
            )));
        }

        Ok(Self {
            category,
            confidence,
            suggested_reply: reply.to_string(),
            model_name: model_name.into(),
        })
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn suggested_reply(&self) -> &str {
        &self.suggested_reply
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn is_productive(&self) -> bool {
        self.category == Category::Productive
    }

    pub fn is_unproductive(&self) -> bool {
        self.category == Category::Unproductive
    }

    /// One-line audit summary.
    pub fn audit_line(&self) -> String {
        format!(
            "[model={}] [category={}] [confidence={:.2}] [reply_size={}]",
            self.model_name,
            self.category,
            self.confidence,
            self.suggested_reply.chars().count()
        )
    }
}
