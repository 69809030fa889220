//! Classification gateway: asks the LLM for a category and reply, then
//! validates the answer against a fixed schema.
//!
//! Flow per request:
//! 1. `build_prompt()`: deterministic prompt with criteria and few-shot examples
//! 2. `LlmProvider::complete()`: low temperature, JSON mode, optional deadline
//! 3. `parse_classification()`: strict field-by-field validation
//!
//! **No retries.** Upstream and schema failures are returned to the caller as-is.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ClassifyError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::types::{
    Category, ClassificationResult, EmailContent, PREVIEW_CHARS,
};

/// Default model when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Temperature for classification (deterministic-ish).
const CLASSIFY_TEMPERATURE: f32 = 0.1;

/// Max tokens for the classification call. The answer is a tiny JSON object.
const CLASSIFY_MAX_TOKENS: u32 = 256;

const SYSTEM_PROMPT: &str = "Você é um assistente JSON preciso.";

/// Gateway settings, fixed at construction.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Identifier reported in every result. Never taken from the model output.
    pub model_name: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Deadline for the completion call. `None` waits indefinitely.
    pub completion_timeout: Option<Duration>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            temperature: CLASSIFY_TEMPERATURE,
            max_tokens: CLASSIFY_MAX_TOKENS,
            completion_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Obtains validated classifications from an LLM.
pub struct ClassificationGateway {
    llm: Arc<dyn LlmProvider>,
    config: GatewayConfig,
}

impl ClassificationGateway {
    pub fn new(llm: Arc<dyn LlmProvider>, config: GatewayConfig) -> Self {
        Self { llm, config }
    }

    pub fn model_name(&self) -> &str {
        &self.config.model_name
    }

    /// Classify one email.
    pub async fn classify(
        &self,
        content: &EmailContent,
    ) -> Result<ClassificationResult, ClassifyError> {
        info!(
            origin = %content.origin(),
            preview = %content.short_preview(PREVIEW_CHARS),
            "Classifying email"
        );

        let request = CompletionRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(content.text())),
        ])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens)
        .with_json_mode(true);

        let raw = self.complete(request).await?;

        let preview: String = raw.chars().take(200).collect();
        debug!(raw_response = %preview, "Completion received");

        let result = parse_classification(&raw, &self.config.model_name).inspect_err(|e| {
            warn!(raw_response = %preview, error = %e, "Rejected model response");
        })?;

        info!(audit = %result.audit_line(), "Email classified");
        Ok(result)
    }

    /// Run the completion, mapping every failure to `UpstreamFailure`.
    ///
    /// When the deadline fires the provider future is dropped, which abandons
    /// the in-flight HTTP request.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ClassifyError> {
        let call = self.llm.complete(request);

        let outcome = match self.config.completion_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                error_upstream(format!("completion timed out after {}ms", limit.as_millis()))
            })?,
            None => call.await,
        };

        let response = outcome.map_err(|e| error_upstream(format!("completion call failed: {e}")))?;

        if response.content.trim().is_empty() {
            return Err(error_upstream("completion returned no content".to_string()));
        }
        Ok(response.content)
    }
}

fn error_upstream(detail: String) -> ClassifyError {
    warn!(detail = %detail, "Upstream completion failed");
    ClassifyError::UpstreamFailure(detail)
}

// ── Prompt construction ─────────────────────────────────────────────

const FEW_SHOT_EXAMPLES: &str = "\
Exemplo 1:
Email: \"Bom dia, poderia me informar o status da minha requisição #12345?\"
Classificação: produtivo
Resposta: \"Bom dia! Vou verificar o status da requisição #12345 e retorno em breve.\"

Exemplo 2:
Email: \"Feliz Natal e um ótimo ano novo para toda equipe!\"
Classificação: improdutivo
Resposta: \"Obrigado pelo carinho! Feliz Natal também!\"";

/// Build the classification prompt. Same text in, same prompt out.
pub fn build_prompt(email_text: &str) -> String {
    format!(
        "Você é um classificador de emails para o setor financeiro.\n\n\
         CRITÉRIOS:\n\
         - PRODUTIVO: requer ação, resposta específica, status, dúvida, arquivo, solicitação.\n\
         - IMPRODUTIVO: saudações, feriados, spam, conversas informais.\n\n\
         {FEW_SHOT_EXAMPLES}\n\n\
         Email a classificar:\n\n\
         {email_text}\n\n\
         Responda APENAS com um objeto JSON válido contendo exatamente as chaves:\n\
         {{\n  \
           \"category\": \"{productive}\" ou \"{unproductive}\",\n  \
           \"confidence\": número entre 0 e 1,\n  \
           \"reply\": \"resposta curta e formal (máx 2 frases)\"\n\
         }}",
        productive = Category::PRODUCTIVE_LITERAL,
        unproductive = Category::UNPRODUCTIVE_LITERAL,
    )
}

// ── Response validation ─────────────────────────────────────────────

fn malformed(detail: impl Into<String>) -> ClassifyError {
    ClassifyError::MalformedResponse(detail.into())
}

/// Validate a raw completion and build the result.
///
/// Checks run in order: JSON object, `category`, `confidence`, `reply`.
/// Unknown keys are ignored. `model_name` is supplied by the caller.
pub fn parse_classification(
    raw: &str,
    model_name: &str,
) -> Result<ClassificationResult, ClassifyError> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|e| malformed(format!("response is not valid JSON: {e}")))?;

    let Value::Object(fields) = value else {
        return Err(malformed("response is not a JSON object"));
    };

    let category = match fields.get("category") {
        None => return Err(malformed("missing 'category'")),
        Some(Value::String(literal)) => Category::from_literal(literal)
            .ok_or_else(|| malformed(format!("unrecognized category {literal:?}")))?,
        Some(other) => return Err(malformed(format!("'category' must be a string, got {other}"))),
    };

    let confidence = match fields.get("confidence") {
        None => return Err(malformed("missing 'confidence'")),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| malformed(format!("'confidence' {n} is not representable")))?,
        Some(other) => return Err(malformed(format!("'confidence' must be a number, got {other}"))),
    };
    if !(0.0..=1.0).contains(&confidence) {
        return Err(malformed(format!("'confidence' {confidence} is outside [0, 1]")));
    }

    let reply = match fields.get("reply") {
        None => return Err(malformed("missing 'reply'")),
        Some(Value::String(reply)) if reply.trim().is_empty() => {
            return Err(malformed("'reply' is empty"));
        }
        Some(Value::String(reply)) => reply,
        Some(other) => return Err(malformed(format!("'reply' must be a string, got {other}"))),
    };

    ClassificationResult::new(category, confidence, reply, model_name)
}
