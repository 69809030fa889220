//! Email classification pipeline.
//!
//! Every request flows through:
//! 1. `InputNormalizer::normalize()`: exactly one of file/text → `EmailContent`
//! 2. `ClassificationGateway::classify()`: prompt → LLM → validated `ClassificationResult`
//!
//! Stages run sequentially per request and share no mutable state.

pub mod gateway;
pub mod normalizer;
pub mod types;

pub use gateway::{ClassificationGateway, GatewayConfig};
pub use normalizer::{InputNormalizer, LopdfExtractor, PdfTextExtractor};
pub use types::{Category, ClassificationResult, EmailContent, Origin, UploadedFile};
