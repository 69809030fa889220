//! Input normalizer: turns an uploaded file or inline text into `EmailContent`.
//!
//! Exactly one input channel must be supplied. Files are gated on their
//! declared content type, then decoded (plain text) or run through the
//! PDF text extractor. Every failure is a caller input error; nothing here
//! is retried.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::ClassifyError;
use crate::pipeline::types::{EmailContent, Origin, PREVIEW_CHARS, UploadedFile};

/// Default upload limit: 5 MB.
pub const DEFAULT_MAX_FILE_BYTES: usize = 5 * 1024 * 1024;

const MIME_TEXT: &str = "text/plain";
const MIME_PDF: &str = "application/pdf";

/// Page-level PDF text extraction.
///
/// Returns one string per page, in page order. Pages without extractable
/// text yield an empty string.
pub trait PdfTextExtractor: Send + Sync {
    fn extract_page_texts(&self, bytes: &[u8]) -> Result<Vec<String>, String>;
}

/// `PdfTextExtractor` backed by lopdf.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfTextExtractor for LopdfExtractor {
    fn extract_page_texts(&self, bytes: &[u8]) -> Result<Vec<String>, String> {
        let doc = lopdf::Document::load_mem(bytes).map_err(|e| e.to_string())?;

        // get_pages() is keyed by 1-based page number, so iteration is in page order.
        doc.get_pages()
            .keys()
            .map(|&page| doc.extract_text(&[page]).map_err(|e| e.to_string()))
            .collect()
    }
}

/// Supported declared media types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaKind {
    PlainText,
    Pdf,
}

/// Parse a declared content type, ignoring parameters and case.
fn media_kind(content_type: Option<&str>) -> Result<MediaKind, ClassifyError> {
    let declared = content_type.unwrap_or("").trim();
    let essence = declared
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        MIME_TEXT => Ok(MediaKind::PlainText),
        MIME_PDF => Ok(MediaKind::Pdf),
        "" => Err(ClassifyError::UnsupportedMediaType(
            "file has no declared content type; use .txt or .pdf".to_string(),
        )),
        _ => Err(ClassifyError::UnsupportedMediaType(format!(
            "{declared}; use .txt or .pdf"
        ))),
    }
}

/// Join non-empty page texts with newlines, keeping page order.
fn join_pages(pages: &[String]) -> String {
    pages
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reduces the two mutually exclusive inputs to one `EmailContent`.
#[derive(Clone)]
pub struct InputNormalizer {
    pdf: Arc<dyn PdfTextExtractor>,
    max_file_bytes: usize,
}

impl InputNormalizer {
    pub fn new(pdf: Arc<dyn PdfTextExtractor>, max_file_bytes: usize) -> Self {
        Self {
            pdf,
            max_file_bytes,
        }
    }

    pub fn max_file_bytes(&self) -> usize {
        self.max_file_bytes
    }

    /// Normalize one request's input.
    pub async fn normalize(
        &self,
        file: Option<UploadedFile>,
        text: Option<String>,
    ) -> Result<EmailContent, ClassifyError> {
        let (content, bytes, file_name) = match (file, text) {
            (Some(_), Some(_)) => {
                return Err(ClassifyError::InvalidInput(
                    "send either a file or text, not both".to_string(),
                ));
            }
            (None, None) => {
                return Err(ClassifyError::InvalidInput(
                    "send either a file or text".to_string(),
                ));
            }
            (Some(file), None) => {
                let bytes = file.bytes.len();
                let name = file.file_name.clone();
                (self.from_file(file).await?, bytes, name)
            }
            (None, Some(text)) => {
                let bytes = text.len();
                (Self::from_text(&text)?, bytes, None)
            }
        };

        info!(
            origin = %content.origin(),
            file_name = file_name.as_deref().unwrap_or("-"),
            bytes,
            chars = content.char_count(),
            preview = %content.short_preview(PREVIEW_CHARS),
            "Email input normalized"
        );

        Ok(content)
    }

    fn from_text(text: &str) -> Result<EmailContent, ClassifyError> {
        EmailContent::new(text, Origin::InlineText)
    }

    async fn from_file(&self, file: UploadedFile) -> Result<EmailContent, ClassifyError> {
        let kind = media_kind(file.content_type.as_deref())?;

        if file.bytes.len() > self.max_file_bytes {
            return Err(ClassifyError::InvalidInput(format!(
                "file is {} bytes, limit is {} bytes",
                file.bytes.len(),
                self.max_file_bytes
            )));
        }

        let text = match kind {
            MediaKind::PlainText => {
                let decoded = String::from_utf8_lossy(&file.bytes);
                let trimmed = decoded.trim();
                if trimmed.is_empty() {
                    return Err(ClassifyError::EmptyInput(
                        ".txt file is empty".to_string(),
                    ));
                }
                trimmed.to_string()
            }
            MediaKind::Pdf => self.read_pdf(file.bytes).await?,
        };

        EmailContent::new(&text, Origin::File)
    }

    async fn read_pdf(&self, bytes: Vec<u8>) -> Result<String, ClassifyError> {
        if bytes.is_empty() {
            return Err(ClassifyError::EmptyInput(".pdf file is empty".to_string()));
        }

        let extractor = Arc::clone(&self.pdf);
        let pages = tokio::task::spawn_blocking(move || extractor.extract_page_texts(&bytes))
            .await
            .map_err(|e| ClassifyError::ExtractionFailure(format!("extraction task failed: {e}")))?
            .map_err(|e| {
                debug!(error = %e, "PDF extraction failed");
                ClassifyError::ExtractionFailure(format!("could not read PDF content: {e}"))
            })?;

        let joined = join_pages(&pages);
        if joined.is_empty() {
            return Err(ClassifyError::EmptyInput(
                "no readable text found in PDF".to_string(),
            ));
        }

        debug!(pages = pages.len(), "PDF text extracted");
        Ok(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Extractor returning fixed page texts.
    struct StubPages(Vec<&'static str>);

    impl PdfTextExtractor for StubPages {
        fn extract_page_texts(&self, _bytes: &[u8]) -> Result<Vec<String>, String> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    /// Extractor that always fails, like a corrupt PDF.
    struct FailingExtractor;

    impl PdfTextExtractor for FailingExtractor {
        fn extract_page_texts(&self, _bytes: &[u8]) -> Result<Vec<String>, String> {
            Err("invalid file header".to_string())
        }
    }

    /// Extractor that must never be reached.
    struct UnreachableExtractor;

    impl PdfTextExtractor for UnreachableExtractor {
        fn extract_page_texts(&self, _bytes: &[u8]) -> Result<Vec<String>, String> {
            panic!("extractor should not be called")
        }
    }

    fn normalizer_with(extractor: impl PdfTextExtractor + 'static) -> InputNormalizer {
        InputNormalizer::new(Arc::new(extractor), DEFAULT_MAX_FILE_BYTES)
    }

    fn normalizer() -> InputNormalizer {
        normalizer_with(UnreachableExtractor)
    }

    // ── Exclusivity ─────────────────────────────────────────────────

    #[tokio::test]
    async fn both_inputs_rejected() {
        for text in ["hello", "", "   "] {
            let file = UploadedFile::new("text/plain", b"body".to_vec());
            let err = normalizer()
                .normalize(Some(file), Some(text.to_string()))
                .await
                .unwrap_err();
            assert!(matches!(err, ClassifyError::InvalidInput(_)), "text={text:?}");
        }
    }

    #[tokio::test]
    async fn no_input_rejected() {
        let err = normalizer().normalize(None, None).await.unwrap_err();
        assert!(matches!(err, ClassifyError::InvalidInput(_)));
    }

    // ── Inline text ─────────────────────────────────────────────────

    #[tokio::test]
    async fn text_trimming_is_idempotent() {
        let n = normalizer();
        let padded = n.normalize(None, Some(" hello ".into())).await.unwrap();
        let plain = n.normalize(None, Some("hello".into())).await.unwrap();
        assert_eq!(padded.text(), "hello");
        assert_eq!(padded.text(), plain.text());
        assert_eq!(padded.origin(), Origin::InlineText);
    }

    #[tokio::test]
    async fn whitespace_text_is_empty_input() {
        let err = normalizer()
            .normalize(None, Some("   ".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifyError::EmptyInput(_)));
    }

    #[tokio::test]
    async fn empty_text_field_is_empty_input() {
        let err = normalizer().normalize(None, Some(String::new())).await.unwrap_err();
        assert!(matches!(err, ClassifyError::EmptyInput(_)));
    }

    #[tokio::test]
    async fn single_char_text_accepted() {
        let content = normalizer().normalize(None, Some("a".into())).await.unwrap();
        assert_eq!(content.text(), "a");
    }

    // ── Media type gate ─────────────────────────────────────────────

    #[tokio::test]
    async fn png_rejected_regardless_of_bytes() {
        for bytes in [b"%PDF-1.4".to_vec(), b"plain words".to_vec(), Vec::new()] {
            let file = UploadedFile::new("image/png", bytes);
            let err = normalizer().normalize(Some(file), None).await.unwrap_err();
            assert!(matches!(err, ClassifyError::UnsupportedMediaType(_)));
        }
    }

    #[tokio::test]
    async fn missing_content_type_rejected() {
        let file = UploadedFile {
            file_name: Some("mail.txt".into()),
            content_type: None,
            bytes: b"hello".to_vec(),
        };
        let err = normalizer().normalize(Some(file), None).await.unwrap_err();
        assert!(matches!(err, ClassifyError::UnsupportedMediaType(_)));
    }

    #[test]
    fn media_kind_ignores_parameters_and_case() {
        assert_eq!(
            media_kind(Some("Text/Plain; charset=utf-8")).unwrap(),
            MediaKind::PlainText
        );
        assert_eq!(media_kind(Some("application/PDF")).unwrap(), MediaKind::Pdf);
        assert!(media_kind(Some("text/html")).is_err());
    }

    // ── Plain text files ────────────────────────────────────────────

    #[tokio::test]
    async fn text_file_decoded_and_trimmed() {
        let file = UploadedFile::new("text/plain", b"\n  Please send the invoice  \n".to_vec())
            .with_file_name("mail.txt");
        let content = normalizer().normalize(Some(file), None).await.unwrap();
        assert_eq!(content.text(), "Please send the invoice");
        assert!(content.is_from_file());
    }

    #[tokio::test]
    async fn text_file_invalid_utf8_replaced() {
        let file = UploadedFile::new("text/plain", vec![b'o', b'k', 0xFF, b'!']);
        let content = normalizer().normalize(Some(file), None).await.unwrap();
        assert_eq!(content.text(), "ok\u{FFFD}!");
    }

    #[tokio::test]
    async fn empty_text_file_is_empty_input() {
        let file = UploadedFile::new("text/plain", b"  \r\n ".to_vec());
        let err = normalizer().normalize(Some(file), None).await.unwrap_err();
        assert!(matches!(err, ClassifyError::EmptyInput(_)));
    }

    #[tokio::test]
    async fn oversized_file_rejected() {
        let n = InputNormalizer::new(Arc::new(UnreachableExtractor), 4);
        let file = UploadedFile::new("text/plain", b"hello".to_vec());
        let err = n.normalize(Some(file), None).await.unwrap_err();
        assert!(matches!(err, ClassifyError::InvalidInput(_)));
    }

    // ── PDF files ───────────────────────────────────────────────────

    #[tokio::test]
    async fn pdf_pages_joined_in_order_skipping_empty() {
        let n = normalizer_with(StubPages(vec!["Page1", "", "Page3"]));
        let file = UploadedFile::new("application/pdf", b"%PDF-stub".to_vec());
        let content = n.normalize(Some(file), None).await.unwrap();
        assert_eq!(content.text(), "Page1\nPage3");
        assert_eq!(content.origin(), Origin::File);
    }

    #[tokio::test]
    async fn pdf_whitespace_pages_skipped() {
        let n = normalizer_with(StubPages(vec!["  ", " first ", "\n", "second"]));
        let file = UploadedFile::new("application/pdf", b"%PDF-stub".to_vec());
        let content = n.normalize(Some(file), None).await.unwrap();
        assert_eq!(content.text(), "first\nsecond");
    }

    #[tokio::test]
    async fn empty_pdf_bytes_is_empty_input() {
        let file = UploadedFile::new("application/pdf", Vec::new());
        let err = normalizer().normalize(Some(file), None).await.unwrap_err();
        assert!(matches!(err, ClassifyError::EmptyInput(_)));
    }

    #[tokio::test]
    async fn pdf_without_text_is_empty_input() {
        let n = normalizer_with(StubPages(vec!["", "  "]));
        let file = UploadedFile::new("application/pdf", b"%PDF-scan".to_vec());
        let err = n.normalize(Some(file), None).await.unwrap_err();
        assert!(matches!(err, ClassifyError::EmptyInput(_)));
    }

    #[tokio::test]
    async fn extractor_error_is_extraction_failure() {
        let n = normalizer_with(FailingExtractor);
        let file = UploadedFile::new("application/pdf", b"garbage".to_vec());
        let err = n.normalize(Some(file), None).await.unwrap_err();
        assert!(matches!(err, ClassifyError::ExtractionFailure(_)));
    }

    #[test]
    fn lopdf_rejects_non_pdf_bytes() {
        assert!(LopdfExtractor.extract_page_texts(b"not a pdf at all").is_err());
    }

    /// Three-page PDF: text, a page with no content stream, text.
    fn three_page_pdf() -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{Document, Object, Stream, dictionary};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut text_page = |text: &str| {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![100.into(), 600.into()]),
                    Operation::new("Tj", vec![Object::string_literal(text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            })
        };
        let first = text_page("Page1");
        let third = text_page("Page3");
        let blank = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![first.into(), blank.into(), third.into()],
                "Count" => 3,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn lopdf_yields_pages_in_order_with_blank_page_empty() {
        let pages = LopdfExtractor.extract_page_texts(&three_page_pdf()).unwrap();
        assert_eq!(pages, vec!["Page1\n", "", "Page3\n"]);
    }

    #[tokio::test]
    async fn lopdf_document_normalizes_to_joined_pages() {
        let n = normalizer_with(LopdfExtractor);
        let file = UploadedFile::new("application/pdf", three_page_pdf()).with_file_name("mail.pdf");
        let content = n.normalize(Some(file), None).await.unwrap();
        assert_eq!(content.text(), "Page1\nPage3");
        assert_eq!(content.origin(), Origin::File);
    }
}
