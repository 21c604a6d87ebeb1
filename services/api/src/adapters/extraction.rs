//! services/api/src/adapters/extraction.rs
//!
//! Turns uploaded bytes into plain text. PDFs go through `pdf-extract` on the
//! blocking pool; images are transcribed by a vision-capable chat model.
//! Implements the `TextExtractionService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrlArgs,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::time::Duration;
use study_genie_core::domain::ContentCategory;
use study_genie_core::ports::{ExtractionError, TextExtractionService};
use tracing::{info, warn};

const OCR_PROMPT: &str = "Transcribe all readable text in this image exactly as written. \
Preserve the reading order. Output only the transcribed text with no commentary. \
If the image contains no text, output nothing.";

/// Detects the MIME type of an upload from its leading bytes.
pub fn sniff_content_type(bytes: &[u8]) -> Option<(ContentCategory, &'static str)> {
    const SIGNATURES: &[(&[u8], ContentCategory, &str)] = &[
        (b"%PDF", ContentCategory::Pdf, "application/pdf"),
        (b"\x89PNG\r\n\x1a\n", ContentCategory::Image, "image/png"),
        (b"\xff\xd8\xff", ContentCategory::Image, "image/jpeg"),
        (b"GIF87a", ContentCategory::Image, "image/gif"),
        (b"GIF89a", ContentCategory::Image, "image/gif"),
        (b"II*\x00", ContentCategory::Image, "image/tiff"),
        (b"MM\x00*", ContentCategory::Image, "image/tiff"),
        (b"BM", ContentCategory::Image, "image/bmp"),
    ];

    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some((ContentCategory::Image, "image/webp"));
    }
    SIGNATURES
        .iter()
        .find(|(magic, _, _)| bytes.starts_with(magic))
        .map(|(_, category, mime)| (*category, *mime))
}

/// Extracts text from PDFs locally and from images via a vision model.
#[derive(Clone)]
pub struct DocumentTextExtractor {
    client: Client<OpenAIConfig>,
    vision_model: String,
    timeout: Duration,
}

impl DocumentTextExtractor {
    pub fn new(client: Client<OpenAIConfig>, vision_model: String, timeout: Duration) -> Self {
        Self {
            client,
            vision_model,
            timeout,
        }
    }

    async fn extract_pdf(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let owned = bytes.to_vec();
        // pdf-extract is synchronous and may panic on damaged files; the join keeps both contained.
        let joined = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&owned)).await;
        match joined {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => {
                warn!("Failed to extract PDF text: {}", e);
                Err(ExtractionError::NoTextFound)
            }
            Err(e) => {
                warn!("PDF extraction task aborted: {}", e);
                Err(ExtractionError::NoTextFound)
            }
        }
    }

    async fn extract_image(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let mime = sniff_content_type(bytes)
            .map(|(_, mime)| mime)
            .unwrap_or("image/png");
        let data_url = format!("data:{};base64,{}", mime, STANDARD.encode(bytes));

        let request = build_vision_request(&self.vision_model, data_url).map_err(|e| {
            warn!("Failed to build vision request: {}", e);
            ExtractionError::NoTextFound
        })?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| {
                warn!("Image transcription timed out after {:?}", self.timeout);
                ExtractionError::NoTextFound
            })?
            .map_err(|e| {
                warn!("Image transcription failed: {}", e);
                ExtractionError::NoTextFound
            })?;

        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

fn build_vision_request(
    model: &str,
    data_url: String,
) -> Result<async_openai::types::chat::CreateChatCompletionRequest, async_openai::error::OpenAIError> {
    let parts = vec![
        ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(OCR_PROMPT)
            .build()?
            .into(),
        ChatCompletionRequestMessageContentPartImageArgs::default()
            .image_url(
                ImageUrlArgs::default()
                    .url(data_url)
                    .detail(ImageDetail::High)
                    .build()?,
            )
            .build()?
            .into(),
    ];
    let message = ChatCompletionRequestUserMessageArgs::default()
        .content(parts)
        .build()?;
    CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages(vec![message.into()])
        .build()
}

#[async_trait]
impl TextExtractionService for DocumentTextExtractor {
    async fn extract_text(
        &self,
        bytes: &[u8],
        category: ContentCategory,
    ) -> Result<String, ExtractionError> {
        let text = match category {
            ContentCategory::Pdf => self.extract_pdf(bytes).await?,
            ContentCategory::Image => self.extract_image(bytes).await?,
        };
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(ExtractionError::NoTextFound);
        }
        info!("Extracted {} characters of text", text.chars().count());
        Ok(text)
    }
}
