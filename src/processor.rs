//! Card processor: the validate → gate → extract workflow.
//!
//! ```text
//!            skip_validation
//!   start ─────────────────────────────┐
//!     │                                ▼
//!     ├─▶ validate ──(is card)──▶ extract ──▶ Extracted / ExtractionFailed
//!     │       │
//!     │       ├─(not a card)──────▶ Rejected
//!     │       └─(stage failed)────▶ ValidationInconclusive
//! ```
//!
//! Each stage returns `Result<_, StageError>`; [`CardProcessor::process_card`]
//! turns stage failures into result objects so the workflow always ends in a
//! [`ProcessingOutcome`]. The only `Err` is an empty image list, rejected
//! before any gateway call. There are no retries here: a failed call degrades
//! its stage immediately.

use crate::config::ScanConfig;
use crate::error::{CardScanError, StageError};
use crate::output::{ExtractionResult, OutcomeStatus, ProcessingOutcome, ValidationResult};
use crate::pipeline::gateway::ModelGateway;
use crate::pipeline::parse::parse_response;
use crate::progress::{ProgressCallback, Stage};
use crate::prompts::{extraction_prompt, EXTRACTION_PROMPT, VALIDATION_PROMPT};
use edgequake_llm::ImageData;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs the two-stage workflow against a [`ModelGateway`].
///
/// Holds no per-request state; construct one per request or share one
/// across requests, either is fine.
pub struct CardProcessor {
    gateway: Arc<dyn ModelGateway>,
    validation_prompt: String,
    extraction_prompt: String,
    progress: Option<ProgressCallback>,
}

impl CardProcessor {
    /// Processor with the built-in prompts and no progress callback.
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            gateway,
            validation_prompt: VALIDATION_PROMPT.to_string(),
            extraction_prompt: EXTRACTION_PROMPT.to_string(),
            progress: None,
        }
    }

    /// Processor using the prompt overrides and callback from `config`.
    pub fn from_config(gateway: Arc<dyn ModelGateway>, config: &ScanConfig) -> Self {
        Self {
            gateway,
            validation_prompt: config
                .validation_prompt
                .clone()
                .unwrap_or_else(|| VALIDATION_PROMPT.to_string()),
            extraction_prompt: config
                .extraction_prompt
                .clone()
                .unwrap_or_else(|| EXTRACTION_PROMPT.to_string()),
            progress: config.progress_callback.clone(),
        }
    }

    pub fn with_progress(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }

    /// Ask the model whether `image` shows an insurance card.
    pub async fn validate_card(&self, image: &ImageData) -> Result<ValidationResult, StageError> {
        self.run_stage(
            Stage::Validate,
            &self.validation_prompt,
            std::slice::from_ref(image),
        )
        .await
    }

    /// Extract card fields from all `images` in a single gateway call.
    pub async fn extract_card_data(
        &self,
        images: &[ImageData],
    ) -> Result<ExtractionResult, StageError> {
        if images.is_empty() {
            return Err(StageError::NoImages);
        }
        let prompt = extraction_prompt(&self.extraction_prompt, images.len());
        let mut result: ExtractionResult = self.run_stage(Stage::Extract, &prompt, images).await?;
        if let Some(e) = result.error.take() {
            debug!("Ignoring 'error' key in model reply: {}", e);
        }
        Ok(result)
    }

    /// Run the full workflow.
    ///
    /// `images[0]` (the front of the card) is validated unless
    /// `skip_validation` is set; every image goes to extraction.
    ///
    /// # Errors
    /// [`CardScanError::NoImages`] when `images` is empty. Every other
    /// failure is reported inside the returned outcome.
    pub async fn process_card(
        &self,
        images: &[ImageData],
        skip_validation: bool,
    ) -> Result<ProcessingOutcome, CardScanError> {
        if images.is_empty() {
            return Err(CardScanError::NoImages);
        }
        info!(
            "Processing card: {} image(s), validation {}",
            images.len(),
            if skip_validation { "skipped" } else { "on" }
        );
        if let Some(cb) = &self.progress {
            cb.on_scan_start(images.len(), skip_validation);
        }

        let validation = if skip_validation {
            None
        } else {
            match self.validate_card(&images[0]).await {
                Ok(v) if v.is_insurance_card => {
                    debug!("Validation passed ({} confidence)", v.confidence.as_str());
                    Some(v)
                }
                Ok(v) => {
                    info!("Not an insurance card: {}", v.reason);
                    return Ok(self.finish(ProcessingOutcome::gated(v, OutcomeStatus::Rejected)));
                }
                Err(e) => {
                    return Ok(self.finish(ProcessingOutcome::gated(
                        ValidationResult::failed(&e),
                        OutcomeStatus::ValidationInconclusive,
                    )));
                }
            }
        };

        let extraction = self
            .extract_card_data(images)
            .await
            .unwrap_or_else(|e| ExtractionResult::failed(format!("Failed to extract data: {e}")));

        Ok(self.finish(ProcessingOutcome::extracted(validation, extraction)))
    }

    async fn run_stage<T: DeserializeOwned>(
        &self,
        stage: Stage,
        prompt: &str,
        images: &[ImageData],
    ) -> Result<T, StageError> {
        if let Some(cb) = &self.progress {
            cb.on_stage_start(stage, images.len());
        }

        let result: Result<T, StageError> = async {
            let reply = self.gateway.invoke(prompt, images).await?;
            debug!("{} stage: {} chars of model output", stage, reply.len());
            Ok(parse_response(&reply)?)
        }
        .await;

        match &result {
            Ok(_) => {
                if let Some(cb) = &self.progress {
                    cb.on_stage_complete(stage);
                }
            }
            Err(e) => {
                warn!("{} stage failed: {}", stage, e);
                if let Some(cb) = &self.progress {
                    cb.on_stage_error(stage, &e.to_string());
                }
            }
        }
        result
    }

    fn finish(&self, outcome: ProcessingOutcome) -> ProcessingOutcome {
        info!(
            "Card processed: status={:?} success={}",
            outcome.status, outcome.success
        );
        if let Some(cb) = &self.progress {
            cb.on_scan_complete(&outcome);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::output::{Confidence, NOT_AN_INSURANCE_CARD};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies and records every call.
    struct Scripted {
        replies: Mutex<VecDeque<Result<String, GatewayError>>>,
        calls: Mutex<Vec<(String, usize)>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<&str, GatewayError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_string))
                        .collect(),
                ),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, usize)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelGateway for Scripted {
        async fn invoke(&self, prompt: &str, images: &[ImageData]) -> Result<String, GatewayError> {
            self.calls
                .lock()
                .unwrap()
                .push((prompt.to_string(), images.len()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GatewayError::Api("script exhausted".into())))
        }
    }

    fn img() -> ImageData {
        ImageData::new("aGVsbG8=", "image/png")
    }

    const IS_CARD: &str =
        r#"{"is_insurance_card": true, "confidence": "high", "reason": "payer logo, member id"}"#;
    const NOT_CARD: &str =
        r#"{"is_insurance_card": false, "confidence": "high", "reason": "this is a receipt"}"#;
    const FIELDS: &str = r#"{"insurance_company": "Acme Health", "member_name": "Jane Doe", "member_id": "X123", "group_number": "G-77", "effective_date": "01/01/2024", "additional_info": {"plan_type": "PPO"}}"#;

    #[tokio::test]
    async fn validated_and_extracted() {
        let gw = Scripted::new(vec![Ok(IS_CARD), Ok(FIELDS)]);
        let p = CardProcessor::new(gw.clone());

        let out = p.process_card(&[img()], false).await.unwrap();

        assert!(out.success);
        assert_eq!(out.status, OutcomeStatus::Extracted);
        assert_eq!(out.validation.as_ref().unwrap().confidence, Confidence::High);
        let ex = out.extraction.unwrap();
        assert_eq!(ex.group_number.as_deref(), Some("G-77"));

        let calls = gw.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], (VALIDATION_PROMPT.to_string(), 1));
        assert_eq!(calls[1], (EXTRACTION_PROMPT.to_string(), 1));
    }

    #[tokio::test]
    async fn rejected_card_short_circuits() {
        let gw = Scripted::new(vec![Ok(NOT_CARD), Ok(FIELDS)]);
        let p = CardProcessor::new(gw.clone());

        let out = p.process_card(&[img(), img()], false).await.unwrap();

        assert!(!out.success);
        assert_eq!(out.status, OutcomeStatus::Rejected);
        assert_eq!(out.error.as_deref(), Some(NOT_AN_INSURANCE_CARD));
        assert!(out.extraction.is_none());
        assert_eq!(gw.calls().len(), 1, "extraction must not be called");
    }

    #[tokio::test]
    async fn validation_failure_is_inconclusive_but_gated() {
        let gw = Scripted::new(vec![Err(GatewayError::Timeout { secs: 60 }), Ok(FIELDS)]);
        let p = CardProcessor::new(gw.clone());

        let out = p.process_card(&[img()], false).await.unwrap();

        assert_eq!(out.status, OutcomeStatus::ValidationInconclusive);
        assert_eq!(out.error.as_deref(), Some(NOT_AN_INSURANCE_CARD));
        let v = out.validation.unwrap();
        assert!(!v.is_insurance_card);
        assert_eq!(v.confidence, Confidence::Low);
        assert!(v.reason.starts_with("Error during validation:"));
        assert!(v.reason.contains("timed out"));
        assert_eq!(gw.calls().len(), 1);
    }

    #[tokio::test]
    async fn unparseable_validation_is_inconclusive() {
        let gw = Scripted::new(vec![Ok("I think so, yes!")]);
        let out = CardProcessor::new(gw)
            .process_card(&[img()], false)
            .await
            .unwrap();
        assert_eq!(out.status, OutcomeStatus::ValidationInconclusive);
    }

    #[tokio::test]
    async fn skip_validation_goes_straight_to_extraction() {
        let gw = Scripted::new(vec![Ok(FIELDS)]);
        let out = CardProcessor::new(gw.clone())
            .process_card(&[img()], true)
            .await
            .unwrap();
        assert!(out.validation.is_none());
        assert!(out.success);
        assert_eq!(gw.calls().len(), 1);
        assert_eq!(gw.calls()[0].0, EXTRACTION_PROMPT);
    }

    #[tokio::test]
    async fn extraction_gateway_failure_is_reported() {
        let gw = Scripted::new(vec![Err(GatewayError::Api("quota exceeded".into()))]);
        let out = CardProcessor::new(gw)
            .process_card(&[img()], true)
            .await
            .unwrap();

        assert!(!out.success);
        assert_eq!(out.status, OutcomeStatus::ExtractionFailed);
        assert!(out.error.is_none());
        let ex = out.extraction.unwrap();
        let err = ex.error.as_deref().unwrap();
        assert!(err.starts_with("Failed to extract data:"));
        assert!(err.contains("quota exceeded"));
        assert!(ex.named_fields().iter().all(|(_, v)| v.is_none()));
        assert!(ex.additional_info.is_empty());
    }

    #[tokio::test]
    async fn extraction_parse_failure_is_reported() {
        let gw = Scripted::new(vec![Ok("Sorry, the image is too dark to read.")]);
        let out = CardProcessor::new(gw)
            .process_card(&[img()], true)
            .await
            .unwrap();
        assert_eq!(out.status, OutcomeStatus::ExtractionFailed);
        assert!(out.extraction.unwrap().error.unwrap().contains("too dark"));
    }

    #[tokio::test]
    async fn two_images_get_multi_image_note() {
        let gw = Scripted::new(vec![Ok(FIELDS)]);
        CardProcessor::new(gw.clone())
            .process_card(&[img(), img()], true)
            .await
            .unwrap();
        let (prompt, count) = gw.calls()[0].clone();
        assert_eq!(count, 2);
        assert!(prompt.contains("Combine information from all images"));
    }

    #[tokio::test]
    async fn validation_sees_only_front_image() {
        let gw = Scripted::new(vec![Ok(IS_CARD), Ok(FIELDS)]);
        CardProcessor::new(gw.clone())
            .process_card(&[img(), img()], false)
            .await
            .unwrap();
        let calls = gw.calls();
        assert_eq!(calls[0].1, 1);
        assert_eq!(calls[1].1, 2);
    }

    #[tokio::test]
    async fn empty_images_rejected_before_any_call() {
        let gw = Scripted::new(vec![Ok(FIELDS)]);
        let err = CardProcessor::new(gw.clone())
            .process_card(&[], true)
            .await
            .unwrap_err();
        assert!(matches!(err, CardScanError::NoImages));
        assert!(gw.calls().is_empty());

        let err = CardProcessor::new(gw.clone())
            .extract_card_data(&[])
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::NoImages));
        assert!(gw.calls().is_empty());
    }

    #[tokio::test]
    async fn model_error_key_is_not_trusted() {
        let gw = Scripted::new(vec![Ok(
            r#"{"insurance_company": "Acme", "error": "partially obscured"}"#,
        )]);
        let out = CardProcessor::new(gw)
            .process_card(&[img()], true)
            .await
            .unwrap();
        assert!(out.success);
        assert!(out.extraction.unwrap().error.is_none());
    }

    #[tokio::test]
    async fn prompt_overrides_from_config() {
        let config = ScanConfig::builder()
            .validation_prompt("Is this a card? JSON please.")
            .extraction_prompt("Fields as JSON.")
            .build()
            .unwrap();
        let gw = Scripted::new(vec![Ok(IS_CARD), Ok(FIELDS)]);
        CardProcessor::from_config(gw.clone(), &config)
            .process_card(&[img(), img()], false)
            .await
            .unwrap();
        let calls = gw.calls();
        assert_eq!(calls[0].0, "Is this a card? JSON please.");
        assert!(calls[1].0.starts_with("Fields as JSON.\n\nNote: You are analyzing 2 images"));
    }
}
