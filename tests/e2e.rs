//! End-to-end integration tests for edgequake-cardscan.
//!
//! These tests use real card scans in `./test_cases/` and make live LLM API
//! calls. They are gated behind the `E2E_ENABLED` environment variable so
//! they do not run in CI unless explicitly requested.
//!
//! Expected fixtures (not committed; card scans contain personal data):
//!   test_cases/card_front.jpg   front of a health-insurance card
//!   test_cases/card_back.jpg    back of the same card
//!   test_cases/card.pdf         a PDF scan of a card (needs libpdfium)
//!   test_cases/not_a_card.jpg   any photo that is not an insurance card
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

use edgequake_cardscan::{
    check_provider, scan, scan_to_file, OutcomeStatus, ProcessingOutcome, ScanConfig,
    NOT_AN_INSURANCE_CARD,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no fixture at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: fixture not found: {}", p.display());
            return;
        }
        p.to_string_lossy().into_owned()
    }};
}

/// A successful scan must carry at least the member ID and the insurer.
fn assert_card_extracted(outcome: &ProcessingOutcome, context: &str) {
    assert!(
        outcome.success,
        "[{context}] scan failed: {:?} / {:?}",
        outcome.error,
        outcome.extraction.as_ref().and_then(|e| e.error.as_ref())
    );
    assert_eq!(outcome.status, OutcomeStatus::Extracted, "[{context}]");

    let card = outcome.extraction.as_ref().expect("extraction present");
    assert!(card.error.is_none(), "[{context}] extraction carries an error");
    assert!(
        card.member_id.as_deref().is_some_and(|s| !s.trim().is_empty()),
        "[{context}] member_id missing"
    );
    assert!(
        card.insurance_company.as_deref().is_some_and(|s| !s.trim().is_empty()),
        "[{context}] insurance_company missing"
    );

    println!("[{context}] ✓  {:#?}", card);
}

// ── Provider check (no model call) ───────────────────────────────────────────

#[test]
fn test_check_provider() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let info = check_provider(&ScanConfig::default()).expect("a provider should resolve");
    assert!(!info.provider.is_empty());
    assert!(!info.model.is_empty());
    println!("provider={} model={}", info.provider, info.model);
}

// ── Scans ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_front_only_validated() {
    let front = e2e_skip_unless_ready!(test_cases_dir().join("card_front.jpg"));

    let outcome = scan(&[front], &ScanConfig::default(), false)
        .await
        .expect("scan should not fail fatally");

    let v = outcome.validation.as_ref().expect("validation ran");
    assert!(v.is_insurance_card, "reason: {}", v.reason);
    assert_card_extracted(&outcome, "front");
}

#[tokio::test]
async fn test_front_and_back() {
    let front = e2e_skip_unless_ready!(test_cases_dir().join("card_front.jpg"));
    let back = e2e_skip_unless_ready!(test_cases_dir().join("card_back.jpg"));

    let outcome = scan(&[front, back], &ScanConfig::default(), false)
        .await
        .expect("scan should not fail fatally");

    assert_card_extracted(&outcome, "front+back");
}

#[tokio::test]
async fn test_skip_validation() {
    let front = e2e_skip_unless_ready!(test_cases_dir().join("card_front.jpg"));

    let outcome = scan(&[front], &ScanConfig::default(), true)
        .await
        .expect("scan should not fail fatally");

    assert!(outcome.validation.is_none());
    assert_card_extracted(&outcome, "skip-validation");
}

#[tokio::test]
async fn test_not_a_card_is_rejected() {
    let photo = e2e_skip_unless_ready!(test_cases_dir().join("not_a_card.jpg"));

    let outcome = scan(&[photo], &ScanConfig::default(), false)
        .await
        .expect("scan should not fail fatally");

    assert!(!outcome.success);
    assert!(outcome.extraction.is_none());
    assert_eq!(outcome.error.as_deref(), Some(NOT_AN_INSURANCE_CARD));
    assert_eq!(outcome.status, OutcomeStatus::Rejected);
}

#[tokio::test]
async fn test_pdf_card() {
    let pdf = e2e_skip_unless_ready!(test_cases_dir().join("card.pdf"));

    let config = ScanConfig::builder().dpi(200).build().unwrap();
    let outcome = scan(&[pdf], &config, false)
        .await
        .expect("scan should not fail fatally");

    assert_card_extracted(&outcome, "pdf");
}

#[tokio::test]
async fn test_scan_to_file() {
    let front = e2e_skip_unless_ready!(test_cases_dir().join("card_front.jpg"));
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("card.json");

    let outcome = scan_to_file(&[front], &out, &ScanConfig::default(), false)
        .await
        .expect("scan_to_file should succeed");

    let written: ProcessingOutcome =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written, outcome);
}
