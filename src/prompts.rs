//! Prompts for the validate and extract stages.
//!
//! Both prompts demand a bare JSON object; [`crate::pipeline::parse`] copes
//! with models that wrap it in fences or prose anyway. Callers can override
//! either prompt via [`crate::config::ScanConfig`]; the constants here are
//! used only when no override is provided.

/// Default prompt for deciding whether an image shows an insurance card.
///
/// Required reply schema: `{is_insurance_card, confidence, reason}`.
pub const VALIDATION_PROMPT: &str = r#"You are an expert at identifying insurance cards.
Analyze this image and determine if it is an insurance card (health/medical insurance).

Look for these characteristics:
- Insurance company name/logo
- Member ID or Subscriber ID
- Group number
- Plan information
- Coverage details
- Medical insurance terminology

Respond ONLY with a JSON object in this exact format:
{
    "is_insurance_card": true or false,
    "confidence": "high" or "medium" or "low",
    "reason": "Brief explanation of your decision"
}"#;

/// Default prompt for extracting card fields.
///
/// Required reply schema: `{insurance_company, member_name, member_id,
/// group_number, effective_date, additional_info}`.
pub const EXTRACTION_PROMPT: &str = r#"You are an expert at extracting information from insurance cards.
Extract all relevant information from this insurance card image.

Required fields to extract (if visible):
1. Insurance Company Name
2. Member/Patient Name
3. Member ID (or Subscriber ID or ID#)
4. Group Number (or Group ID or Group#)
5. Effective Date (or Start Date or End Date)

Also extract any additional useful information like:
- Plan Type (PPO, HMO, etc.)
- RxBin, RxPCN, RxGrp (pharmacy information)
- Copay information
- Contact phone numbers

Respond ONLY with a JSON object in this exact format:
{
    "insurance_company": "company name or null",
    "member_name": "name or null",
    "member_id": "ID or null",
    "group_number": "group number or null",
    "effective_date": "date or null",
    "additional_info": {
        "plan_type": "type or null",
        "pharmacy_info": {},
        "other_details": {}
    }
}

If a field is not visible or cannot be determined, use null."#;

/// Note appended to the extraction prompt when several images are sent.
pub fn multi_image_note(image_count: usize) -> String {
    format!(
        "Note: You are analyzing {image_count} images of the same insurance card \
         (likely front and back). Combine information from all images."
    )
}

/// Build the extraction prompt for `image_count` images.
///
/// A single image gets `base` unchanged.
pub fn extraction_prompt(base: &str, image_count: usize) -> String {
    if image_count > 1 {
        format!("{base}\n\n{}", multi_image_note(image_count))
    } else {
        base.to_string()
    }
}
