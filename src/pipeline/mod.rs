//! Pipeline stages for insurance card scanning.
//!
//! Each submodule implements exactly one step; the [`crate::processor`]
//! composes `gateway` and `parse` into the validate → extract workflow.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ gateway ──▶ parse
//! (path/URL) (pdfium)  (base64)   (VLM)      (JSON)
//! ```
//!
//! 1. [`input`]: read a path or URL, sniff PDF/PNG/JPEG, decode photos
//! 2. [`render`]: rasterise PDF pages in `spawn_blocking`
//! 3. [`encode`]: PNG-encode and base64-wrap each image
//! 4. [`gateway`]: the model call; the only stage with network I/O to the VLM
//! 5. [`parse`]: recover the JSON object from the model's reply

pub mod encode;
pub mod gateway;
pub mod input;
pub mod parse;
pub mod render;
