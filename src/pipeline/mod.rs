//! Pipeline stages for paper explanation.
//!
//! Each submodule implements exactly one transformation step and is
//! independently testable.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ extract ──▶ filter ──────────────┐
//! (arXiv)    (pdfium)    (heuristics)         ▼
//!               │                           matcher ──▶ response
//!               └──────▶ explain ─▶ schema ───┘
//!                        (LLM)      (validate)
//! ```
//!
//! 1. [`source`]: parse the arXiv identifier, download the PDF under a
//!    size cap, look up title and authors
//! 2. [`extract`]: page text and raster figures; runs in `spawn_blocking`
//!    because pdfium is synchronous
//! 3. [`filter`]: drop logos, rules, blanks and tiny images, keeping
//!    extraction indices stable
//! 4. [`explain`]: style-specific prompt, one retry, bounded by a timeout
//! 5. [`schema`]: strict parsing of the AI's JSON
//! 6. [`matcher`]: pair filtered figures with AI captions, with fallbacks
//! 7. [`encode`]: PNG encoding and `data:` URIs

pub mod encode;
pub mod explain;
pub mod extract;
pub mod filter;
pub mod matcher;
pub mod schema;
pub mod source;
