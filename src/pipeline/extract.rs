//! Document extraction: PDF bytes → page text + candidate raster figures.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is synchronous and
//! CPU-bound. The whole extraction runs on the blocking pool so Tokio worker
//! threads never stall on a large document.
//!
//! The PDF is loaded straight from memory; nothing is written to disk, so
//! there is nothing to clean up on any exit path.

use crate::config::ExplainConfig;
use crate::error::ExplainError;
use crate::pipeline::encode::{encode_png, tonal_range};
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// Directories probed for the pdfium shared library after the system search path.
const WELL_KNOWN_PDFIUM_DIRS: &[&str] = &[
    "./",
    "/usr/local/lib",
    "/usr/lib",
    "/opt/pdfium/lib",
    "/opt/homebrew/lib",
];

/// Text of one page, 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page_number: usize,
    pub text: String,
}

/// All text extracted from a document, in page order.
#[derive(Debug, Clone, Default)]
pub struct ExtractedText {
    pub segments: Vec<PageText>,
    /// Segments joined with newlines and capped at `max_text_chars`.
    pub text: String,
    pub truncated: bool,
}

impl ExtractedText {
    /// Join `segments` in order, keeping at most `max_chars` characters.
    pub fn assemble(segments: Vec<PageText>, max_chars: usize) -> Self {
        let full = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let (text, truncated) = match full.char_indices().nth(max_chars) {
            None => (full, false),
            Some((cut, _)) => (full[..cut].to_string(), true),
        };
        Self {
            segments,
            text,
            truncated,
        }
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Where an image sits vertically, as fractions of page height from the top edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub top: f32,
    pub bottom: f32,
}

/// A raster image found in the document, before quality filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFigure {
    /// 1-based page number.
    pub page_number: usize,
    /// 0-based position in extraction order. Never reassigned.
    pub extraction_index: usize,
    /// PNG-encoded pixels.
    pub image_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// `None` when pdfium could not report bounds.
    pub placement: Option<Placement>,
    /// Luma max − min over the image (0–255).
    pub tonal_range: u8,
}

/// Everything the later stages need from a document.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub text: ExtractedText,
    pub figures: Vec<RawFigure>,
    /// Title from the PDF's info dictionary, if set.
    pub pdf_title: Option<String>,
    pub total_pages: usize,
    pub pages_processed: usize,
}

/// Reject anything that does not start with the `%PDF` magic bytes.
pub fn check_pdf_magic(bytes: &[u8]) -> Result<(), ExplainError> {
    if bytes.starts_with(b"%PDF") {
        Ok(())
    } else {
        Err(ExplainError::CorruptDocument {
            detail: "data is not a PDF (missing %PDF header)".into(),
        })
    }
}

/// Bind to the pdfium shared library.
///
/// Resolution order: `PDFIUM_LIB_PATH` (file or directory), the system
/// library search path, then a short list of common install directories.
pub fn bind_pdfium() -> Result<Pdfium, ExplainError> {
    if let Ok(path) = std::env::var("PDFIUM_LIB_PATH") {
        if !path.is_empty() {
            let p = Path::new(&path);
            let lib = if p.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(p)
            } else {
                p.to_path_buf()
            };
            return Pdfium::bind_to_library(&lib).map(Pdfium::new).map_err(|e| {
                ExplainError::Internal(format!("could not load pdfium from PDFIUM_LIB_PATH: {e}"))
            });
        }
    }

    let bindings = Pdfium::bind_to_system_library().or_else(|system_err| {
        WELL_KNOWN_PDFIUM_DIRS
            .iter()
            .find_map(|dir| {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)).ok()
            })
            .ok_or(system_err)
    });

    bindings.map(Pdfium::new).map_err(|e| {
        ExplainError::Internal(format!(
            "pdfium library not found ({e}). Install libpdfium or set PDFIUM_LIB_PATH"
        ))
    })
}

/// Extract text and figures from PDF bytes.
pub async fn extract(bytes: Vec<u8>, config: &ExplainConfig) -> Result<Extraction, ExplainError> {
    check_pdf_magic(&bytes)?;

    let limits = Limits {
        max_pages: config.max_pages,
        max_text_chars: config.max_text_chars,
        min_text_chars: config.min_text_chars,
        max_raw_figures: config.max_raw_figures,
    };

    tokio::task::spawn_blocking(move || extract_blocking(&bytes, &limits))
        .await
        .map_err(|e| ExplainError::Internal(format!("Extraction task panicked: {}", e)))?
}

struct Limits {
    max_pages: usize,
    max_text_chars: usize,
    min_text_chars: usize,
    max_raw_figures: usize,
}

fn extract_blocking(bytes: &[u8], limits: &Limits) -> Result<Extraction, ExplainError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| ExplainError::CorruptDocument {
            detail: format!("{:?}", e),
        })?;

    let pdf_title = document
        .metadata()
        .get(PdfDocumentMetadataTagType::Title)
        .map(|t| t.value().trim().to_string())
        .filter(|t| !t.is_empty());

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if total_pages > limits.max_pages {
        info!(
            "PDF has {} pages, processing the first {}",
            total_pages, limits.max_pages
        );
    }

    let mut segments = Vec::new();
    let mut figures: Vec<RawFigure> = Vec::new();
    let mut text_chars = 0usize;
    let mut pages_processed = 0usize;

    for (idx, page) in pages.iter().enumerate().take(limits.max_pages) {
        let page_number = idx + 1;
        pages_processed += 1;

        if text_chars <= limits.max_text_chars {
            match page.text() {
                Ok(t) => {
                    let text = t.all();
                    text_chars += text.chars().count();
                    segments.push(PageText { page_number, text });
                }
                Err(e) => warn!("Page {}: text extraction failed: {:?}", page_number, e),
            }
        }

        if figures.len() < limits.max_raw_figures {
            collect_figures(&page, page_number, limits.max_raw_figures, &mut figures);
        }
    }

    let text = ExtractedText::assemble(segments, limits.max_text_chars);
    let usable = text.text.trim().chars().count();
    if usable < limits.min_text_chars {
        return Err(ExplainError::CorruptDocument {
            detail: format!(
                "only {} characters of text could be extracted (minimum {}); \
                 scanned papers are not supported",
                usable, limits.min_text_chars
            ),
        });
    }

    info!(
        "Extracted {} chars{} and {} candidate figures from {}/{} pages",
        text.char_count(),
        if text.truncated { " (truncated)" } else { "" },
        figures.len(),
        pages_processed,
        total_pages
    );

    Ok(Extraction {
        text,
        figures,
        pdf_title,
        total_pages,
        pages_processed,
    })
}

fn collect_figures(page: &PdfPage, page_number: usize, cap: usize, out: &mut Vec<RawFigure>) {
    let page_height = page.height().value;

    for object in page.objects().iter() {
        if out.len() >= cap {
            debug!("Raw figure cap ({}) reached on page {}", cap, page_number);
            return;
        }
        let Some(image_object) = object.as_image_object() else {
            continue;
        };

        let image = match image_object.get_raw_image() {
            Ok(img) => img,
            Err(e) => {
                warn!("Page {}: skipping undecodable image: {:?}", page_number, e);
                continue;
            }
        };

        let png = match encode_png(&image) {
            Ok(png) => png,
            Err(e) => {
                warn!("Page {}: skipping image that failed PNG encoding: {}", page_number, e);
                continue;
            }
        };

        let placement = object.bounds().ok().and_then(|b| {
            if page_height <= 0.0 {
                return None;
            }
            let top = (1.0 - b.top().value / page_height).clamp(0.0, 1.0);
            let bottom = (1.0 - b.bottom().value / page_height).clamp(0.0, 1.0);
            Some(Placement { top, bottom })
        });

        let extraction_index = out.len();
        debug!(
            "Page {}: figure #{} {}x{}",
            page_number,
            extraction_index,
            image.width(),
            image.height()
        );
        out.push(RawFigure {
            page_number,
            extraction_index,
            width: image.width(),
            height: image.height(),
            tonal_range: tonal_range(&image),
            image_bytes: png,
            placement,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(n: usize, s: &str) -> PageText {
        PageText {
            page_number: n,
            text: s.to_string(),
        }
    }

    #[test]
    fn magic_check_rejects_html() {
        let err = check_pdf_magic(b"<!DOCTYPE html><html>").unwrap_err();
        assert!(matches!(err, ExplainError::CorruptDocument { .. }));
        assert!(check_pdf_magic(b"%PDF-1.7\n").is_ok());
        assert!(check_pdf_magic(b"").is_err());
    }

    #[tokio::test]
    async fn non_pdf_bytes_fail_before_pdfium_is_touched() {
        let config = ExplainConfig::default();
        let err = extract(b"GIF89a....".to_vec(), &config).await.unwrap_err();
        assert!(matches!(err, ExplainError::CorruptDocument { .. }));
    }

    #[test]
    fn assemble_joins_pages_in_order() {
        let t = ExtractedText::assemble(vec![seg(1, "alpha"), seg(2, "beta")], 100);
        assert_eq!(t.text, "alpha\nbeta");
        assert!(!t.truncated);
    }

    #[test]
    fn assemble_truncates_on_char_boundary() {
        let t = ExtractedText::assemble(vec![seg(1, "héllo"), seg(2, "wörld")], 8);
        assert_eq!(t.text, "héllo\nwö");
        assert_eq!(t.char_count(), 8);
        assert!(t.truncated);
    }

    #[test]
    fn assemble_exact_fit_is_not_truncated() {
        let t = ExtractedText::assemble(vec![seg(1, "abc"), seg(2, "de")], 6);
        assert_eq!(t.text, "abc\nde");
        assert!(!t.truncated);
    }

    #[test]
    fn assemble_flags_dropped_pages() {
        let t = ExtractedText::assemble(vec![seg(1, "abc"), seg(2, "de")], 3);
        assert_eq!(t.text, "abc");
        assert!(t.truncated);
    }
}
