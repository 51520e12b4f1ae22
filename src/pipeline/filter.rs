//! Figure quality filter.
//!
//! A deterministic predicate per figure. The output is always an order- and
//! index-preserving subsequence of the input: survivors keep their original
//! `extraction_index`, gaps and all. Running the filter twice gives the same
//! result as running it once.

use crate::config::FigureFilterConfig;
use crate::pipeline::extract::RawFigure;
use std::fmt;
use tracing::debug;

/// A raw figure that survived filtering. Same record, same index.
pub type FilteredFigure = RawFigure;

/// Why a figure was discarded.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    TooSmall { area: u64 },
    ThinSide { side: u32 },
    ExtremeAspect { ratio: f32 },
    MarginBand,
    NearBlank { tonal_range: u8 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::TooSmall { area } => write!(f, "area {area} px² below minimum"),
            Rejection::ThinSide { side } => write!(f, "short side {side} px below minimum"),
            Rejection::ExtremeAspect { ratio } => write!(f, "aspect ratio {ratio:.1}:1"),
            Rejection::MarginBand => write!(f, "inside header/footer band"),
            Rejection::NearBlank { tonal_range } => {
                write!(f, "near-blank (tonal range {tonal_range})")
            }
        }
    }
}

/// Judge one figure. `None` means keep.
pub fn assess(fig: &RawFigure, cfg: &FigureFilterConfig) -> Option<Rejection> {
    let (w, h) = (fig.width, fig.height);
    let short = w.min(h);
    let long = w.max(h);

    if short < cfg.min_side_px {
        return Some(Rejection::ThinSide { side: short });
    }

    let area = w as u64 * h as u64;
    if area < cfg.min_area_px {
        return Some(Rejection::TooSmall { area });
    }

    let ratio = long as f32 / short.max(1) as f32;
    if ratio > cfg.max_aspect_ratio {
        return Some(Rejection::ExtremeAspect { ratio });
    }

    if let Some(p) = fig.placement {
        let band = cfg.margin_band;
        let in_top = p.bottom <= band;
        let in_bottom = p.top >= 1.0 - band;
        if band > 0.0 && (in_top || in_bottom) {
            return Some(Rejection::MarginBand);
        }
    }

    if fig.tonal_range < cfg.min_tonal_range {
        return Some(Rejection::NearBlank {
            tonal_range: fig.tonal_range,
        });
    }

    None
}

/// Keep the figures worth showing, in order, up to `max_figures`.
pub fn filter_figures(raw: Vec<RawFigure>, cfg: &FigureFilterConfig) -> Vec<FilteredFigure> {
    let total = raw.len();
    let cap = cfg.max_figures.unwrap_or(usize::MAX);
    let mut kept = Vec::new();

    for fig in raw {
        if let Some(reason) = assess(&fig, cfg) {
            debug!(
                "Dropping figure #{} (page {}): {}",
                fig.extraction_index, fig.page_number, reason
            );
            continue;
        }
        if kept.len() >= cap {
            debug!(
                "Dropping figure #{} (page {}): over the {} figure cap",
                fig.extraction_index, fig.page_number, cap
            );
            continue;
        }
        kept.push(fig);
    }

    debug!("Figure filter kept {}/{}", kept.len(), total);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extract::Placement;

    fn fig(idx: usize, w: u32, h: u32) -> RawFigure {
        RawFigure {
            page_number: 1,
            extraction_index: idx,
            image_bytes: vec![],
            width: w,
            height: h,
            placement: Some(Placement {
                top: 0.3,
                bottom: 0.6,
            }),
            tonal_range: 200,
        }
    }

    fn indices(figs: &[FilteredFigure]) -> Vec<usize> {
        figs.iter().map(|f| f.extraction_index).collect()
    }

    #[test]
    fn small_and_thin_images_are_dropped() {
        let cfg = FigureFilterConfig::default();
        assert_eq!(assess(&fig(0, 50, 50), &cfg), Some(Rejection::TooSmall { area: 2500 }));
        assert_eq!(assess(&fig(0, 2000, 20), &cfg), Some(Rejection::ThinSide { side: 20 }));
        assert_eq!(assess(&fig(0, 400, 300), &cfg), None);
    }

    #[test]
    fn rule_lines_fail_aspect_check() {
        let cfg = FigureFilterConfig::default();
        assert!(matches!(
            assess(&fig(0, 1300, 40), &cfg),
            Some(Rejection::ExtremeAspect { .. })
        ));
    }

    #[test]
    fn header_and_footer_bands_are_dropped() {
        let cfg = FigureFilterConfig::default();
        let mut header = fig(0, 300, 100);
        header.placement = Some(Placement { top: 0.01, bottom: 0.05 });
        assert_eq!(assess(&header, &cfg), Some(Rejection::MarginBand));

        let mut footer = fig(1, 300, 100);
        footer.placement = Some(Placement { top: 0.95, bottom: 0.99 });
        assert_eq!(assess(&footer, &cfg), Some(Rejection::MarginBand));

        // Straddling the band edge is not "entirely inside"
        let mut tall = fig(2, 300, 300);
        tall.placement = Some(Placement { top: 0.02, bottom: 0.40 });
        assert_eq!(assess(&tall, &cfg), None);

        let mut unknown = fig(3, 300, 300);
        unknown.placement = None;
        assert_eq!(assess(&unknown, &cfg), None);
    }

    #[test]
    fn blank_images_are_dropped() {
        let cfg = FigureFilterConfig::default();
        let mut blank = fig(0, 400, 400);
        blank.tonal_range = 3;
        assert_eq!(
            assess(&blank, &cfg),
            Some(Rejection::NearBlank { tonal_range: 3 })
        );
    }

    #[test]
    fn output_preserves_order_and_indices() {
        let cfg = FigureFilterConfig::default();
        let raw = vec![
            fig(0, 400, 300),
            fig(1, 20, 20),
            fig(2, 500, 500),
            fig(3, 1300, 40),
            fig(4, 640, 480),
        ];
        let kept = filter_figures(raw, &cfg);
        assert_eq!(indices(&kept), vec![0, 2, 4]);
    }

    #[test]
    fn cap_keeps_first_survivors() {
        let cfg = FigureFilterConfig {
            max_figures: Some(2),
            ..Default::default()
        };
        let raw = vec![fig(0, 10, 10), fig(1, 400, 300), fig(2, 400, 300), fig(3, 400, 300)];
        assert_eq!(indices(&filter_figures(raw, &cfg)), vec![1, 2]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let cfg = FigureFilterConfig {
            max_figures: Some(3),
            ..Default::default()
        };
        let raw: Vec<RawFigure> = (0..8)
            .map(|i| if i % 3 == 0 { fig(i, 16, 16) } else { fig(i, 300 + i as u32, 200) })
            .collect();
        let once = filter_figures(raw, &cfg);
        let twice = filter_figures(once.clone(), &cfg);
        assert_eq!(once, twice);
    }

    #[test]
    fn zero_survivors_is_not_an_error() {
        let cfg = FigureFilterConfig::default();
        assert!(filter_figures(vec![fig(0, 1, 1)], &cfg).is_empty());
        assert!(filter_figures(vec![], &cfg).is_empty());
    }
}
