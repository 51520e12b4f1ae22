//! Figure matching: filtered figures × AI figure descriptions → merged list.
//!
//! One pass builds a map keyed by `figure_index` (later duplicates win), a
//! second walks the filtered figures in order. The output always has exactly
//! one entry per filtered figure. AI entries that point at no figure are
//! dropped. Matching never fails.

use crate::pipeline::filter::FilteredFigure;
use crate::pipeline::schema::AiFigure;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Importance text used when the AI did not describe a figure.
pub const FALLBACK_IMPORTANCE: &str =
    "This figure is part of the paper's visual evidence supporting its findings.";

/// A figure ready for the response.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedFigure {
    pub extraction_index: usize,
    pub image_bytes: Vec<u8>,
    pub page: usize,
    pub width: u32,
    pub height: u32,
    pub caption: String,
    pub importance: String,
    /// True when caption and importance came from the AI.
    pub ai_described: bool,
}

/// Merge `figures` with the AI's descriptions.
pub fn match_figures(figures: Vec<FilteredFigure>, described: &[AiFigure]) -> Vec<MatchedFigure> {
    let mut by_index: HashMap<i64, &AiFigure> = HashMap::with_capacity(described.len());
    for entry in described {
        by_index.insert(entry.figure_index, entry);
    }

    let known: HashSet<i64> = figures.iter().map(|f| f.extraction_index as i64).collect();
    let mut dropped: Vec<i64> = by_index
        .keys()
        .copied()
        .filter(|i| !known.contains(i))
        .collect();
    if !dropped.is_empty() {
        dropped.sort_unstable();
        debug!("Ignoring AI figure descriptions for unknown indices {:?}", dropped);
    }

    figures
        .into_iter()
        .enumerate()
        .map(|(position, fig)| {
            let (caption, importance, ai_described) =
                match by_index.get(&(fig.extraction_index as i64)) {
                    Some(entry) => (entry.caption.clone(), entry.importance.clone(), true),
                    None => (
                        format!("Figure {}", position + 1),
                        FALLBACK_IMPORTANCE.to_string(),
                        false,
                    ),
                };
            MatchedFigure {
                extraction_index: fig.extraction_index,
                page: fig.page_number,
                width: fig.width,
                height: fig.height,
                image_bytes: fig.image_bytes,
                caption,
                importance,
                ai_described,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extract::RawFigure;

    fn fig(idx: usize) -> FilteredFigure {
        RawFigure {
            page_number: idx + 1,
            extraction_index: idx,
            image_bytes: vec![idx as u8],
            width: 400,
            height: 300,
            placement: None,
            tonal_range: 255,
        }
    }

    fn ai(idx: i64, caption: &str) -> AiFigure {
        AiFigure {
            figure_index: idx,
            caption: caption.into(),
            importance: format!("why {caption}"),
        }
    }

    #[test]
    fn unmatched_figure_gets_fallback_and_stray_index_is_dropped() {
        let out = match_figures(
            vec![fig(0), fig(1), fig(2)],
            &[ai(0, "zero"), ai(2, "two"), ai(5, "five")],
        );
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].caption, "zero");
        assert!(out[0].ai_described);
        assert_eq!(out[1].caption, "Figure 2");
        assert_eq!(out[1].importance, FALLBACK_IMPORTANCE);
        assert!(!out[1].ai_described);
        assert_eq!(out[2].caption, "two");
        assert!(out.iter().all(|m| m.caption != "five"));
    }

    #[test]
    fn fallback_numbers_by_position_not_index() {
        let out = match_figures(vec![fig(3), fig(7)], &[]);
        assert_eq!(out[0].caption, "Figure 1");
        assert_eq!(out[1].caption, "Figure 2");
        assert_eq!(out[1].extraction_index, 7);
    }

    #[test]
    fn duplicate_indices_last_write_wins() {
        let out = match_figures(vec![fig(0)], &[ai(0, "first"), ai(0, "second")]);
        assert_eq!(out[0].caption, "second");
    }

    #[test]
    fn empty_figures_yield_empty_output() {
        assert!(match_figures(vec![], &[ai(0, "a"), ai(1, "b")]).is_empty());
    }

    #[test]
    fn negative_index_matches_nothing() {
        let out = match_figures(vec![fig(0)], &[ai(-1, "neg")]);
        assert_eq!(out[0].caption, "Figure 1");
    }

    #[test]
    fn output_length_always_equals_input_length() {
        for n in 0..6 {
            let figs: Vec<_> = (0..n).map(fig).collect();
            let described: Vec<_> = (0..10).map(|i| ai(i, "c")).collect();
            assert_eq!(match_figures(figs, &described).len(), n);
        }
    }

    #[test]
    fn image_data_and_geometry_are_carried_through() {
        let out = match_figures(vec![fig(4)], &[ai(4, "four")]);
        assert_eq!(out[0].image_bytes, vec![4]);
        assert_eq!(out[0].page, 5);
        assert_eq!((out[0].width, out[0].height), (400, 300));
    }
}
