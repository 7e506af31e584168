//! Heuristic detail-page classification.
//!
//! Textual markers decide first: any positive marker means a detail page,
//! negative markers alone mean the search listing. Only when the text carries
//! no marker at all does the weak visual hint (e.g. a printer icon) count.

use crate::config::ClassifierConfig;
use crate::models::{PageClass, PageSignals};

#[derive(Debug, Clone)]
pub struct PageClassifier {
    detail_markers: Vec<String>,
    listing_markers: Vec<String>,
    weak_visual_selectors: Vec<String>,
}

impl PageClassifier {
    pub fn new(
        detail_markers: Vec<String>,
        listing_markers: Vec<String>,
        weak_visual_selectors: Vec<String>,
    ) -> Self {
        Self {
            detail_markers: detail_markers.iter().map(|m| m.to_lowercase()).collect(),
            listing_markers: listing_markers.iter().map(|m| m.to_lowercase()).collect(),
            weak_visual_selectors,
        }
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::new(
            config.detail_markers.clone(),
            config.listing_markers.clone(),
            config.weak_visual_selectors.clone(),
        )
    }

    /// Selectors a driver should probe to fill `has_weak_visual_marker`.
    pub fn weak_visual_selectors(&self) -> &[String] {
        &self.weak_visual_selectors
    }

    pub fn classify(&self, signals: &PageSignals) -> PageClass {
        let text = signals.text.to_lowercase();
        let detail = self.detail_markers.iter().any(|m| text.contains(m.as_str()));
        let listing = self
            .listing_markers
            .iter()
            .any(|m| text.contains(m.as_str()));

        match (detail, listing) {
            (true, _) => PageClass::LikelyDetail,
            (false, true) => PageClass::LikelyListing,
            (false, false) if signals.has_weak_visual_marker => PageClass::LikelyDetail,
            (false, false) => PageClass::Unknown,
        }
    }
}

impl Default for PageClassifier {
    fn default() -> Self {
        Self::from_config(&ClassifierConfig::default())
    }
}
