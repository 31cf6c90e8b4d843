//! Page adapter contracts, the goodreturns table extractor, and price normalization.

mod goodreturns;
pub mod normalize;

use ifp_core::{Diagnostic, FuelType, RawRow, StateSlug};
use thiserror::Error;

pub use goodreturns::GoodReturnsAdapter;
pub use normalize::{normalize, parse_price, NormalizedPrice};

pub const CRATE_NAME: &str = "ifp-adapters";

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid selector {selector:?}: {message}")]
    Selector { selector: String, message: String },
    #[error("no page adapter registered for source {0:?}")]
    UnknownSource(String),
}

/// Rows pulled from one fuel-type page, plus anything odd noticed on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub rows: Vec<RawRow>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Extraction {
    pub fn rejected(diagnostic: Diagnostic) -> Self {
        Self {
            rows: Vec::new(),
            diagnostics: vec![diagnostic],
        }
    }
}

/// Markup-shape knowledge for one upstream site.
///
/// Structural surprises are reported through [`Extraction::diagnostics`]
/// with zero rows, never as errors.
pub trait PageAdapter: Send + Sync {
    fn source_id(&self) -> &'static str;

    fn default_base_url(&self) -> &'static str;

    /// Path of the page listing `fuel` prices for a state, relative to the site root.
    fn page_path(&self, fuel: FuelType, slug: &StateSlug) -> String;

    fn extract(&self, markup: &str, expected_tokens: &[String], fuel: FuelType) -> Extraction;
}

pub fn adapter_for_source(source_id: &str) -> Result<Box<dyn PageAdapter>, AdapterError> {
    match source_id {
        goodreturns::SOURCE_ID => Ok(Box::new(GoodReturnsAdapter::new()?)),
        other => Err(AdapterError::UnknownSource(other.to_string())),
    }
}
