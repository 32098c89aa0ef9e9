//! Automatic background extraction.
//!
//! The pipeline only depends on the [`extractor::BackgroundExtractor`] trait. Implementations
//! register themselves in the global [`extractor::EXTRACTOR_REGISTRY`] with the
//! `#[register_extractor]` attribute so they can be selected by name.

/// Window-average peak stripping followed by a Chebyshev polynomial fit.
pub mod bruckner;

/// The extractor trait and the global registry of extractors.
pub mod extractor;

pub use bruckner::BrucknerChebyshev;
pub use extractor::{BackgroundExtractor, ExtractorRegistry, EXTRACTOR_REGISTRY};
