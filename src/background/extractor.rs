//! This module provides the `BackgroundExtractor` trait and a global, thread-safe registry of
//! extractors that can be looked up by name.

use crate::error::{PatternError, Result};
#[allow(unused_imports)] // this dependency is required by the `register_extractor` macro
use ctor::ctor;
use ndarray::Array1;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Mutex;

/// Extracts a smooth background curve from a diffraction pattern.
///
/// Implementations must be pure and deterministic: the same `(x, y, parameters)` always
/// gives the same background, and the returned curve has one value per input sample.
/// The meaning of the three parameters is up to the implementation.
///
/// To make an extractor selectable by name, derive `Clone` and `Debug` and annotate the
/// struct with `#[register_extractor]`:
///
/// ```ignore
/// #[register_extractor]
/// #[derive(Clone, Debug)]
/// struct ConstantBackground;
///
/// impl BackgroundExtractor for ConstantBackground {
///     fn new() -> Self { ConstantBackground }
///
///     fn name(&self) -> &'static str { "Constant" }
///
///     fn extract(
///         &self,
///         x: &Array1<f64>,
///         y: &Array1<f64>,
///         parameters: [f64; 3],
///     ) -> Result<Array1<f64>> {
///         Ok(Array1::from_elem(x.len(), parameters[0]))
///     }
/// }
/// ```
pub trait BackgroundExtractor: Send + Sync + Debug + CloneBoxedExtractor {
    /// Creates the extractor with its default configuration.
    fn new() -> Self
    where
        Self: Sized;

    /// Name under which the extractor is registered.
    fn name(&self) -> &'static str;

    /// Returns the background of `(x, y)`, same length as the input.
    ///
    /// Errors are passed to the caller of the recalculation unchanged.
    fn extract(&self, x: &Array1<f64>, y: &Array1<f64>, parameters: [f64; 3])
        -> Result<Array1<f64>>;
}

/// Allows cloning of boxed extractors.
pub trait CloneBoxedExtractor {
    fn clone_box(&self) -> Box<dyn BackgroundExtractor>;
}

impl<T> CloneBoxedExtractor for T
where
    T: 'static + BackgroundExtractor + Clone,
{
    fn clone_box(&self) -> Box<dyn BackgroundExtractor> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn BackgroundExtractor> {
    fn clone(&self) -> Box<dyn BackgroundExtractor> {
        self.as_ref().clone_box()
    }
}

/// Registry of background extractors keyed by [`BackgroundExtractor::name`].
#[derive(Debug, Default)]
pub struct ExtractorRegistry {
    pub extractors: HashMap<String, Box<dyn BackgroundExtractor>>,
}

impl ExtractorRegistry {
    /// Adds a default instance of `E` to the global [`EXTRACTOR_REGISTRY`].
    ///
    /// Registering a second extractor with the same name replaces the first.
    pub fn register_extractor<E: BackgroundExtractor + 'static>() {
        let extractor = E::new();
        match EXTRACTOR_REGISTRY.lock() {
            Ok(mut registry) => {
                registry
                    .extractors
                    .insert(extractor.name().to_string(), Box::new(extractor));
            }
            Err(err) => {
                log::error!("could not register background extractor: {err}");
            }
        }
    }

    /// Returns a copy of the extractor registered under `name`.
    pub fn get_extractor(&self, name: &str) -> Option<Box<dyn BackgroundExtractor>> {
        self.extractors.get(name).cloned()
    }

    /// Names of all registered extractors, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.extractors.keys().cloned().collect();
        names.sort();
        names
    }
}

/// The global extractor registry, filled at program start by `#[register_extractor]`.
pub static EXTRACTOR_REGISTRY: Lazy<Mutex<ExtractorRegistry>> =
    Lazy::new(|| Mutex::new(ExtractorRegistry::default()));

/// Looks up a registered extractor by name.
pub fn extractor_by_name(name: &str) -> Result<Box<dyn BackgroundExtractor>> {
    EXTRACTOR_REGISTRY
        .lock()
        .map_err(|err| PatternError::Extraction(err.to_string()))?
        .get_extractor(name)
        .ok_or_else(|| PatternError::UnknownExtractor(name.to_string()))
}
