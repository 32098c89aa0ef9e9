//! Processing engine for one-dimensional X-ray diffraction patterns.
//!
//! A [`PatternEngine`] owns patterns and keeps their derived data current: every parameter
//! change (scale, offset, reference background, automatic background, smoothing) recomputes
//! the pattern, notifies its subscribers and propagates to the patterns that use it as
//! reference background.
//!
//! ```
//! use ndarray::Array1;
//! use pattern_engine::{Pattern, PatternEngine};
//!
//! let mut engine = PatternEngine::new();
//! let x = Array1::<f64>::linspace(1.0, 10.0, 10);
//! let sample = engine.insert(Pattern::from_xy(x.clone(), x.mapv(|v| 2.0 * v), "sample")?);
//! let empty_cell = engine.insert(Pattern::from_xy(x.clone(), Array1::ones(10), "empty cell")?);
//!
//! engine.set_reference_background(sample, Some(empty_cell))?;
//! engine.set_scale(empty_cell, 3.0)?;
//!
//! let (_, y) = engine.derived(sample)?;
//! assert_eq!(y[0], 2.0 - 3.0);
//! # Ok::<(), pattern_engine::PatternError>(())
//! ```

pub mod algebra;
pub mod background;
pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod grid;
pub mod io;
pub mod math_tools;
pub mod pattern;
pub mod pipeline;
pub mod units;

pub use algebra::CombineOp;
pub use background::{BackgroundExtractor, BrucknerChebyshev};
pub use batch::PatternStack;
pub use config::{AutoBackgroundSettings, ConfigCommand, PatternSettings};
pub use engine::PatternEngine;
pub use error::{PatternError, Result};
pub use grid::{align, InterpolationKind};
pub use pattern::{Pattern, PatternData, PatternId, SubscriptionId};
pub use units::{convert, Unit};
