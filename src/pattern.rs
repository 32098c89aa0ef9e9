//! A diffraction pattern: original data, processing parameters and derived output.

use crate::config::PatternSettings;
use crate::error::{PatternError, Result};
use ndarray::Array1;
use std::fmt::{Debug, Display, Formatter};
use std::path::PathBuf;
use uuid::Uuid;

/// Handle of a pattern registered in a [`crate::engine::PatternEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatternId(Uuid);

impl PatternId {
    pub(crate) fn new() -> Self {
        PatternId(Uuid::new_v4())
    }
}

impl Display for PatternId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of a change subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub(crate) fn new() -> Self {
        SubscriptionId(Uuid::new_v4())
    }
}

/// Callback invoked with the new derived `(x, y)` after every successful recalculation.
pub type ChangeCallback = Box<dyn FnMut(&Array1<f64>, &Array1<f64>) + Send>;

/// A sampled curve: `x` and `y` of equal length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PatternData {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
}

impl PatternData {
    /// Pairs `x` with `y`, rejecting unequal lengths.
    pub fn new(x: Array1<f64>, y: Array1<f64>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(PatternError::malformed(
                "pattern data",
                format!("x has {} samples but y has {}", x.len(), y.len()),
            ));
        }
        Ok(PatternData { x, y })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Smallest and largest x, `None` for an empty curve.
    pub fn x_extent(&self) -> Option<(f64, f64)> {
        if self.x.is_empty() {
            return None;
        }
        let min = self.x.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some((min, max))
    }

    /// Samples whose x satisfies `keep`.
    pub fn select(&self, keep: impl Fn(f64) -> bool) -> PatternData {
        let (x, y): (Vec<f64>, Vec<f64>) = self
            .x
            .iter()
            .zip(self.y.iter())
            .filter(|(x, _)| keep(**x))
            .map(|(x, y)| (*x, *y))
            .unzip();
        PatternData {
            x: Array1::from(x),
            y: Array1::from(y),
        }
    }

    /// The demo curve `ln(x²) - (0.2 x)²` on 100 points in `[0.1, 15]`.
    pub fn demo() -> Self {
        let x = Array1::<f64>::linspace(0.1, 15.0, 100);
        let y = x.mapv(|v| (v * v).ln() - (v * 0.2).powi(2));
        PatternData { x, y }
    }
}

/// One pattern with its parameters, derived output and change subscribers.
///
/// Parameters are changed through [`crate::engine::PatternEngine`], which recalculates the
/// derived data and notifies subscribers. A pattern that is not registered in an engine
/// (for example the result of pattern algebra) is a detached snapshot.
pub struct Pattern {
    pub name: String,
    /// Source file, empty when the data did not come from a file.
    pub filename: PathBuf,
    pub(crate) original: PatternData,
    pub(crate) settings: PatternSettings,
    pub(crate) reference_background: Option<PatternId>,
    pub(crate) derived: PatternData,
    pub(crate) auto_background_before_subtraction: Option<PatternData>,
    pub(crate) auto_background: Option<PatternData>,
    /// Patterns using this one as reference background.
    pub(crate) dependents: Vec<PatternId>,
    pub(crate) subscribers: Vec<(SubscriptionId, ChangeCallback)>,
}

impl Pattern {
    /// Creates a pattern whose derived data equals `data`.
    pub fn new(data: PatternData, name: &str) -> Self {
        Pattern {
            name: name.to_string(),
            filename: PathBuf::new(),
            derived: data.clone(),
            original: data,
            settings: PatternSettings::default(),
            reference_background: None,
            auto_background_before_subtraction: None,
            auto_background: None,
            dependents: vec![],
            subscribers: vec![],
        }
    }

    /// Creates a pattern from `x` and `y`.
    pub fn from_xy(x: Array1<f64>, y: Array1<f64>, name: &str) -> Result<Self> {
        Ok(Pattern::new(PatternData::new(x, y)?, name))
    }

    /// Current output `(x, y)` of the processing pipeline.
    pub fn derived(&self) -> (&Array1<f64>, &Array1<f64>) {
        (&self.derived.x, &self.derived.y)
    }

    pub fn derived_data(&self) -> &PatternData {
        &self.derived
    }

    pub fn original(&self) -> (&Array1<f64>, &Array1<f64>) {
        (&self.original.x, &self.original.y)
    }

    pub fn original_data(&self) -> &PatternData {
        &self.original
    }

    pub fn settings(&self) -> &PatternSettings {
        &self.settings
    }

    pub fn offset(&self) -> f64 {
        self.settings.offset
    }

    pub fn scale(&self) -> f64 {
        self.settings.scale
    }

    pub fn smoothing(&self) -> f64 {
        self.settings.smoothing
    }

    pub fn reference_background(&self) -> Option<PatternId> {
        self.reference_background
    }

    pub fn auto_background_enabled(&self) -> bool {
        self.settings.auto_background.enabled
    }

    pub fn auto_background_parameters(&self) -> [f64; 3] {
        self.settings.auto_background.parameters
    }

    /// Region the automatic background is extracted on, after clamping to the data extent.
    pub fn auto_background_roi(&self) -> Option<[f64; 2]> {
        self.settings.auto_background.roi
    }

    /// Pattern before the automatic background was subtracted, while that subtraction is active.
    pub fn auto_background_before_subtraction(&self) -> Option<&PatternData> {
        self.auto_background_before_subtraction.as_ref()
    }

    /// Extracted automatic background, while that subtraction is active.
    pub fn auto_background(&self) -> Option<&PatternData> {
        self.auto_background.as_ref()
    }

    pub fn has_background(&self) -> bool {
        self.reference_background.is_some() || self.settings.auto_background.enabled
    }

    /// Number of original samples.
    pub fn len(&self) -> usize {
        self.original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    /// Detached copy of the derived samples with `x_min < x < x_max`.
    pub fn limit(&self, x_min: f64, x_max: f64) -> Pattern {
        Pattern::new(
            self.derived.select(|x| x_min < x && x < x_max),
            &self.name,
        )
    }

    pub(crate) fn notify(&mut self) {
        let Pattern {
            subscribers,
            derived,
            ..
        } = self;
        for (_, callback) in subscribers.iter_mut() {
            callback(&derived.x, &derived.y);
        }
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Pattern::new(PatternData::demo(), "")
    }
}

impl Debug for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pattern")
            .field("name", &self.name)
            .field("filename", &self.filename)
            .field("samples", &self.original.len())
            .field("derived_samples", &self.derived.len())
            .field("settings", &self.settings)
            .field("reference_background", &self.reference_background)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
