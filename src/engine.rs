//! The pattern engine: owns patterns, applies parameter changes and keeps derived data current.
//!
//! Every change goes through [`PatternEngine::apply`] (the `set_*` methods are shorthands).
//! A change is staged, the pattern is recalculated with the staged parameters and only a
//! successful recalculation is committed. After the commit the pattern's subscribers are
//! notified and every pattern that uses it as reference background is recalculated in turn,
//! depth-first.

use crate::algebra::{self, CombineOp};
use crate::background::extractor::extractor_by_name;
use crate::background::{BackgroundExtractor, BrucknerChebyshev};
use crate::config::{ConfigCommand, PatternSettings};
use crate::error::{PatternError, Result};
use crate::io;
use crate::pattern::{Pattern, PatternData, PatternId, SubscriptionId};
use crate::pipeline::{recalculate, Recalculated};
use ndarray::Array1;
use std::collections::HashMap;
use std::path::Path;

/// Parameters of a pending change, committed only if the recalculation succeeds.
struct Staged {
    original: Option<PatternData>,
    settings: PatternSettings,
    reference: Option<PatternId>,
}

/// Owner of a set of patterns and of the background extractor they share.
///
/// Patterns are addressed by [`PatternId`]. The reference-background relation is a
/// non-owning handle from the dependent to its reference plus a dependents list on the
/// reference, so edits to a reference reach every pattern subtracting it.
#[derive(Debug)]
pub struct PatternEngine {
    patterns: HashMap<PatternId, Pattern>,
    extractor: Box<dyn BackgroundExtractor>,
}

impl Default for PatternEngine {
    fn default() -> Self {
        PatternEngine::new()
    }
}

impl PatternEngine {
    /// Creates an empty engine using the default background extractor.
    pub fn new() -> Self {
        PatternEngine::with_extractor(Box::new(BrucknerChebyshev::new()))
    }

    pub fn with_extractor(extractor: Box<dyn BackgroundExtractor>) -> Self {
        PatternEngine {
            patterns: HashMap::new(),
            extractor,
        }
    }

    /// Creates an engine with an extractor taken from the global registry.
    pub fn with_extractor_named(name: &str) -> Result<Self> {
        Ok(PatternEngine::with_extractor(extractor_by_name(name)?))
    }

    pub fn extractor(&self) -> &dyn BackgroundExtractor {
        self.extractor.as_ref()
    }

    /// Replaces the background extractor and recalculates every pattern using automatic
    /// background subtraction. Returns the first recalculation error, if any.
    pub fn set_extractor(&mut self, extractor: Box<dyn BackgroundExtractor>) -> Result<()> {
        log::debug!("switching background extractor to {}", extractor.name());
        self.extractor = extractor;
        let ids: Vec<PatternId> = self
            .patterns
            .iter()
            .filter(|(_, p)| p.settings.auto_background.enabled)
            .map(|(id, _)| *id)
            .collect();
        let mut first_error = None;
        for id in ids {
            if let Err(err) = self.recalculate(id) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Registers `pattern` and returns its handle.
    ///
    /// The pattern enters without reference background and keeps its current derived data.
    pub fn insert(&mut self, mut pattern: Pattern) -> PatternId {
        let id = PatternId::new();
        pattern.reference_background = None;
        pattern.dependents.clear();
        self.patterns.insert(id, pattern);
        id
    }

    /// Loads a pattern file and registers it.
    pub fn insert_from_file(&mut self, path: &Path) -> Result<PatternId> {
        Ok(self.insert(io::load_pattern(path)?))
    }

    /// Unregisters a pattern and hands it back.
    ///
    /// # Errors
    /// [`PatternError::StillReferenced`] while another pattern uses it as reference background.
    pub fn remove(&mut self, id: PatternId) -> Result<Pattern> {
        let pattern = self.pattern(id)?;
        if !pattern.dependents.is_empty() {
            return Err(PatternError::StillReferenced {
                pattern_name: pattern.name.clone(),
            });
        }
        let mut pattern = self
            .patterns
            .remove(&id)
            .ok_or(PatternError::UnknownPattern(id))?;
        if let Some(reference) = pattern.reference_background.take() {
            if let Some(reference) = self.patterns.get_mut(&reference) {
                reference.dependents.retain(|d| *d != id);
            }
        }
        Ok(pattern)
    }

    pub fn get(&self, id: PatternId) -> Option<&Pattern> {
        self.patterns.get(&id)
    }

    pub fn pattern(&self, id: PatternId) -> Result<&Pattern> {
        self.patterns
            .get(&id)
            .ok_or(PatternError::UnknownPattern(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PatternId, &Pattern)> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn rename(&mut self, id: PatternId, name: &str) -> Result<()> {
        let pattern = self
            .patterns
            .get_mut(&id)
            .ok_or(PatternError::UnknownPattern(id))?;
        pattern.name = name.to_string();
        Ok(())
    }

    /// Current derived `(x, y)` of a pattern.
    pub fn derived(&self, id: PatternId) -> Result<(&Array1<f64>, &Array1<f64>)> {
        Ok(self.pattern(id)?.derived())
    }

    /// Calls `callback` with the derived data after every successful recalculation of `id`.
    pub fn subscribe<F>(&mut self, id: PatternId, callback: F) -> Result<SubscriptionId>
    where
        F: FnMut(&Array1<f64>, &Array1<f64>) + Send + 'static,
    {
        let pattern = self
            .patterns
            .get_mut(&id)
            .ok_or(PatternError::UnknownPattern(id))?;
        let subscription = SubscriptionId::new();
        pattern.subscribers.push((subscription, Box::new(callback)));
        Ok(subscription)
    }

    /// Removes a subscription. Returns `false` if it did not exist.
    pub fn unsubscribe(&mut self, id: PatternId, subscription: SubscriptionId) -> bool {
        match self.patterns.get_mut(&id) {
            Some(pattern) => {
                let before = pattern.subscribers.len();
                pattern.subscribers.retain(|(s, _)| *s != subscription);
                pattern.subscribers.len() != before
            }
            None => false,
        }
    }

    /// Replaces the original data, resets scale to 1 and offset to 0.
    pub fn set_original(&mut self, id: PatternId, x: Array1<f64>, y: Array1<f64>) -> Result<()> {
        let data = PatternData::new(x, y)?;
        self.apply(id, ConfigCommand::SetOriginal(data))
    }

    pub fn set_offset(&mut self, id: PatternId, offset: f64) -> Result<()> {
        self.apply(id, ConfigCommand::SetOffset(offset))
    }

    /// Sets the scale; negative values are floored to 0.
    pub fn set_scale(&mut self, id: PatternId, scale: f64) -> Result<()> {
        self.apply(id, ConfigCommand::SetScale(scale))
    }

    pub fn set_smoothing(&mut self, id: PatternId, width: f64) -> Result<()> {
        self.apply(id, ConfigCommand::SetSmoothing(width))
    }

    /// Sets or clears the reference background of `id`.
    ///
    /// # Errors
    /// [`PatternError::CyclicReference`] if `reference` is `id` itself or already depends on it.
    pub fn set_reference_background(
        &mut self,
        id: PatternId,
        reference: Option<PatternId>,
    ) -> Result<()> {
        self.apply(id, ConfigCommand::SetReferenceBackground(reference))
    }

    pub fn enable_auto_background(
        &mut self,
        id: PatternId,
        parameters: [f64; 3],
        roi: Option<[f64; 2]>,
    ) -> Result<()> {
        self.apply(id, ConfigCommand::EnableAutoBackground { parameters, roi })
    }

    pub fn disable_auto_background(&mut self, id: PatternId) -> Result<()> {
        self.apply(id, ConfigCommand::DisableAutoBackground)
    }

    /// Applies one change to a pattern and recalculates it and its dependents.
    ///
    /// On error the pattern keeps its previous parameters and derived data. If the pattern
    /// itself succeeds but a dependent fails, the change stays committed, the failing
    /// dependent keeps its previous state and the first such error is returned.
    pub fn apply(&mut self, id: PatternId, command: ConfigCommand) -> Result<()> {
        let pattern = self.pattern(id)?;
        let mut staged = Staged {
            original: None,
            settings: pattern.settings.clone(),
            reference: pattern.reference_background,
        };

        match command {
            ConfigCommand::SetOriginal(data) => {
                staged.original = Some(data);
                staged.settings.scale = 1.0;
                staged.settings.offset = 0.0;
            }
            ConfigCommand::SetOffset(offset) => staged.settings.offset = offset,
            ConfigCommand::SetScale(scale) => staged.settings.set_scale(scale),
            ConfigCommand::SetSmoothing(width) => staged.settings.smoothing = width,
            ConfigCommand::SetReferenceBackground(reference) => {
                if let Some(reference) = reference {
                    self.check_acyclic(id, reference)?;
                }
                staged.reference = reference;
            }
            ConfigCommand::EnableAutoBackground { parameters, roi } => {
                staged.settings.auto_background.enabled = true;
                staged.settings.auto_background.parameters = parameters;
                staged.settings.auto_background.roi = roi;
            }
            ConfigCommand::DisableAutoBackground => {
                staged.settings.auto_background.enabled = false;
            }
        }

        self.update(id, staged)
    }

    /// Recalculates a pattern with its current parameters and propagates the result.
    pub fn recalculate(&mut self, id: PatternId) -> Result<()> {
        let pattern = self.pattern(id)?;
        let staged = Staged {
            original: None,
            settings: pattern.settings.clone(),
            reference: pattern.reference_background,
        };
        self.update(id, staged)
    }

    /// Reads new original data for `id` from a file.
    ///
    /// Name and filename follow the file; scale and offset are kept.
    pub fn load(&mut self, id: PatternId, path: &Path) -> Result<()> {
        let (data, name) = io::read_pattern_file(path)?;
        let pattern = self.pattern(id)?;
        let staged = Staged {
            original: Some(data),
            settings: pattern.settings.clone(),
            reference: pattern.reference_background,
        };
        self.commit_staged(id, staged)?;
        if let Some(pattern) = self.patterns.get_mut(&id) {
            pattern.name = name;
            pattern.filename = path.to_path_buf();
            log::info!("loaded {:?} into pattern {}", path, pattern.name);
        }
        self.propagate(id, &mut vec![])
    }

    /// Writes the original data of `id` as two text columns.
    pub fn save(&self, id: PatternId, path: &Path, header: &str) -> Result<()> {
        io::save_pattern(self.pattern(id)?, path, header)
    }

    /// Sum or difference of two patterns' derived data as a new, detached pattern.
    pub fn combine(&self, a: PatternId, b: PatternId, op: CombineOp) -> Result<Pattern> {
        algebra::combine(self.pattern(a)?, self.pattern(b)?, op)
    }

    /// Derived data of `id` multiplied by `factor`, as a new, detached pattern.
    pub fn scale_by(&self, id: PatternId, factor: f64) -> Result<Pattern> {
        Ok(algebra::scale_by(self.pattern(id)?, factor))
    }

    /// Fails if making `reference` the reference background of `id` would close a cycle.
    fn check_acyclic(&self, id: PatternId, reference: PatternId) -> Result<()> {
        let mut current = Some(reference);
        let mut steps = 0;
        while let Some(c) = current {
            if c == id || steps > self.patterns.len() {
                return Err(PatternError::CyclicReference {
                    pattern_name: self.pattern(id)?.name.clone(),
                });
            }
            current = self.pattern(c)?.reference_background;
            steps += 1;
        }
        Ok(())
    }

    fn run_pipeline(&self, id: PatternId, staged: &Staged) -> Result<Recalculated> {
        let pattern = self.pattern(id)?;
        let reference = match staged.reference {
            Some(reference) => Some(&self.pattern(reference)?.derived),
            None => None,
        };
        let original = staged.original.as_ref().unwrap_or(&pattern.original);
        recalculate(
            &pattern.name,
            original,
            &staged.settings,
            reference,
            self.extractor.as_ref(),
        )
    }

    fn update(&mut self, id: PatternId, staged: Staged) -> Result<()> {
        self.commit_staged(id, staged)?;
        self.propagate(id, &mut vec![])
    }

    /// Recalculates `id` with the staged parameters and commits them on success.
    fn commit_staged(&mut self, id: PatternId, staged: Staged) -> Result<()> {
        let recalculated = self.run_pipeline(id, &staged)?;

        let pattern = self
            .patterns
            .get_mut(&id)
            .ok_or(PatternError::UnknownPattern(id))?;
        let previous_reference = pattern.reference_background;
        if let Some(original) = staged.original {
            pattern.original = original;
        }
        pattern.settings = staged.settings;
        pattern.reference_background = staged.reference;
        commit(pattern, recalculated);

        if previous_reference != staged.reference {
            if let Some(old) = previous_reference.and_then(|r| self.patterns.get_mut(&r)) {
                old.dependents.retain(|d| *d != id);
            }
            if let Some(new) = staged.reference.and_then(|r| self.patterns.get_mut(&r)) {
                if !new.dependents.contains(&id) {
                    new.dependents.push(id);
                }
            }
        }
        Ok(())
    }

    /// Notifies the subscribers of `id`, then recalculates its dependents depth-first.
    fn propagate(&mut self, id: PatternId, visiting: &mut Vec<PatternId>) -> Result<()> {
        let pattern = self
            .patterns
            .get_mut(&id)
            .ok_or(PatternError::UnknownPattern(id))?;
        if visiting.contains(&id) {
            return Err(PatternError::CyclicReference {
                pattern_name: pattern.name.clone(),
            });
        }
        visiting.push(id);
        pattern.notify();
        let dependents = pattern.dependents.clone();

        let mut first_error = None;
        for dependent in dependents {
            let result = self.recalculate_quietly(dependent);
            let result = result.and_then(|_| self.propagate(dependent, visiting));
            if let Err(err) = result {
                log::debug!("propagation to dependent {dependent} failed: {err}");
                first_error.get_or_insert(err);
            }
        }
        visiting.pop();
        first_error.map_or(Ok(()), Err)
    }

    /// Recalculates and commits without notifying or propagating.
    fn recalculate_quietly(&mut self, id: PatternId) -> Result<()> {
        let pattern = self.pattern(id)?;
        let staged = Staged {
            original: None,
            settings: pattern.settings.clone(),
            reference: pattern.reference_background,
        };
        let recalculated = self.run_pipeline(id, &staged)?;
        let pattern = self
            .patterns
            .get_mut(&id)
            .ok_or(PatternError::UnknownPattern(id))?;
        commit(pattern, recalculated);
        Ok(())
    }
}

fn commit(pattern: &mut Pattern, recalculated: Recalculated) {
    log::debug!(
        "recalculated {}: {} of {} samples",
        pattern.name,
        recalculated.derived.len(),
        pattern.original.len()
    );
    pattern.derived = recalculated.derived;
    pattern.auto_background_before_subtraction = recalculated.auto_background_before_subtraction;
    pattern.auto_background = recalculated.auto_background;
    pattern.settings.auto_background.roi = recalculated.auto_background_roi;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use std::sync::{Arc, Mutex};

    fn engine_with(x: Array1<f64>, y: Array1<f64>, name: &str) -> (PatternEngine, PatternId) {
        let mut engine = PatternEngine::new();
        let id = engine.insert(Pattern::from_xy(x, y, name).unwrap());
        (engine, id)
    }

    fn flat(x: &Array1<f64>, value: f64, name: &str) -> Pattern {
        Pattern::from_xy(x.clone(), Array1::from_elem(x.len(), value), name).unwrap()
    }

    fn ramp(name: &str) -> Pattern {
        let x = Array1::<f64>::linspace(0.0, 10.0, 11);
        let y = x.mapv(|v| v * v);
        Pattern::from_xy(x, y, name).unwrap()
    }

    #[test]
    fn test_offset_and_scale_round_trip() {
        let mut engine = PatternEngine::new();
        let id = engine.insert(ramp("p"));
        engine.set_offset(id, 3.0).unwrap();
        engine.set_scale(id, 0.25).unwrap();
        engine.set_offset(id, -7.0).unwrap();
        let (_, y) = engine.derived(id).unwrap();
        assert_abs_diff_eq!(y[4], 16.0 * 0.25 - 7.0, epsilon = 1e-12);

        engine.set_offset(id, 0.0).unwrap();
        engine.set_scale(id, 1.0).unwrap();
        let pattern = engine.pattern(id).unwrap();
        assert_eq!(pattern.derived(), pattern.original());
    }

    #[test]
    fn test_negative_scale_behaves_like_zero() {
        let mut engine = PatternEngine::new();
        let a = engine.insert(ramp("a"));
        let b = engine.insert(ramp("b"));
        engine.set_offset(a, 2.0).unwrap();
        engine.set_offset(b, 2.0).unwrap();
        engine.set_scale(a, -5.0).unwrap();
        engine.set_scale(b, 0.0).unwrap();
        assert_eq!(engine.pattern(a).unwrap().scale(), 0.0);
        assert_eq!(engine.derived(a).unwrap(), engine.derived(b).unwrap());
    }

    #[test]
    fn test_derived_is_stable_without_mutation() {
        let mut engine = PatternEngine::new();
        let id = engine.insert(Pattern::default());
        engine.enable_auto_background(id, [0.1, 50.0, 50.0], None).unwrap();
        engine.set_smoothing(id, 1.5).unwrap();
        let first = engine.derived(id).unwrap().1.clone();
        let second = engine.derived(id).unwrap().1.clone();
        assert_eq!(first, second);
        engine.recalculate(id).unwrap();
        assert_eq!(engine.derived(id).unwrap().1, &first);
    }

    #[test]
    fn test_set_original_resets_scale_and_offset() {
        let mut engine = PatternEngine::new();
        let id = engine.insert(ramp("p"));
        engine.set_scale(id, 3.0).unwrap();
        engine.set_offset(id, 1.0).unwrap();
        engine
            .set_original(id, array![1.0, 2.0, 3.0], array![4.0, 5.0, 6.0])
            .unwrap();
        let pattern = engine.pattern(id).unwrap();
        assert_eq!(pattern.scale(), 1.0);
        assert_eq!(pattern.offset(), 0.0);
        assert_eq!(pattern.derived().1, &array![4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_set_original_rejects_unequal_lengths() {
        let (mut engine, id) = engine_with(array![1.0, 2.0], array![1.0, 1.0], "p");
        let result = engine.set_original(id, array![1.0, 2.0, 3.0], array![1.0]);
        assert!(matches!(result, Err(PatternError::MalformedInput { .. })));
        assert_eq!(engine.pattern(id).unwrap().len(), 2);
    }

    #[test]
    fn test_reference_background_is_subtracted() {
        let mut engine = PatternEngine::new();
        let sample = engine.insert(ramp("sample"));
        let x = Array1::<f64>::linspace(0.0, 10.0, 11);
        let background = engine.insert(flat(&x, 2.0, "bkg"));
        engine.set_reference_background(sample, Some(background)).unwrap();
        let (_, y) = engine.derived(sample).unwrap();
        assert_eq!(y, &x.mapv(|v| v * v - 2.0));
        assert!(engine.pattern(sample).unwrap().has_background());

        engine.set_reference_background(sample, None).unwrap();
        assert_eq!(engine.derived(sample).unwrap().1, &x.mapv(|v| v * v));
        assert!(engine.pattern(background).unwrap().dependents.is_empty());
    }

    #[test]
    fn test_edits_to_reference_propagate_transitively() {
        let mut engine = PatternEngine::new();
        let x = Array1::<f64>::linspace(0.0, 10.0, 11);
        let a = engine.insert(flat(&x, 10.0, "a"));
        let b = engine.insert(flat(&x, 1.0, "b"));
        let c = engine.insert(flat(&x, 0.5, "c"));
        engine.set_reference_background(a, Some(b)).unwrap();
        engine.set_reference_background(b, Some(c)).unwrap();
        // a - (b - c) = 10 - 0.5
        assert_eq!(engine.derived(a).unwrap().1, &Array1::from_elem(11, 9.5));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        engine
            .subscribe(a, move |_, y| seen_clone.lock().unwrap().push(y[0]))
            .unwrap();

        engine.set_offset(c, 1.5).unwrap();
        // c = 2, b = -1, a = 11
        assert_eq!(engine.derived(a).unwrap().1, &Array1::from_elem(11, 11.0));
        assert_eq!(*seen.lock().unwrap(), vec![11.0]);
    }

    #[test]
    fn test_self_reference_is_rejected() {
        let mut engine = PatternEngine::new();
        let a = engine.insert(ramp("a"));
        let result = engine.set_reference_background(a, Some(a));
        assert!(matches!(result, Err(PatternError::CyclicReference { .. })));
        assert_eq!(engine.pattern(a).unwrap().reference_background(), None);
    }

    #[test]
    fn test_transitive_cycle_is_rejected() {
        let mut engine = PatternEngine::new();
        let a = engine.insert(ramp("a"));
        let b = engine.insert(ramp("b"));
        let c = engine.insert(ramp("c"));
        engine.set_reference_background(a, Some(b)).unwrap();
        engine.set_reference_background(b, Some(c)).unwrap();
        let result = engine.set_reference_background(c, Some(a));
        assert!(matches!(
            result,
            Err(PatternError::CyclicReference { pattern_name }) if pattern_name == "c"
        ));
        assert_eq!(engine.pattern(c).unwrap().reference_background(), None);
    }

    #[test]
    fn test_failed_recalculation_keeps_previous_state() {
        let mut engine = PatternEngine::new();
        let sample = engine.insert(ramp("sample"));
        let far = engine.insert(
            Pattern::from_xy(array![50.0, 51.0, 52.0], array![1.0, 1.0, 1.0], "far").unwrap(),
        );
        engine.set_offset(sample, 1.0).unwrap();
        let before = engine.derived(sample).unwrap().1.clone();

        let result = engine.set_reference_background(sample, Some(far));
        assert!(matches!(
            result,
            Err(PatternError::RangeOverlap { pattern_name }) if pattern_name == "sample"
        ));
        let pattern = engine.pattern(sample).unwrap();
        assert_eq!(pattern.reference_background(), None);
        assert_eq!(pattern.derived().1, &before);
        assert!(engine.pattern(far).unwrap().dependents.is_empty());
    }

    #[test]
    fn test_failing_dependent_stays_stale() {
        let mut engine = PatternEngine::new();
        let x = Array1::<f64>::linspace(0.0, 10.0, 11);
        let sample = engine.insert(ramp("sample"));
        let bkg = engine.insert(flat(&x, 1.0, "bkg"));
        engine.set_reference_background(sample, Some(bkg)).unwrap();
        let before = engine.derived(sample).unwrap().1.clone();

        let result = engine.set_original(bkg, array![40.0, 41.0], array![0.0, 0.0]);
        assert!(matches!(result, Err(PatternError::RangeOverlap { .. })));
        // the reference itself was updated, the dependent kept its last valid output
        assert_eq!(engine.pattern(bkg).unwrap().len(), 2);
        assert_eq!(engine.derived(sample).unwrap().1, &before);
    }

    #[test]
    fn test_referenced_pattern_cannot_be_removed() {
        let mut engine = PatternEngine::new();
        let sample = engine.insert(ramp("sample"));
        let bkg = engine.insert(ramp("bkg"));
        engine.set_reference_background(sample, Some(bkg)).unwrap();
        assert!(matches!(
            engine.remove(bkg),
            Err(PatternError::StillReferenced { .. })
        ));
        engine.set_reference_background(sample, None).unwrap();
        assert_eq!(engine.remove(bkg).unwrap().name, "bkg");
        assert!(matches!(
            engine.derived(bkg),
            Err(PatternError::UnknownPattern(_))
        ));
    }

    #[test]
    fn test_removing_dependent_unlinks_it() {
        let mut engine = PatternEngine::new();
        let sample = engine.insert(ramp("sample"));
        let bkg = engine.insert(ramp("bkg"));
        engine.set_reference_background(sample, Some(bkg)).unwrap();
        engine.remove(sample).unwrap();
        assert!(engine.remove(bkg).is_ok());
        assert!(engine.is_empty());
    }

    #[test]
    fn test_auto_background_roi_is_clamped() {
        let mut engine = PatternEngine::new();
        let id = engine.insert(ramp("p"));
        engine
            .enable_auto_background(id, [0.5, 10.0, 3.0], Some([1.0, 9.0]))
            .unwrap();
        assert_eq!(engine.pattern(id).unwrap().auto_background_roi(), Some([1.0, 9.0]));

        engine
            .enable_auto_background(id, [0.5, 10.0, 3.0], Some([-5.0, 20.0]))
            .unwrap();
        let pattern = engine.pattern(id).unwrap();
        assert_eq!(pattern.auto_background_roi(), Some([0.0, 10.0]));
        assert!(pattern.auto_background().is_some());
        assert_eq!(pattern.auto_background_before_subtraction().unwrap().len(), 11);
    }

    #[test]
    fn test_auto_background_roi_outside_data_is_rejected() {
        let mut engine = PatternEngine::new();
        let id = engine.insert(ramp("p"));
        let result = engine.enable_auto_background(id, [0.5, 10.0, 3.0], Some([20.0, 30.0]));
        assert!(matches!(
            result,
            Err(PatternError::RangeOverlap { pattern_name }) if pattern_name == "p"
        ));
        let pattern = engine.pattern(id).unwrap();
        assert!(!pattern.auto_background_enabled());
        assert_eq!(pattern.auto_background_roi(), None);
        assert_eq!(pattern.derived(), pattern.original());
    }

    #[test]
    fn test_disabling_auto_background_clears_side_products() {
        let mut engine = PatternEngine::new();
        let id = engine.insert(Pattern::default());
        engine.enable_auto_background(id, [0.1, 50.0, 50.0], None).unwrap();
        assert!(engine.pattern(id).unwrap().auto_background().is_some());
        engine.disable_auto_background(id).unwrap();
        let pattern = engine.pattern(id).unwrap();
        assert!(pattern.auto_background().is_none());
        assert!(pattern.auto_background_before_subtraction().is_none());
        assert_eq!(pattern.derived(), pattern.original());
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let mut engine = PatternEngine::new();
        let id = engine.insert(ramp("p"));
        let count = Arc::new(Mutex::new(0));
        let count_clone = count.clone();
        let subscription = engine
            .subscribe(id, move |_, _| *count_clone.lock().unwrap() += 1)
            .unwrap();
        engine.set_smoothing(id, 1.0).unwrap();
        assert!(engine.unsubscribe(id, subscription));
        engine.set_smoothing(id, 2.0).unwrap();
        assert_eq!(*count.lock().unwrap(), 1);
        assert!(!engine.unsubscribe(id, subscription));
    }

    #[test]
    fn test_apply_command() {
        let mut engine = PatternEngine::new();
        let id = engine.insert(ramp("p"));
        engine.apply(id, ConfigCommand::SetOffset(4.0)).unwrap();
        assert_eq!(engine.derived(id).unwrap().1[0], 4.0);
    }

    #[test]
    fn test_combine_through_engine() {
        let mut engine = PatternEngine::new();
        let a = engine.insert(flat(&array![0.0, 1.0, 2.0, 3.0, 4.0], 0.0, "a"));
        let b = engine.insert(flat(&array![2.0, 3.0, 4.0, 5.0, 6.0], 1.0, "b"));
        let sum = engine.combine(a, b, CombineOp::Add).unwrap();
        assert_eq!(sum.derived().0, &array![2.0, 3.0, 4.0]);
        let doubled = engine.scale_by(b, -2.0).unwrap();
        assert_eq!(doubled.derived().1, &Array1::from_elem(5, -2.0));
    }
}
