//! Background handling for a stack of patterns sharing one binning.

use crate::background::BackgroundExtractor;
use crate::error::{PatternError, Result};
use crate::units::{convert_array, Unit};
use cancellable_loops::par_try_map_cancellable;
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use std::sync::atomic::AtomicBool;
use std::sync::RwLock;

/// A 2-D stack of patterns, one row per image, all on the same x binning.
#[derive(Debug, Clone)]
pub struct PatternStack {
    binning: Array1<f64>,
    unit: Unit,
    data: Array2<f64>,
    background: Option<Array2<f64>>,
}

impl PatternStack {
    /// # Errors
    /// [`PatternError::MalformedInput`] if the number of columns differs from the binning.
    pub fn new(binning: Array1<f64>, unit: Unit, data: Array2<f64>) -> Result<Self> {
        if data.ncols() != binning.len() {
            return Err(PatternError::malformed(
                "pattern stack",
                format!(
                    "{} bins but {} columns of data",
                    binning.len(),
                    data.ncols()
                ),
            ));
        }
        Ok(PatternStack {
            binning,
            unit,
            data,
            background: None,
        })
    }

    pub fn binning(&self) -> &Array1<f64> {
        &self.binning
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn background(&self) -> Option<&Array2<f64>> {
        self.background.as_ref()
    }

    /// Number of patterns in the stack.
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    /// Binning expressed in `unit`.
    pub fn binning_in(&self, unit: Unit, wavelength: f64) -> Array1<f64> {
        convert_array(&self.binning, self.unit, unit, wavelength)
    }

    /// Replaces the data, dropping a background extracted for the previous data.
    pub fn set_data(&mut self, data: Array2<f64>) -> Result<()> {
        if data.ncols() != self.binning.len() {
            return Err(PatternError::ShapeMismatch {
                data: data.shape().to_vec(),
                background: vec![self.data.nrows(), self.binning.len()],
            });
        }
        self.data = data;
        self.background = None;
        Ok(())
    }

    /// Extracts the background of every row in parallel.
    ///
    /// Progress is published to `progress` while running. Raising `abort_flag` cancels the
    /// run; nothing is stored and `Ok(false)` is returned.
    pub fn extract_background(
        &mut self,
        extractor: &dyn BackgroundExtractor,
        parameters: [f64; 3],
        abort_flag: &AtomicBool,
        progress: &RwLock<Option<f32>>,
    ) -> Result<bool> {
        let n_rows = self.data.nrows();
        log::debug!(
            "extracting {n_rows} backgrounds with {} {parameters:?}",
            extractor.name()
        );
        let binning = &self.binning;
        let data = &self.data;
        let rows = par_try_map_cancellable(
            (0..n_rows).into_par_iter(),
            n_rows,
            abort_flag,
            progress,
            |i| extractor.extract(binning, &data.row(i).to_owned(), parameters),
        )?;

        let Some(rows) = rows else {
            log::info!("background extraction aborted");
            return Ok(false);
        };

        let mut background = Array2::<f64>::zeros(self.data.raw_dim());
        for (mut target, row) in background.axis_iter_mut(Axis(0)).zip(rows.iter()) {
            if row.len() != target.len() {
                return Err(PatternError::Extraction(format!(
                    "{} returned {} background values for {} samples",
                    extractor.name(),
                    row.len(),
                    target.len()
                )));
            }
            target.assign(row);
        }
        self.background = Some(background);
        Ok(true)
    }

    /// Data minus the extracted background.
    ///
    /// # Errors
    /// - [`PatternError::MissingBackground`] if no background was extracted
    /// - [`PatternError::ShapeMismatch`] if the background does not match the data
    pub fn subtracted(&self) -> Result<Array2<f64>> {
        let background = self
            .background
            .as_ref()
            .ok_or(PatternError::MissingBackground)?;
        if background.shape() != self.data.shape() {
            return Err(PatternError::ShapeMismatch {
                data: self.data.shape().to_vec(),
                background: background.shape().to_vec(),
            });
        }
        Ok(&self.data - background)
    }

    /// Stores an externally computed background.
    pub fn set_background(&mut self, background: Option<Array2<f64>>) {
        self.background = background;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    #[derive(Clone, Debug)]
    struct RowMinimum;

    impl BackgroundExtractor for RowMinimum {
        fn new() -> Self {
            RowMinimum
        }

        fn name(&self) -> &'static str {
            "row minimum"
        }

        fn extract(
            &self,
            _x: &Array1<f64>,
            y: &Array1<f64>,
            _parameters: [f64; 3],
        ) -> Result<Array1<f64>> {
            let min = y.iter().copied().fold(f64::INFINITY, f64::min);
            Ok(Array1::from_elem(y.len(), min))
        }
    }

    #[derive(Clone, Debug)]
    struct Failing;

    impl BackgroundExtractor for Failing {
        fn new() -> Self {
            Failing
        }

        fn name(&self) -> &'static str {
            "failing"
        }

        fn extract(
            &self,
            _x: &Array1<f64>,
            _y: &Array1<f64>,
            _parameters: [f64; 3],
        ) -> Result<Array1<f64>> {
            Err(PatternError::Extraction("no".to_string()))
        }
    }

    fn stack() -> PatternStack {
        let binning = Array1::<f64>::linspace(5.0, 25.0, 8);
        let data = Array::from_shape_fn((4, 8), |(i, j)| (i * 10 + j) as f64);
        PatternStack::new(binning, Unit::Angle, data).unwrap()
    }

    #[test]
    fn test_extract_and_subtract() {
        let mut stack = stack();
        let abort_flag = AtomicBool::new(false);
        let progress = Arc::new(RwLock::new(None));
        let done = stack
            .extract_background(&RowMinimum, [0.0; 3], &abort_flag, &progress)
            .unwrap();
        assert!(done);
        assert_eq!(*progress.read().unwrap(), None);

        let subtracted = stack.subtracted().unwrap();
        for row in subtracted.outer_iter() {
            assert_eq!(row.to_vec(), (0..8).map(|j| j as f64).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_aborted_extraction_stores_nothing() {
        let mut stack = stack();
        let abort_flag = AtomicBool::new(true);
        let progress = RwLock::new(None);
        let done = stack
            .extract_background(&RowMinimum, [0.0; 3], &abort_flag, &progress)
            .unwrap();
        assert!(!done);
        assert!(stack.background().is_none());
        assert!(!abort_flag.load(Ordering::Relaxed));
    }

    #[test]
    fn test_extractor_error_is_returned() {
        let mut stack = stack();
        let result = stack.extract_background(
            &Failing,
            [0.0; 3],
            &AtomicBool::new(false),
            &RwLock::new(None),
        );
        assert!(matches!(result, Err(PatternError::Extraction(_))));
        assert!(stack.background().is_none());
    }

    #[test]
    fn test_subtracted_needs_matching_background() {
        let mut stack = stack();
        assert!(matches!(
            stack.subtracted(),
            Err(PatternError::MissingBackground)
        ));
        stack.set_background(Some(Array2::zeros((3, 8))));
        assert!(matches!(
            stack.subtracted(),
            Err(PatternError::ShapeMismatch { data, background })
                if data == vec![4, 8] && background == vec![3, 8]
        ));
    }

    #[test]
    fn test_new_data_drops_background() {
        let mut stack = stack();
        stack.set_background(Some(Array2::zeros((4, 8))));
        stack.set_data(Array2::ones((2, 8))).unwrap();
        assert!(stack.background().is_none());
        assert_eq!(stack.len(), 2);
        assert!(stack.set_data(Array2::ones((2, 3))).is_err());
    }

    #[test]
    fn test_binning_in_other_unit() {
        let stack = stack();
        let d = stack.binning_in(Unit::LatticeSpacing, 0.3344);
        let back = convert_array(&d, Unit::LatticeSpacing, Unit::Angle, 0.3344);
        for (a, b) in back.iter().zip(stack.binning().iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }
        assert!(PatternStack::new(Array1::zeros(3), Unit::Angle, Array2::zeros((2, 4))).is_err());
    }
}
