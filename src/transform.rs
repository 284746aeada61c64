//! Lookup transforms over a built [`TerminologyEncoder`].
//!
//! All state is computed when the encoder is built, so transforming is a row
//! gather. [`Transformer`] gives the encoder the usual fit/transform shape for
//! use in pipelines; `fit` does nothing.

use crate::encoder::TerminologyEncoder;
use crate::error::{EncoderError, Result};
use crate::matrix::hstack;
use ndarray::{ArrayViewD, Ix2};
use sprs::CsMat;

/// Fit/transform contract for pipeline stages.
pub trait Transformer<X> {
    type Output;

    /// Learn from `x`. Stateless transformers return `self` untouched.
    fn fit(&mut self, x: X) -> &mut Self;

    fn transform(&self, x: X) -> Result<Self::Output>;
}

impl TerminologyEncoder {
    /// Encode one column of codes.
    ///
    /// Row `k` of the result is the encoding of the `k`-th code; order and
    /// repeats are preserved. Fails on the first code outside the scope.
    ///
    /// # Example
    /// ```rust,ignore
    /// let rows = encoder.transform_column(["73211009", "44054006"])?;
    /// assert_eq!(rows.rows(), 2);
    /// ```
    pub fn transform_column<I, S>(&self, codes: I) -> Result<CsMat<f64>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rows = codes
            .into_iter()
            .map(|code| self.index.position(code.as_ref()))
            .collect::<Result<Vec<usize>>>()?;
        Ok(self.matrix.select_rows(&rows))
    }

    /// Encode a two-dimensional array of codes.
    ///
    /// Each input column is encoded with [`transform_column`](Self::transform_column)
    /// and the blocks are joined side by side in column order, giving
    /// `rows × (columns · features)`.
    pub fn transform<S: AsRef<str>>(&self, x: ArrayViewD<'_, S>) -> Result<CsMat<f64>> {
        if x.ndim() != 2 {
            return Err(EncoderError::Shape(format!(
                "expected a two-dimensional array, got {} dimension(s)",
                x.ndim()
            )));
        }
        let x = x
            .into_dimensionality::<Ix2>()
            .map_err(|e| EncoderError::Shape(e.to_string()))?;
        if x.ncols() == 0 {
            return Err(EncoderError::Shape(
                "expected at least one column of codes".to_string(),
            ));
        }

        let blocks = x
            .columns()
            .into_iter()
            .map(|column| self.transform_column(column.iter()))
            .collect::<Result<Vec<_>>>()?;
        hstack(&blocks)
    }

    /// No-op; the encoder is complete once built.
    pub fn fit<X>(&mut self, _x: X) -> &mut Self {
        self
    }
}

impl<'a, S: AsRef<str>> Transformer<ArrayViewD<'a, S>> for TerminologyEncoder {
    type Output = CsMat<f64>;

    fn fit(&mut self, x: ArrayViewD<'a, S>) -> &mut Self {
        TerminologyEncoder::fit(self, x)
    }

    fn transform(&self, x: ArrayViewD<'a, S>) -> Result<CsMat<f64>> {
        TerminologyEncoder::transform(self, x)
    }
}
