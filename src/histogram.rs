use crate::quantile::{cumulative, hist_quantile, interp};
use crate::PermsetError;
use bincode::{Decode, Encode};
use std::fs;
use std::path::Path;

/// Fixed-bin accumulator for permutation null scores.
///
/// Scores outside the bin range land in the first or last bin; the true
/// extremes are still tracked in `min`/`max`.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct NullHistogram {
    edges: Vec<f64>,
    counts: Vec<u64>,
    total: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl NullHistogram {
    /// Create `nbins` equal-width bins over `[lo, hi]`
    pub fn new(lo: f64, hi: f64, nbins: usize) -> Result<Self, PermsetError> {
        if nbins == 0 {
            return Err(PermsetError::InvalidArgument(
                "histogram needs at least one bin".to_string(),
            ));
        }
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return Err(PermsetError::InvalidArgument(format!(
                "invalid histogram range [{}, {}]",
                lo, hi
            )));
        }
        let width = (hi - lo) / nbins as f64;
        let mut edges: Vec<f64> = (0..nbins).map(|i| lo + width * i as f64).collect();
        edges.push(hi);
        Ok(Self {
            edges,
            counts: vec![0; nbins],
            total: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        })
    }

    pub fn from_scores<I>(lo: f64, hi: f64, nbins: usize, scores: I) -> Result<Self, PermsetError>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut hist = Self::new(lo, hi, nbins)?;
        for score in scores {
            hist.add(score);
        }
        Ok(hist)
    }

    fn bin_of(&self, score: f64) -> usize {
        let lo = self.edges[0];
        let hi = self.edges[self.edges.len() - 1];
        let nbins = self.counts.len();
        let pos = ((score - lo) / (hi - lo) * nbins as f64).floor();
        if pos <= 0.0 {
            0
        } else {
            (pos as usize).min(nbins - 1)
        }
    }

    /// Record one null score. NaN scores are ignored.
    pub fn add(&mut self, score: f64) {
        if score.is_nan() {
            tracing::debug!("ignoring NaN null score");
            return;
        }
        let bin = self.bin_of(score);
        self.counts[bin] += 1;
        self.total += 1;
        self.sum += score;
        self.min = self.min.min(score);
        self.max = self.max.max(score);
    }

    /// Fold another partition's histogram into this one
    pub fn merge(&mut self, other: &NullHistogram) -> Result<(), PermsetError> {
        if self.edges != other.edges {
            return Err(PermsetError::InvalidArgument(
                "cannot merge histograms with different bin edges".to_string(),
            ));
        }
        for (c, o) in self.counts.iter_mut().zip(&other.counts) {
            *c += o;
        }
        self.total += other.total;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        Ok(())
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn mean(&self) -> Option<f64> {
        (self.total > 0).then(|| self.sum / self.total as f64)
    }

    pub fn min(&self) -> Option<f64> {
        (self.total > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.total > 0).then_some(self.max)
    }

    /// Score below which `frac` of the null mass lies
    ///
    /// # Panics
    /// If `frac` is outside `[0, 1]`.
    pub fn quantile(&self, frac: f64) -> f64 {
        hist_quantile(&self.counts, &self.edges, frac, None, None)
    }

    /// Estimated fraction of null scores at or below `score`
    pub fn cdf(&self, score: f64) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        interp(score, &self.edges, &cumulative(&self.counts), Some(0.0), Some(1.0))
    }

    /// Estimated fraction of null scores at or above `score`
    pub fn sf(&self, score: f64) -> f64 {
        1.0 - self.cdf(score)
    }

    pub fn save(&self, path: &Path) -> Result<(), PermsetError> {
        let bytes = bincode::encode_to_vec(self, bincode::config::standard())?;
        fs::write(path, bytes)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PermsetError> {
        let bytes = fs::read(path)?;
        let (hist, _): (NullHistogram, usize) =
            bincode::decode_from_slice(&bytes, bincode::config::standard())?;
        Ok(hist)
    }
}
