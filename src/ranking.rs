//! # Candidate ranking
//!
//! When several assignments of reconstructed objects to a hypothesis are possible, each
//! assignment is fitted separately and the results are ranked by fit statistic.
//! [`CandidateRanking`] collects `(combination, FitResult)` pairs produced by an external
//! enumeration, drops aborted fits, and hands back the remaining ones sorted by ascending
//! `chi2`. Failed fits carry `chi2 = +∞` and therefore rank last.
//!
//! ```rust
//! use kinfit::kin_fitter::FitResult;
//! use kinfit::ranking::CandidateRanking;
//!
//! let mut ranking = CandidateRanking::new();
//! ranking.push(vec![0, 1, 2, 3], FitResult::aborted("degenerate jet", 4));
//! assert_eq!(ranking.n_aborted(), 1);
//! assert!(ranking.into_ranked(None).is_empty());
//! ```

use itertools::Itertools;
use log::debug;

use crate::kin_fitter::FitResult;

/// A fitted combination and its position in the ranking (0 is the best).
#[derive(Debug, Clone, PartialEq)]
pub struct RankedFit<C> {
    pub rank: usize,
    pub combination: C,
    pub result: FitResult,
}

/// Accumulator of fitted candidate combinations.
#[derive(Debug, Clone)]
pub struct CandidateRanking<C> {
    fits: Vec<(C, FitResult)>,
    n_aborted: usize,
}

impl<C> Default for CandidateRanking<C> {
    fn default() -> Self {
        CandidateRanking {
            fits: Vec::new(),
            n_aborted: 0,
        }
    }
}

impl<C> CandidateRanking<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result of one combination. Aborted results are counted and discarded.
    pub fn push(&mut self, combination: C, result: FitResult) {
        if result.status.is_aborted() {
            self.n_aborted += 1;
            return;
        }
        self.fits.push((combination, result));
    }

    /// Number of kept (non-aborted) results.
    pub fn len(&self) -> usize {
        self.fits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fits.is_empty()
    }

    pub fn n_aborted(&self) -> usize {
        self.n_aborted
    }

    pub fn n_converged(&self) -> usize {
        self.fits.iter().filter(|(_, r)| r.is_converged()).count()
    }

    /// Lowest-`chi2` result recorded so far.
    pub fn best(&self) -> Option<(&C, &FitResult)> {
        self.fits
            .iter()
            .min_by(|a, b| a.1.chi2.total_cmp(&b.1.chi2))
            .map(|(c, r)| (c, r))
    }

    /// Consume the accumulator and return the results sorted by ascending `chi2`.
    ///
    /// Arguments
    /// -----------------
    /// * `max_n_comb`: keep at most this many entries; `None` keeps all of them.
    ///
    /// Return
    /// ----------
    /// * Ranked fits. Ties keep their insertion order.
    pub fn into_ranked(self, max_n_comb: Option<usize>) -> Vec<RankedFit<C>> {
        debug!(
            "ranking {} fitted combination(s), {} aborted",
            self.fits.len(),
            self.n_aborted
        );
        let keep = max_n_comb.unwrap_or(usize::MAX);
        self.fits
            .into_iter()
            .sorted_by(|a, b| a.1.chi2.total_cmp(&b.1.chi2))
            .take(keep)
            .enumerate()
            .map(|(rank, (combination, result))| RankedFit {
                rank,
                combination,
                result,
            })
            .collect()
    }
}
