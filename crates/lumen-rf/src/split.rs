//! Split criteria and best-split search over 8-bit features.

use rand::Rng;
use rand::seq::index;

use crate::node::Pixel;

/// Number of distinct values an 8-bit feature can take.
const N_LEVELS: usize = 256;

/// Criterion for measuring the quality of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SplitCriterion {
    /// Gini impurity: 1 - Σ(p_i²)
    Gini,
    /// Information entropy: -Σ(p_i · ln(p_i))
    Entropy,
}

impl SplitCriterion {
    /// Compute the impurity of a node from its class counts.
    ///
    /// Returns zero when `n_samples` is zero.
    #[must_use]
    pub fn impurity(&self, class_counts: &[usize], n_samples: usize) -> f64 {
        if n_samples == 0 {
            return 0.0;
        }
        let n = n_samples as f64;
        let value = match self {
            SplitCriterion::Gini => {
                let sum_sq: f64 = class_counts
                    .iter()
                    .map(|&c| {
                        let p = c as f64 / n;
                        p * p
                    })
                    .sum();
                1.0 - sum_sq
            }
            SplitCriterion::Entropy => -class_counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
        };
        value
    }
}

/// How candidate thresholds are chosen for a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SplitMethod {
    /// Evaluate every boundary between observed intensities.
    ///
    /// Uses a 256-level count table per feature, so the search is
    /// `O(n + 256)` per feature and exact for 8-bit data.
    Exact,
    /// Extremely randomized trees: one uniform random threshold per feature.
    ExtraTrees,
}

/// Result of finding the best split for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    pub(crate) pixel: Pixel,
    pub(crate) threshold: u8,
    pub(crate) left_indices: Vec<usize>,
    pub(crate) right_indices: Vec<usize>,
}

/// Shared read-only inputs to a split search.
pub(crate) struct SplitContext<'a, R> {
    pub(crate) features: &'a [R],
    pub(crate) labels: &'a [usize],
    pub(crate) n_classes: usize,
    pub(crate) criterion: SplitCriterion,
    pub(crate) method: SplitMethod,
    pub(crate) max_features: usize,
    pub(crate) min_samples_leaf: usize,
}

impl<R: AsRef<[u8]>> SplitContext<'_, R> {
    /// Find the best split among `max_features` randomly chosen features.
    ///
    /// `features` is row-major; `sample_indices` select (possibly repeated)
    /// rows. Returns `None` when no feature yields a split that leaves at
    /// least `min_samples_leaf` samples on each side.
    pub(crate) fn find_best_split(
        &self,
        sample_indices: &[usize],
        rng: &mut impl Rng,
    ) -> Option<SplitResult> {
        let n_samples = sample_indices.len();
        let n_features = self.features.first()?.as_ref().len();
        if n_samples < 2 || n_features == 0 {
            return None;
        }

        let mut parent_counts = vec![0usize; self.n_classes];
        for &si in sample_indices {
            parent_counts[self.labels[si]] += 1;
        }
        let parent_impurity = self.criterion.impurity(&parent_counts, n_samples);

        let take = self.max_features.min(n_features);
        let selected = index::sample(rng, n_features, take);

        let mut best_decrease = f64::NEG_INFINITY;
        let mut best: Option<(usize, u8)> = None;
        let mut table = vec![0usize; N_LEVELS * self.n_classes];

        for feat_idx in selected.iter() {
            let candidate = match self.method {
                SplitMethod::Exact => self.scan_exact(
                    feat_idx,
                    sample_indices,
                    &parent_counts,
                    parent_impurity,
                    &mut table,
                ),
                SplitMethod::ExtraTrees => self.draw_random(
                    feat_idx,
                    sample_indices,
                    &parent_counts,
                    parent_impurity,
                    rng,
                ),
            };
            if let Some((threshold, decrease)) = candidate
                && decrease > best_decrease
            {
                best_decrease = decrease;
                best = Some((feat_idx, threshold));
            }
        }

        let (feat_idx, threshold) = best?;
        let (left_indices, right_indices) = sample_indices
            .iter()
            .partition(|&&si| self.features[si].as_ref()[feat_idx] <= threshold);

        Some(SplitResult {
            pixel: Pixel::new(feat_idx),
            threshold,
            left_indices,
            right_indices,
        })
    }

    /// Weighted impurity decrease (MDI, as in scikit-learn) of a partition.
    fn decrease(
        &self,
        parent_impurity: f64,
        left_counts: &[usize],
        n_left: usize,
        parent_counts: &[usize],
        n_samples: usize,
    ) -> f64 {
        let right_counts: Vec<usize> = parent_counts
            .iter()
            .zip(left_counts)
            .map(|(&p, &l)| p - l)
            .collect();
        let n_right = n_samples - n_left;
        let left = self.criterion.impurity(left_counts, n_left);
        let right = self.criterion.impurity(&right_counts, n_right);
        (n_samples as f64) * parent_impurity
            - (n_left as f64) * left
            - (n_right as f64) * right
    }

    /// Scan all boundaries between observed intensities of one feature.
    ///
    /// Returns the best `(threshold, decrease)`; the threshold is the floor
    /// of the midpoint between adjacent observed values.
    fn scan_exact(
        &self,
        feat_idx: usize,
        sample_indices: &[usize],
        parent_counts: &[usize],
        parent_impurity: f64,
        table: &mut [usize],
    ) -> Option<(u8, f64)> {
        let k = self.n_classes;
        let n_samples = sample_indices.len();
        table.fill(0);
        for &si in sample_indices {
            let v = self.features[si].as_ref()[feat_idx] as usize;
            table[v * k + self.labels[si]] += 1;
        }

        let mut left_counts = vec![0usize; k];
        let mut n_left = 0usize;
        let mut prev_value: Option<usize> = None;
        let mut best: Option<(u8, f64)> = None;

        for v in 0..N_LEVELS {
            let row = &table[v * k..(v + 1) * k];
            let row_total: usize = row.iter().sum();
            if row_total == 0 {
                continue;
            }
            if let Some(prev) = prev_value {
                let n_right = n_samples - n_left;
                if n_left >= self.min_samples_leaf && n_right >= self.min_samples_leaf {
                    let decrease =
                        self.decrease(parent_impurity, &left_counts, n_left, parent_counts, n_samples);
                    if best.is_none_or(|(_, d)| decrease > d) {
                        best = Some((((prev + v) / 2) as u8, decrease));
                    }
                }
            }
            for (lc, &c) in left_counts.iter_mut().zip(row) {
                *lc += c;
            }
            n_left += row_total;
            prev_value = Some(v);
        }
        best
    }

    /// Evaluate one random threshold drawn uniformly in `[min, max)`.
    fn draw_random(
        &self,
        feat_idx: usize,
        sample_indices: &[usize],
        parent_counts: &[usize],
        parent_impurity: f64,
        rng: &mut impl Rng,
    ) -> Option<(u8, f64)> {
        let (lo, hi) = sample_indices
            .iter()
            .map(|&si| self.features[si].as_ref()[feat_idx])
            .fold((u8::MAX, u8::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if lo >= hi {
            return None;
        }
        let threshold = rng.gen_range(lo..hi);

        let mut left_counts = vec![0usize; self.n_classes];
        let mut n_left = 0usize;
        for &si in sample_indices {
            if self.features[si].as_ref()[feat_idx] <= threshold {
                left_counts[self.labels[si]] += 1;
                n_left += 1;
            }
        }
        let n_samples = sample_indices.len();
        if n_left < self.min_samples_leaf || n_samples - n_left < self.min_samples_leaf {
            return None;
        }
        let decrease =
            self.decrease(parent_impurity, &left_counts, n_left, parent_counts, n_samples);
        Some((threshold, decrease))
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn context<'a>(
        features: &'a [Vec<u8>],
        labels: &'a [usize],
        method: SplitMethod,
        min_samples_leaf: usize,
    ) -> SplitContext<'a, Vec<u8>> {
        SplitContext {
            features,
            labels,
            n_classes: 2,
            criterion: SplitCriterion::Gini,
            method,
            max_features: features[0].len(),
            min_samples_leaf,
        }
    }

    #[test]
    fn gini_pure_and_balanced() {
        assert!(SplitCriterion::Gini.impurity(&[10, 0], 10).abs() < f64::EPSILON);
        assert!((SplitCriterion::Gini.impurity(&[5, 5], 10) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn entropy_binary_balanced() {
        let imp = SplitCriterion::Entropy.impurity(&[5, 5], 10);
        assert!((imp - 2.0_f64.ln()).abs() < 1e-10);
    }

    #[test]
    fn exact_split_separates_dark_from_bright() {
        let features = vec![vec![10], vec![20], vec![30], vec![200], vec![210], vec![220]];
        let labels = vec![0, 0, 0, 1, 1, 1];
        let ctx = context(&features, &labels, SplitMethod::Exact, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let indices: Vec<usize> = (0..6).collect();

        let split = ctx.find_best_split(&indices, &mut rng).expect("split exists");
        assert_eq!(split.pixel.offset(), 0);
        assert_eq!(split.threshold, 115);
        assert_eq!(split.left_indices, vec![0, 1, 2]);
        assert_eq!(split.right_indices, vec![3, 4, 5]);
    }

    #[test]
    fn repeated_indices_are_counted() {
        // Bootstrap samples repeat rows; the split must still partition them.
        let features = vec![vec![5], vec![250]];
        let labels = vec![0, 1];
        let ctx = context(&features, &labels, SplitMethod::Exact, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let split = ctx.find_best_split(&[0, 0, 1, 1, 1], &mut rng).unwrap();
        assert_eq!(split.left_indices.len(), 2);
        assert_eq!(split.right_indices.len(), 3);
    }

    #[test]
    fn constant_feature_has_no_split() {
        let features = vec![vec![7], vec![7], vec![7], vec![7]];
        let labels = vec![0, 1, 0, 1];
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for method in [SplitMethod::Exact, SplitMethod::ExtraTrees] {
            let ctx = context(&features, &labels, method, 1);
            assert!(ctx.find_best_split(&[0, 1, 2, 3], &mut rng).is_none());
        }
    }

    #[test]
    fn min_samples_leaf_enforced() {
        let features = vec![vec![0], vec![255]];
        let labels = vec![0, 1];
        let ctx = context(&features, &labels, SplitMethod::Exact, 2);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert!(ctx.find_best_split(&[0, 1], &mut rng).is_none());
    }

    #[test]
    fn extra_trees_threshold_within_observed_range() {
        let features = vec![vec![40], vec![60], vec![180], vec![190]];
        let labels = vec![0, 0, 1, 1];
        let ctx = context(&features, &labels, SplitMethod::ExtraTrees, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(9);

        let split = ctx.find_best_split(&[0, 1, 2, 3], &mut rng).unwrap();
        assert!((40..190).contains(&split.threshold));
        assert!(!split.left_indices.is_empty());
        assert!(!split.right_indices.is_empty());
    }
}
