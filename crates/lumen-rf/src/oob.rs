//! Out-of-bag accuracy: each training row is scored only by the trees whose
//! bootstrap never drew it.

use crate::error::RfError;
use crate::tree::DecisionTree;

/// Accuracy of the forest on its own out-of-bag rows.
#[derive(Debug, Clone)]
pub struct OobScore {
    /// Share of scored rows whose soft vote matched their label.
    pub accuracy: f64,
    /// `confusion_matrix[truth][predicted]`, out-of-bag rows only.
    pub confusion_matrix: Vec<Vec<usize>>,
    /// Rows left out by at least one tree; the rest are not scored.
    pub n_oob_samples: usize,
}

/// Score every row with the averaged leaf distributions of the trees that
/// left it out, matching how [`RandomForest::predict_proba`] combines trees.
///
/// [`RandomForest::predict_proba`]: crate::RandomForest::predict_proba
pub(crate) fn compute_oob<R: AsRef<[u8]>>(
    trees: &[DecisionTree],
    features: &[R],
    labels: &[usize],
    n_classes: usize,
    oob_indices_per_tree: &[Vec<usize>],
) -> Result<OobScore, RfError> {
    let mut sums: Vec<Option<Vec<f64>>> = vec![None; features.len()];
    for (tree, left_out) in trees.iter().zip(oob_indices_per_tree) {
        for &row in left_out {
            let leaf = tree.leaf_distribution(features[row].as_ref())?;
            let acc = sums[row].get_or_insert_with(|| vec![0.0; n_classes]);
            acc.iter_mut().zip(leaf).for_each(|(a, p)| *a += p);
        }
    }

    let mut confusion = vec![vec![0usize; n_classes]; n_classes];
    let mut n_oob_samples = 0usize;
    let mut correct = 0usize;
    for (row, sum) in sums.iter().enumerate() {
        let Some(sum) = sum else { continue };
        let predicted = sum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
            .map_or(0, |(class, _)| class);
        confusion[labels[row]][predicted] += 1;
        correct += usize::from(predicted == labels[row]);
        n_oob_samples += 1;
    }

    if n_oob_samples == 0 {
        return Err(RfError::OobEvaluationFailed {
            reason: format!("all {} rows were drawn by every tree", features.len()),
        });
    }

    Ok(OobScore {
        accuracy: correct as f64 / n_oob_samples as f64,
        confusion_matrix: confusion,
        n_oob_samples,
    })
}
