//! JSON report writer for evaluation outputs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use lumen_image::Label;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::assembler::SkippedFile;
use crate::domain::ExperimentName;
use crate::IoError;

/// Per-backend metrics handed to [`ReportWriter::write_evaluation`].
///
/// Plain data so the writer has no dependency on the classifier crates.
#[derive(Debug, Clone)]
pub struct BackendMetrics<'a> {
    /// Backend name, e.g. `"neural-network"`.
    pub backend: &'a str,
    /// Fraction of test samples classified correctly.
    pub accuracy: f64,
    /// Support-weighted precision.
    pub precision: f64,
    /// Support-weighted recall.
    pub recall: f64,
    /// Support-weighted F1.
    pub f1: f64,
    /// `confusion_matrix[true][predicted]`, indexed by class index.
    pub confusion_matrix: &'a [Vec<usize>],
    /// `(precision, recall, f1, support)` per class index.
    pub class_metrics: &'a [(f64, f64, f64, usize)],
    /// Where the fitted model was saved, if it was.
    pub model_path: Option<&'a Path>,
}

/// Run-level context written alongside the metrics.
#[derive(Debug, Clone)]
pub struct RunSummary<'a> {
    /// Seed used for the split and both backends.
    pub seed: u64,
    /// Held-out fraction.
    pub test_fraction: f64,
    /// Training set size.
    pub n_train: usize,
    /// Test set size.
    pub n_test: usize,
    /// Per-label counts over the whole assembled dataset.
    pub label_counts: &'a [(Label, usize)],
    /// Files left out during assembly.
    pub skipped: &'a [SkippedFile],
}

/// Writes evaluation reports to JSON files.
///
/// Creates the output directory on construction if it does not exist.
/// Reports are named `{experiment}_evaluation.json`.
pub struct ReportWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ReportWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    /// The directory reports are written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write an evaluation report to `{experiment}_evaluation.json` and
    /// return its path.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::Serialize`] | a metric cannot be encoded as JSON |
    /// | [`IoError::WriteFile`] | the file cannot be written |
    #[instrument(skip_all, fields(n_backends = backends.len()))]
    pub fn write_evaluation(
        &self,
        run: &RunSummary<'_>,
        backends: &[BackendMetrics<'_>],
    ) -> Result<PathBuf, IoError> {
        let path = self
            .output_dir
            .join(format!("{}_evaluation.json", self.experiment.as_str()));

        let label_counts: BTreeMap<&str, usize> = run
            .label_counts
            .iter()
            .map(|(label, count)| (label.name(), *count))
            .collect();

        let skipped: Vec<SkippedEntry> = run
            .skipped
            .iter()
            .map(|s| SkippedEntry {
                path: s.path.display().to_string(),
                label: s.label,
                reason: &s.reason,
            })
            .collect();

        let backends: Vec<BackendEntry> = backends.iter().map(BackendEntry::from_metrics).collect();

        let artifact = EvaluationArtifact {
            experiment: self.experiment.as_str(),
            seed: run.seed,
            test_fraction: run.test_fraction,
            n_train: run.n_train,
            n_test: run.n_test,
            label_counts,
            skipped,
            backends,
        };

        let json = serde_json::to_string_pretty(&artifact).map_err(|e| IoError::Serialize {
            path: path.clone(),
            source: e,
        })?;
        fs::write(&path, &json).map_err(|e| IoError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        info!(path = %path.display(), "evaluation report written");
        Ok(path)
    }
}

// --- Shadow structs for JSON serialization ---

#[derive(Serialize)]
struct EvaluationArtifact<'a> {
    experiment: &'a str,
    seed: u64,
    test_fraction: f64,
    n_train: usize,
    n_test: usize,
    label_counts: BTreeMap<&'a str, usize>,
    skipped: Vec<SkippedEntry<'a>>,
    backends: Vec<BackendEntry<'a>>,
}

#[derive(Serialize)]
struct SkippedEntry<'a> {
    path: String,
    label: Label,
    reason: &'a str,
}

#[derive(Serialize)]
struct BackendEntry<'a> {
    backend: &'a str,
    accuracy: f64,
    precision: f64,
    recall: f64,
    f1: f64,
    confusion_matrix: &'a [Vec<usize>],
    class_metrics: Vec<ClassEntry>,
    model_path: Option<String>,
}

impl<'a> BackendEntry<'a> {
    fn from_metrics(m: &BackendMetrics<'a>) -> Self {
        let class_metrics = m
            .class_metrics
            .iter()
            .enumerate()
            .map(|(i, &(precision, recall, f1, support))| ClassEntry {
                class: i,
                label: Label::from_index(i).map(Label::name),
                precision,
                recall,
                f1,
                support,
            })
            .collect();
        Self {
            backend: m.backend,
            accuracy: m.accuracy,
            precision: m.precision,
            recall: m.recall,
            f1: m.f1,
            confusion_matrix: m.confusion_matrix,
            class_metrics,
            model_path: m.model_path.map(|p| p.display().to_string()),
        }
    }
}

#[derive(Serialize)]
struct ClassEntry {
    class: usize,
    label: Option<&'static str>,
    precision: f64,
    recall: f64,
    f1: f64,
    support: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn metrics<'a>(cm: &'a [Vec<usize>], classes: &'a [(f64, f64, f64, usize)]) -> BackendMetrics<'a> {
        BackendMetrics {
            backend: "random-forest",
            accuracy: 0.75,
            precision: 0.8,
            recall: 0.75,
            f1: 0.74,
            confusion_matrix: cm,
            class_metrics: classes,
            model_path: None,
        }
    }

    #[test]
    fn write_evaluation_json_structure() {
        let dir = TempDir::new().unwrap();
        let experiment = ExperimentName::new("xray_run".into()).unwrap();
        let writer = ReportWriter::new(dir.path(), experiment).unwrap();

        let cm = vec![vec![2, 0], vec![1, 1]];
        let classes = vec![(0.67, 1.0, 0.8, 2), (1.0, 0.5, 0.67, 2)];
        let skipped = vec![SkippedFile {
            path: PathBuf::from("covid/broken.png"),
            label: Label::Covid,
            reason: "cannot decode image".into(),
        }];
        let counts = [(Label::Normal, 10), (Label::Covid, 9)];
        let run = RunSummary {
            seed: 1,
            test_fraction: 0.2,
            n_train: 15,
            n_test: 4,
            label_counts: &counts,
            skipped: &skipped,
        };

        let path = writer.write_evaluation(&run, &[metrics(&cm, &classes)]).unwrap();
        assert_eq!(path, dir.path().join("xray_run_evaluation.json"));

        let content: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(content["experiment"], "xray_run");
        assert_eq!(content["seed"], 1);
        assert_eq!(content["n_test"], 4);
        assert_eq!(content["label_counts"]["Normal"], 10);
        assert_eq!(content["label_counts"]["COVID"], 9);
        assert_eq!(content["skipped"][0]["label"], "covid");

        let backend = &content["backends"][0];
        assert_eq!(backend["backend"], "random-forest");
        assert_eq!(backend["confusion_matrix"][1][0], 1);
        assert_eq!(backend["class_metrics"][1]["label"], "COVID");
        assert_eq!(backend["class_metrics"][0]["support"], 2);
        assert!(backend["model_path"].is_null());
    }

    #[test]
    fn creates_nested_output_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested").join("deep");
        let experiment = ExperimentName::new("nested_test".into()).unwrap();
        let writer = ReportWriter::new(&nested, experiment).unwrap();
        let run = RunSummary {
            seed: 1,
            test_fraction: 0.2,
            n_train: 4,
            n_test: 1,
            label_counts: &[],
            skipped: &[],
        };
        writer.write_evaluation(&run, &[]).unwrap();
        assert!(nested.join("nested_test_evaluation.json").exists());
    }
}
