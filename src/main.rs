use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use lumen_image::{ChannelPolicy, Label, Normalizer};
use lumen_io::{
    BackendMetrics, DatasetAssembler, DecodeFailurePolicy, ExperimentName, ReportWriter,
    RunSummary,
};
use lumen_mlp::MlpConfig;
use lumen_model::{
    Backend, BackendConfig, Evaluation, InferenceService, InferenceSession, ModelPaths,
    Prediction, TrainingSummary,
};
use lumen_rf::{DEFAULT_TREES, MaxFeatures, OobMode, RandomForestConfig, SplitCriterion, SplitMethod};

#[derive(Parser)]
#[command(name = "lumen")]
#[command(about = "Chest X-ray triage with neural-network and random-forest classifiers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for the train/test split and both backends
    #[arg(long, default_value_t = 1, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Where the labeled images come from.
#[derive(Args, Debug, Clone)]
struct DataArgs {
    /// Directory of Normal images
    #[arg(long, requires = "covid_dir", conflicts_with = "data_root")]
    normal_dir: Option<PathBuf>,

    /// Directory of COVID images
    #[arg(long, requires = "normal_dir", conflicts_with = "data_root")]
    covid_dir: Option<PathBuf>,

    /// Root whose subdirectories are named after labels (normal/, covid/)
    #[arg(long, required_unless_present = "normal_dir")]
    data_root: Option<PathBuf>,

    /// How deep to descend into each labeled directory (1 = direct children)
    #[arg(long, default_value_t = 1)]
    max_depth_walk: usize,

    /// What to do with undecodable files: "skip" or "abort"
    #[arg(long, default_value = "skip")]
    decode_policy: String,

    /// Convert color images to grayscale instead of rejecting them
    #[arg(long, default_value_t = false)]
    convert_color: bool,
}

/// Neural-network hyperparameters.
#[derive(Args, Debug, Clone)]
struct MlpArgs {
    /// Hidden layer widths, comma-separated
    #[arg(long, value_delimiter = ',', default_values_t = MlpConfig::DEFAULT_HIDDEN_LAYERS)]
    hidden_layers: Vec<usize>,

    /// Adam learning rate
    #[arg(long, default_value_t = 1e-3)]
    learning_rate: f64,

    /// L2 penalty strength
    #[arg(long, default_value_t = 1e-4)]
    alpha: f64,

    /// Mini-batch size (clamped to the training set size)
    #[arg(long, default_value_t = 200)]
    batch_size: usize,

    /// Maximum training epochs
    #[arg(long, default_value_t = 200)]
    max_epochs: usize,

    /// Minimum loss improvement that counts as progress
    #[arg(long, default_value_t = 1e-4)]
    tolerance: f64,

    /// Epochs without progress before stopping
    #[arg(long, default_value_t = 10)]
    patience: usize,
}

/// Random-forest hyperparameters.
#[derive(Args, Debug, Clone)]
struct RfArgs {
    /// Number of trees
    #[arg(long, default_value_t = DEFAULT_TREES)]
    n_trees: usize,

    /// Maximum tree depth (unlimited if omitted)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Pixels considered per split: "sqrt", "log2", "all", a fraction, or a count
    #[arg(long, default_value = "sqrt")]
    max_features: String,

    /// Minimum samples required to split a node
    #[arg(long, default_value_t = 2)]
    min_samples_split: usize,

    /// Minimum samples required in each leaf
    #[arg(long, default_value_t = 1)]
    min_samples_leaf: usize,

    /// Split quality criterion: "gini" or "entropy"
    #[arg(long, default_value = "gini")]
    criterion: String,

    /// Split-finding method: "exact" or "extra-trees"
    #[arg(long, default_value = "exact")]
    split_method: String,

    /// Compute out-of-bag accuracy during training
    #[arg(long, default_value_t = false)]
    oob: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a dataset, fit both backends, evaluate, and save the models
    Train {
        #[command(flatten)]
        data: DataArgs,

        /// Output directory for models and the evaluation report
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long, default_value = "lumen")]
        experiment: String,

        /// Fraction of samples held out for evaluation
        #[arg(long, default_value_t = 0.2)]
        test_fraction: f64,

        #[command(flatten)]
        mlp: MlpArgs,

        #[command(flatten)]
        rf: RfArgs,
    },

    /// Classify a single image with a saved model
    Predict {
        /// Image to classify
        #[arg(long)]
        image: PathBuf,

        /// Backend: neural-network (nn, ann, mlp) or random-forest (rf)
        #[arg(long)]
        backend: String,

        /// Directory holding the saved models
        #[arg(long, default_value = ".")]
        model_dir: PathBuf,

        /// Convert color images to grayscale instead of rejecting them
        #[arg(long, default_value_t = false)]
        convert_color: bool,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct TrainOutput {
    experiment: String,
    seed: u64,
    n_samples: usize,
    n_train: usize,
    n_test: usize,
    n_skipped: usize,
    report: PathBuf,
    backends: Vec<BackendOutput>,
}

#[derive(Serialize)]
struct BackendOutput {
    #[serde(flatten)]
    training: TrainingSummary,
    accuracy: f64,
    precision: f64,
    recall: f64,
    model: PathBuf,
}

fn parse_decode_policy(s: &str) -> Result<DecodeFailurePolicy> {
    match s {
        "skip" => Ok(DecodeFailurePolicy::Skip),
        "abort" => Ok(DecodeFailurePolicy::Abort),
        other => anyhow::bail!("unknown decode policy: {other} (expected skip or abort)"),
    }
}

fn parse_criterion(s: &str) -> Result<SplitCriterion> {
    match s {
        "gini" => Ok(SplitCriterion::Gini),
        "entropy" => Ok(SplitCriterion::Entropy),
        other => anyhow::bail!("unknown criterion: {other} (expected gini or entropy)"),
    }
}

fn parse_split_method(s: &str) -> Result<SplitMethod> {
    match s {
        "exact" => Ok(SplitMethod::Exact),
        "extra-trees" => Ok(SplitMethod::ExtraTrees),
        other => anyhow::bail!("unknown split method: {other} (expected exact or extra-trees)"),
    }
}

fn normalizer(convert_color: bool) -> Normalizer {
    let policy = if convert_color {
        ChannelPolicy::ConvertToLuma
    } else {
        ChannelPolicy::Strict
    };
    Normalizer::new().with_channel_policy(policy)
}

fn build_assembler(data: &DataArgs) -> Result<DatasetAssembler> {
    let normalizer = normalizer(data.convert_color);
    let assembler = match (&data.data_root, &data.normal_dir, &data.covid_dir) {
        (Some(root), _, _) => DatasetAssembler::from_root(root, normalizer)
            .with_context(|| format!("failed to scan data root {}", root.display()))?,
        (None, Some(normal), Some(covid)) => DatasetAssembler::new(normalizer)
            .with_directory(normal, Label::Normal)
            .with_directory(covid, Label::Covid),
        _ => anyhow::bail!("pass --data-root or both --normal-dir and --covid-dir"),
    };
    Ok(assembler
        .with_max_depth(data.max_depth_walk)
        .with_sort_by_file_name(true)
        .with_failure_policy(parse_decode_policy(&data.decode_policy)?))
}

fn build_configs(mlp: &MlpArgs, rf: &RfArgs, seed: u64) -> Result<[BackendConfig; 2]> {
    let mlp_config = MlpConfig::new(mlp.hidden_layers.clone())?
        .with_learning_rate(mlp.learning_rate)
        .with_alpha(mlp.alpha)
        .with_batch_size(mlp.batch_size)
        .with_max_epochs(mlp.max_epochs)
        .with_tolerance(mlp.tolerance)
        .with_patience(mlp.patience)
        .with_seed(seed);

    let rf_config = RandomForestConfig::new(rf.n_trees)?
        .with_max_depth(rf.max_depth)
        .with_max_features(rf.max_features.parse::<MaxFeatures>()?)
        .with_min_samples_split(rf.min_samples_split)
        .with_min_samples_leaf(rf.min_samples_leaf)
        .with_criterion(parse_criterion(&rf.criterion)?)
        .with_split_method(parse_split_method(&rf.split_method)?)
        .with_oob_mode(OobMode::from(rf.oob))
        .with_seed(seed);

    Ok([
        BackendConfig::NeuralNetwork(mlp_config),
        BackendConfig::RandomForest(rf_config),
    ])
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Train {
            data,
            output_dir,
            experiment,
            test_fraction,
            mlp,
            rf,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;
            let configs = build_configs(&mlp, &rf, cli.seed)?;

            // 1. Assemble labeled images
            let mut assembly = build_assembler(&data)?
                .assemble()
                .context("failed to assemble dataset")?;
            let skipped = std::mem::take(&mut assembly.skipped);
            if !skipped.is_empty() {
                warn!(n_skipped = skipped.len(), "some files were skipped");
            }
            let dataset = assembly
                .into_dataset()
                .context("no training data: every file was skipped or the directories are empty")?;
            let n_samples = dataset.len();
            let label_counts = dataset.label_counts();
            for (label, count) in &label_counts {
                info!(%label, count, "label count");
            }

            // 2. Split
            let split = dataset
                .train_test_split(test_fraction, cli.seed)
                .context("failed to split dataset")?;
            info!(n_train = split.train.len(), n_test = split.test.len(), "dataset split");

            // 3. Fit, evaluate, and save each backend
            let writer = ReportWriter::new(&output_dir, experiment_name)?;
            let paths = ModelPaths::in_dir(writer.output_dir());
            let mut results = Vec::with_capacity(configs.len());
            for config in &configs {
                let backend = config.backend();
                let (model, training) = config
                    .fit_with_summary(&split.train)
                    .with_context(|| format!("{backend} training failed"))?;
                let evaluation = Evaluation::compute(&model, &split.test)
                    .with_context(|| format!("{backend} evaluation failed"))?;
                println!("{evaluation}");

                let model_path = paths.get(backend).to_path_buf();
                model
                    .save(&model_path)
                    .with_context(|| format!("failed to save {backend} model"))?;
                results.push((training, evaluation, model_path));
            }

            // 4. Write evaluation JSON
            let class_tuples: Vec<Vec<(f64, f64, f64, usize)>> = results
                .iter()
                .map(|(_, evaluation, _)| evaluation.class_metric_tuples())
                .collect();
            let metrics: Vec<BackendMetrics<'_>> = results
                .iter()
                .zip(&class_tuples)
                .map(|((_, evaluation, model_path), tuples)| BackendMetrics {
                    backend: evaluation.backend().name(),
                    accuracy: evaluation.accuracy(),
                    precision: evaluation.precision(),
                    recall: evaluation.recall(),
                    f1: evaluation.f1(),
                    confusion_matrix: evaluation.confusion().as_rows(),
                    class_metrics: tuples,
                    model_path: Some(model_path.as_path()),
                })
                .collect();
            let run = RunSummary {
                seed: cli.seed,
                test_fraction,
                n_train: split.train.len(),
                n_test: split.test.len(),
                label_counts: &label_counts,
                skipped: &skipped,
            };
            let report = writer.write_evaluation(&run, &metrics)?;

            // 5. Print summary
            let output = TrainOutput {
                experiment,
                seed: cli.seed,
                n_samples,
                n_train: split.train.len(),
                n_test: split.test.len(),
                n_skipped: skipped.len(),
                report,
                backends: results
                    .into_iter()
                    .map(|(training, evaluation, model)| BackendOutput {
                        training,
                        accuracy: evaluation.accuracy(),
                        precision: evaluation.precision(),
                        recall: evaluation.recall(),
                        model,
                    })
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Predict {
            image,
            backend,
            model_dir,
            convert_color,
        } => {
            let backend: Backend = backend.parse()?;

            // 1. Load models
            let service = InferenceService::start(&ModelPaths::in_dir(&model_dir));
            let mut session = InferenceSession::new(service, normalizer(convert_color));

            // 2. Normalize the image
            session
                .load_image(&image)
                .with_context(|| format!("failed to load {}", image.display()))?;

            // 3. Decide
            let prediction: Prediction = session.classify(backend)?;
            info!(%prediction, "image classified");
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
    }

    Ok(())
}
