//! Training stage: fit OLS on the prepared split, score it on the held-out
//! rows and register the result as a new model version.

use admission_core::{
    evaluate, AppConfig, DatasetError, Evaluation, LinearModel, MetricsError, ModelRegistry, ModelVersion,
    RegressionError, RegistryError, Split,
};
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("reading prepared splits: {0}")]
    Dataset(#[from] DatasetError),
    #[error("{file} must have exactly one target column, found {found}")]
    TargetShape { file: &'static str, found: usize },
    #[error("train and test feature columns differ: {train:?} vs {test:?}")]
    FeatureMismatch { train: Vec<String>, test: Vec<String> },
    #[error("fitting model: {0}")]
    Regression(#[from] RegressionError),
    #[error("evaluating model: {0}")]
    Metrics(#[from] MetricsError),
    #[error("saving model: {0}")]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub evaluation: Evaluation,
    pub version: ModelVersion,
    pub train_rows: usize,
    pub test_rows: usize,
}

fn validate(split: &Split) -> Result<(), TrainError> {
    if split.y_train.width() != 1 {
        return Err(TrainError::TargetShape { file: "y_train.csv", found: split.y_train.width() });
    }
    if split.y_test.width() != 1 {
        return Err(TrainError::TargetShape { file: "y_test.csv", found: split.y_test.width() });
    }
    if split.x_train.headers() != split.x_test.headers() {
        return Err(TrainError::FeatureMismatch { train: split.x_train.headers().to_vec(), test: split.x_test.headers().to_vec() });
    }
    Ok(())
}

/// Fits and scores a model without persisting it.
pub fn fit_and_evaluate(split: &Split) -> Result<(LinearModel, Evaluation), TrainError> {
    validate(split)?;
    let x_train = split.x_train.to_array();
    let y_train = split.y_train.first_column();
    let model = LinearModel::fit(x_train.view(), y_train.view(), split.x_train.headers().to_vec())?;

    let y_pred = model.predict(split.x_test.to_array().view())?;
    let evaluation = evaluate(split.y_test.first_column().view(), y_pred.view())?;
    Ok((model, evaluation))
}

/// Runs the whole stage. Scores are reported, never used to gate the save.
#[instrument(skip_all, fields(model = %cfg.model.name))]
pub fn train(cfg: &AppConfig) -> Result<TrainingReport, TrainError> {
    let split = Split::read_from(&cfg.data.processed_dir)?;
    let (model, evaluation) = fit_and_evaluate(&split)?;
    info!(mse = evaluation.mse, r2 = evaluation.r2, "model performance");

    let registry = ModelRegistry::new(&cfg.model.store_dir);
    let version = registry.register(&cfg.model.name, &model, Some(evaluation))?;
    info!(tag = %version.tag, "model saved to registry");

    Ok(TrainingReport { evaluation, version, train_rows: split.x_train.len(), test_rows: split.x_test.len() })
}
