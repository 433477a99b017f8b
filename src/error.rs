use burn::{config::ConfigError, record::RecorderError};

/// Errors produced while preparing data, loading configs and saving artifacts.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Validation size must be in (0, 1), got {0}")]
    InvalidValSize(f64),

    #[error("Split of {total} items leaves an empty subset (train {train}, valid {valid})")]
    EmptySplit {
        total: usize,
        train: usize,
        valid: usize,
    },

    #[error("Class {class} has only {count} member(s), at least 2 are required to stratify")]
    ClassTooSmall { class: u8, count: usize },

    #[error("The {subset} subset has {size} items but there are {num_classes} classes")]
    SplitSmallerThanClasses {
        subset: &'static str,
        size: usize,
        num_classes: usize,
    },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Recorder error: {0}")]
    Recorder(#[from] RecorderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, Error>;
