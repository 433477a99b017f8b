#![recursion_limit = "256"]

//! Two-layer MNIST digit classifier trained with burn's learner.
//!
//! The training set is split into stratified training and validation subsets,
//! the official test set is kept for the final evaluation.

pub mod cli;
pub mod data;
pub mod evaluation;
pub mod model;
pub mod split;
pub mod training;

mod error;

pub use error::{Error, Result};
