pub mod accumulate;
pub mod constants;
pub mod eigen_basis;
pub mod evaluation;
pub mod feature_space;
pub mod fit_params;
pub mod least_squares;
pub mod matrix_builder;
pub mod measurements;
mod progress_bar;
pub mod range_estimator;
pub mod robust;
pub mod space_fit;
pub mod stats;
pub mod trackpca_errors;
