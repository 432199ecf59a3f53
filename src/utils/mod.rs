pub mod threads;
pub mod token_budget;
pub mod token_estimator;
