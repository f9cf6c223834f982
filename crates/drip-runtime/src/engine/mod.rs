mod executor;

pub use executor::StepExecutor;
