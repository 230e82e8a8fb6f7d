//! Failure and cancellation scenarios for the batch engine.

pub mod pool_failures;
