//! Progress reporting for slow pipeline steps.
//!
//! [`ProgressCallback`] keeps the library crates free of any rendering
//! backend; the CLI supplies `indicatif` spinners.

/// Receives progress updates from a pipeline step.
pub trait ProgressCallback: Send + Sync {
    /// Update the message displayed alongside the indicator.
    fn set_message(&self, msg: String);

    /// Mark the step complete with a final message.
    fn finish(&self, msg: String);
}
