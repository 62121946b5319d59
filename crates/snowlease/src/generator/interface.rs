use crate::{Error, Result, Status};

/// Object-safe view of a [`Generator`] for code that only needs raw IDs.
///
/// Lets consumers hold an `Arc<dyn IdSource>` without naming the registry or
/// encoder types.
///
/// [`Generator`]: crate::Generator
pub trait IdSource: Send + Sync {
    /// Returns the next ID as its raw `u64` bit pattern.
    ///
    /// # Errors
    ///
    /// See [`Generator::next_id`].
    ///
    /// [`Generator::next_id`]: crate::Generator::next_id
    fn next_raw_id(&self) -> Result<u64>;

    fn status(&self) -> Status;

    fn worker_id(&self) -> Option<u64>;

    fn last_error(&self) -> Option<Error>;
}
