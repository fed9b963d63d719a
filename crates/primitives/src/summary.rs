/// A trait for objects that can be summarized into a string for logging purposes.
///
/// Sometimes the Debug impl is too verbose, and the Display impl does something
/// different than what we want. This trait allows us to have our custom verbosity.
pub trait Summary {
    /// Returns a summary of the object.
    fn summary(&self) -> String;
}
