/// Recommended error type for code that drives the runner. Errors from the core crates convert
/// into it so you can use `?` to propagate them.
pub type SpinnerResult<T> = anyhow::Result<T>;
