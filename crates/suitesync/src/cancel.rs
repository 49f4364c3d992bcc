use derive_more::{Display, Error};

/// Distinguished outcome of a cooperatively cancelled operation.
///
/// Threads through every workflow as the terminal value of a fired
/// cancellation signal. Swallowed silently at the top level instead of
/// being reported as a failure.
#[derive(Debug, Display, Error)]
#[display(fmt = "operation cancelled")]
pub(crate) struct Cancelled;
