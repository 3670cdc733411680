use tokio::runtime::{Handle, RuntimeFlavor};

/// Runs synchronous I/O called from a trait method on the polling task.
///
/// On a multi-thread runtime the worker hands its other tasks off first; on a
/// current-thread runtime, or outside one, `work` runs inline.
pub(crate) fn run_blocking<T>(work: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}
