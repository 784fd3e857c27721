//! The runtime behind the blocking API.

use std::{future::Future, sync::LazyLock};

use tokio::runtime::{Builder, Runtime};

use crate::error::{Error, Result};

static TOKIO_RUNTIME: LazyLock<std::result::Result<Runtime, String>> = LazyLock::new(|| {
    Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| e.to_string())
});

/// Runs `future` to completion on the shared current-thread runtime, which is built on first use.
///
/// Must not be called from within an async context.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output> {
    match &*TOKIO_RUNTIME {
        Ok(runtime) => Ok(runtime.block_on(future)),
        Err(message) => Err(Error::internal(format!(
            "failed to start the underlying async runtime: {message}"
        ))),
    }
}
