//! Finding the interceptor in a handler chain.

use std::sync::Arc;

use crate::interceptor::{Handler, TapInterceptor};

/// How many handlers the locator inspects before giving up.
pub const MAX_CHAIN_DEPTH: usize = 8;

/// The chain does not contain a reachable [`TapInterceptor`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocateError {
    /// A handler without an inner handler was reached first.
    #[error("no interceptor in handler chain: `{handler}` at depth {depth} has no inner handler")]
    MissingInner { handler: &'static str, depth: usize },

    /// The chain is deeper than the locator walks.
    #[error("no interceptor within the first {0} handlers of the chain")]
    DepthExceeded(usize),
}

/// Walk the chain from `root` and return the first [`TapInterceptor`].
///
/// `root` itself is depth 0.
pub fn locate(root: &Arc<dyn Handler>) -> Result<TapInterceptor, LocateError> {
    let mut current = root;
    for depth in 0..MAX_CHAIN_DEPTH {
        if let Some(interceptor) = current.as_any().downcast_ref::<TapInterceptor>() {
            return Ok(interceptor.clone());
        }
        current = current.inner().ok_or_else(|| LocateError::MissingInner {
            handler: current.name(),
            depth,
        })?;
    }
    Err(LocateError::DepthExceeded(MAX_CHAIN_DEPTH))
}
