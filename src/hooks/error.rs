use thiserror::Error;

/// Boxed error type that hook actions may return.
pub type BoxDynError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for hook actions.
pub type HookResult = Result<(), BoxDynError>;

/// Errors raised while registering or running commit hooks.
#[derive(Debug, Error)]
pub enum HookError {
    /// A hook registered outside any transaction failed while running inline.
    #[error("Immediate commit hook failed: {0}")]
    Immediate(#[source] BoxDynError),

    /// A hook failed while the pending list was draining. Draining continues
    /// past failures; the first failure is the one reported, with the
    /// zero-based position the hook held in the registration order.
    #[error("Commit hook {index} failed: {source}")]
    Execution {
        index: usize,
        #[source]
        source: BoxDynError,
    },
}
