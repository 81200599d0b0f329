/// Classification for how a provider handle reacts to a failed call.
///
/// | Class | Counts as failure? | Slows the provider down? |
/// |-------|--------------------|--------------------------|
/// | `Never` | Yes | No |
/// | `Backoff` | Yes | Yes, the limiter delay is multiplied |
/// | `NextProvider` | Yes | No |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// The request itself is bad (unknown symbol, unsupported operation).
    /// Another attempt against the same provider will not help.
    Never,

    /// The upstream asked us to slow down (HTTP 429 or a quota notice).
    /// The provider's rate limiter grows its inter-request delay.
    Backoff,

    /// Transient or provider-specific failure; the manager moves on to
    /// the next provider in priority order.
    NextProvider,
}
