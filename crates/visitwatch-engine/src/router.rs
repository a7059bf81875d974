//! Frequency router — immediate delivery vs. digest accumulation.

use visitwatch_core::settings::{Frequency, NotificationSettings};
use visitwatch_core::types::ChangeSet;

/// What to do with a freshly detected ChangeSet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Hand to the gateway now, synchronously.
    Dispatch,
    /// Append to the user's digest queue; the scheduler delivers later.
    Accumulate,
}

/// Decide between immediate dispatch and accumulation.
///
/// The decision follows the *email* channel frequency — email is the only
/// digest-capable channel; every other channel is always immediate. The
/// master switch and channel toggles do not change the decision: disabled
/// channels are skipped at dispatch time, so a disabled daily user keeps
/// accumulating and receives the backlog if re-enabled.
///
/// An unrecognized frequency routes to `Dispatch` (via
/// [`Frequency::parse`]'s fallback): never silently drop a change.
///
/// Callers must not invoke the router for an empty ChangeSet — an empty
/// detection is a no-op upstream.
pub fn route(change_set: &ChangeSet, settings: &NotificationSettings) -> RouteDecision {
    debug_assert!(!change_set.is_empty(), "empty ChangeSet must not be routed");
    match settings.email.frequency() {
        Frequency::Daily => RouteDecision::Accumulate,
        Frequency::Immediate => RouteDecision::Dispatch,
    }
}
