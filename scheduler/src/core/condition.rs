//! Predicates over the host context.

/// A read-only predicate evaluated against the host context.
///
/// Used for loop stop conditions and wait targets. Implemented for free by
/// any `Fn(&C) -> bool` closure.
pub trait StopCondition<C> {
    fn is_met(&self, ctx: &C) -> bool;
}

impl<C, F> StopCondition<C> for F
where
    F: Fn(&C) -> bool,
{
    fn is_met(&self, ctx: &C) -> bool {
        self(ctx)
    }
}
