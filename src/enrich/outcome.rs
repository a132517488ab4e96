/// Typed result of one enrichment fetch.
///
/// A failed or timed-out call resolves to `Unavailable` rather than hiding
/// inside a catch-all; the merge step consumes the distinction explicitly
/// and substitutes the per-kind default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FetchOutcome<T> {
    Fetched(T),
    Unavailable,
}

impl<T> FetchOutcome<T> {
    pub fn fetched(&self) -> Option<&T> {
        match self {
            FetchOutcome::Fetched(value) => Some(value),
            FetchOutcome::Unavailable => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, FetchOutcome::Unavailable)
    }
}
