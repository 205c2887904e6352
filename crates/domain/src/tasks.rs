//! Background task seam.

use common::DormId;

/// Fire-and-forget trigger for background recomputation.
///
/// Implementations must never block and never fail the caller: the order
/// workflow treats analytics refreshes as best-effort.
pub trait TaskRunner: Send + Sync {
    fn refresh_popular_sellers(&self, dorm_id: DormId);
}

/// Runner that drops every request. Lets the order workflow run without
/// an analytics worker attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTaskRunner;

impl TaskRunner for NoopTaskRunner {
    fn refresh_popular_sellers(&self, _dorm_id: DormId) {}
}
