//! The two seams the controller is generic over.

use async_trait::async_trait;

use crate::worklist::WorkItem;

/// One asynchronous unit of work per item. Failures are reported inside
/// `Outcome`, never as an error, so the run loop cannot be aborted by a probe.
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    type Item: WorkItem;
    type Outcome: Send + 'static;

    async fn probe(&self, item: &Self::Item) -> Self::Outcome;
}

/// Pure mapping from a raw outcome to a stored record.
pub trait Classifier: Send + Sync + 'static {
    type Item;
    type Outcome;
    type Output;

    fn classify(&self, item: &Self::Item, outcome: Self::Outcome) -> Self::Output;
}
