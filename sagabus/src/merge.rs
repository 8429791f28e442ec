//! Optimistic version merge between stored and current saga data shapes
//!
//! When a retrieved instance was persisted by an older build of the saga's
//! data type, a registered [`SagaMerger`] gets one chance to carry the old
//! business fields into the new shape. Everything about the protocol is
//! non-fatal: absence of a merger, a declined merge, or a same-version
//! retrieval all fall back to the retrieved instance unchanged.

use crate::instance::{SagaData, SagaInstance};
use crate::message::SagaMessage;

/// Hook for carrying business data across saga data versions
pub trait SagaMerger<D: SagaData>: Send + Sync {
    /// Merge `retrieved` (old version) into `current` (fresh, new version)
    ///
    /// Return `None` to decline; the retrieved instance is then used as-is.
    fn merge(
        &self,
        current: &SagaInstance<D>,
        retrieved: &SagaInstance<D>,
        message: &dyn SagaMessage,
    ) -> Option<SagaInstance<D>>;
}

/// Run the version-merge check against a retrieved instance
///
/// A fresh instance with the retrieved identity and the current data version
/// is compared against what storage returned. Only the merger's business
/// fields are trusted from a successful merge; identity and version are
/// normalized afterwards, so the version can never regress.
pub fn reconcile<D: SagaData>(
    merger: Option<&dyn SagaMerger<D>>,
    retrieved: SagaInstance<D>,
    message: &dyn SagaMessage,
) -> SagaInstance<D> {
    let current = SagaInstance::<D>::with_id(retrieved.id);
    if current.version <= retrieved.version {
        return retrieved;
    }

    let Some(merger) = merger else {
        tracing::info!(
            id = %retrieved.id,
            stored_version = retrieved.version,
            current_version = current.version,
            "saga data version is behind and no merger is registered, using stored instance"
        );
        return retrieved;
    };

    match merger.merge(&current, &retrieved, message) {
        Some(mut merged) => {
            merged.id = retrieved.id;
            merged.version = current.version;
            tracing::info!(
                id = %merged.id,
                from_version = retrieved.version,
                to_version = merged.version,
                "saga instance merged to current data version"
            );
            merged
        }
        None => {
            tracing::info!(
                id = %retrieved.id,
                stored_version = retrieved.version,
                current_version = current.version,
                "merger declined, using stored instance"
            );
            retrieved
        }
    }
}
