//! Store trait definitions

use clockwork_api::{ExportHistoryItem, NewExportItem};
use clockwork_util::ExportId;

use crate::StoreResult;

/// Durable ledger of export artifacts
///
/// Mutations are serialized by the implementation; ids are generated at
/// record time and never reused.
pub trait ExportHistoryStore: Send + Sync {
    /// Record a written artifact under a fresh id
    fn record(&self, item: NewExportItem) -> StoreResult<ExportHistoryItem>;

    /// All items, newest first
    fn list(&self) -> StoreResult<Vec<ExportHistoryItem>>;

    /// Delete the given ids and return what remains. Unknown ids are ignored.
    fn delete_many(&self, ids: &[ExportId]) -> StoreResult<Vec<ExportHistoryItem>>;

    /// Delete everything
    fn clear(&self) -> StoreResult<Vec<ExportHistoryItem>>;

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
