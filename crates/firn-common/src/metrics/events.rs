//! Internal events for metadata coordinator metrics emission.
//!
//! Each event struct represents a measurable occurrence in the bulk-load
//! metadata path. Events implement the `InternalEvent` trait which emits
//! the corresponding counter.

use metrics::counter;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when a load request resolves into a file group.
pub struct FileGroupResolved {
    pub table_id: i64,
    pub file_count: usize,
}

impl InternalEvent for FileGroupResolved {
    fn emit(self) {
        trace!(
            table_id = self.table_id,
            files = self.file_count,
            "File group resolved"
        );
        counter!("firn_load_file_groups_resolved_total").increment(1);
        counter!("firn_load_files_referenced_total").increment(self.file_count as u64);
    }
}

/// Event emitted when a load request is rejected at definition time.
pub struct LoadRejected {
    /// Stable label naming the rejection reason.
    pub reason: &'static str,
}

impl InternalEvent for LoadRejected {
    fn emit(self) {
        trace!(reason = self.reason, "Load definition rejected");
        counter!("firn_load_rejections_total", "reason" => self.reason).increment(1);
    }
}

/// Event emitted on every attempted ETL state transition.
pub struct EtlTransition {
    /// Name of the requested target state.
    pub to: &'static str,
    /// Whether the check-and-set accepted the transition.
    pub accepted: bool,
}

impl InternalEvent for EtlTransition {
    fn emit(self) {
        trace!(to = self.to, accepted = self.accepted, "ETL state transition");
        let accepted = if self.accepted { "true" } else { "false" };
        counter!("firn_etl_transitions_total", "to" => self.to, "accepted" => accepted)
            .increment(1);
    }
}

/// Event emitted when a record is appended to the metadata journal.
pub struct JournalRecordWritten {
    /// Stable label naming the record kind.
    pub kind: &'static str,
    /// Encoded payload size in bytes.
    pub bytes: usize,
}

impl InternalEvent for JournalRecordWritten {
    fn emit(self) {
        trace!(kind = self.kind, bytes = self.bytes, "Journal record written");
        counter!("firn_journal_records_total", "kind" => self.kind).increment(1);
        counter!("firn_journal_bytes_total").increment(self.bytes as u64);
    }
}

/// Event emitted after a journal replay completes.
pub struct JournalReplayed {
    /// Records decoded and handed back to the caller.
    pub records: usize,
    /// Records skipped because their kind was unknown.
    pub skipped: usize,
}

impl InternalEvent for JournalReplayed {
    fn emit(self) {
        trace!(
            records = self.records,
            skipped = self.skipped,
            "Journal replay completed"
        );
        counter!("firn_journal_replayed_records_total").increment(self.records as u64);
        counter!("firn_journal_skipped_records_total").increment(self.skipped as u64);
    }
}
