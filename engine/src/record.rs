//! Record types for synchronizable state.

use crate::{CollectionName, RecordId, Timestamp, Version};
use serde::{Deserialize, Serialize};

/// Where a record stands relative to the remote mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncState {
    /// Local and remote agree
    Clean,
    /// A local mutation is waiting to be pushed
    PendingPush,
    /// A newer remote version was observed and not yet adopted
    PendingPull,
    /// Both sides changed since the last sync
    Conflict,
}

/// A logical unit of synchronizable state.
///
/// The payload is opaque bytes interpreted by the owning feature. Version
/// bookkeeping is the engine's concern: `local_version` increments on every
/// local mutation, `remote_version` tracks the highest version the remote
/// backend has acknowledged or that this client has observed from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Stable identifier, unique within its collection
    pub id: RecordId,
    /// Collection this record belongs to
    pub collection: CollectionName,
    /// Opaque serialized value
    pub payload: Vec<u8>,
    /// Incremented on every local mutation
    pub local_version: Version,
    /// Last version acknowledged by the remote backend, absent if never synced
    pub remote_version: Option<Version>,
    /// Logical timestamp of the last local mutation (milliseconds)
    pub last_modified_at: Timestamp,
    /// Current synchronization state
    pub sync_state: SyncState,
}

impl Record {
    /// Create a record from its first local write.
    pub fn new(
        id: impl Into<RecordId>,
        collection: impl Into<CollectionName>,
        payload: Vec<u8>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            collection: collection.into(),
            payload,
            local_version: 1,
            remote_version: None,
            last_modified_at: now,
            sync_state: SyncState::PendingPush,
        }
    }

    /// Apply a local mutation: replace the payload, bump the version.
    pub fn mutate(&mut self, payload: Vec<u8>, now: Timestamp) {
        self.payload = payload;
        self.local_version += 1;
        self.last_modified_at = now;
        self.sync_state = SyncState::PendingPush;
    }

    /// Record a successful push acknowledged at `acked` by the backend.
    ///
    /// The record only becomes clean if no newer local mutation landed while
    /// the push was in flight.
    pub fn mark_pushed(&mut self, acked: Version) {
        self.remote_version = Some(self.remote_version.map_or(acked, |v| v.max(acked)));
        if self.remote_version == Some(self.local_version) {
            self.sync_state = SyncState::Clean;
        }
    }

    /// Note that the remote backend was observed holding `version`.
    ///
    /// Only flags the sync state; `remote_version` itself changes when the
    /// observation is resolved. If the remote is ahead while a local mutation
    /// is pending, the record is in conflict; if the record was clean it now
    /// needs a pull.
    pub fn observe_remote(&mut self, version: Version) {
        let known = self.remote_version.unwrap_or(0);
        if version <= known {
            return;
        }
        self.sync_state = match self.sync_state {
            SyncState::Clean | SyncState::PendingPull => SyncState::PendingPull,
            SyncState::PendingPush | SyncState::Conflict => SyncState::Conflict,
        };
    }

    /// Rebase this record onto the remote copy, discarding local state.
    ///
    /// Adopts the remote lineage wholesale: versions, timestamp, and payload.
    /// For records fetched from the backend, `local_version` carries the
    /// remote version counter.
    pub fn adopt_remote(&mut self, remote: &Record) {
        self.payload = remote.payload.clone();
        self.local_version = remote.local_version;
        self.remote_version = Some(remote.local_version);
        self.last_modified_at = remote.last_modified_at;
        self.sync_state = SyncState::Clean;
    }

    /// Whether local and remote agree.
    pub fn is_clean(&self) -> bool {
        self.sync_state == SyncState::Clean
    }

    /// Whether a local mutation still needs to reach the remote.
    pub fn needs_push(&self) -> bool {
        matches!(
            self.sync_state,
            SyncState::PendingPush | SyncState::Conflict
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_write_is_pending_push() {
        let record = Record::new("streak-1", "streaks", b"3".to_vec(), 1000);

        assert_eq!(record.local_version, 1);
        assert_eq!(record.remote_version, None);
        assert_eq!(record.sync_state, SyncState::PendingPush);
        assert!(record.needs_push());
        assert!(!record.is_clean());
    }

    #[test]
    fn mutation_bumps_version_and_timestamp() {
        let mut record = Record::new("streak-1", "streaks", b"3".to_vec(), 1000);
        record.mutate(b"4".to_vec(), 2000);

        assert_eq!(record.local_version, 2);
        assert_eq!(record.payload, b"4".to_vec());
        assert_eq!(record.last_modified_at, 2000);
        assert_eq!(record.sync_state, SyncState::PendingPush);
    }

    #[test]
    fn versions_count_mutations() {
        let mut record = Record::new("r", "c", vec![0], 0);
        for i in 1..=10u64 {
            record.mutate(vec![i as u8], i * 100);
        }
        // one create + ten mutations
        assert_eq!(record.local_version, 11);
    }

    #[test]
    fn pushed_record_becomes_clean() {
        let mut record = Record::new("streak-1", "streaks", b"3".to_vec(), 1000);
        record.mark_pushed(1);

        assert_eq!(record.remote_version, Some(1));
        assert!(record.is_clean());
        assert_eq!(record.local_version, 1);
    }

    #[test]
    fn push_ack_for_stale_version_stays_pending() {
        let mut record = Record::new("streak-1", "streaks", b"3".to_vec(), 1000);
        record.mutate(b"4".to_vec(), 2000); // local_version now 2

        // Ack for the version-1 push that was in flight
        record.mark_pushed(1);

        assert_eq!(record.remote_version, Some(1));
        assert_eq!(record.sync_state, SyncState::PendingPush);
    }

    #[test]
    fn remote_version_never_regresses() {
        let mut record = Record::new("r", "c", vec![], 0);
        record.mark_pushed(5);
        record.mark_pushed(3);
        assert_eq!(record.remote_version, Some(5));
    }

    #[test]
    fn observing_newer_remote_on_clean_record_needs_pull() {
        let mut record = Record::new("r", "c", vec![], 0);
        record.mark_pushed(1);
        assert!(record.is_clean());

        record.observe_remote(2);
        assert_eq!(record.sync_state, SyncState::PendingPull);
    }

    #[test]
    fn observing_newer_remote_with_pending_push_is_conflict() {
        let mut record = Record::new("r", "c", vec![], 0);
        record.mark_pushed(1);
        record.mutate(vec![1], 100);

        record.observe_remote(2);
        assert_eq!(record.sync_state, SyncState::Conflict);
    }

    #[test]
    fn observing_known_remote_version_is_a_no_op() {
        let mut record = Record::new("r", "c", vec![], 0);
        record.mark_pushed(3);
        record.observe_remote(3);
        assert!(record.is_clean());
    }

    #[test]
    fn adopt_remote_rebases_wholesale() {
        let mut local = Record::new("r", "c", b"mine".to_vec(), 5000);
        local.mutate(b"mine-v2".to_vec(), 6000);

        let remote = Record {
            id: "r".into(),
            collection: "c".into(),
            payload: b"theirs".to_vec(),
            local_version: 7,
            remote_version: Some(7),
            last_modified_at: 9000,
            sync_state: SyncState::Clean,
        };

        local.adopt_remote(&remote);

        assert_eq!(local.payload, b"theirs".to_vec());
        assert_eq!(local.local_version, 7);
        assert_eq!(local.remote_version, Some(7));
        assert_eq!(local.last_modified_at, 9000);
        assert!(local.is_clean());
    }

    #[test]
    fn serialization_roundtrip() {
        let record = Record::new("user-1", "settings", b"{\"theme\":\"dark\"}".to_vec(), 1000);

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("localVersion")); // camelCase
        assert!(json.contains("pendingPush"));

        let parsed: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(record, parsed);
    }
}
