//! Last-writer-wins conflict resolution.
//!
//! Invoked when the remote backend holds a version of a record that is
//! strictly ahead of what this client last saw, while a local mutation is
//! also pending. The policy is intentionally simple: no field-level merge,
//! one side wins wholesale.
//!
//! # Ordering
//!
//! 1. Later `last_modified_at` wins
//! 2. Ties broken by version magnitude
//! 3. Remaining ties go to the remote side, a fixed ordering that makes
//!    repeated calls agree everywhere

use crate::{Record, SyncState};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Which side of a conflict won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resolution {
    LocalWins,
    RemoteWins,
}

/// Outcome of resolving a conflict.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// Which side won
    pub resolution: Resolution,
    /// What the local record should become
    pub record: Record,
}

/// Resolve a conflict between the local record and the remote copy.
///
/// For records fetched from the backend, `local_version` carries the remote
/// version counter. When the local side wins, its payload is kept and the
/// observed remote version is folded in so the subsequent push carries the
/// right expectation. When the remote side wins, the local record is rebased
/// onto the remote lineage and the pending local mutation is discarded.
pub fn resolve(local: &Record, remote: &Record) -> Resolved {
    let resolution = pick_winner(local, remote);

    let record = match resolution {
        Resolution::LocalWins => {
            let mut record = local.clone();
            let observed = remote.local_version;
            record.remote_version =
                Some(record.remote_version.map_or(observed, |v| v.max(observed)));
            record.sync_state = SyncState::PendingPush;
            record
        }
        Resolution::RemoteWins => {
            let mut record = local.clone();
            record.adopt_remote(remote);
            record
        }
    };

    Resolved { resolution, record }
}

fn pick_winner(local: &Record, remote: &Record) -> Resolution {
    match local.last_modified_at.cmp(&remote.last_modified_at) {
        Ordering::Greater => Resolution::LocalWins,
        Ordering::Less => Resolution::RemoteWins,
        Ordering::Equal => match local.local_version.cmp(&remote.local_version) {
            Ordering::Greater => Resolution::LocalWins,
            // equal versions fall through to the fixed ordering: remote wins
            _ => Resolution::RemoteWins,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_record(version: u64, modified_at: u64) -> Record {
        Record {
            id: "r-1".into(),
            collection: "settings".into(),
            payload: b"local".to_vec(),
            local_version: version,
            remote_version: Some(1),
            last_modified_at: modified_at,
            sync_state: SyncState::PendingPush,
        }
    }

    fn remote_record(version: u64, modified_at: u64) -> Record {
        Record {
            id: "r-1".into(),
            collection: "settings".into(),
            payload: b"remote".to_vec(),
            local_version: version,
            remote_version: Some(version),
            last_modified_at: modified_at,
            sync_state: SyncState::Clean,
        }
    }

    #[test]
    fn later_remote_timestamp_wins() {
        let local = local_record(3, 1000);
        let remote = remote_record(2, 2000);

        let resolved = resolve(&local, &remote);

        assert_eq!(resolved.resolution, Resolution::RemoteWins);
        assert_eq!(resolved.record.payload, b"remote".to_vec());
        assert_eq!(resolved.record.local_version, 2);
        assert_eq!(resolved.record.remote_version, Some(2));
        assert!(resolved.record.is_clean());
    }

    #[test]
    fn later_local_timestamp_wins() {
        let local = local_record(3, 3000);
        let remote = remote_record(5, 2000);

        let resolved = resolve(&local, &remote);

        assert_eq!(resolved.resolution, Resolution::LocalWins);
        assert_eq!(resolved.record.payload, b"local".to_vec());
        // observed remote version folded in for the next push
        assert_eq!(resolved.record.remote_version, Some(5));
        assert_eq!(resolved.record.sync_state, SyncState::PendingPush);
    }

    #[test]
    fn timestamp_tie_higher_version_wins() {
        let local = local_record(6, 2000);
        let remote = remote_record(4, 2000);
        assert_eq!(resolve(&local, &remote).resolution, Resolution::LocalWins);

        let local = local_record(2, 2000);
        let remote = remote_record(4, 2000);
        assert_eq!(resolve(&local, &remote).resolution, Resolution::RemoteWins);
    }

    #[test]
    fn full_tie_goes_to_remote() {
        let local = local_record(4, 2000);
        let remote = remote_record(4, 2000);
        assert_eq!(resolve(&local, &remote).resolution, Resolution::RemoteWins);
    }

    #[test]
    fn local_winner_never_loses_observed_remote_version() {
        let mut local = local_record(3, 3000);
        local.remote_version = Some(9);
        let remote = remote_record(5, 2000);

        let resolved = resolve(&local, &remote);
        assert_eq!(resolved.record.remote_version, Some(9));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_resolve_deterministic(
                local_version in 1u64..100,
                remote_version in 1u64..100,
                local_ts in 1000u64..5000,
                remote_ts in 1000u64..5000,
            ) {
                let local = local_record(local_version, local_ts);
                let remote = remote_record(remote_version, remote_ts);

                let first = resolve(&local, &remote);
                let second = resolve(&local, &remote);

                prop_assert_eq!(first.resolution, second.resolution);
                prop_assert_eq!(first.record, second.record);
            }

            #[test]
            fn prop_later_timestamp_always_wins(
                local_version in 1u64..100,
                remote_version in 1u64..100,
                earlier in 1000u64..5000,
                delta in 1u64..1000,
            ) {
                let later = earlier + delta;

                let local = local_record(local_version, later);
                let remote = remote_record(remote_version, earlier);
                prop_assert_eq!(resolve(&local, &remote).resolution, Resolution::LocalWins);

                let local = local_record(local_version, earlier);
                let remote = remote_record(remote_version, later);
                prop_assert_eq!(resolve(&local, &remote).resolution, Resolution::RemoteWins);
            }

            #[test]
            fn prop_winner_record_is_internally_consistent(
                local_version in 1u64..100,
                remote_version in 1u64..100,
                local_ts in 1000u64..5000,
                remote_ts in 1000u64..5000,
            ) {
                let local = local_record(local_version, local_ts);
                let remote = remote_record(remote_version, remote_ts);

                let resolved = resolve(&local, &remote);
                match resolved.resolution {
                    Resolution::RemoteWins => {
                        // clean implies version agreement
                        prop_assert!(resolved.record.is_clean());
                        prop_assert_eq!(
                            Some(resolved.record.local_version),
                            resolved.record.remote_version
                        );
                    }
                    Resolution::LocalWins => {
                        prop_assert!(resolved.record.needs_push());
                        prop_assert_eq!(resolved.record.payload.clone(), local.payload.clone());
                    }
                }
            }
        }
    }
}
