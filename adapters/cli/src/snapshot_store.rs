#![allow(clippy::missing_errors_doc)]

use std::{
    fs,
    path::{Path, PathBuf},
};

#[cfg(test)]
use std::{error::Error, fmt};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use nighthold_core::{RunId, RunSnapshot};

#[cfg(test)]
const SNAPSHOT_DOMAIN: &str = "nighthold";
#[cfg(test)]
const SNAPSHOT_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded snapshot payload.
pub(crate) const SNAPSHOT_HEADER: &str = "nighthold:v1";
/// Delimiter used to separate the prefix, day number and payload.
#[cfg(test)]
const FIELD_DELIMITER: char = ':';

/// Encodes a day-boundary snapshot into a single-line string.
///
/// The day number is repeated in clear text before the payload so a save file
/// can be identified without decoding it.
pub(crate) fn encode(snapshot: &RunSnapshot) -> String {
    let json = serde_json::to_vec(snapshot).expect("run snapshot serialization never fails");
    let encoded = STANDARD_NO_PAD.encode(json);
    format!(
        "{SNAPSHOT_HEADER}:{}:{encoded}",
        snapshot.day_number()
    )
}

/// Decodes a snapshot from the provided string representation.
#[cfg(test)]
pub(crate) fn decode(value: &str) -> Result<RunSnapshot, SnapshotCodecError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SnapshotCodecError::EmptyPayload);
    }

    let mut parts = trimmed.split(FIELD_DELIMITER);
    let domain = parts.next().ok_or(SnapshotCodecError::MissingPrefix)?;
    let version = parts.next().ok_or(SnapshotCodecError::MissingVersion)?;
    let day = parts.next().ok_or(SnapshotCodecError::MissingDay)?;
    let payload = parts.next().ok_or(SnapshotCodecError::MissingPayload)?;

    if domain != SNAPSHOT_DOMAIN {
        return Err(SnapshotCodecError::InvalidPrefix(domain.to_owned()));
    }
    if version != SNAPSHOT_VERSION {
        return Err(SnapshotCodecError::UnsupportedVersion(version.to_owned()));
    }

    let header_day = day
        .trim()
        .parse::<u32>()
        .map_err(|_| SnapshotCodecError::InvalidDay(day.to_owned()))?;
    let bytes = STANDARD_NO_PAD
        .decode(payload.as_bytes())
        .map_err(SnapshotCodecError::InvalidEncoding)?;
    let decoded: RunSnapshot =
        serde_json::from_slice(&bytes).map_err(SnapshotCodecError::InvalidPayload)?;

    if decoded.day_number() != header_day {
        return Err(SnapshotCodecError::DayMismatch {
            header: header_day,
            payload: decoded.day_number(),
        });
    }

    Ok(decoded)
}

/// Errors that can occur while decoding persisted snapshot strings.
#[cfg(test)]
#[derive(Debug)]
pub(crate) enum SnapshotCodecError {
    /// The provided string was empty or contained only whitespace.
    EmptyPayload,
    /// The prefix segment was missing from the encoded snapshot.
    MissingPrefix,
    /// The encoded snapshot did not contain a version segment.
    MissingVersion,
    /// The encoded snapshot did not include the day segment.
    MissingDay,
    /// The encoded snapshot did not include the payload segment.
    MissingPayload,
    /// The encoded snapshot used an unexpected prefix segment.
    InvalidPrefix(String),
    /// The encoded snapshot used an unsupported version identifier.
    UnsupportedVersion(String),
    /// The day segment could not be parsed from the encoded snapshot.
    InvalidDay(String),
    /// The clear-text day disagreed with the day stored in the payload.
    DayMismatch {
        /// Day number read from the clear-text segment.
        header: u32,
        /// Day number carried by the decoded payload.
        payload: u32,
    },
    /// The base64 payload could not be decoded.
    InvalidEncoding(base64::DecodeError),
    /// The decoded payload could not be deserialised.
    InvalidPayload(serde_json::Error),
}

#[cfg(test)]
impl fmt::Display for SnapshotCodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "snapshot payload was empty"),
            Self::MissingPrefix => write!(f, "snapshot string is missing the prefix"),
            Self::MissingVersion => write!(f, "snapshot string is missing the version"),
            Self::MissingDay => write!(f, "snapshot string is missing the day number"),
            Self::MissingPayload => write!(f, "snapshot string is missing the payload"),
            Self::InvalidPrefix(prefix) => {
                write!(f, "snapshot prefix '{prefix}' is not supported")
            }
            Self::UnsupportedVersion(version) => {
                write!(f, "snapshot version '{version}' is not supported")
            }
            Self::InvalidDay(day) => write!(f, "could not parse snapshot day '{day}'"),
            Self::DayMismatch { header, payload } => write!(
                f,
                "snapshot header claims day {header} but the payload stores day {payload}"
            ),
            Self::InvalidEncoding(error) => {
                write!(f, "could not decode snapshot payload: {error}")
            }
            Self::InvalidPayload(error) => {
                write!(f, "could not parse snapshot payload: {error}")
            }
        }
    }
}

#[cfg(test)]
impl Error for SnapshotCodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidEncoding(error) => Some(error),
            Self::InvalidPayload(error) => Some(error),
            _ => None,
        }
    }
}

/// File-backed store that persists one snapshot per run.
#[derive(Debug)]
pub(crate) struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Creates a store rooted in the provided save directory.
    pub(crate) fn new(save_dir: &Path, run: RunId) -> Self {
        Self {
            path: save_dir.join(format!("run-{}.nhsave", run.get())),
        }
    }

    /// Path of the file the store writes to.
    #[cfg(test)]
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Persists the snapshot, replacing any previous one atomically.
    ///
    /// The write lands in a staging file first; the rename is the commit
    /// point, so an interrupted write leaves the prior snapshot intact.
    pub(crate) fn persist(&self, snapshot: &RunSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create save directory {}", parent.display())
            })?;
        }
        let staging = self.path.with_extension("nhsave.tmp");
        fs::write(&staging, encode(snapshot).as_bytes())
            .with_context(|| format!("failed to stage snapshot at {}", staging.display()))?;
        fs::rename(&staging, &self.path)
            .with_context(|| format!("failed to commit snapshot at {}", self.path.display()))
    }

    /// Loads the most recently committed snapshot.
    #[cfg(test)]
    pub(crate) fn load(&self) -> Result<RunSnapshot> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read snapshot at {}", self.path.display()))?;
        decode(&contents)
            .with_context(|| format!("failed to decode snapshot at {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nighthold_core::{CellCoord, QueuedBuild, StructureKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    static SCRATCH_COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn scratch_dir() -> PathBuf {
        let index = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "nighthold-snapshot-store-{}-{index}",
            std::process::id()
        ))
    }

    fn sample_snapshot(day: u32) -> RunSnapshot {
        RunSnapshot::new(
            RunId::new(11),
            0xfeed_beef,
            day,
            Duration::from_secs(270),
            vec![QueuedBuild::new(
                StructureKind::Wall,
                CellCoord::new(3, 9),
                Duration::from_secs(4),
            )],
        )
    }

    #[test]
    fn round_trip_preserves_the_snapshot() {
        let snapshot = sample_snapshot(4);

        let encoded = encode(&snapshot);
        assert!(encoded.starts_with(&format!("{SNAPSHOT_HEADER}:4:")));

        let decoded = decode(&encoded).expect("snapshot decodes");
        assert_eq!(snapshot, decoded);
    }

    #[test]
    fn decode_rejects_foreign_and_stale_strings() {
        assert!(matches!(
            decode("   "),
            Err(SnapshotCodecError::EmptyPayload)
        ));
        assert!(matches!(
            decode("stronghold:v1:4:AAAA"),
            Err(SnapshotCodecError::InvalidPrefix(_))
        ));
        assert!(matches!(
            decode("nighthold:v9:4:AAAA"),
            Err(SnapshotCodecError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            decode("nighthold:v1:four:AAAA"),
            Err(SnapshotCodecError::InvalidDay(_))
        ));
        assert!(matches!(
            decode("nighthold:v1:4:!!not-base64!!"),
            Err(SnapshotCodecError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn decode_rejects_a_day_header_that_disagrees_with_the_payload() {
        let encoded = encode(&sample_snapshot(4));
        let tampered = encoded.replacen(":4:", ":9:", 1);

        assert!(matches!(
            decode(&tampered),
            Err(SnapshotCodecError::DayMismatch {
                header: 9,
                payload: 4,
            })
        ));
    }

    #[test]
    fn persist_replaces_the_previous_snapshot_atomically() {
        let dir = scratch_dir();
        let store = SnapshotStore::new(&dir, RunId::new(11));

        store.persist(&sample_snapshot(1)).expect("first persist");
        let loaded = store.load().expect("first load");
        assert_eq!(loaded.day_number(), 1);

        // An interrupted write leaves garbage in the staging file only.
        let staging = store.path().with_extension("nhsave.tmp");
        fs::write(&staging, b"torn write").expect("staging write");
        let loaded = store.load().expect("load after torn write");
        assert_eq!(loaded.day_number(), 1);

        store.persist(&sample_snapshot(2)).expect("second persist");
        let loaded = store.load().expect("second load");
        assert_eq!(loaded.day_number(), 2);

        let _ = fs::remove_dir_all(&dir);
    }
}
