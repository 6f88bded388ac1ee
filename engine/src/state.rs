//! Typed shared state for one pipeline run.
//!
//! Each stage owns exactly one predeclared key. A key names its value type,
//! so a stage can only produce the fragment type its key declares. Slots are
//! write-once. Nothing can read a slot while stages run: the only read path
//! is [`StateStore::into_complete`], which consumes the store after every
//! stage has finished.
//!
//! ```
//! use scoresheet_engine::Metadata;
//! use scoresheet_engine::state::{Fragment, MetadataKey, StateStore};
//!
//! let store = StateStore::new();
//! store.writer::<MetadataKey>().write(Fragment::Data(Metadata::new())).unwrap();
//! let complete = store.into_complete();
//! assert_eq!(complete.metadata, Fragment::Data(Metadata::new()));
//! assert!(complete.clocks.is_failed());
//! ```
//!
//! A key only accepts its own value type:
//!
//! ```compile_fail
//! use scoresheet_engine::Metadata;
//! use scoresheet_engine::state::{ClocksKey, Fragment, StateStore};
//!
//! let store = StateStore::new();
//! let _ = store.writer::<ClocksKey>().write(Fragment::Data(Metadata::new()));
//! ```
//!
//! and a writer is spent by its first write:
//!
//! ```compile_fail
//! use scoresheet_engine::Metadata;
//! use scoresheet_engine::state::{Fragment, MetadataKey, StateStore};
//!
//! let store = StateStore::new();
//! let writer = store.writer::<MetadataKey>();
//! let _ = writer.write(Fragment::Data(Metadata::new()));
//! let _ = writer.write(Fragment::Data(Metadata::new()));
//! ```

use std::marker::PhantomData;
use std::sync::OnceLock;

use thiserror::Error;

use scoresheet_types::{ClockEntry, Metadata, StageKey};

use crate::transcriber::Transcript;

/// A predeclared slot in the [`StateStore`].
pub trait FragmentKey: Send + Sync + 'static {
    type Value: Send + Sync + 'static;

    const KEY: StageKey;

    #[doc(hidden)]
    fn slot(store: &StateStore) -> &OnceLock<Fragment<Self::Value>>;
}

/// Header fields.
#[derive(Debug, Clone, Copy)]
pub struct MetadataKey;

/// Clock readings, one entry per move row.
#[derive(Debug, Clone, Copy)]
pub struct ClocksKey;

/// The validated move transcript.
#[derive(Debug, Clone, Copy)]
pub struct MovesKey;

impl FragmentKey for MetadataKey {
    type Value = Metadata;
    const KEY: StageKey = StageKey::Metadata;

    fn slot(store: &StateStore) -> &OnceLock<Fragment<Metadata>> {
        &store.metadata
    }
}

impl FragmentKey for ClocksKey {
    type Value = Vec<ClockEntry>;
    const KEY: StageKey = StageKey::Clocks;

    fn slot(store: &StateStore) -> &OnceLock<Fragment<Vec<ClockEntry>>> {
        &store.clocks
    }
}

impl FragmentKey for MovesKey {
    type Value = Transcript;
    const KEY: StageKey = StageKey::Moves;

    fn slot(store: &StateStore) -> &OnceLock<Fragment<Transcript>> {
        &store.moves
    }
}

/// Value written to a slot: the stage's output or a marker that it failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment<T> {
    Data(T),
    Failed(StageFailure),
}

impl<T> Fragment<T> {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Fragment::Failed(_))
    }
}

/// Error marker left by a stage that produced no data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub key: StageKey,
    pub message: String,
}

impl StageFailure {
    #[must_use]
    pub fn new(key: StageKey, message: impl Into<String>) -> Self {
        Self {
            key,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.key.stage_name(), self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("{0} fragment was already written")]
    AlreadyWritten(StageKey),
}

#[derive(Debug, Default)]
pub struct StateStore {
    metadata: OnceLock<Fragment<Metadata>>,
    clocks: OnceLock<Fragment<Vec<ClockEntry>>>,
    moves: OnceLock<Fragment<Transcript>>,
}

impl StateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write capability for one key. Writing consumes the writer.
    #[must_use]
    pub fn writer<K: FragmentKey>(&self) -> FragmentWriter<'_, K> {
        FragmentWriter {
            store: self,
            _key: PhantomData,
        }
    }

    /// Keys whose slot has been filled.
    #[must_use]
    pub fn written(&self) -> Vec<StageKey> {
        let mut keys = Vec::with_capacity(StageKey::ALL.len());
        if self.metadata.get().is_some() {
            keys.push(StageKey::Metadata);
        }
        if self.clocks.get().is_some() {
            keys.push(StageKey::Clocks);
        }
        if self.moves.get().is_some() {
            keys.push(StageKey::Moves);
        }
        keys
    }

    /// Consume the store once every stage has finished.
    ///
    /// A slot that was never written becomes a failure marker, so the
    /// consolidated result always accounts for all three keys.
    #[must_use]
    pub fn into_complete(self) -> CompleteState {
        CompleteState {
            metadata: take_slot(self.metadata, StageKey::Metadata),
            clocks: take_slot(self.clocks, StageKey::Clocks),
            moves: take_slot(self.moves, StageKey::Moves),
        }
    }
}

fn take_slot<T>(slot: OnceLock<Fragment<T>>, key: StageKey) -> Fragment<T> {
    slot.into_inner().unwrap_or_else(|| {
        tracing::warn!(key = %key, "Stage finished without writing its fragment");
        Fragment::Failed(StageFailure::new(key, "stage produced no result"))
    })
}

/// Single-use write capability for the slot named by `K`.
pub struct FragmentWriter<'s, K: FragmentKey> {
    store: &'s StateStore,
    _key: PhantomData<K>,
}

impl<K: FragmentKey> FragmentWriter<'_, K> {
    pub fn write(self, fragment: Fragment<K::Value>) -> Result<(), StateError> {
        K::slot(self.store)
            .set(fragment)
            .map_err(|_| StateError::AlreadyWritten(K::KEY))
    }
}

/// Every fragment of a finished run. Read by the merger only.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteState {
    pub metadata: Fragment<Metadata>,
    pub clocks: Fragment<Vec<ClockEntry>>,
    pub moves: Fragment<Transcript>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_land_in_their_own_slot() {
        let store = StateStore::new();
        store
            .writer::<ClocksKey>()
            .write(Fragment::Data(vec![ClockEntry {
                white: "1:30".into(),
                black: None,
            }]))
            .unwrap();
        assert_eq!(store.written(), vec![StageKey::Clocks]);

        let complete = store.into_complete();
        assert!(complete.metadata.is_failed());
        assert!(matches!(complete.clocks, Fragment::Data(ref rows) if rows.len() == 1));
        assert!(complete.moves.is_failed());
    }

    #[test]
    fn second_write_is_rejected() {
        let store = StateStore::new();
        store
            .writer::<MetadataKey>()
            .write(Fragment::Data(Metadata::new()))
            .unwrap();
        let err = store
            .writer::<MetadataKey>()
            .write(Fragment::Failed(StageFailure::new(StageKey::Metadata, "late")))
            .unwrap_err();
        assert_eq!(err, StateError::AlreadyWritten(StageKey::Metadata));

        let complete = store.into_complete();
        assert_eq!(complete.metadata, Fragment::Data(Metadata::new()));
    }

    #[test]
    fn missing_slot_becomes_failure_marker() {
        let complete = StateStore::new().into_complete();
        match complete.moves {
            Fragment::Failed(failure) => {
                assert_eq!(failure.key, StageKey::Moves);
                assert_eq!(
                    failure.to_string(),
                    "move extraction failed: stage produced no result"
                );
            }
            Fragment::Data(_) => panic!("expected a failure marker"),
        }
    }

    #[test]
    fn concurrent_writers_fill_distinct_slots() {
        let store = StateStore::new();
        std::thread::scope(|scope| {
            scope.spawn(|| {
                store
                    .writer::<MetadataKey>()
                    .write(Fragment::Data(Metadata::new()))
                    .unwrap();
            });
            scope.spawn(|| {
                store
                    .writer::<ClocksKey>()
                    .write(Fragment::Data(Vec::new()))
                    .unwrap();
            });
        });
        assert_eq!(store.written(), vec![StageKey::Metadata, StageKey::Clocks]);
    }
}
