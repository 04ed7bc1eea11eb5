use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use crate::reply::ActionRequest;

use super::state::{SessionState, SessionStateError};

pub const PENDING_ACTIONS_KEY: &str = "copilot.pending_actions";
pub const SNAPSHOT_FORMAT_VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    State(#[from] SessionStateError),
    #[error("failed to encode pending actions: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("pending actions blob is not valid JSON: {message}")]
    Decode { message: String },
    #[error(
        "pending actions blob has format version {found}, expected {}",
        SNAPSHOT_FORMAT_VERSION
    )]
    UnsupportedVersion { found: u16 },
    #[error("pending actions blob checksum mismatch (expected {expected}, got {actual})")]
    ChecksumMismatch { expected: String, actual: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct PendingSnapshot {
    format_version: u16,
    actions_sha256_hex: String,
    actions: Vec<ActionRequest>,
}

/// Pending actions parked under one fixed session key. Saving overwrites;
/// taking erases the key before the blob is decoded.
#[derive(Debug)]
pub struct PendingActionStore<S> {
    state: S,
}

impl<S: SessionState> PendingActionStore<S> {
    pub fn new(state: S) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn into_state(self) -> S {
        self.state
    }

    pub fn save(&mut self, actions: &[ActionRequest]) -> Result<(), StoreError> {
        let snapshot = PendingSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            actions_sha256_hex: actions_digest(actions)?,
            actions: actions.to_vec(),
        };
        let blob = serde_json::to_string(&snapshot).map_err(StoreError::Encode)?;
        self.state.set(PENDING_ACTIONS_KEY, &blob)?;
        info!(
            action_count = actions.len(),
            bytes = blob.len(),
            "copilot_pending_actions_saved"
        );
        Ok(())
    }

    pub fn take_if_present(&mut self) -> Result<Option<Vec<ActionRequest>>, StoreError> {
        let Some(blob) = self.read_blob()? else {
            return Ok(None);
        };
        self.state.erase(PENDING_ACTIONS_KEY)?;
        debug!(bytes = blob.len(), "copilot_pending_actions_taken");
        decode_snapshot(&blob).map(Some)
    }

    pub fn peek(&self) -> Result<Option<Vec<ActionRequest>>, StoreError> {
        match self.read_blob()? {
            Some(blob) => decode_snapshot(&blob).map(Some),
            None => Ok(None),
        }
    }

    pub fn has_pending(&self) -> Result<bool, StoreError> {
        Ok(self.read_blob()?.is_some())
    }

    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.state.erase(PENDING_ACTIONS_KEY)?;
        Ok(())
    }

    fn read_blob(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .state
            .get(PENDING_ACTIONS_KEY)?
            .filter(|blob| !blob.trim().is_empty()))
    }
}

fn decode_snapshot(blob: &str) -> Result<Vec<ActionRequest>, StoreError> {
    let snapshot =
        serde_json::from_str::<PendingSnapshot>(blob).map_err(|error| StoreError::Decode {
            message: error.to_string(),
        })?;
    if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(StoreError::UnsupportedVersion {
            found: snapshot.format_version,
        });
    }
    let actual = actions_digest(&snapshot.actions)?;
    if actual != snapshot.actions_sha256_hex {
        return Err(StoreError::ChecksumMismatch {
            expected: snapshot.actions_sha256_hex,
            actual,
        });
    }
    Ok(snapshot.actions)
}

fn actions_digest(actions: &[ActionRequest]) -> Result<String, StoreError> {
    let canonical = serde_json::to_vec(actions).map_err(StoreError::Encode)?;
    Ok(to_hex_lower(&Sha256::digest(&canonical)))
}

fn to_hex_lower(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::reply::ComponentEntry;
    use crate::session::InMemorySessionState;

    fn sample_actions() -> Vec<ActionRequest> {
        let renderer = json!({"Renderer": {"materialColor": "#ff0000"}});
        vec![
            ActionRequest::create_gameobject(
                "Cube",
                vec![
                    ComponentEntry::Object(json!({"primitive":"Cube"}).as_object().cloned().expect("obj")),
                    ComponentEntry::Object(renderer.as_object().cloned().expect("obj")),
                ],
            ),
            ActionRequest::create_gameobject("Empty", vec![ComponentEntry::Name("Rigidbody".into())]),
        ]
    }

    #[test]
    fn take_after_save_returns_actions_once() {
        let mut store = PendingActionStore::new(InMemorySessionState::default());
        let actions = sample_actions();
        store.save(&actions).expect("save");

        assert_eq!(store.take_if_present().expect("take"), Some(actions));
        assert_eq!(store.take_if_present().expect("second take"), None);
    }

    #[test]
    fn save_overwrites_previous_blob() {
        let mut store = PendingActionStore::new(InMemorySessionState::default());
        store.save(&sample_actions()).expect("save");
        let replacement = vec![ActionRequest::create_gameobject("Only", Vec::new())];
        store.save(&replacement).expect("save again");
        assert_eq!(store.take_if_present().expect("take"), Some(replacement));
    }

    #[test]
    fn peek_does_not_erase() {
        let mut store = PendingActionStore::new(InMemorySessionState::default());
        store.save(&sample_actions()).expect("save");
        assert!(store.peek().expect("peek").is_some());
        assert!(store.has_pending().expect("has pending"));
        assert!(store.take_if_present().expect("take").is_some());
        assert!(!store.has_pending().expect("has pending"));
    }

    #[test]
    fn corrupt_blob_is_erased_before_decode_fails() {
        let mut state = InMemorySessionState::default();
        state.set(PENDING_ACTIONS_KEY, "{not json").expect("seed");
        let mut store = PendingActionStore::new(state);

        assert!(matches!(
            store.take_if_present(),
            Err(StoreError::Decode { .. })
        ));
        assert_eq!(store.take_if_present().expect("after corrupt"), None);
    }

    #[test]
    fn tampered_actions_fail_the_checksum() {
        let mut store = PendingActionStore::new(InMemorySessionState::default());
        store.save(&sample_actions()).expect("save");
        let blob = store
            .state()
            .get(PENDING_ACTIONS_KEY)
            .expect("get")
            .expect("blob");
        let mut state = store.into_state();
        state
            .set(PENDING_ACTIONS_KEY, &blob.replace("Empty", "Other"))
            .expect("tamper");

        let mut store = PendingActionStore::new(state);
        assert!(matches!(
            store.take_if_present(),
            Err(StoreError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn empty_blob_reads_as_absent() {
        let mut state = InMemorySessionState::default();
        state.set(PENDING_ACTIONS_KEY, "  ").expect("seed");
        let mut store = PendingActionStore::new(state);
        assert_eq!(store.take_if_present().expect("take"), None);
    }
}
