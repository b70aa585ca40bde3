//! Installation identity management.
//!
//! Each installation gets a persistent UUID stored under
//! [`keys::INSTALLATION_ID`](crate::keys::INSTALLATION_ID). It is sent with
//! every batch so the collector can group events without knowing who the
//! user is.

use tp_core::Identity;

use crate::{Store, StoreError, keys};

/// Reads the stored installation identity without creating one.
pub fn load_identity(store: &Store) -> Result<Option<Identity>, StoreError> {
    let Some(raw) = store.get(keys::INSTALLATION_ID)? else {
        return Ok(None);
    };
    let token: String = serde_json::from_str(&raw).map_err(|source| StoreError::Decode {
        key: keys::INSTALLATION_ID,
        source,
    })?;
    Identity::parse(&token)
        .map(Some)
        .map_err(|source| StoreError::Invalid {
            key: keys::INSTALLATION_ID,
            source,
        })
}

/// Loads the installation identity, creating and persisting it on first run.
///
/// The token is never rotated: a stored value that is not a UUID is reported
/// as an error and left in place.
pub fn load_or_create_identity(store: &mut Store) -> Result<Identity, StoreError> {
    if let Some(identity) = load_identity(store)? {
        return Ok(identity);
    }

    let identity = Identity::generate();
    let value = serde_json::to_string(&identity.token()).map_err(|source| StoreError::Encode {
        key: keys::INSTALLATION_ID,
        source,
    })?;
    store.set(keys::INSTALLATION_ID, value)?;
    tracing::info!(%identity, "generated installation identity");
    Ok(identity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_run_creates_identity() {
        let mut store = Store::open_in_memory().unwrap();
        assert!(load_identity(&store).unwrap().is_none());
        let identity = load_or_create_identity(&mut store).unwrap();
        let raw = store.get(keys::INSTALLATION_ID).unwrap().unwrap();
        assert_eq!(raw, format!("\"{identity}\""));
    }

    #[test]
    fn test_later_runs_reuse_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tabpulse.db");
        let first = {
            let mut store = Store::open(&path).unwrap();
            load_or_create_identity(&mut store).unwrap()
        };
        let mut store = Store::open(&path).unwrap();
        let second = load_or_create_identity(&mut store).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_stored_identity_is_an_error() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .set(keys::INSTALLATION_ID, "\"not-a-uuid\"".to_string())
            .unwrap();
        assert!(matches!(
            load_or_create_identity(&mut store),
            Err(StoreError::Invalid { .. })
        ));
        // The bad value is left in place.
        assert_eq!(
            store.get(keys::INSTALLATION_ID).unwrap().unwrap(),
            "\"not-a-uuid\""
        );
    }
}
