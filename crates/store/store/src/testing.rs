use std::time::Duration;

use crate::error::StoreError;
use crate::store::KeyValueStore;

/// Run the full key-value store conformance test suite.
///
/// Call this from your backend's test module with a fresh store instance.
/// Keys are derived from `prefix` so that several runs can share a backend.
///
/// # Errors
///
/// Returns an error if a store operation fails.
///
/// # Panics
///
/// Panics if the backend violates the [`KeyValueStore`] contract.
pub async fn run_store_conformance_tests(
    store: &dyn KeyValueStore,
    prefix: &str,
) -> Result<(), StoreError> {
    test_get_missing(store, prefix).await?;
    test_set_if_not_exists_new(store, prefix).await?;
    test_set_if_not_exists_existing(store, prefix).await?;
    test_compare_and_delete_match(store, prefix).await?;
    test_compare_and_delete_mismatch(store, prefix).await?;
    test_compare_and_delete_missing(store, prefix).await?;
    test_expire_existing(store, prefix).await?;
    test_expire_missing(store, prefix).await?;
    Ok(())
}

const LONG_TTL: Duration = Duration::from_secs(3600);

async fn test_get_missing(store: &dyn KeyValueStore, prefix: &str) -> Result<(), StoreError> {
    let key = format!("{prefix}:missing");
    let val = store.get(&key).await?;
    assert!(val.is_none(), "get on missing key should return None");
    Ok(())
}

async fn test_set_if_not_exists_new(
    store: &dyn KeyValueStore,
    prefix: &str,
) -> Result<(), StoreError> {
    let key = format!("{prefix}:setnx-new");
    let created = store.set_if_not_exists(&key, "v1", LONG_TTL).await?;
    assert!(created, "set_if_not_exists on new key should return true");
    let val = store.get(&key).await?;
    assert_eq!(val.as_deref(), Some("v1"));
    Ok(())
}

async fn test_set_if_not_exists_existing(
    store: &dyn KeyValueStore,
    prefix: &str,
) -> Result<(), StoreError> {
    let key = format!("{prefix}:setnx-existing");
    assert!(store.set_if_not_exists(&key, "v1", LONG_TTL).await?);
    let created = store.set_if_not_exists(&key, "v2", LONG_TTL).await?;
    assert!(
        !created,
        "set_if_not_exists on existing key should return false"
    );
    let val = store.get(&key).await?;
    assert_eq!(val.as_deref(), Some("v1"), "original value should remain");
    Ok(())
}

async fn test_compare_and_delete_match(
    store: &dyn KeyValueStore,
    prefix: &str,
) -> Result<(), StoreError> {
    let key = format!("{prefix}:cad-match");
    store.set_if_not_exists(&key, "owner", LONG_TTL).await?;
    let deleted = store.compare_and_delete(&key, "owner").await?;
    assert!(deleted, "compare_and_delete with matching value should delete");
    assert!(store.get(&key).await?.is_none());
    Ok(())
}

async fn test_compare_and_delete_mismatch(
    store: &dyn KeyValueStore,
    prefix: &str,
) -> Result<(), StoreError> {
    let key = format!("{prefix}:cad-mismatch");
    store.set_if_not_exists(&key, "owner", LONG_TTL).await?;
    let deleted = store.compare_and_delete(&key, "intruder").await?;
    assert!(!deleted, "compare_and_delete with foreign value must not delete");
    assert_eq!(store.get(&key).await?.as_deref(), Some("owner"));
    store.compare_and_delete(&key, "owner").await?;
    Ok(())
}

async fn test_compare_and_delete_missing(
    store: &dyn KeyValueStore,
    prefix: &str,
) -> Result<(), StoreError> {
    let key = format!("{prefix}:cad-missing");
    let deleted = store.compare_and_delete(&key, "anyone").await?;
    assert!(!deleted, "compare_and_delete on missing key should return false");
    Ok(())
}

async fn test_expire_existing(store: &dyn KeyValueStore, prefix: &str) -> Result<(), StoreError> {
    let key = format!("{prefix}:expire-existing");
    store
        .set_if_not_exists(&key, "v", Duration::from_secs(60))
        .await?;
    let extended = store.expire(&key, LONG_TTL).await?;
    assert!(extended, "expire on existing key should return true");
    assert_eq!(store.get(&key).await?.as_deref(), Some("v"));
    store.compare_and_delete(&key, "v").await?;
    Ok(())
}

async fn test_expire_missing(store: &dyn KeyValueStore, prefix: &str) -> Result<(), StoreError> {
    let key = format!("{prefix}:expire-missing");
    let extended = store.expire(&key, LONG_TTL).await?;
    assert!(!extended, "expire on missing key is a no-op");
    assert!(
        store.get(&key).await?.is_none(),
        "expire must not create the key"
    );
    Ok(())
}
