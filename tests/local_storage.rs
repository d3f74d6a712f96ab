use erp_backend::storage::{LOCAL_PREFIX, LocalStore, Storage, StorageError};

#[actix_web::test]
async fn local_objects_round_trip_through_locations() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::local_only(LocalStore::new(dir.path()));
    assert_eq!(storage.backend_name(), "local");

    let location = storage
        .put("documents/employee/7/nid.pdf", b"%PDF-1.7".to_vec(), "application/pdf")
        .await
        .unwrap();
    assert_eq!(location, format!("{LOCAL_PREFIX}documents/employee/7/nid.pdf"));
    assert!(dir.path().join("documents/employee/7/nid.pdf").exists());

    assert_eq!(storage.get(&location).await.unwrap(), b"%PDF-1.7");

    storage.delete(&location).await.unwrap();
    assert!(matches!(
        storage.get(&location).await,
        Err(StorageError::NotFound(_))
    ));
    // second delete is a no-op
    storage.delete(&location).await.unwrap();
}

#[actix_web::test]
async fn escaping_keys_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::local_only(LocalStore::new(dir.path()));

    let err = storage
        .put("../outside.txt", b"x".to_vec(), "text/plain")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidKey(_)));
}
