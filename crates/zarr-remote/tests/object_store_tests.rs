//! Integration test: open a store kept in an `object_store` bucket.

use std::sync::Arc;

use object_store::{memory::InMemory, path::Path, ObjectStore};
use test_utils::{create_ramp, StoreFixture};
use zarr_codec::{ArrayData, ArrayMetadata, CodecSpec};
use zarr_remote::{DataOptions, ObjectStoreFetcher, StoreConfig, StoreError, ZarrStore};

async fn bucket_with(fixture: &StoreFixture, prefix: &str) -> Arc<InMemory> {
    let bucket = Arc::new(InMemory::new());
    for (key, bytes) in fixture.objects() {
        bucket
            .put(&Path::from(format!("{prefix}/{key}")), bytes.into())
            .await
            .unwrap();
    }
    bucket
}

#[tokio::test]
async fn test_read_from_bucket_prefix() {
    let fixture = StoreFixture::new().group("lfp").array(
        "lfp/voltage",
        ArrayMetadata::new(vec![50], vec![16], "<f8").with_compressor(CodecSpec::new("zstd")),
        &ArrayData::Float64(create_ramp(50)),
    );
    let bucket = bucket_with(&fixture, "sessions/s01.zarr").await;
    let fetcher = Arc::new(ObjectStoreFetcher::new(bucket, "/sessions/s01.zarr/"));

    let store = ZarrStore::open(fetcher, StoreConfig::default()).await.unwrap();
    assert_eq!(store.location(), "sessions/s01.zarr");

    let lfp = store.get_group("lfp").unwrap();
    assert_eq!(lfp.datasets()[0].shape, vec![50]);

    let data = lfp
        .get_dataset_data("voltage", &DataOptions::slice(vec![14..18]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(data.as_array(), Some(&ArrayData::Float64(vec![14.0, 15.0, 16.0, 17.0])));
    assert_eq!(store.stats().network_fetches, 2);
}

#[tokio::test]
async fn test_missing_store_fails_to_open() {
    let fetcher = Arc::new(ObjectStoreFetcher::new(Arc::new(InMemory::new()), "empty"));
    assert!(matches!(
        ZarrStore::open(fetcher, StoreConfig::default()).await,
        Err(StoreError::OpenFailed { .. })
    ));
}
