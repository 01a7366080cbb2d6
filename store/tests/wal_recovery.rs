//! Crash-recovery tests: a store node reopened over its write-ahead logs
//! must reconstruct the state it acknowledged before going down.

use bytes::Bytes;
use vireo_store::{MergeRequest, PutRequest, StoreNode, StoreNodeConfig};

fn config(dir: &tempfile::TempDir) -> StoreNodeConfig {
    StoreNodeConfig {
        shard_count: 4,
        wal_dir: Some(dir.path().to_path_buf()),
    }
}

#[tokio::test]
async fn should_recover_acknowledged_writes_after_reopen() {
    let dir = tempfile::tempdir().unwrap();

    // given - a node that acknowledged a mix of puts and merges
    {
        let node = StoreNode::open(&config(&dir)).await.unwrap();
        for i in 0..32 {
            let response = node
                .put(PutRequest {
                    key: Bytes::from(format!("k{:05}", i)),
                    value: Bytes::from(format!("v{:05}", i)),
                })
                .await;
            assert!(response.ok);
        }
        let response = node
            .merge(MergeRequest {
                key: Bytes::from_static(b"k00003"),
                payload: Bytes::from_static(b"merged"),
            })
            .await;
        assert!(response.ok);
        // node dropped without any explicit shutdown
    }

    // when
    let recovered = StoreNode::open(&config(&dir)).await.unwrap();

    // then - every acknowledged write is visible again
    for i in 0..32 {
        let expected = if i == 3 {
            "merged".to_string()
        } else {
            format!("v{:05}", i)
        };
        let value = recovered
            .get(Bytes::from(format!("k{:05}", i)))
            .await
            .unwrap();
        assert_eq!(value, Some(Bytes::from(expected)), "key k{:05}", i);
    }
}

#[tokio::test]
async fn should_keep_accepting_writes_after_recovery() {
    let dir = tempfile::tempdir().unwrap();

    // given
    {
        let node = StoreNode::open(&config(&dir)).await.unwrap();
        node.put(PutRequest {
            key: Bytes::from_static(b"k00001"),
            value: Bytes::from_static(b"before-crash"),
        })
        .await;
    }

    // when - the recovered node takes a newer write for the same key
    let recovered = StoreNode::open(&config(&dir)).await.unwrap();
    let response = recovered
        .merge(MergeRequest {
            key: Bytes::from_static(b"k00001"),
            payload: Bytes::from_static(b"after-crash"),
        })
        .await;
    assert!(response.ok);

    // then - the post-recovery write wins now and after another reopen
    assert_eq!(
        recovered.get(Bytes::from_static(b"k00001")).await.unwrap(),
        Some(Bytes::from_static(b"after-crash"))
    );
    drop(recovered);

    let reopened = StoreNode::open(&config(&dir)).await.unwrap();
    assert_eq!(
        reopened.get(Bytes::from_static(b"k00001")).await.unwrap(),
        Some(Bytes::from_static(b"after-crash"))
    );
}

#[tokio::test]
async fn should_recover_entries_before_a_torn_tail() {
    let dir = tempfile::tempdir().unwrap();
    let single_shard = StoreNodeConfig {
        shard_count: 1,
        wal_dir: Some(dir.path().to_path_buf()),
    };

    // given - two acknowledged writes, then a crash tears the last frame
    {
        let node = StoreNode::open(&single_shard).await.unwrap();
        node.put(PutRequest {
            key: Bytes::from_static(b"a"),
            value: Bytes::from_static(b"1"),
        })
        .await;
        node.put(PutRequest {
            key: Bytes::from_static(b"b"),
            value: Bytes::from_static(b"2"),
        })
        .await;
    }
    let wal_path = dir.path().join("shard_00000.wal");
    let data = std::fs::read(&wal_path).unwrap();
    std::fs::write(&wal_path, &data[..data.len() - 1]).unwrap();

    // when
    let recovered = StoreNode::open(&single_shard).await.unwrap();

    // then - the intact entry survives, the torn one is gone
    assert_eq!(
        recovered.get(Bytes::from_static(b"a")).await.unwrap(),
        Some(Bytes::from_static(b"1"))
    );
    assert_eq!(recovered.get(Bytes::from_static(b"b")).await.unwrap(), None);
}
