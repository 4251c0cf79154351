// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use serial_test::serial;
use shardcache::cache::entry::entry_size;

use crate::integration_tests::common::{WireClient, spawn_node};

/// spec.md §8 S3: with a budget sized for exactly two one-byte-key/
/// one-byte-value entries, touching `a` keeps it alive while `b` is evicted
/// by the next `SET`.
#[tokio::test]
#[serial]
async fn capacity_pressure_evicts_the_lru_tail() -> Result<()> {
    let budget = entry_size("a", b"1") as u64 * 2;
    let node = spawn_node("lru-eviction", budget).await?;
    let mut client = WireClient::connect(node.port).await?;

    assert_eq!(client.send("SET a:1").await?, "DONE");
    assert_eq!(client.send("SET b:2").await?, "DONE");
    assert_eq!(client.send("GET a").await?, "1"); // a is now MRU, b is the tail
    assert_eq!(client.send("SET c:3").await?, "DONE"); // evicts b

    assert_eq!(client.send("GET b").await?, "NIL");
    assert_eq!(client.send("GET a").await?, "1");
    assert_eq!(client.send("GET c").await?, "3");

    node.stop().await;
    Ok(())
}
