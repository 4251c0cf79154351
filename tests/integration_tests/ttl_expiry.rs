// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use serial_test::serial;
use tokio::time::{Duration, sleep};

use crate::integration_tests::common::{WireClient, spawn_node};

/// spec.md §8 S2: `EXPR` followed by a sleep past the deadline makes `GET`
/// report a miss, via the live node's real system clock.
#[tokio::test]
#[serial]
async fn key_expires_after_its_ttl() -> Result<()> {
    let node = spawn_node("ttl-expiry", 4096).await?;
    let mut client = WireClient::connect(node.port).await?;

    assert_eq!(client.send("SET k:v").await?, "DONE");
    assert_eq!(client.send("EXPR k:50").await?, "DONE");

    sleep(Duration::from_millis(150)).await;

    assert_eq!(client.send("GET k").await?, "NIL");

    node.stop().await;
    Ok(())
}

/// `EXPR k:0` clears any TTL; the key never expires afterward.
#[tokio::test]
#[serial]
async fn zero_ttl_means_no_expiry() -> Result<()> {
    let node = spawn_node("ttl-zero", 4096).await?;
    let mut client = WireClient::connect(node.port).await?;

    assert_eq!(client.send("SET k:v").await?, "DONE");
    assert_eq!(client.send("EXPR k:0").await?, "DONE");

    sleep(Duration::from_millis(100)).await;

    assert_eq!(client.send("GET k").await?, "v");

    node.stop().await;
    Ok(())
}

/// An `EXPR` on a nonexistent key parses fine and still replies `DONE`
/// (the store's `set_expire` is a harmless no-op for a missing key).
#[tokio::test]
#[serial]
async fn expr_invalid_ms_is_rejected() -> Result<()> {
    let node = spawn_node("ttl-bad-ms", 4096).await?;
    let mut client = WireClient::connect(node.port).await?;

    assert_eq!(client.send("SET k:v").await?, "DONE");
    assert_eq!(client.send("EXPR k:notanumber").await?, "wrong command");

    node.stop().await;
    Ok(())
}
