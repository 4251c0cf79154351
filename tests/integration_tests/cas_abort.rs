// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use serial_test::serial;

use crate::integration_tests::common::{WireClient, spawn_node};

/// spec.md §8 S5: session A watches `k`, queues a write inside MULTI;
/// meanwhile session B writes `k` directly. A's EXEC must abort with `NIL`
/// and leave B's write in place.
#[tokio::test]
#[serial]
async fn concurrent_write_aborts_the_watchers_transaction() -> Result<()> {
    let node = spawn_node("cas-abort", 4096).await?;
    let mut a = WireClient::connect(node.port).await?;
    let mut b = WireClient::connect(node.port).await?;

    assert_eq!(a.send("WATCH k").await?, "DONE");
    assert_eq!(a.send("MULTI").await?, "DONE");
    assert_eq!(a.send("SET k:new").await?, "QUEUED");

    assert_eq!(b.send("SET k:other").await?, "DONE");

    assert_eq!(a.send("EXEC k").await?, "NIL");
    assert_eq!(a.send("GET k").await?, "other");

    node.stop().await;
    Ok(())
}

/// Without any intervening write to the watched key itself, EXEC commits
/// normally (the queued write here targets an unrelated key, so nothing
/// ever calls `NotifyModified` on `k`).
#[tokio::test]
#[serial]
async fn exec_succeeds_when_watched_key_was_left_alone() -> Result<()> {
    let node = spawn_node("cas-clean", 4096).await?;
    let mut client = WireClient::connect(node.port).await?;

    assert_eq!(client.send("WATCH k").await?, "DONE");
    assert_eq!(client.send("MULTI").await?, "DONE");
    assert_eq!(client.send("SET other:v").await?, "QUEUED");
    assert_eq!(client.send("EXEC other").await?, "DONE");
    assert_eq!(client.send("GET other").await?, "v");

    node.stop().await;
    Ok(())
}

/// `UNWATCH` removes the key from the session's watch set, so a later write
/// by another session no longer aborts this one's transaction.
#[tokio::test]
#[serial]
async fn unwatch_stops_future_cas_aborts() -> Result<()> {
    let node = spawn_node("cas-unwatch", 4096).await?;
    let mut a = WireClient::connect(node.port).await?;
    let mut b = WireClient::connect(node.port).await?;

    assert_eq!(a.send("WATCH k").await?, "DONE");
    assert_eq!(a.send("UNWATCH k").await?, "DONE");
    assert_eq!(a.send("MULTI").await?, "DONE");
    assert_eq!(a.send("SET k:mine").await?, "QUEUED");

    assert_eq!(b.send("SET k:other").await?, "DONE");

    assert_eq!(a.send("EXEC k").await?, "DONE");
    assert_eq!(a.send("GET k").await?, "mine");

    node.stop().await;
    Ok(())
}
