// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use serial_test::serial;

use crate::integration_tests::common::{WireClient, spawn_node};

/// spec.md §8 S4: queued commands inside MULTI apply in order at EXEC, and
/// the reply is the last queued command's own reply.
#[tokio::test]
#[serial]
async fn transaction_commits_queued_writes_in_order() -> Result<()> {
    let node = spawn_node("txn-commit", 4096).await?;
    let mut client = WireClient::connect(node.port).await?;

    assert_eq!(client.send("MULTI").await?, "DONE");
    assert_eq!(client.send("SET x:1").await?, "QUEUED");
    assert_eq!(client.send("SET y:2").await?, "QUEUED");
    assert_eq!(client.send("EXEC x").await?, "DONE");

    assert_eq!(client.send("GET x").await?, "1");
    assert_eq!(client.send("GET y").await?, "2");

    node.stop().await;
    Ok(())
}

/// A nested `MULTI` is rejected; the outer transaction's queue survives.
#[tokio::test]
#[serial]
async fn nested_multi_is_rejected_without_losing_the_queue() -> Result<()> {
    let node = spawn_node("txn-nested-multi", 4096).await?;
    let mut client = WireClient::connect(node.port).await?;

    assert_eq!(client.send("MULTI").await?, "DONE");
    assert_eq!(client.send("SET a:1").await?, "QUEUED");
    assert_eq!(client.send("MULTI").await?, "NIL");
    assert_eq!(client.send("EXEC a").await?, "DONE");
    assert_eq!(client.send("GET a").await?, "1");

    node.stop().await;
    Ok(())
}

/// `DISCARD` drops the queue without applying anything, and always replies
/// `DONE` even outside a transaction.
#[tokio::test]
#[serial]
async fn discard_drops_the_queue() -> Result<()> {
    let node = spawn_node("txn-discard", 4096).await?;
    let mut client = WireClient::connect(node.port).await?;

    assert_eq!(client.send("MULTI").await?, "DONE");
    assert_eq!(client.send("SET a:1").await?, "QUEUED");
    assert_eq!(client.send("DISCARD").await?, "DONE");
    assert_eq!(client.send("GET a").await?, "NIL");

    assert_eq!(client.send("DISCARD").await?, "DONE");

    node.stop().await;
    Ok(())
}

/// `EXEC` with no open transaction is an error.
#[tokio::test]
#[serial]
async fn exec_without_multi_is_rejected() -> Result<()> {
    let node = spawn_node("txn-bare-exec", 4096).await?;
    let mut client = WireClient::connect(node.port).await?;

    assert_eq!(client.send("EXEC").await?, "NIL");

    node.stop().await;
    Ok(())
}
