// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use serial_test::serial;

use crate::integration_tests::common::{WireClient, spawn_node};

/// spec.md §8 S1: SET, GET, DEL, GET-after-delete over one connection.
#[tokio::test]
#[serial]
async fn basic_round_trip() -> Result<()> {
    let node = spawn_node("roundtrip", 4096).await?;
    let mut client = WireClient::connect(node.port).await?;

    assert_eq!(client.send("SET foo:bar").await?, "DONE");
    assert_eq!(client.send("GET foo").await?, "bar");
    assert_eq!(client.send("DEL foo").await?, "DONE");
    assert_eq!(client.send("GET foo").await?, "NIL");

    node.stop().await;
    Ok(())
}

/// `DEL` always replies `DONE`, even for a key that was never set.
#[tokio::test]
#[serial]
async fn del_on_absent_key_still_replies_done() -> Result<()> {
    let node = spawn_node("del-absent", 4096).await?;
    let mut client = WireClient::connect(node.port).await?;

    assert_eq!(client.send("DEL nope").await?, "DONE");

    node.stop().await;
    Ok(())
}

/// `SELECT` is a no-op that always replies `DONE`, in or out of a
/// transaction.
#[tokio::test]
#[serial]
async fn select_is_an_accepted_noop() -> Result<()> {
    let node = spawn_node("select-noop", 4096).await?;
    let mut client = WireClient::connect(node.port).await?;

    assert_eq!(client.send("SELECT mygroup").await?, "DONE");
    assert_eq!(client.send("SET foo:bar").await?, "DONE");
    assert_eq!(client.send("GET foo").await?, "bar");

    node.stop().await;
    Ok(())
}
