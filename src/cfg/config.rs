// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::cfg::logger::LoggerConfig;

/// Top-level configuration shared by both binaries (spec §1's "external
/// collaborators" interface): a cache node only ever reads `node` +
/// `runtime` + `logger`; the proxy only ever reads `proxy` + `runtime` +
/// `logger`. Keeping both in one struct means a single YAML file can
/// describe a whole deployment in one document.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub logger: LoggerConfig,
}

/// Cache node settings (spec §6 defaults: port 7000, 512-byte budget, 1s
/// flush).
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct NodeConfig {
    #[serde(default = "default_node_port")]
    pub port: u16,
    #[serde(default = "default_cache_budget_bytes")]
    pub cache_budget_bytes: u64,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    #[serde(default = "default_aof_path")]
    pub aof_path: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            port: default_node_port(),
            cache_budget_bytes: default_cache_budget_bytes(),
            flush_interval_ms: default_flush_interval_ms(),
            aof_path: default_aof_path(),
        }
    }
}

/// Sharding proxy settings (spec §6 defaults: port 8888, 3 virtual-node
/// replicas).
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_port")]
    pub port: u16,
    #[serde(default)]
    pub backends: Vec<String>,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: default_proxy_port(),
            backends: Vec::new(),
            replicas: default_replicas(),
        }
    }
}

/// Shared connection-handling knobs that don't belong to either the node or
/// the proxy specifically.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RuntimeConfig {
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            connection_timeout_ms: default_connection_timeout_ms(),
        }
    }
}

fn default_node_port() -> u16 {
    7000
}
fn default_proxy_port() -> u16 {
    8888
}
fn default_cache_budget_bytes() -> u64 {
    512
}
fn default_flush_interval_ms() -> u64 {
    1000
}
fn default_replicas() -> u32 {
    3
}
fn default_connection_timeout_ms() -> u64 {
    5000
}
fn default_aof_path() -> String {
    "cache.aof".to_string()
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config = serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates cross-field invariants. Every field already has a usable
    /// default from serde; this only rejects combinations no default can
    /// paper over (an explicit zero where the spec requires a positive
    /// value).
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(self.node.cache_budget_bytes > 0, "cache_budget_bytes must be > 0");
        ensure!(self.node.flush_interval_ms > 0, "flush_interval_ms must be > 0");
        ensure!(self.proxy.replicas > 0, "proxy.replicas must be > 0");
        ensure!(
            self.runtime.connection_timeout_ms > 0,
            "connection_timeout_ms must be > 0"
        );
        Ok(())
    }
}
