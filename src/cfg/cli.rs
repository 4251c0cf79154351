// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

/// Shared command-line surface for both `cachenode` and `cacheproxy` (spec
/// §6's "CLI surface (minimal): two executables... each accepting a TCP
/// port"). An optional `--config` points at a YAML file in the shape of
/// [`crate::cfg::config::Config`]; `--port` overrides whichever port that
/// binary listens on, winning over both the config file and the built-in
/// default.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a YAML config file. Defaults are used for anything it omits.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Overrides the listen port from the config/default.
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,
}

/// Resolves a possibly-relative path against the current working directory
/// and canonicalizes it.
pub fn resolve_config_path(rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    let canon = abs
        .canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))?;

    Ok(canon)
}
