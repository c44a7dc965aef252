// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Command line and configuration loading.
//!
//! Rule sources come from a main YAML config, per-list files, or both; list
//! arguments are glob patterns so a rules directory can be pulled in with
//! one flag. Service settings resolve with the usual precedence: command
//! line over config file over built-in default.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use koral_engine::Engine;

pub const DEFAULT_PORT: u16 = 5725;
pub const DEFAULT_LOGLEVEL: &str = "info";

#[derive(Debug, Parser)]
#[command(
    name = "koral-mapper",
    about = "Rewrites KoralQuery annotation trees and snippets between annotation schemes",
    version
)]
pub struct Args {
    /// Main YAML configuration file
    #[arg(short, long, env = "KORAL_MAPPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Additional rule-list files; glob patterns are expanded
    #[arg(short, long = "list", value_name = "GLOB")]
    pub lists: Vec<String>,

    /// Port to listen on
    #[arg(short, long, env = "KORAL_MAPPER_PORT")]
    pub port: Option<u16>,

    /// Log level filter, e.g. `info` or `koral_engine=debug`
    #[arg(long, env = "KORAL_MAPPER_LOGLEVEL")]
    pub loglevel: Option<String>,
}

/// Effective service settings after merging all sources.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub port: u16,
    pub loglevel: String,
}

/// Reads every configured source and builds the engine. Any configuration
/// or rule-compilation failure aborts startup.
pub fn load(args: &Args) -> anyhow::Result<(Settings, Engine)> {
    let main_source = args
        .config
        .as_ref()
        .map(|path| {
            fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))
        })
        .transpose()?;
    let mut list_sources = Vec::new();
    for pattern in &args.lists {
        let paths = glob::glob(pattern)
            .with_context(|| format!("bad list pattern {pattern:?}"))?
            .collect::<Result<Vec<_>, _>>()?;
        if paths.is_empty() {
            bail!("no files match list pattern {pattern:?}");
        }
        for path in paths {
            let source = fs::read_to_string(&path)
                .with_context(|| format!("reading list file {}", path.display()))?;
            list_sources.push(source);
        }
    }
    let refs: Vec<&str> = list_sources.iter().map(String::as_str).collect();
    let (config, engine) = Engine::from_yaml_sources(main_source.as_deref(), &refs)
        .context("loading mapping lists")?;
    let settings = Settings {
        port: args.port.or(config.port).unwrap_or(DEFAULT_PORT),
        loglevel: args
            .loglevel
            .clone()
            .or(config.loglevel)
            .unwrap_or_else(|| DEFAULT_LOGLEVEL.to_string()),
    };
    Ok((settings, engine))
}
