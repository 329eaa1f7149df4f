//! `nestpm cache` command implementation.

use super::{fail_with, ErrorInfo};
use miette::{IntoDiagnostic, Result};
use nestpm_core::pkg::Blobstore;
use nestpm_core::Config;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct CacheCleanResult<'a> {
    ok: bool,
    path: &'a Path,
    removed: usize,
}

#[derive(Serialize)]
struct CachePathResult<'a> {
    ok: bool,
    path: &'a Path,
    entries: usize,
}

pub fn clean(config: &Config, json: bool) -> Result<()> {
    let store = Blobstore::new(&config.cache_dir);
    let removed = match store.clear() {
        Ok(n) => n,
        Err(e) => fail_with(
            json,
            &ErrorInfo {
                code: e.code().to_string(),
                message: e.message().to_string(),
                spec: None,
            },
        ),
    };

    if json {
        let result = CacheCleanResult {
            ok: true,
            path: store.root(),
            removed,
        };
        println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);
    } else {
        println!("Removed {removed} entries from {}", store.root().display());
    }
    Ok(())
}

pub fn path(config: &Config, json: bool) -> Result<()> {
    let store = Blobstore::new(&config.cache_dir);

    if json {
        let result = CachePathResult {
            ok: true,
            path: store.root(),
            entries: store.entry_count().unwrap_or(0),
        };
        println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);
    } else {
        println!("{}", store.root().display());
    }
    Ok(())
}
