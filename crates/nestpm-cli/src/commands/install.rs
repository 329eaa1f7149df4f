//! `nestpm install` command implementation.

use super::{fail_with, ErrorInfo};
use miette::{IntoDiagnostic, Result};
use nestpm_core::pkg::{InstallOptions, InstallReport, Installer, PkgError};
use nestpm_core::Config;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Install result for JSON output.
#[derive(Serialize)]
struct InstallResult<'a> {
    ok: bool,
    out_dir: &'a Path,
    installed: &'a [InstallReport],
}

fn error_info(spec: Option<&str>, e: &PkgError) -> ErrorInfo {
    ErrorInfo {
        code: e.code().to_string(),
        message: e.message().to_string(),
        spec: spec.map(str::to_string),
    }
}

pub fn run(
    config: &Config,
    specs: &[String],
    out_dir: &Path,
    options: InstallOptions,
    json: bool,
) -> Result<()> {
    let mut installer = match Installer::from_config(config, options) {
        Ok(installer) => installer,
        Err(e) => fail_with(json, &error_info(None, &e)),
    };

    info!(
        registry = %config.registry,
        cache = %config.cache_dir.display(),
        out_dir = %out_dir.display(),
        "Installing"
    );

    let mut reports = Vec::with_capacity(specs.len());
    for spec in specs {
        match installer.install(spec, out_dir) {
            Ok(report) => {
                if !json {
                    let version = report.version.as_deref().unwrap_or("unversioned");
                    println!("+ {}@{version}", report.name);
                }
                reports.push(report);
            }
            Err(e) => fail_with(json, &error_info(Some(spec), &e)),
        }
    }

    if json {
        let result = InstallResult {
            ok: true,
            out_dir,
            installed: &reports,
        };
        println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);
    } else {
        let installed: usize = reports.iter().map(|r| r.installed).sum();
        let reused: usize = reports.iter().map(|r| r.reused).sum();
        println!(
            "{installed} package(s) installed into {} ({reused} reused from ancestors)",
            out_dir.display()
        );
    }

    Ok(())
}
