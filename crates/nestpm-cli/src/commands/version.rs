use miette::{IntoDiagnostic, Result};
use nestpm_core::version::{version_string, SCHEMA_VERSION};
use nestpm_core::VERSION;
use serde::Serialize;

#[derive(Serialize)]
struct VersionResult {
    ok: bool,
    version: &'static str,
    schema_version: u32,
}

pub fn run(json: bool) -> Result<()> {
    if json {
        let result = VersionResult {
            ok: true,
            version: VERSION,
            schema_version: SCHEMA_VERSION,
        };
        println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);
    } else {
        println!("{}", version_string());
    }
    Ok(())
}
