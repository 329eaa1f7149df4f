pub mod cache;
pub mod install;
pub mod version;

use serde::Serialize;

/// Error code for an unreadable `nestpm.json`.
pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

/// Error info for JSON output.
#[derive(Debug, Serialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
}

#[derive(Serialize)]
struct Failure<'a> {
    ok: bool,
    error: &'a ErrorInfo,
}

/// Print a failure and exit with status 1.
pub fn fail(json: bool, code: &str, message: &str) -> ! {
    fail_with(
        json,
        &ErrorInfo {
            code: code.to_string(),
            message: message.to_string(),
            spec: None,
        },
    )
}

/// Print a failure described by `error` and exit with status 1.
pub fn fail_with(json: bool, error: &ErrorInfo) -> ! {
    if json {
        let failure = Failure { ok: false, error };
        match serde_json::to_string_pretty(&failure) {
            Ok(text) => println!("{text}"),
            Err(_) => println!(r#"{{"ok":false}}"#),
        }
    } else {
        match &error.spec {
            Some(spec) => eprintln!("error: {spec}: {}: {}", error.code, error.message),
            None => eprintln!("error: {}: {}", error.code, error.message),
        }
    }
    std::process::exit(1);
}
