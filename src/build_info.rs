use serde::Serialize;

/// Where a binary came from, git values are captured by `build.rs`.
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub name: String,
    pub crate_version: &'static str,
    pub git_describe: &'static str,
    pub git_hash: &'static str,
}

pub fn build_info(name: &str) -> BuildInfo {
    BuildInfo {
        name: name.to_string(),
        crate_version: env!("CARGO_PKG_VERSION"),
        git_describe: env!("GIT_DESCRIBE"),
        git_hash: env!("GIT_HASH"),
    }
}

/// Print `build_info` as JSON on stdout.
pub fn print_report(name: &str) {
    match serde_json::to_string_pretty(&build_info(name)) {
        Ok(report) => println!("{report}"),
        Err(e) => log::error!("could not format build info, {e}"),
    }
}
