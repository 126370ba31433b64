//! Version and build metadata surfaced by the CLI.

/// Crate version from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Short git commit hash captured by `build.rs`.
pub const GIT_COMMIT: &str = env!("PILOT_BUILD_GIT_HASH");

/// UTC build timestamp captured by `build.rs`.
pub const BUILD_TIMESTAMP: &str = env!("PILOT_BUILD_TIMESTAMP");

/// Trailer appended to `pilot --help`.
pub const HELP_BUILD_METADATA: &str = concat!(
    "Build metadata:\n  commit: ",
    env!("PILOT_BUILD_GIT_HASH"),
    "\n  built: ",
    env!("PILOT_BUILD_TIMESTAMP")
);

/// One-line banner printed when an interactive session starts.
pub fn banner_line() -> String {
    format!("pilot v{VERSION} ({GIT_COMMIT}, built {BUILD_TIMESTAMP})")
}

/// Multi-line text for `pilot --version`.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("PILOT_BUILD_GIT_HASH"),
    "\nbuilt: ",
    env!("PILOT_BUILD_TIMESTAMP")
);
