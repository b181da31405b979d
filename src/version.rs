//! Version information for the weather-cluster binary.
//!
//! The git revision is embedded when the build sets `WEATHER_CLUSTER_GIT_REV`.

use std::sync::LazyLock;

/// The package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git revision of the build (empty string if not set).
pub const GIT_REV: &str = match option_env!("WEATHER_CLUSTER_GIT_REV") {
    Some(rev) => rev,
    None => "",
};

static FULL_VERSION: LazyLock<String> = LazyLock::new(|| {
    if GIT_REV.is_empty() {
        PKG_VERSION.to_string()
    } else {
        format!("{} ({})", PKG_VERSION, GIT_REV)
    }
});

/// Returns the full version string for display.
///
/// `"X.Y.Z (abcdef0)"` when a git revision was embedded, `"X.Y.Z"` otherwise.
pub fn full_version() -> &'static str {
    FULL_VERSION.as_str()
}
