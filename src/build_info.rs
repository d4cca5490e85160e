//! Version details stamped at build time, shown by `trackport --version`.

/// Short commit the binary was built from, `unknown` outside a git checkout.
pub const COMMIT: &str = env!("TRACKPORT_COMMIT");

/// Long `--version` text: package version and commit.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("TRACKPORT_COMMIT"),
    ")"
);
