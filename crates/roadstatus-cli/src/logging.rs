//! Tracing subscriber setup for the `roadstatus` binary.
//!
//! Logs go to stderr so stdout carries only road statuses. `RUST_LOG` always
//! wins; otherwise the level comes from `--verbose`/`--quiet` or their
//! environment equivalents.

use tracing_subscriber::EnvFilter;

const VERBOSE_VARS: [&str; 2] = ["ROADSTATUS_VERBOSE", "TFL_VERBOSE"];
const QUIET_VARS: [&str; 2] = ["ROADSTATUS_QUIET", "TFL_QUIET"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    /// Combines the CLI flags with the environment. Verbose beats quiet.
    pub(crate) fn resolve<F>(verbose_flag: bool, quiet_flag: bool, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if is_enabled(verbose_flag, &VERBOSE_VARS, &lookup) {
            Self::Verbose
        } else if is_enabled(quiet_flag, &QUIET_VARS, &lookup) {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    /// Filter directive used when `RUST_LOG` is unset.
    pub(crate) fn directive(self) -> &'static str {
        match self {
            Self::Verbose => "debug",
            Self::Normal | Self::Quiet => "error",
        }
    }
}

/// `true` if the flag is set or any of `vars` holds `1` or `true`
/// (case-insensitive).
fn is_enabled<F>(flag: bool, vars: &[&str], lookup: &F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    flag || vars.iter().any(|var| {
        lookup(var).is_some_and(|value| {
            let value = value.trim();
            value == "1" || value.eq_ignore_ascii_case("true")
        })
    })
}

/// Installs the global fmt subscriber writing to stderr.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub(crate) fn init_tracing(verbosity: Verbosity) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(verbosity.directive()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(verbosity == Verbosity::Verbose)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}
