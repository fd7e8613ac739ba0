//! GnuPG version detection from `--version` output.

use std::sync::LazyLock;

use regex::Regex;

static VERSION_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^gpg \(GnuPG[^)]*\) (\d+)\.(\d+)(?:\.(\d+))?")
        .inspect_err(|e| tracing::error!(error = %e, "Invalid version pattern"))
        .ok()
});

/// A parsed `major.minor.patch` GnuPG version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GpgVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl GpgVersion {
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse the first line of `gpg --version` output.
    #[must_use]
    pub fn parse(output: &str) -> Option<Self> {
        let pattern = VERSION_LINE.as_ref()?;
        let captures = pattern.captures(output.lines().next()?.trim())?;
        let number = |i: usize| -> Option<u32> {
            captures.get(i).map_or(Some(0), |m| m.as_str().parse().ok())
        };
        Some(Self::new(number(1)?, number(2)?, number(3)?))
    }

    /// Loopback pinentry (passphrases over the command channel) exists from 2.1.
    #[must_use]
    pub fn supports_loopback_pinentry(&self) -> bool {
        *self >= Self::new(2, 1, 0)
    }
}

impl std::fmt::Display for GpgVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
