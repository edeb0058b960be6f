//! Host platform profiling.
//!
//! Derives the [`PlatformKey`] that selects the artefact variant for this
//! host: the operating system family, the CPU architecture, and the runtime
//! version tag. Profiling never fails; unrecognised values are kept in their
//! raw lowercased form and an undetectable runtime version falls back to
//! [`DEFAULT_RUNTIME_VERSION`].

use crate::deps::CommandExecutor;
use log::{debug, warn};
use std::fmt;
use std::str::FromStr;

/// Runtime version used when neither configuration nor the host provide one.
pub const DEFAULT_RUNTIME_VERSION: RuntimeVersion = RuntimeVersion {
    major: 3,
    minor: 11,
};

/// Operating system family, normalised to a closed set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OsFamily {
    /// Microsoft Windows.
    Windows,
    /// Linux.
    Linux,
    /// macOS and other Darwin-based systems.
    Darwin,
    /// Any other host, carrying the raw lowercased name.
    Other(String),
}

impl OsFamily {
    /// Normalise a host-reported OS name.
    ///
    /// # Examples
    ///
    /// ```
    /// use vorto_loader::platform::OsFamily;
    ///
    /// assert_eq!(OsFamily::from_host("macos"), OsFamily::Darwin);
    /// assert_eq!(OsFamily::from_host("Linux"), OsFamily::Linux);
    /// assert_eq!(OsFamily::from_host("FreeBSD").to_string(), "freebsd");
    /// ```
    #[must_use]
    pub fn from_host(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        match lowered.as_str() {
            "windows" => Self::Windows,
            "linux" => Self::Linux,
            "darwin" | "macos" => Self::Darwin,
            _ => Self::Other(lowered),
        }
    }

    /// Return the lowercase family name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::Darwin => "darwin",
            Self::Other(raw) => raw,
        }
    }

    /// Whether this is a Windows host.
    #[must_use]
    pub fn is_windows(&self) -> bool {
        matches!(self, Self::Windows)
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `<major>.<minor>` runtime version tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeVersion {
    major: u32,
    minor: u32,
}

impl RuntimeVersion {
    /// Create a version from its components.
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Return the major component.
    #[must_use]
    pub const fn major(&self) -> u32 {
        self.major
    }

    /// Return the minor component.
    #[must_use]
    pub const fn minor(&self) -> u32 {
        self.minor
    }

    /// Return the version without a separator, e.g. `311` for `3.11`.
    #[must_use]
    pub fn compact(&self) -> String {
        format!("{}{}", self.major, self.minor)
    }

    /// Extract a version from free-form tool output such as `Python 3.11.4`.
    ///
    /// The first whitespace-separated token that parses as a version wins;
    /// any patch component is discarded.
    ///
    /// # Examples
    ///
    /// ```
    /// use vorto_loader::platform::RuntimeVersion;
    ///
    /// let version = RuntimeVersion::scan("Python 3.12.1\n").expect("version");
    /// assert_eq!(version.to_string(), "3.12");
    /// ```
    #[must_use]
    pub fn scan(text: &str) -> Option<Self> {
        text.split_whitespace().find_map(|token| token.parse().ok())
    }
}

impl FromStr for RuntimeVersion {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.trim().split('.');
        let major = parts.next().and_then(|p| p.parse::<u32>().ok());
        let minor = parts.next().and_then(|p| p.parse::<u32>().ok());
        match (major, minor) {
            (Some(major), Some(minor)) => Ok(Self { major, minor }),
            _ => Err(format!(
                "expected a version of the form <major>.<minor>, got \"{value}\""
            )),
        }
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// The tuple that selects the artefact variant for a host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlatformKey {
    os_family: OsFamily,
    cpu_arch: String,
    runtime_version: RuntimeVersion,
}

impl PlatformKey {
    /// Create a key from already-normalised components.
    #[must_use]
    pub fn new(os_family: OsFamily, cpu_arch: &str, runtime_version: RuntimeVersion) -> Self {
        Self {
            os_family,
            cpu_arch: cpu_arch.trim().to_lowercase(),
            runtime_version,
        }
    }

    /// Return the operating system family.
    #[must_use]
    pub fn os_family(&self) -> &OsFamily {
        &self.os_family
    }

    /// Return the lowercased CPU architecture.
    #[must_use]
    pub fn cpu_arch(&self) -> &str {
        &self.cpu_arch
    }

    /// Return the runtime version tag.
    #[must_use]
    pub fn runtime_version(&self) -> RuntimeVersion {
        self.runtime_version
    }

    /// Return the loadable-extension suffix for this platform.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        if self.os_family.is_windows() {
            ".pyd"
        } else {
            ".so"
        }
    }
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, runtime {}",
            self.os_family, self.cpu_arch, self.runtime_version
        )
    }
}

/// Source of raw host facts, abstracted for testing.
#[cfg_attr(test, mockall::automock)]
pub trait HostProbe {
    /// Host-reported operating system name.
    fn os(&self) -> String;

    /// Host-reported CPU architecture.
    fn arch(&self) -> String;

    /// Raw runtime version output, if the runtime could be queried.
    fn runtime_version(&self) -> Option<String>;
}

/// Probes the live host, querying the runtime interpreter for its version.
pub struct SystemProbe<'a> {
    executor: &'a dyn CommandExecutor,
    interpreter: String,
}

impl<'a> SystemProbe<'a> {
    /// Create a probe that runs `interpreter --version` through `executor`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, interpreter: &str) -> Self {
        Self {
            executor,
            interpreter: interpreter.to_owned(),
        }
    }
}

impl HostProbe for SystemProbe<'_> {
    fn os(&self) -> String {
        std::env::consts::OS.to_owned()
    }

    fn arch(&self) -> String {
        std::env::consts::ARCH.to_owned()
    }

    fn runtime_version(&self) -> Option<String> {
        let output = match self.executor.run(&self.interpreter, &["--version"]) {
            Ok(output) => output,
            Err(e) => {
                debug!("runtime probe: failed to run {}: {e}", self.interpreter);
                return None;
            }
        };
        if !output.status.success() {
            debug!(
                "runtime probe: {} exited with {}",
                self.interpreter, output.status
            );
            return None;
        }
        // Older interpreters report their version on stderr.
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push(' ');
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Some(text)
    }
}

/// Return the interpreter probed for the runtime version on this host.
#[must_use]
pub fn default_interpreter() -> &'static str {
    if cfg!(windows) { "python" } else { "python3" }
}

/// Derive the platform key for this run.
///
/// A configured `runtime_override` takes precedence over the probed runtime
/// version; when neither is available [`DEFAULT_RUNTIME_VERSION`] is used.
#[must_use]
pub fn profile(probe: &dyn HostProbe, runtime_override: Option<RuntimeVersion>) -> PlatformKey {
    let os_family = OsFamily::from_host(&probe.os());
    let arch = probe.arch();
    let runtime_version = runtime_override
        .or_else(|| probe.runtime_version().as_deref().and_then(RuntimeVersion::scan))
        .unwrap_or_else(|| {
            warn!("could not detect runtime version; assuming {DEFAULT_RUNTIME_VERSION}");
            DEFAULT_RUNTIME_VERSION
        });
    PlatformKey::new(os_family, &arch, runtime_version)
}
