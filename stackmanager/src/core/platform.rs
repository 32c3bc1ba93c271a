//! Host platform identification

use std::fmt;

/// Operating systems the release manifest publishes builds for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    Mac,
    Linux,
}

impl Platform {
    /// Platform this binary was compiled for
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::Mac
        } else {
            Platform::Linux
        }
    }

    /// Platform name used in the release manifest
    pub fn manifest_name(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Mac => "mac",
            Platform::Linux => "ubuntu",
        }
    }

    /// Parse a manifest platform name, `None` for platforms we do not ship
    pub fn from_manifest_name(name: &str) -> Option<Self> {
        match name.trim() {
            "windows" => Some(Platform::Windows),
            "mac" => Some(Platform::Mac),
            "ubuntu" => Some(Platform::Linux),
            _ => None,
        }
    }

    /// Path segment used on the download host
    pub fn download_segment(&self) -> &'static str {
        match self {
            Platform::Windows => "win",
            Platform::Mac => "mac",
            Platform::Linux => "linux",
        }
    }

    /// File whose presence in the launch directory shows the runtime bundle is unpacked
    pub fn runtime_probe(&self) -> &'static str {
        match self {
            Platform::Windows => "Qt5Core.dll",
            Platform::Mac => "QtCore.framework",
            Platform::Linux => "libQt5Core.so.5",
        }
    }

    pub fn executable_suffix(&self) -> &'static str {
        match self {
            Platform::Windows => ".exe",
            Platform::Mac | Platform::Linux => "",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.manifest_name())
    }
}
