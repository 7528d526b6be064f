//! Target profile registry.
//!
//! The set of build targets is closed: each [`Target`] maps to exactly one
//! [`TargetProfile`], and no two targets share the same settings, so a profile
//! read back from an editor file can be identified again with [`identify`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Build targets the project can be analyzed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Web,
    Desktop,
    Ios,
    Android,
}

impl Target {
    /// Every registered target, in display order
    pub const ALL: [Target; 4] = [Target::Web, Target::Desktop, Target::Ios, Target::Android];

    /// Identifier used on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Target::Web => "web",
            Target::Desktop => "desktop",
            Target::Ios => "ios",
            Target::Android => "android",
        }
    }

    /// One-line description for listings
    pub fn description(&self) -> &'static str {
        match self {
            Target::Web => "Browser build (WebAssembly)",
            Target::Desktop => "Native desktop build for the host",
            Target::Ios => "iOS device build",
            Target::Android => "Android device build",
        }
    }

    /// Resolve the profile for this target
    pub fn profile(self) -> TargetProfile {
        let (triple, features, check): (Option<&str>, &[&str], Option<&[&str]>) = match self {
            Target::Web => (
                Some("wasm32-unknown-unknown"),
                &["web"][..],
                Some(&["wasm32-unknown-unknown"][..]),
            ),
            Target::Desktop => (None, &["desktop"][..], None),
            Target::Ios => (
                Some("aarch64-apple-ios"),
                &["mobile"][..],
                Some(&["aarch64-apple-ios"][..]),
            ),
            Target::Android => (
                Some("aarch64-linux-android"),
                &["mobile"][..],
                Some(&["aarch64-linux-android"][..]),
            ),
        };

        TargetProfile {
            target: self,
            settings: ProfileSettings {
                architecture_triple: triple.map(str::to_string),
                features: features.iter().map(|f| f.to_string()).collect(),
                check_targets: check.map(|c| c.iter().map(|t| t.to_string()).collect()),
            },
        }
    }

    /// Comma-separated list of valid names, for error messages
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.name() == wanted)
            .ok_or_else(|| Error::UnknownTarget {
                name: s.to_string(),
                valid: Self::valid_names(),
            })
    }
}

/// The rust-analyzer settings a target needs, without the target's name.
///
/// This is what a codec can recover from an editor file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileSettings {
    /// `None` analyzes for the host
    pub architecture_triple: Option<String>,
    pub features: BTreeSet<String>,
    /// `None` checks all targets
    pub check_targets: Option<Vec<String>>,
}

impl ProfileSettings {
    /// Triple for display, `native` when unset
    pub fn triple_display(&self) -> &str {
        self.architecture_triple.as_deref().unwrap_or("native")
    }

    pub fn features_display(&self) -> String {
        if self.features.is_empty() {
            return String::from("(none)");
        }
        self.features.iter().cloned().collect::<Vec<_>>().join(", ")
    }

    pub fn check_targets_display(&self) -> String {
        match &self.check_targets {
            Some(targets) if !targets.is_empty() => targets.join(", "),
            Some(_) => String::from("(none)"),
            None => String::from("all"),
        }
    }
}

/// A registered target together with its resolved settings.
///
/// Only the registry constructs these; fields are read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetProfile {
    target: Target,
    settings: ProfileSettings,
}

impl TargetProfile {
    pub fn target(&self) -> Target {
        self.target
    }

    pub fn name(&self) -> &'static str {
        self.target.name()
    }

    pub fn architecture_triple(&self) -> Option<&str> {
        self.settings.architecture_triple.as_deref()
    }

    pub fn features(&self) -> &BTreeSet<String> {
        &self.settings.features
    }

    pub fn check_targets(&self) -> Option<&[String]> {
        self.settings.check_targets.as_deref()
    }

    pub fn settings(&self) -> &ProfileSettings {
        &self.settings
    }
}

/// Look up a target profile by name
pub fn profile(name: &str) -> Result<TargetProfile> {
    name.parse::<Target>().map(Target::profile)
}

/// Find the registered target whose settings match exactly
pub fn identify(settings: &ProfileSettings) -> Option<TargetProfile> {
    Target::ALL
        .into_iter()
        .map(Target::profile)
        .find(|p| p.settings() == settings)
}
