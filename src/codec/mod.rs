//! Backend config codecs.
//!
//! Each editor backend gets a matched writer/reader pair:
//! - [`vscode`] renders rust-analyzer keys into `.vscode/settings.json`.
//! - [`emacs`] renders an eglot workspace configuration into `.dir-locals.el`,
//!   reading it back with the small s-expression reader in [`sexp`].
//!
//! Readers only look at the keys they own and never fail: anything they
//! cannot make sense of is reported as [`ParseOutcome::Unrecognized`].

pub mod emacs;
pub mod sexp;
pub mod vscode;

use crate::target::{self, ProfileSettings, TargetProfile};

/// Result of reading a backend file back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The owned settings match a registered target
    Recognized(TargetProfile),
    /// The owned settings are well-formed but match no registered target
    UnknownTarget(ProfileSettings),
    /// Required settings are missing or malformed
    Unrecognized,
}

impl ParseOutcome {
    /// Map extracted settings onto the registry
    pub fn from_settings(settings: ProfileSettings) -> Self {
        match target::identify(&settings) {
            Some(profile) => Self::Recognized(profile),
            None => Self::UnknownTarget(settings),
        }
    }
}

/// Writer/reader pair for one backend's file syntax
pub trait Codec: Sync {
    /// Render a complete file for `profile`
    fn render(&self, profile: &TargetProfile) -> String;

    /// Render `profile` on top of an existing file.
    ///
    /// The default replaces the whole file.
    fn merge(&self, existing: &str, profile: &TargetProfile) -> String {
        let _ = existing;
        self.render(profile)
    }

    /// Extract the owned settings from a file
    fn parse(&self, text: &str) -> ParseOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Target;

    fn codecs() -> [&'static dyn Codec; 2] {
        [&vscode::VsCodeCodec, &emacs::EmacsCodec]
    }

    #[test]
    fn test_round_trip_every_target_and_backend() {
        for codec in codecs() {
            for target in Target::ALL {
                let profile = target.profile();
                let rendered = codec.render(&profile);
                assert_eq!(
                    codec.parse(&rendered),
                    ParseOutcome::Recognized(profile.clone()),
                    "round trip failed for {target}:\n{rendered}"
                );
            }
        }
    }

    #[test]
    fn test_render_is_deterministic_and_merge_stable() {
        for codec in codecs() {
            for target in Target::ALL {
                let profile = target.profile();
                let first = codec.render(&profile);
                assert_eq!(first, codec.render(&profile));
                assert_eq!(codec.merge(&first, &profile), first);
            }
        }
    }

    #[test]
    fn test_garbage_is_unrecognized() {
        for codec in codecs() {
            assert_eq!(codec.parse(""), ParseOutcome::Unrecognized);
            assert_eq!(codec.parse("not a config ((("), ParseOutcome::Unrecognized);
        }
    }
}
