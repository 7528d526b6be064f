//! `.dir-locals.el` codec.
//!
//! The profile is written as an `eglot-workspace-configuration` plist that
//! applies to every mode in the project. The file is owned as a whole: a
//! switch replaces it, and the previous version goes to the backup slot.

use super::sexp::{self, Sexp, quote_string};
use super::{Codec, ParseOutcome};
use crate::target::{ProfileSettings, TargetProfile};

pub const CONFIG_VARIABLE: &str = "eglot-workspace-configuration";

const HEADER: &str = "\
;;; Directory Local Variables            -*- no-byte-compile: t -*-
;;; Managed by edtarget: run `edtarget switch <target>` instead of editing.

";

/// Codec for Emacs directory-local variables
#[derive(Debug, Clone, Copy, Default)]
pub struct EmacsCodec;

impl Codec for EmacsCodec {
    fn render(&self, profile: &TargetProfile) -> String {
        let target = profile
            .architecture_triple()
            .map(quote_string)
            .unwrap_or_else(|| String::from("nil"));
        let features = vector(profile.features().iter());
        let checks = profile
            .check_targets()
            .map(|targets| vector(targets.iter()))
            .unwrap_or_else(|| String::from("nil"));

        let lines = [
            format!("((nil . (({CONFIG_VARIABLE}"),
            String::from("          . (:rust-analyzer"),
            format!("             (:cargo (:target {target}"),
            format!("                      :features {features})"),
            format!("              :check (:targets {checks})))))))"),
        ];
        format!("{HEADER}{}\n", lines.join("\n"))
    }

    fn parse(&self, text: &str) -> ParseOutcome {
        let form = match sexp::read(text) {
            Ok(form) => form,
            Err(e) => {
                tracing::debug!(".dir-locals.el could not be read: {e}");
                return ParseOutcome::Unrecognized;
            }
        };

        form.alist_entries()
            .into_iter()
            .find_map(|(_mode, variables)| variables.alist_get(CONFIG_VARIABLE))
            .and_then(|config| extract(&config))
            .map(ParseOutcome::from_settings)
            .unwrap_or(ParseOutcome::Unrecognized)
    }
}

fn vector<'a>(items: impl Iterator<Item = &'a String>) -> String {
    let quoted: Vec<String> = items.map(|s| quote_string(s)).collect();
    format!("[{}]", quoted.join(" "))
}

/// JSON null in eglot's encoding
fn is_null(value: &Sexp) -> bool {
    value.is_nil() || value.as_symbol() == Some(":null")
}

fn strings(value: &Sexp) -> Option<Vec<String>> {
    match value {
        Sexp::Vector(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

fn extract(config: &Sexp) -> Option<ProfileSettings> {
    let analyzer = config.plist_get(":rust-analyzer")?;
    let cargo = analyzer.plist_get(":cargo")?;

    let target = cargo.plist_get(":target")?;
    let architecture_triple = if is_null(target) {
        None
    } else {
        Some(target.as_str()?.to_string())
    };

    let features = strings(cargo.plist_get(":features")?)?.into_iter().collect();

    let check_targets = match analyzer.plist_get(":check").and_then(|c| c.plist_get(":targets")) {
        None => None,
        Some(value) if is_null(value) => None,
        Some(value) => Some(strings(value)?),
    };

    Some(ProfileSettings {
        architecture_triple,
        features,
        check_targets,
    })
}
