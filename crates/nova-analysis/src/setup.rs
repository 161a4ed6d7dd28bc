use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Relative order of the two compiler backends within a round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompileOrder {
    /// Primary compiler first; it also sees secondary sources so that
    /// references between the two languages resolve in both directions.
    #[default]
    Mixed,
    PrimaryThenSecondary,
    SecondaryThenPrimary,
}

/// Option lists handed to the two compiler backends.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOptions {
    pub primary: Vec<String>,
    pub secondary: Vec<String>,
}

impl CompileOptions {
    pub fn new(primary: Vec<String>, secondary: Vec<String>) -> Self {
        Self { primary, secondary }
    }
}

/// Configuration fingerprint of one build run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSetup {
    pub output: PathBuf,
    pub options: CompileOptions,
    pub compiler_version: String,
    pub order: CompileOrder,
}

impl BuildSetup {
    pub fn new(
        output: impl Into<PathBuf>,
        options: CompileOptions,
        compiler_version: impl Into<String>,
        order: CompileOrder,
    ) -> Self {
        Self {
            output: output.into(),
            options,
            compiler_version: compiler_version.into(),
            order,
        }
    }

    /// Whether metadata recorded under `other` is a valid starting point for
    /// a build under `self`.
    ///
    /// Differs from `==` only in ignoring the order of option units (see
    /// [`option_units`]).
    pub fn is_equivalent(&self, other: &BuildSetup) -> bool {
        self.output == other.output
            && self.compiler_version == other.compiler_version
            && self.order == other.order
            && same_option_units(&self.options.primary, &other.options.primary)
            && same_option_units(&self.options.secondary, &other.options.secondary)
    }
}

/// Split an option list into units: a flag plus the values that follow it.
///
/// `["-target", "17", "-deprecation"]` becomes `[["-target", "17"], ["-deprecation"]]`.
/// Leading values without a flag form units of their own.
pub fn option_units(options: &[String]) -> Vec<Vec<&str>> {
    let mut units: Vec<Vec<&str>> = Vec::new();
    for option in options {
        let option = option.as_str();
        match units.last_mut() {
            Some(unit) if !option.starts_with('-') && unit[0].starts_with('-') => unit.push(option),
            _ => units.push(vec![option]),
        }
    }
    units
}

fn same_option_units(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a = option_units(a);
    let mut b = option_units(b);
    a.sort();
    b.sort();
    a == b
}
