//! Tool configuration and the target-version profile.
//!
//! A [`ToolConfig`] is built from defaults, optionally overlaid by a YAML file
//! (`--config`), and injected into the tool facade. Version-gated constructs are
//! decided in exactly one place: [`TargetProfile::supports`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Result;
use crate::err_msg;
use crate::tool::source::LegacyEncoding;

/// Nesting limit shared by the parser and the decoder.
pub const DEFAULT_MAX_DEPTH: usize = 200;

// ============================================================================
// PYTHON VERSION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PythonVersion {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
}

impl PythonVersion {
    pub const fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
        }
    }
}

impl Default for PythonVersion {
    fn default() -> Self {
        PythonVersion::new(3, 12, 0)
    }
}

impl fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

impl FromStr for PythonVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(format!("invalid Python version '{s}'"));
        }
        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| format!("invalid Python version '{s}'"))?;
        }
        if numbers[0] != 3 {
            return Err(format!("unsupported Python major version in '{s}'"));
        }
        Ok(PythonVersion::new(numbers[0], numbers[1], numbers[2]))
    }
}

impl TryFrom<String> for PythonVersion {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PythonVersion> for String {
    fn from(value: PythonVersion) -> Self {
        value.to_string()
    }
}

// ============================================================================
// TARGET PROFILE
// ============================================================================

/// Syntax introduced after Python 3.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// `def f(a, /)`
    PositionalOnlyParams,
    /// `(x := y)`
    NamedExpr,
    /// `match` statements and patterns
    MatchStatement,
    /// `except* E:`
    ExceptStar,
    /// `def f[T]()`, `class C[T]`, `type X = ...`
    TypeParams,
    /// `def f[T = int]()`
    TypeParamDefaults,
}

impl Feature {
    pub fn min_version(&self) -> PythonVersion {
        match self {
            Feature::PositionalOnlyParams | Feature::NamedExpr => PythonVersion::new(3, 8, 0),
            Feature::MatchStatement => PythonVersion::new(3, 10, 0),
            Feature::ExceptStar => PythonVersion::new(3, 11, 0),
            Feature::TypeParams => PythonVersion::new(3, 12, 0),
            Feature::TypeParamDefaults => PythonVersion::new(3, 13, 0),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Feature::PositionalOnlyParams => "positional-only parameters",
            Feature::NamedExpr => "assignment expressions",
            Feature::MatchStatement => "match statements",
            Feature::ExceptStar => "except* clauses",
            Feature::TypeParams => "type parameters",
            Feature::TypeParamDefaults => "type parameter defaults",
        }
    }
}

/// The Python release whose syntax the encoder reports and the decoder targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetProfile {
    pub python_version: PythonVersion,
}

impl TargetProfile {
    pub fn new(python_version: PythonVersion) -> Self {
        Self { python_version }
    }

    pub fn supports(&self, feature: Feature) -> bool {
        self.python_version >= feature.min_version()
    }
}

// ============================================================================
// TOOL CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    pub target: TargetProfile,
    pub max_depth: usize,
    /// Roots searched, in order, when resolving `source_type = module`.
    pub module_search_paths: Vec<PathBuf>,
    /// Tried in order when a source file is not valid UTF-8.
    pub fallback_encodings: Vec<String>,
    /// Schema used by `validate` when the request names none.
    pub schema_path: Option<PathBuf>,
    pub include_metadata: bool,
    pub format_output: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            target: TargetProfile::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            module_search_paths: default_search_paths(),
            fallback_encodings: vec!["cp1252".into(), "latin-1".into()],
            schema_path: None,
            include_metadata: true,
            format_output: true,
        }
    }
}

fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(".")];
    if let Some(python_path) = std::env::var_os("PYTHONPATH") {
        paths.extend(std::env::split_paths(&python_path).filter(|p| !p.as_os_str().is_empty()));
    }
    paths
}

impl ToolConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: ToolConfig = serde_yaml::from_str(text)
            .map_err(|e| err_msg!(Config, "Invalid configuration: {}", e).caused_by(e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            err_msg!(Config, "Cannot read configuration file {}", path.display()).caused_by(e)
        })?;
        tracing::debug!(path = %path.display(), "loading configuration");
        Self::from_yaml_str(&text)
    }

    pub fn with_target(mut self, version: PythonVersion) -> Self {
        self.target = TargetProfile::new(version);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(err_msg!(Config, "max_depth must be at least 1"));
        }
        for label in &self.fallback_encodings {
            if LegacyEncoding::from_label(label).is_none() {
                return Err(err_msg!(Config, "Unsupported fallback encoding '{}'", label)
                    .with_help("supported encodings: cp1252, latin-1, ascii"));
            }
        }
        Ok(())
    }

    pub fn encodings(&self) -> Vec<LegacyEncoding> {
        self.fallback_encodings
            .iter()
            .filter_map(|label| LegacyEncoding::from_label(label))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_parsing_accepts_short_forms() {
        assert_eq!("3.9".parse::<PythonVersion>(), Ok(PythonVersion::new(3, 9, 0)));
        assert_eq!(
            "3.12.1".parse::<PythonVersion>(),
            Ok(PythonVersion::new(3, 12, 1))
        );
        assert!("2.7".parse::<PythonVersion>().is_err());
        assert!("three".parse::<PythonVersion>().is_err());
    }

    #[test]
    fn profile_gates_features_by_version() {
        let old = TargetProfile::new(PythonVersion::new(3, 9, 0));
        assert!(old.supports(Feature::NamedExpr));
        assert!(!old.supports(Feature::MatchStatement));
        assert!(TargetProfile::default().supports(Feature::TypeParams));
    }

    #[test]
    fn yaml_overlays_defaults() {
        let config = ToolConfig::from_yaml_str(
            "target:\n  python_version: \"3.10\"\nmax_depth: 50\n",
        )
        .unwrap();
        assert_eq!(config.max_depth, 50);
        assert_eq!(config.target.python_version, PythonVersion::new(3, 10, 0));
        assert!(config.include_metadata);
        assert_eq!(config.fallback_encodings, vec!["cp1252", "latin-1"]);
    }

    #[test]
    fn yaml_rejects_bad_values() {
        assert!(ToolConfig::from_yaml_str("max_depth: 0\n").is_err());
        assert!(ToolConfig::from_yaml_str("fallback_encodings: [klingon]\n").is_err());
        assert!(ToolConfig::from_yaml_str("unknown_key: 1\n").is_err());
    }
}
