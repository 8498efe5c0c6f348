use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    domain::{Flag, OP_EXPORT_BUILD, OP_PREVIEW_BUILD},
    error::{ModelError, ModelResult},
};

/// Which artifact a build request produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildTarget {
    /// Unminified browser preview served from the session directory.
    Preview,
    /// Full application bundle packaged into a downloadable archive.
    Export,
}

impl BuildTarget {
    /// Operation type used for retry logs and metric samples.
    pub const fn operation_type(&self) -> &'static str {
        match self {
            BuildTarget::Preview => OP_PREVIEW_BUILD,
            BuildTarget::Export => OP_EXPORT_BUILD,
        }
    }

    pub const fn as_label(&self) -> &'static str {
        match self {
            BuildTarget::Preview => "preview",
            BuildTarget::Export => "export",
        }
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

impl FromStr for BuildTarget {
    type Err = ModelError;
    fn from_str(s: &str) -> ModelResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preview" => Ok(BuildTarget::Preview),
            "export" | "release" => Ok(BuildTarget::Export),
            other => Err(ModelError::UnknownTarget(other.to_string())),
        }
    }
}

/// Caller-supplied knobs for an export build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    /// Ask the compiler to minify the bundle. Enabled unless stated otherwise.
    #[serde(default = "Flag::enabled")]
    pub minify: Flag,
    /// Ask the compiler for mobile-oriented output.
    #[serde(default)]
    pub mobile_optimized: Flag,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            minify: Flag::enabled(),
            mobile_optimized: Flag::disabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_parses_and_maps_to_operation_type() {
        assert_eq!("Preview".parse::<BuildTarget>().unwrap(), BuildTarget::Preview);
        assert_eq!(" export ".parse::<BuildTarget>().unwrap(), BuildTarget::Export);
        assert!("apk".parse::<BuildTarget>().is_err());

        assert_eq!(BuildTarget::Preview.operation_type(), "preview_build");
        assert_eq!(BuildTarget::Export.operation_type(), "export_build");
    }

    #[test]
    fn export_options_default_to_minified_desktop() {
        let opts = ExportOptions::default();
        assert!(opts.minify.is_enabled());
        assert!(opts.mobile_optimized.is_disabled());

        let parsed: ExportOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, opts);
    }

    #[test]
    fn export_options_accept_camel_case() {
        let parsed: ExportOptions =
            serde_json::from_str(r#"{"minify":false,"mobileOptimized":true}"#).unwrap();
        assert!(parsed.minify.is_disabled());
        assert!(parsed.mobile_optimized.is_enabled());
    }
}
