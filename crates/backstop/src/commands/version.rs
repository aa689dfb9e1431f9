//! Version command

use crate::cli::VersionArgs;
use anyhow::Result;
use serde::Serialize;

/// Build metadata baked in by build.rs
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub version: &'static str,
    pub commit: Option<&'static str>,
    pub build_date: Option<&'static str>,
    pub target: Option<&'static str>,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            commit: option_env!("GIT_SHA"),
            build_date: option_env!("BUILD_DATE"),
            target: option_env!("TARGET"),
        }
    }
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "backstop {}", self.version)?;
        if let Some(commit) = self.commit {
            write!(f, " ({})", commit)?;
        }
        if let Some(target) = self.target {
            write!(f, " {}", target)?;
        }
        Ok(())
    }
}

pub fn run(args: VersionArgs) -> Result<()> {
    let info = VersionInfo::current();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("{}", info);
        if let Some(date) = info.build_date {
            println!("Build date: {}", date);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info_current_is_valid_semver() {
        let info = VersionInfo::current();
        assert!(
            semver::Version::parse(info.version).is_ok(),
            "version should be valid semver, got: {}",
            info.version
        );
    }

    #[test]
    fn test_display_with_all_fields() {
        let info = VersionInfo {
            version: "1.2.3",
            commit: Some("abc1234"),
            build_date: Some("2026-01-01"),
            target: Some("x86_64-unknown-linux-gnu"),
        };
        assert_eq!(
            info.to_string(),
            "backstop 1.2.3 (abc1234) x86_64-unknown-linux-gnu"
        );
    }

    #[test]
    fn test_display_without_optional_fields() {
        let info = VersionInfo {
            version: "0.1.0",
            commit: None,
            build_date: None,
            target: None,
        };
        assert_eq!(info.to_string(), "backstop 0.1.0");
    }

    #[test]
    fn test_json_output_contains_version() {
        let json = serde_json::to_string(&VersionInfo::current()).unwrap();
        assert!(json.contains(env!("CARGO_PKG_VERSION")));
    }
}
