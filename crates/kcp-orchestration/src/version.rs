//! Resolución de la versión mayor de Kyma.
//!
//! Las versiones "custom" (`PR-<n>`, `main-<sha>`) son builds de pre-release
//! sin versión semántica; para ellas se usa la mayor de la versión por
//! defecto configurada. Cualquier otra versión se parsea como
//! `<major>.<minor>...` y sólo se exige que el primer componente sea numérico.
use crate::error::VersionError;

const CUSTOM_VERSION_PREFIXES: [&str; 2] = ["PR-", "main-"];

pub fn is_custom_version(version: &str) -> bool {
    CUSTOM_VERSION_PREFIXES.iter().any(|p| version.starts_with(p))
}

/// Primer componente antes del primer `.` como entero. No se admiten
/// espacios alrededor del número.
pub fn parse_major_version(version: &str) -> Result<u32, VersionError> {
    let major = version.split('.').next().unwrap_or_default();
    major.parse::<u32>()
         .map_err(|_| VersionError::InvalidMajor(version.to_string()))
}

/// Versión mayor de `version`, o de `default_version` si `version` es custom.
pub fn determine_major_version(version: &str, default_version: &str) -> Result<u32, VersionError> {
    if is_custom_version(version) {
        return parse_major_version(default_version);
    }
    parse_major_version(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_versions_use_default_major() {
        assert_eq!(determine_major_version("PR-1234", "2.4.1"), Ok(2));
        assert_eq!(determine_major_version("main-abcdef", "1.24.3"), Ok(1));
    }

    #[test]
    fn regular_versions_use_leading_component() {
        assert_eq!(determine_major_version("1.24.3", "2.4.1"), Ok(1));
        assert_eq!(determine_major_version("2", "1.0.0"), Ok(2));
        assert_eq!(determine_major_version("2.x-rc1", "1.0.0"), Ok(2));
    }

    #[test]
    fn non_numeric_major_fails() {
        assert_eq!(determine_major_version("abc.1.2", "2.4.1"),
                   Err(VersionError::InvalidMajor("abc.1.2".into())));
        assert!(determine_major_version("", "2.4.1").is_err());
    }

    #[test]
    fn surrounding_whitespace_is_rejected() {
        assert_eq!(parse_major_version(" 2.1"), Err(VersionError::InvalidMajor(" 2.1".into())));
        assert!(parse_major_version("2 .1").is_err());
        assert_eq!(parse_major_version("2.1"), Ok(2));
    }

    #[test]
    fn custom_version_with_broken_default_fails() {
        assert!(determine_major_version("PR-1", "main-123").is_err());
    }

    #[test]
    fn prefixes_are_case_sensitive() {
        assert!(is_custom_version("PR-1"));
        assert!(!is_custom_version("pr-1"));
        assert!(!is_custom_version("1.PR-1"));
    }
}
