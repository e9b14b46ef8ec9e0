//! Per-language discovery front-ends (§4.9): locate modules, enumerate
//! packages, classify source vs. build output, apply exclusion
//! patterns, derive package paths.

pub mod go_discovery;
pub mod ts_discovery;

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct DiscoveredPackage {
    pub pkg_path: String,
    pub dir: PathBuf,
    pub is_main: bool,
    pub is_test: bool,
}

#[derive(Debug, Clone)]
pub struct DiscoveredModule {
    pub name: String,
    pub dir: PathBuf,
    pub packages: Vec<DiscoveredPackage>,
}

/// Builds the default exclusion set plus any caller-supplied regexes
/// (`--excludes`), used uniformly by both front-ends' tree walks.
pub fn build_exclusions(user_patterns: &[String]) -> Vec<regex::Regex> {
    let defaults = [
        r"(^|/)\.git(/|$)",
        r"(^|/)node_modules(/|$)",
        r"(^|/)vendor(/|$)",
        r"(^|/)dist(/|$)",
        r"(^|/)build(/|$)",
    ];
    defaults
        .iter()
        .map(|p| regex::Regex::new(p).expect("built-in exclusion pattern is valid"))
        .chain(user_patterns.iter().filter_map(|p| regex::Regex::new(p).ok()))
        .collect()
}

pub fn is_excluded(relative_path: &std::path::Path, patterns: &[regex::Regex]) -> bool {
    let text = relative_path.to_string_lossy();
    patterns.iter().any(|re| re.is_match(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn default_exclusions_cover_node_modules_and_vendor() {
        let patterns = build_exclusions(&[]);
        assert!(is_excluded(Path::new("node_modules/x"), &patterns));
        assert!(is_excluded(Path::new("vendor/github.com/x"), &patterns));
        assert!(!is_excluded(Path::new("src/main.go"), &patterns));
    }

    #[test]
    fn user_patterns_are_appended() {
        let patterns = build_exclusions(&["generated/.*".to_string()]);
        assert!(is_excluded(Path::new("generated/api.go"), &patterns));
    }
}
