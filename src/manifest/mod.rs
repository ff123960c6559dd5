//! go.mod parser
//!
//! Parses go.mod files into the root module path and one dependency record
//! per require directive. Supports both single-line require directives and
//! require blocks, and filters out dependencies overridden by replace
//! directives.
//!
//! Format examples:
//! - Single: `require golang.org/x/text v0.14.0`
//! - Block:
//!   ```text
//!   require (
//!       golang.org/x/text v0.14.0
//!       golang.org/x/net v0.20.0 // indirect
//!   )
//!   ```

use regex::Regex;
use thiserror::Error;

use crate::module::{Module, parse_go_version};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("go.mod file does not contain a module declaration")]
    MissingModuleDirective,

    #[error("invalid version '{version}' for module '{path}'")]
    InvalidVersion { path: String, version: String },
}

/// Parser for go.mod files
pub struct GoModParser {
    /// Regex for the module directive: `module example.com/name`
    module_re: Regex,
    /// Regex for single-line require: `require module/path v1.2.3`
    single_require_re: Regex,
    /// Regex for require block start: `require (`
    block_start_re: Regex,
    /// Regex for require spec inside block: `module/path v1.2.3 [// indirect]`
    require_spec_re: Regex,
    /// Regex for single-line replace: `replace old [v] => ...`
    single_replace_re: Regex,
    /// Regex for replace block start: `replace (`
    replace_block_start_re: Regex,
    /// Regex for replace spec inside block
    replace_spec_re: Regex,
}

impl GoModParser {
    pub fn new() -> Self {
        Self {
            module_re: Regex::new(r"^module\s+(\S+)\s*$").unwrap(),
            single_require_re: Regex::new(r"^require\s+(\S+)\s+(v\S+)\s*(//.*)?$").unwrap(),
            block_start_re: Regex::new(r"^require\s*\(\s*$").unwrap(),
            require_spec_re: Regex::new(r"^\s*(\S+)\s+(v\S+)\s*(//.*)?$").unwrap(),
            single_replace_re: Regex::new(r"^replace\s+(\S+)(\s+v\S+)?\s*=>").unwrap(),
            replace_block_start_re: Regex::new(r"^replace\s*\(\s*$").unwrap(),
            replace_spec_re: Regex::new(r"^\s*(\S+)(\s+v\S+)?\s*=>").unwrap(),
        }
    }

    /// Parse go.mod content into the root module path and its dependencies.
    ///
    /// Dependencies named by a replace directive are dropped: their effective
    /// version is whatever the replacement points at, not a published release.
    pub fn parse(&self, content: &str) -> Result<(String, Vec<Module>), ManifestError> {
        let mut root: Option<String> = None;
        let mut requires: Vec<(String, String, bool)> = Vec::new();
        let mut replaced: Vec<String> = Vec::new();

        let mut in_require_block = false;
        let mut in_replace_block = false;

        for line in content.lines() {
            let trimmed = line.trim();

            // Skip empty lines and comments.
            if trimmed.is_empty() || trimmed.starts_with("//") {
                continue;
            }

            if (in_require_block || in_replace_block) && trimmed == ")" {
                in_require_block = false;
                in_replace_block = false;
                continue;
            }

            if in_require_block {
                if let Some(caps) = self.require_spec_re.captures(line) {
                    requires.push(require_from_captures(&caps));
                }
                continue;
            }
            if in_replace_block {
                if let Some(caps) = self.replace_spec_re.captures(line) {
                    replaced.push(caps.get(1).unwrap().as_str().to_string());
                }
                continue;
            }

            if self.block_start_re.is_match(trimmed) {
                in_require_block = true;
                continue;
            }
            if self.replace_block_start_re.is_match(trimmed) {
                in_replace_block = true;
                continue;
            }

            if let Some(caps) = self.module_re.captures(trimmed) {
                root = Some(caps.get(1).unwrap().as_str().to_string());
                continue;
            }
            if let Some(caps) = self.single_replace_re.captures(trimmed) {
                replaced.push(caps.get(1).unwrap().as_str().to_string());
                continue;
            }
            if let Some(caps) = self.single_require_re.captures(trimmed) {
                requires.push(require_from_captures(&caps));
            }
        }

        let root = root.ok_or(ManifestError::MissingModuleDirective)?;

        let mut modules = Vec::with_capacity(requires.len());
        for (path, raw_version, indirect) in requires {
            if replaced.contains(&path) {
                continue;
            }
            let version =
                parse_go_version(&raw_version).ok_or_else(|| ManifestError::InvalidVersion {
                    path: path.clone(),
                    version: raw_version.clone(),
                })?;
            modules.push(Module::new(path, version, indirect));
        }
        Ok((root, modules))
    }
}

impl Default for GoModParser {
    fn default() -> Self {
        Self::new()
    }
}

fn require_from_captures(caps: &regex::Captures<'_>) -> (String, String, bool) {
    let path = caps.get(1).unwrap().as_str().to_string();
    let version = caps.get(2).unwrap().as_str().to_string();
    let indirect = caps
        .get(3)
        .is_some_and(|comment| comment.as_str().contains("indirect"));
    (path, version, indirect)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GO_MOD: &str = r#"
module github.com/example/project

go 1.22

require golang.org/x/text v0.14.0

require (
    github.com/pkg/errors v0.9.1
    golang.org/x/net v0.20.0 // indirect
    github.com/replaced/module v1.0.0
)

replace github.com/replaced/module => ../local/module
"#;

    #[test]
    fn parse_extracts_root_module_path() {
        let (root, _) = GoModParser::new().parse(GO_MOD).unwrap();
        assert_eq!(root, "github.com/example/project");
    }

    #[test]
    fn parse_extracts_single_and_block_requires() {
        let (_, modules) = GoModParser::new().parse(GO_MOD).unwrap();
        let paths: Vec<&str> = modules.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "golang.org/x/text",
                "github.com/pkg/errors",
                "golang.org/x/net",
            ]
        );
        assert_eq!(modules[0].version.to_string(), "0.14.0");
    }

    #[test]
    fn parse_marks_indirect_dependencies() {
        let (_, modules) = GoModParser::new().parse(GO_MOD).unwrap();
        assert!(!modules[0].indirect);
        assert!(!modules[1].indirect);
        assert!(modules[2].indirect);
    }

    #[test]
    fn parse_filters_out_replaced_modules() {
        let (_, modules) = GoModParser::new().parse(GO_MOD).unwrap();
        assert!(!modules.iter().any(|m| m.path == "github.com/replaced/module"));
    }

    #[test]
    fn parse_filters_modules_from_replace_blocks() {
        let content = r#"
module example.com/root

require (
    github.com/a/b v1.0.0
    github.com/c/d v2.1.0
)

replace (
    github.com/a/b => github.com/fork/b v1.0.1
)
"#;
        let (_, modules) = GoModParser::new().parse(content).unwrap();
        let paths: Vec<&str> = modules.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["github.com/c/d"]);
    }

    #[test]
    fn parse_fails_without_module_directive() {
        let result = GoModParser::new().parse("require golang.org/x/text v0.14.0\n");
        assert!(matches!(result, Err(ManifestError::MissingModuleDirective)));
    }

    #[test]
    fn parse_fails_on_invalid_version() {
        let content = "module example.com/root\nrequire github.com/a/b vnot-a-version\n";
        let result = GoModParser::new().parse(content);
        assert!(matches!(result, Err(ManifestError::InvalidVersion { .. })));
    }

    #[test]
    fn parse_accepts_pseudo_versions_and_incompatible() {
        let content = "module example.com/root\n\
            require github.com/a/b v0.0.0-20190101000000-abcdef123456 // indirect\n\
            require github.com/c/d v2.0.0+incompatible\n";
        let (_, modules) = GoModParser::new().parse(content).unwrap();
        assert_eq!(modules.len(), 2);
        assert!(modules[0].indirect);
        assert_eq!(modules[1].version.to_string(), "2.0.0+incompatible");
    }
}
