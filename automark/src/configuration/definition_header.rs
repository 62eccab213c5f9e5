//! The declarative header carried by every tutor test-definition file.
//!
//! A header is a JSON object written inside comments, between a line containing
//! [`BEGIN_MARKER`] and a line containing [`END_MARKER`]:
//!
//! ```c
//! /* automark:begin
//!  * { "kind": "native", "targets": ["q1.c"], "timeout": 5, "params": ["TEST1", "TEST2"] }
//!  * automark:end */
//! ```
//!
//! Each line between the markers has its comment leader removed before the lines are joined
//! and parsed, so the same header works in C (`//`, `/*`, `*`), VHDL (`--`), Python and shell
//! (`#`) and assembler (`;`) sources.

use crate::input::MatchMode;
use serde::{Deserialize, Serialize};
use shlex::Shlex;
use std::{collections::HashSet, time::Duration};
use thiserror::Error;

pub const BEGIN_MARKER: &str = "automark:begin";
pub const END_MARKER: &str = "automark:end";

const COMMENT_LEADERS: [&str; 6] = ["/*", "//", "--", "#", ";", "*"];

/// Selects the adapter that prepares and runs a test unit.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AdapterKind {
    /// Compile the tutor test source with the student's C source and run the binary.
    Native,
    /// Analyse and simulate a VHDL testbench against the student's design.
    HdlSimulate,
    /// Synthesise the student's VHDL design to a bitstream.
    HdlSynthesize,
    /// Run the student's script with an interpreter.
    Script,
    /// Count static-checker diagnostics in the student's source.
    Lint,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(untagged, deny_unknown_fields)]
pub enum TargetSpecification {
    /// Matched with the cohort's default match mode.
    Pattern(String),
    Complete { pattern: String, mode: MatchMode },
}

impl TargetSpecification {
    pub fn pattern(&self) -> &str {
        match self {
            TargetSpecification::Pattern(pattern) => pattern,
            TargetSpecification::Complete { pattern, .. } => pattern,
        }
    }

    pub fn mode(&self, default: MatchMode) -> MatchMode {
        match self {
            TargetSpecification::Pattern(_) => default,
            TargetSpecification::Complete { mode, .. } => *mode,
        }
    }
}

fn default_lint_checks() -> String {
    "performance-*,readability-*,portability-*".to_string()
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(deny_unknown_fields)]
pub struct LintSection {
    /// Highest number of diagnostics still accepted.
    pub threshold: u32,
    #[serde(default = "default_lint_checks")]
    pub checks: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ExpectSection {
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub status: Option<i32>,
}

/// How the student's native source joins the build.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// A generated `student.h` includes the student's source; the tutor source includes it.
    #[default]
    Include,
    /// The student's sources are compiled and linked alongside the tutor source.
    Link,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
struct DefinitionHeaderUnchecked {
    kind: AdapterKind,
    #[serde(default)]
    targets: Vec<TargetSpecification>,
    #[serde(default)]
    depends: Vec<String>,
    timeout: Option<f64>,
    #[serde(default)]
    params: Vec<String>,
    args: Option<String>,
    stdin: Option<String>,
    expect: Option<ExpectSection>,
    lint: Option<LintSection>,
    #[serde(default)]
    build: BuildMode,
    top: Option<String>,
    generic: Option<String>,
    constraints: Option<String>,
    max_warnings: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(try_from = "DefinitionHeaderUnchecked")]
pub struct DefinitionHeader {
    pub kind: AdapterKind,
    /// Student files exercised. A header without targets is not collected.
    pub targets: Vec<TargetSpecification>,
    /// Tutor files (relative to the corpus root) prepared before the target, in order.
    pub depends: Vec<String>,
    pub timeout: Option<f64>,
    pub params: Vec<String>,
    /// Shell-quoted program arguments.
    pub args: Option<String>,
    pub stdin: Option<String>,
    pub expect: Option<ExpectSection>,
    pub lint: Option<LintSection>,
    pub build: BuildMode,
    pub top: Option<String>,
    pub generic: Option<String>,
    pub constraints: Option<String>,
    pub max_warnings: Option<u32>,
}

impl DefinitionHeader {
    /// A header with only `kind` and `targets` set.
    pub fn new(kind: AdapterKind, targets: Vec<TargetSpecification>) -> Self {
        Self {
            kind,
            targets,
            depends: vec![],
            timeout: None,
            params: vec![],
            args: None,
            stdin: None,
            expect: None,
            lint: None,
            build: BuildMode::default(),
            top: None,
            generic: None,
            constraints: None,
            max_warnings: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        kind: AdapterKind,
        targets: Vec<TargetSpecification>,
        depends: Vec<String>,
        timeout: Option<f64>,
        params: Vec<String>,
        args: Option<String>,
        stdin: Option<String>,
        expect: Option<ExpectSection>,
        lint: Option<LintSection>,
        build: BuildMode,
        top: Option<String>,
        generic: Option<String>,
        constraints: Option<String>,
        max_warnings: Option<u32>,
    ) -> Result<Self, &'static str> {
        if let Some(seconds) = timeout
            && !super::valid_seconds(seconds)
        {
            return Err("timeout must be a positive number of seconds");
        }
        if targets.iter().any(|t| t.pattern().is_empty()) {
            return Err("target patterns must not be empty");
        }
        if depends.iter().any(String::is_empty) {
            return Err("dependency names must not be empty");
        }
        let mut seen = HashSet::new();
        for p in &params {
            if p.is_empty() {
                return Err("parameter values must not be empty");
            }
            if !seen.insert(p) {
                return Err("parameter values must not be duplicated");
            }
        }
        if let Some(args) = &args {
            let mut lex = Shlex::new(args);
            for _ in lex.by_ref() {}
            if lex.had_error {
                return Err("invalid args string");
            }
        }
        if let Some(expect) = &expect
            && expect.stdout.is_none()
            && expect.status.is_none()
        {
            return Err("expect must set at least one of stdout or status");
        }
        match kind {
            AdapterKind::Lint => {
                if lint.is_none() {
                    return Err("a lint definition requires a lint section");
                }
                if !params.is_empty() {
                    return Err("a lint definition cannot be parameterized");
                }
            }
            AdapterKind::HdlSynthesize => {
                if top.is_none() {
                    return Err("an hdl-synthesize definition requires a top entity");
                }
            }
            _ => {}
        }
        Ok(Self {
            kind,
            targets,
            depends,
            timeout,
            params,
            args,
            stdin,
            expect,
            lint,
            build,
            top,
            generic,
            constraints,
            max_warnings,
        })
    }

    /// `args` split the way a POSIX shell would.
    pub fn arguments(&self) -> Vec<String> {
        self.args
            .as_deref()
            .map(|args| Shlex::new(args).collect())
            .unwrap_or_default()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(super::seconds)
    }
}

impl TryFrom<DefinitionHeaderUnchecked> for DefinitionHeader {
    type Error = &'static str;

    fn try_from(value: DefinitionHeaderUnchecked) -> Result<Self, Self::Error> {
        let DefinitionHeaderUnchecked {
            kind,
            targets,
            depends,
            timeout,
            params,
            args,
            stdin,
            expect,
            lint,
            build,
            top,
            generic,
            constraints,
            max_warnings,
        } = value;

        DefinitionHeader::build(
            kind,
            targets,
            depends,
            timeout,
            params,
            args,
            stdin,
            expect,
            lint,
            build,
            top,
            generic,
            constraints,
            max_warnings,
        )
    }
}

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("'{BEGIN_MARKER}' on line {0} has no matching '{END_MARKER}'")]
    Unterminated(usize),
    #[error("invalid header: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Extracts and parses the header block of a test-definition file.
///
/// Returns `Ok(None)` when `text` has no [`BEGIN_MARKER`] line. Only the first block is read.
pub fn parse_header_block(text: &str) -> Result<Option<DefinitionHeader>, HeaderError> {
    let mut lines = text.lines().enumerate();
    let Some((begin, _)) = lines.by_ref().find(|(_, line)| line.contains(BEGIN_MARKER)) else {
        return Ok(None);
    };
    let mut json = String::new();
    let mut terminated = false;
    for (_, line) in lines {
        if line.contains(END_MARKER) {
            terminated = true;
            break;
        }
        json.push_str(strip_comment_leader(line));
        json.push('\n');
    }
    if !terminated {
        return Err(HeaderError::Unterminated(begin + 1));
    }
    Ok(Some(serde_json::from_str(&json)?))
}

fn strip_comment_leader(line: &str) -> &str {
    let line = line.trim_start();
    COMMENT_LEADERS
        .iter()
        .find_map(|leader| line.strip_prefix(leader))
        .unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::test_macros::{
        test_invalid_deserialization, test_serialize_and_deserialize, test_valid_deserialization,
    };

    mod test_definition_header {
        use super::*;

        // serialization
        test_serialize_and_deserialize!(
            should_serialize_deserialize_minimal,
            DefinitionHeader::new(
                AdapterKind::Native,
                vec![TargetSpecification::Pattern("q1.c".to_string())]
            ),
            DefinitionHeader
        );
        test_serialize_and_deserialize!(
            should_serialize_deserialize_complete,
            DefinitionHeader {
                depends: vec!["pkg.vhd".to_string()],
                timeout: Some(2.5),
                params: vec!["A".to_string(), "B".to_string()],
                generic: Some("selector".to_string()),
                ..DefinitionHeader::new(
                    AdapterKind::HdlSimulate,
                    vec![
                        TargetSpecification::Complete {
                            pattern: "entity\\s+adder".to_string(),
                            mode: MatchMode::Content
                        },
                        TargetSpecification::Pattern("**/tb_*.vhd".to_string())
                    ]
                )
            },
            DefinitionHeader
        );

        // invalid deserialization
        test_invalid_deserialization!(should_panic_with_empty_object, r#"{}"#, DefinitionHeader);
        test_invalid_deserialization!(
            should_panic_with_unknown_kind,
            r#"{ "kind": "spreadsheet", "targets": ["a.xlsx"] }"#,
            DefinitionHeader
        );
        test_invalid_deserialization!(
            should_panic_with_unknown_field,
            r#"{ "kind": "native", "targets": ["q1.c"], "marks": 3 }"#,
            DefinitionHeader
        );
        test_invalid_deserialization!(
            should_panic_with_zero_timeout,
            r#"{ "kind": "native", "targets": ["q1.c"], "timeout": 0 }"#,
            DefinitionHeader
        );
        test_invalid_deserialization!(
            should_panic_with_unrepresentable_timeout,
            r#"{ "kind": "script", "targets": ["q1.sh"], "timeout": 1e20 }"#,
            DefinitionHeader
        );
        test_invalid_deserialization!(
            should_panic_with_duplicated_params,
            r#"{ "kind": "native", "targets": ["q1.c"], "params": ["A", "A"] }"#,
            DefinitionHeader
        );
        test_invalid_deserialization!(
            should_panic_with_unbalanced_args,
            r#"{ "kind": "script", "targets": ["q1.py"], "args": "'open" }"#,
            DefinitionHeader
        );
        test_invalid_deserialization!(
            should_panic_with_empty_expect,
            r#"{ "kind": "script", "targets": ["q1.py"], "expect": {} }"#,
            DefinitionHeader
        );
        test_invalid_deserialization!(
            should_panic_with_lint_kind_without_lint_section,
            r#"{ "kind": "lint", "targets": ["q1.c"] }"#,
            DefinitionHeader
        );
        test_invalid_deserialization!(
            should_panic_with_parameterized_lint,
            r#"{ "kind": "lint", "targets": ["q1.c"], "params": ["A"], "lint": { "threshold": 0 } }"#,
            DefinitionHeader
        );
        test_invalid_deserialization!(
            should_panic_with_synthesis_without_top,
            r#"{ "kind": "hdl-synthesize", "targets": ["top.vhd"] }"#,
            DefinitionHeader
        );
        test_invalid_deserialization!(
            should_panic_with_unknown_target_mode,
            r#"{ "kind": "native", "targets": [{ "pattern": "q1.c", "mode": "fuzzy" }] }"#,
            DefinitionHeader
        );

        // valid deserialization
        test_valid_deserialization!(
            should_accept_without_targets,
            r#"{ "kind": "native" }"#,
            DefinitionHeader
        );
        test_valid_deserialization!(
            should_accept_lint_with_default_checks,
            r#"{ "kind": "lint", "targets": ["q1.c"], "lint": { "threshold": 3 } }"#,
            DefinitionHeader
        );
        test_valid_deserialization!(
            should_accept_synthesis,
            r#"{
                "kind": "hdl-synthesize",
                "targets": ["top.vhd", "counter.vhd"],
                "top": "top",
                "constraints": "basys3.xdc",
                "max_warnings": 10,
                "timeout": 600
            }"#,
            DefinitionHeader
        );

        #[test]
        fn should_split_args_like_a_shell() {
            let header: DefinitionHeader = serde_json::from_str(
                r#"{ "kind": "script", "targets": ["q1.py"], "args": "-n 3 'two words'" }"#,
            )
            .unwrap();
            assert_eq!(header.arguments(), vec!["-n", "3", "two words"]);
            assert_eq!(header.timeout(), None);
        }
    }

    mod test_parse_header_block {
        use super::*;

        #[test_log::test]
        fn should_return_none_without_marker() {
            assert!(
                parse_header_block("int main(void) { return 0; }\n")
                    .unwrap()
                    .is_none()
            );
        }

        #[test_log::test]
        fn should_parse_c_block_comment() {
            let text = r#"
/* automark:begin
 * {
 *   "kind": "native",
 *   "targets": ["q1.c"],
 *   "timeout": 5,
 *   "params": ["TEST1", "TEST2"]
 * }
 * automark:end */
#include "student.h"
"#;
            let header = parse_header_block(text).unwrap().unwrap();
            assert_eq!(header.kind, AdapterKind::Native);
            assert_eq!(header.targets[0].pattern(), "q1.c");
            assert_eq!(header.timeout(), Some(Duration::from_secs(5)));
            assert_eq!(header.params, vec!["TEST1", "TEST2"]);
        }

        #[test_log::test]
        fn should_parse_vhdl_line_comments() {
            let text = r#"library ieee;
-- automark:begin
-- { "kind": "hdl-simulate",
--   "targets": ["adder.vhd"],
--   "depends": ["pkg.vhd"] }
-- automark:end
entity tb_adder is
end entity;
"#;
            let header = parse_header_block(text).unwrap().unwrap();
            assert_eq!(header.kind, AdapterKind::HdlSimulate);
            assert_eq!(header.depends, vec!["pkg.vhd"]);
        }

        #[test_log::test]
        fn should_parse_hash_comments() {
            let text = "# automark:begin\n# {\"kind\": \"script\", \"targets\": [\"q1.py\"], \"stdin\": \"3\\n4\"}\n# automark:end\n";
            let header = parse_header_block(text).unwrap().unwrap();
            assert_eq!(header.stdin.as_deref(), Some("3\n4"));
        }

        #[test_log::test]
        fn should_fail_on_unterminated_block() {
            let text = "// x\n// automark:begin\n// { \"kind\": \"native\" }\n";
            assert!(matches!(
                parse_header_block(text),
                Err(HeaderError::Unterminated(2))
            ));
        }

        #[test_log::test]
        fn should_fail_on_invalid_json() {
            let text = "// automark:begin\n// { \"kind\": native }\n// automark:end\n";
            assert!(matches!(
                parse_header_block(text),
                Err(HeaderError::Invalid(_))
            ));
        }

        #[test_log::test]
        fn should_surface_validation_messages() {
            let text = "// automark:begin\n// { \"kind\": \"lint\", \"targets\": [\"a.c\"] }\n// automark:end\n";
            let err = parse_header_block(text).unwrap_err();
            assert!(
                err.to_string().contains("requires a lint section"),
                "unexpected message: {err}"
            );
        }
    }
}
