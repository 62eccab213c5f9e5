use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// External tools used by the adapters, and the fixed flags passed to them.
///
/// The same flags are used for every student so that builds are reproducible.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct ToolchainSection {
    pub compiler: String,
    pub compile_flags: Vec<String>,
    pub linter: String,
    pub ghdl: String,
    pub ghdl_options: Vec<String>,
    pub vivado: String,
    pub vivado_options: Vec<String>,
    pub part_number: String,
    pub interpreter: String,
    /// Extra directories searched (recursively) for tools missing from `PATH`.
    pub search_paths: Vec<PathBuf>,
}

impl Default for ToolchainSection {
    fn default() -> Self {
        let strings = |v: &[&str]| v.iter().map(|s| s.to_string()).collect();
        Self {
            compiler: "gcc".to_string(),
            compile_flags: strings(&[
                "-funsigned-char",
                "-funsigned-bitfields",
                "-fpack-struct",
                "-fshort-enums",
                "-Wall",
                "-std=gnu99",
            ]),
            linter: "clang-tidy".to_string(),
            ghdl: "ghdl".to_string(),
            ghdl_options: strings(&["--std=08", "--warn-no-hide"]),
            vivado: "bin/vivado".to_string(),
            vivado_options: strings(&["-nojournal"]),
            part_number: "xc7a35tcpg236-1".to_string(),
            interpreter: "python3".to_string(),
            search_paths: vec![PathBuf::from("/opt/Xilinx/"), PathBuf::from("/usr/local/")],
        }
    }
}
