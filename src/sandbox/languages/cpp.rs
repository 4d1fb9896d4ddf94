//! C++ language support

use super::{LanguageSpec, source_path_for};
use crate::config::SandboxConfig;
use crate::constants::sandbox_paths;

pub(super) fn spec(config: &SandboxConfig) -> LanguageSpec {
    LanguageSpec {
        extension: "cpp",
        compile: Some(vec![
            config.gpp_path.clone(),
            source_path_for("cpp"),
            "-o".to_string(),
            sandbox_paths::PROG.to_string(),
            "-O2".to_string(),
            "-std=c++17".to_string(),
        ]),
        run: vec![sandbox_paths::PROG.to_string()],
    }
}
