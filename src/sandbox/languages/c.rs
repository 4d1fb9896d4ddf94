//! C language support

use super::{LanguageSpec, source_path_for};
use crate::config::SandboxConfig;
use crate::constants::sandbox_paths;

pub(super) fn spec(config: &SandboxConfig) -> LanguageSpec {
    LanguageSpec {
        extension: "c",
        compile: Some(vec![
            config.gcc_path.clone(),
            source_path_for("c"),
            "-o".to_string(),
            sandbox_paths::PROG.to_string(),
            "-O2".to_string(),
            "-std=c11".to_string(),
            "-lm".to_string(),
        ]),
        run: vec![sandbox_paths::PROG.to_string()],
    }
}
