//! Python language support

use super::{LanguageSpec, source_path_for};
use crate::config::SandboxConfig;

pub(super) fn spec(config: &SandboxConfig) -> LanguageSpec {
    LanguageSpec {
        extension: "py",
        compile: None,
        run: vec![config.python_path.clone(), source_path_for("py")],
    }
}
