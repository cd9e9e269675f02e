use std::path::PathBuf;

/// Fatal errors only. Anything recoverable (tool timeouts, parse failures,
/// agent errors) is captured in `HookResult`/`FixResult` records instead of
/// being propagated as an error.
#[derive(thiserror::Error, Debug)]
pub enum QuenchError {
    #[error("Invalid configuration:\n{}", .errors.join("\n"))]
    InvalidConfig { errors: Vec<String> },

    #[error("Workspace '{}' is missing or inaccessible", .path.display())]
    WorkspaceInaccessible { path: PathBuf },

    #[error("Hook '{hook}' references unregistered parser '{parser_id}'")]
    UnknownParser { hook: String, parser_id: String },

    #[error("Hook '{hook}' depends on unknown hook '{dependency}'")]
    UnknownDependency { hook: String, dependency: String },

    #[error("Hook dependency cycle: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },
}
