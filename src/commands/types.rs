//! Command Registry Types
//!
//! The contract external commands implement. The interpreter treats every
//! registered command as an opaque leaf: it resolves a name, builds a
//! `CommandContext`, awaits `execute`, and folds the `CommandResult` back
//! into its own `ExecResult`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::fs::FileSystem;

/// Result of running an external command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(stdout: String) -> Self {
        Self { stdout, stderr: String::new(), exit_code: 0 }
    }

    pub fn error(stderr: String) -> Self {
        Self { stdout: String::new(), stderr, exit_code: 1 }
    }

    pub fn with_exit_code(stdout: String, stderr: String, exit_code: i32) -> Self {
        Self { stdout, stderr, exit_code }
    }
}

/// Everything an external command needs to run: its expanded argv, captured
/// stdin (the previous pipeline stage's stdout, or the here-doc/here-string
/// body), the resolved cwd and exported environment, and a handle to the
/// virtual filesystem. Commands never see the interpreter's internal state.
pub struct CommandContext {
    pub args: Vec<String>,
    pub stdin: String,
    pub cwd: String,
    pub env: HashMap<String, String>,
    pub fs: Arc<dyn FileSystem>,
}

impl CommandContext {
    pub fn new(
        args: Vec<String>,
        stdin: String,
        cwd: String,
        env: HashMap<String, String>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self { args, stdin, cwd, env, fs }
    }
}

/// A command registered under a fixed name. Implementations are external
/// collaborators (the ~80 coreutil-style commands); this core only depends
/// on the trait.
#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, ctx: CommandContext) -> CommandResult;
}
