//! Command Registry
//!
//! Name-to-handler table for non-builtin commands. The interpreter consults
//! this only after builtins and shell functions have both missed; a name
//! found here is run as an external command, a name found nowhere is
//! "command not found" (exit 127).

use std::collections::HashMap;

use super::types::Command;

#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self { commands: HashMap::new() }
    }

    pub fn register(&mut self, cmd: Box<dyn Command>) {
        self.commands.insert(cmd.name().to_string(), cmd);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(name).map(|c| c.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.commands.keys().map(|s| s.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CommandContext, CommandResult};
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Command for Echo {
        fn name(&self) -> &'static str {
            "echo-ext"
        }

        async fn execute(&self, ctx: CommandContext) -> CommandResult {
            CommandResult::success(format!("{}\n", ctx.args.join(" ")))
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut reg = CommandRegistry::new();
        assert!(!reg.contains("echo-ext"));
        reg.register(Box::new(Echo));
        assert!(reg.contains("echo-ext"));
        assert!(reg.get("echo-ext").is_some());
        assert!(reg.get("missing").is_none());
    }
}
