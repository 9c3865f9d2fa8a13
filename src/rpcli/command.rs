//! `rp-cli` exec command generation.
//!
//! This module provides a builder for the command strings passed to
//! `rp-cli -e`. Steps are chained with `&&` so rp-cli stops at the first
//! failing step. It does not execute anything.

/// Builder for `rp-cli -e` command chains.
#[derive(Debug, Clone, Default)]
pub struct RpCommand {
    steps: Vec<String>,
}

impl RpCommand {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw step.
    pub fn step(mut self, step: impl Into<String>) -> Self {
        self.steps.push(step.into());
        self
    }

    /// Clear the current file selection.
    pub fn select_clear(self) -> Self {
        self.step("select clear")
    }

    /// Add a path to the selection.
    pub fn select_add(self, path: &str) -> Self {
        self.step(format!("select add {}", quote(path)))
    }

    /// Run the plan builder for `task`.
    pub fn builder_plan(self, task: &str) -> Self {
        self.step(format!("builder {} --type plan", quote(task)))
    }

    /// Export the current prompt to `out`.
    pub fn prompt_export(self, out: &str) -> Self {
        self.step(format!("prompt export {}", quote(out)))
    }

    /// Build the final command string.
    pub fn build(self) -> String {
        self.steps.join(" && ")
    }

    /// Switch the window to a workspace.
    ///
    /// # Example
    /// ```
    /// use rpflow::rpcli::RpCommand;
    /// let cmd = RpCommand::workspace_switch("GitHub");
    /// assert_eq!(cmd.build(), "workspace switch \"GitHub\"");
    /// ```
    pub fn workspace_switch(workspace: &str) -> Self {
        Self::new().step(format!("workspace switch {}", quote(workspace)))
    }

    /// Replace the selection with `paths` and export the prompt to `out`.
    ///
    /// # Example
    /// ```
    /// use rpflow::rpcli::RpCommand;
    /// let paths = vec!["src".to_string(), "Cargo.toml".to_string()];
    /// let cmd = RpCommand::selection_export(&paths, "/tmp/out.md");
    /// assert_eq!(
    ///     cmd.build(),
    ///     "select clear && select add \"src\" && select add \"Cargo.toml\" && prompt export \"/tmp/out.md\""
    /// );
    /// ```
    pub fn selection_export(paths: &[String], out: &str) -> Self {
        paths
            .iter()
            .fold(Self::new().select_clear(), |cmd, p| cmd.select_add(p))
            .prompt_export(out)
    }

    /// Replace the selection, run the plan builder, then export the prompt.
    ///
    /// # Example
    /// ```
    /// use rpflow::rpcli::RpCommand;
    /// let paths = vec!["src".to_string()];
    /// let cmd = RpCommand::plan_export(&paths, "add retries", "out.md");
    /// assert_eq!(
    ///     cmd.build(),
    ///     "select clear && select add \"src\" && builder \"add retries\" --type plan && prompt export \"out.md\""
    /// );
    /// ```
    pub fn plan_export(paths: &[String], task: &str, out: &str) -> Self {
        paths
            .iter()
            .fold(Self::new().select_clear(), |cmd, p| cmd.select_add(p))
            .builder_plan(task)
            .prompt_export(out)
    }

    /// The steps accumulated so far.
    pub fn steps(&self) -> &[String] {
        &self.steps
    }
}

// rp-cli takes the text between double quotes verbatim.
fn quote(value: &str) -> String {
    format!("\"{}\"", value)
}

/// Split a comma-separated `--select-set` value into trimmed, non-empty paths.
pub fn split_paths(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_export_no_paths() {
        let cmd = RpCommand::selection_export(&[], "out.md");
        assert_eq!(cmd.build(), "select clear && prompt export \"out.md\"");
    }

    #[test]
    fn test_plan_export_steps() {
        let paths = split_paths("a.rs, b.rs");
        let cmd = RpCommand::plan_export(&paths, "refactor", "/tmp/p.md");
        assert_eq!(
            cmd.steps(),
            &[
                "select clear",
                "select add \"a.rs\"",
                "select add \"b.rs\"",
                "builder \"refactor\" --type plan",
                "prompt export \"/tmp/p.md\"",
            ]
        );
    }

    #[test]
    fn test_builder_is_reusable() {
        let cmd = RpCommand::workspace_switch("Work");
        let cmd_clone = cmd.clone();
        assert_eq!(cmd.build(), cmd_clone.build());
    }

    #[test]
    fn test_split_paths_trims_and_drops_empty() {
        assert_eq!(
            split_paths(" src/lib.rs ,, tests ,"),
            vec!["src/lib.rs".to_string(), "tests".to_string()]
        );
        assert!(split_paths("").is_empty());
        assert!(split_paths(" , ").is_empty());
    }
}
