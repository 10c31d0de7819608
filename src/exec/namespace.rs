//! Persistent per-session execution environment

use std::collections::BTreeMap;
use std::path::Path;

use tempfile::TempDir;

/// Execution environment that survives across a session's code runs.
///
/// Interpreter processes are short lived; continuity comes from replaying
/// every previously committed snippet ahead of the new one, from exported
/// environment variables, and from files left behind in the scratch
/// directory. Dropping the namespace removes the scratch directory and
/// everything the session wrote there.
#[derive(Debug)]
pub struct ExecNamespace {
    workdir: TempDir,
    env: BTreeMap<String, String>,
    prelude: Vec<String>,
    baseline: String,
}

impl ExecNamespace {
    /// Create a fresh namespace. A non-empty `init_script` (the configured
    /// initial imports) becomes the first prelude entry.
    pub fn new(init_script: &str) -> std::io::Result<Self> {
        let mut prelude = Vec::new();
        if !init_script.trim().is_empty() {
            prelude.push(init_script.trim_end().to_string());
        }

        Ok(Self {
            workdir: tempfile::Builder::new().prefix("genie-session-").tempdir()?,
            env: BTreeMap::new(),
            prelude,
            baseline: String::new(),
        })
    }

    /// Scratch directory the interpreter runs in
    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    /// Environment variables exported to every run
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Export a variable to every subsequent run.
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.insert(key.into(), value.into());
    }

    /// Full script for one run: the committed prelude replayed ahead of the
    /// new snippet.
    pub fn compose(&self, snippet: &str) -> String {
        let mut script = String::new();
        for entry in &self.prelude {
            script.push_str(entry);
            script.push('\n');
        }
        script.push_str(snippet);
        script.push('\n');
        script
    }

    /// Record a successful snippet together with the full stdout the run
    /// produced, so later runs replay it and strip its output.
    pub fn commit(&mut self, snippet: &str, full_output: &str) {
        self.prelude.push(snippet.trim_end().to_string());
        self.baseline = full_output.to_string();
    }

    /// Strip the replayed prelude's output, leaving what the new snippet
    /// printed. Falls back to the full output when the prefix diverges,
    /// which happens when a replayed snippet prints nondeterministically.
    pub fn delta<'a>(&self, full_output: &'a str) -> &'a str {
        full_output.strip_prefix(&self.baseline).unwrap_or(full_output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_replays_prelude_in_order() {
        let mut ns = ExecNamespace::new("import gget").unwrap();
        ns.commit("a = 1", "");
        ns.commit("b = a + 1", "");

        assert_eq!(ns.compose("print(b)"), "import gget\na = 1\nb = a + 1\nprint(b)\n");
    }

    #[test]
    fn test_blank_init_script_is_skipped() {
        let ns = ExecNamespace::new("  \n").unwrap();
        assert_eq!(ns.compose("x = 1"), "x = 1\n");
    }

    #[test]
    fn test_delta_strips_previous_output() {
        let mut ns = ExecNamespace::new("").unwrap();
        ns.commit("print('a')", "a\n");

        assert_eq!(ns.delta("a\nb\n"), "b\n");
        // Divergent replay output falls back to the whole capture.
        assert_eq!(ns.delta("x\nb\n"), "x\nb\n");
    }

    #[test]
    fn test_workdir_is_removed_on_drop() {
        let ns = ExecNamespace::new("").unwrap();
        let path = ns.workdir().to_path_buf();
        assert!(path.is_dir());
        drop(ns);
        assert!(!path.exists());
    }
}
