use crate::command::{format_command, CommandRunner, DefaultCommandRunner};
use crate::compiler::{join_classpath, CompileFailure, SecondaryCompiler};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// [`SecondaryCompiler`] that shells out to `javac`.
#[derive(Debug, Clone)]
pub struct JavacCompiler {
    javac: PathBuf,
    cwd: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl JavacCompiler {
    pub fn new(javac: impl Into<PathBuf>) -> Self {
        Self {
            javac: javac.into(),
            cwd: PathBuf::from("."),
            runner: Arc::new(DefaultCommandRunner),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_working_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    fn arguments(
        sources: &[PathBuf],
        classpath: &[PathBuf],
        output: &Path,
        options: &[String],
        max_errors: usize,
    ) -> Vec<String> {
        let mut args = options.to_vec();
        // An explicit `-Xmaxerrs` in the options wins.
        if max_errors > 0 && !options.iter().any(|option| option == "-Xmaxerrs") {
            args.push("-Xmaxerrs".to_owned());
            args.push(max_errors.to_string());
        }
        args.push("-d".to_owned());
        args.push(output.to_string_lossy().into_owned());
        if !classpath.is_empty() {
            args.push("-classpath".to_owned());
            args.push(join_classpath(classpath));
        }
        args.extend(
            sources
                .iter()
                .map(|source| source.to_string_lossy().into_owned()),
        );
        args
    }
}

impl Default for JavacCompiler {
    fn default() -> Self {
        Self::new("javac")
    }
}

impl SecondaryCompiler for JavacCompiler {
    fn compile(
        &self,
        sources: &[PathBuf],
        classpath: &[PathBuf],
        output: &Path,
        options: &[String],
        max_errors: usize,
    ) -> Result<(), CompileFailure> {
        let args = Self::arguments(sources, classpath, output, options, max_errors);
        tracing::debug!(
            target: "nova.incremental",
            command = %format_command(&self.javac, &args),
            "running javac"
        );

        let output = self.runner.run(&self.cwd, &self.javac, &args)?;
        if output.status.success() {
            return Ok(());
        }

        let message = output.combined();
        let errors = count_javac_errors(&message).max(1);
        Err(CompileFailure::Reported { errors, message })
    }
}

/// Number of errors in javac output.
///
/// Uses the trailing `N error(s)` summary when javac printed one, otherwise
/// counts `: error:` diagnostic lines.
pub fn count_javac_errors(output: &str) -> usize {
    let summary = output.lines().rev().find_map(|line| {
        let line = line.trim();
        let count = line
            .strip_suffix(" errors")
            .or_else(|| line.strip_suffix(" error"))?;
        count.parse::<usize>().ok()
    });
    if let Some(count) = summary {
        return count;
    }

    output
        .lines()
        .filter(|line| line.contains(": error:"))
        .count()
}
