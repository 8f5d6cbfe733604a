//! Generator backed by an external script.
//!
//! Invocation is `<program> <script> <token> <owner> <repo> <default_branch>
//! <working_branch> <scratch_dir> <artifact_filename>`. A non-zero exit status
//! is a failure. What stdout means depends on [`OutputMode`].

use std::path::Path;
use std::process::Stdio;
use std::str::FromStr;

use tokio::process::Command;
use tracing::{debug, warn};

use super::{Artifact, ArtifactGenerator, ArtifactRun, GenerateRequest, GeneratorError, GeneratorOutcome};

/// How the script reports its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// The last non-blank stdout line is `true` or `false`. On `true` the
    /// script has written the artifact into the scratch directory.
    #[default]
    Indicator,
    /// Stdout is the artifact itself, or exactly `false` when nothing changed.
    Payload,
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "indicator" => Ok(OutputMode::Indicator),
            "payload" => Ok(OutputMode::Payload),
            other => Err(format!(
                "unknown generator output mode {other:?} (expected \"indicator\" or \"payload\")"
            )),
        }
    }
}

/// Runs a script once per pass.
#[derive(Debug, Clone)]
pub struct ScriptGenerator {
    program: String,
    script: String,
    mode: OutputMode,
}

impl ScriptGenerator {
    pub fn new(program: impl Into<String>, script: impl Into<String>, mode: OutputMode) -> Self {
        ScriptGenerator {
            program: program.into(),
            script: script.into(),
            mode,
        }
    }
}

impl ArtifactGenerator for ScriptGenerator {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<ArtifactRun, GeneratorError> {
        debug!(program = %self.program, script = %self.script, "Running generator");

        let output = Command::new(&self.program)
            .arg(&self.script)
            .arg(request.token)
            .arg(&request.repo.owner)
            .arg(&request.repo.repo)
            .arg(request.default_branch)
            .arg(request.working_branch)
            .arg(request.scratch_dir)
            .arg(request.artifact_filename)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(GeneratorError::Spawn)?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            warn!(status = %output.status, stderr = %stderr, "Generator failed");
            return Err(GeneratorError::Exited {
                status: output.status.to_string(),
                stderr,
            });
        }

        let outcome = match self.mode {
            OutputMode::Indicator => match parse_indicator(&stdout) {
                Some(true) => GeneratorOutcome::Changed(Artifact::new(request.artifact_path())),
                Some(false) => GeneratorOutcome::Unchanged,
                None => return Err(GeneratorError::UnrecognizedOutput { stdout }),
            },
            OutputMode::Payload => {
                if stdout.trim() == "false" {
                    GeneratorOutcome::Unchanged
                } else {
                    let path = request.artifact_path();
                    write_payload(&path, stdout.as_bytes()).await?;
                    GeneratorOutcome::Changed(Artifact::new(path))
                }
            }
        };

        Ok(ArtifactRun {
            outcome,
            stdout,
            stderr,
        })
    }
}

/// Writes the payload, creating directories for nested artifact names.
async fn write_payload(path: &Path, payload: &[u8]) -> Result<(), GeneratorError> {
    let write = async {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, payload).await
    };
    write.await.map_err(|source| GeneratorError::WriteArtifact {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads the change indicator from the last non-blank line of stdout.
fn parse_indicator(stdout: &str) -> Option<bool> {
    let last = stdout.lines().map(str::trim).rfind(|line| !line.is_empty())?;
    match last {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RepoId;
    use std::path::Path;

    fn request<'a>(repo: &'a RepoId, scratch: &'a Path) -> GenerateRequest<'a> {
        GenerateRequest {
            token: "ghs_token",
            repo,
            default_branch: "main",
            working_branch: "add-docker-lock",
            scratch_dir: scratch,
            artifact_filename: "docker-lock.json",
        }
    }

    fn write_script(dir: &Path, body: &str) -> String {
        let path = dir.join("gen.sh");
        std::fs::write(&path, body).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn indicator_uses_last_nonblank_line() {
        assert_eq!(parse_indicator("true\n"), Some(true));
        assert_eq!(parse_indicator("scanning...\nfalse\n\n"), Some(false));
        assert_eq!(parse_indicator("  true  "), Some(true));
        assert_eq!(parse_indicator(""), None);
        assert_eq!(parse_indicator("yes"), None);
        assert_eq!(parse_indicator("true\nmaybe"), None);
    }

    #[test]
    fn output_mode_parses() {
        assert_eq!("indicator".parse::<OutputMode>(), Ok(OutputMode::Indicator));
        assert_eq!("PAYLOAD".parse::<OutputMode>(), Ok(OutputMode::Payload));
        assert!("json".parse::<OutputMode>().is_err());
    }

    #[tokio::test]
    async fn passes_positional_arguments() {
        let tools = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let script = write_script(
            tools.path(),
            "printf '%s\\n' \"$@\" > \"$6/$7\"\necho true\n",
        );
        let repo = RepoId::new("acme", "widgets");
        let generator = ScriptGenerator::new("sh", script, OutputMode::Indicator);

        let run = generator.generate(request(&repo, scratch.path())).await.unwrap();

        let expected_path = scratch.path().join("docker-lock.json");
        assert_eq!(run.outcome, GeneratorOutcome::Changed(Artifact::new(&expected_path)));
        let args = std::fs::read_to_string(&expected_path).unwrap();
        let args: Vec<_> = args.lines().collect();
        assert_eq!(
            args,
            vec![
                "ghs_token",
                "acme",
                "widgets",
                "main",
                "add-docker-lock",
                scratch.path().to_str().unwrap(),
                "docker-lock.json",
            ]
        );
    }

    #[tokio::test]
    async fn indicator_false_is_unchanged() {
        let tools = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let script = write_script(tools.path(), "echo 'nothing to do' >&2\necho false\n");
        let repo = RepoId::new("acme", "widgets");
        let generator = ScriptGenerator::new("sh", script, OutputMode::Indicator);

        let run = generator.generate(request(&repo, scratch.path())).await.unwrap();

        assert_eq!(run.outcome, GeneratorOutcome::Unchanged);
        assert_eq!(run.stderr.trim(), "nothing to do");
    }

    #[tokio::test]
    async fn nonzero_exit_is_failure() {
        let tools = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let script = write_script(tools.path(), "echo true\necho broken >&2\nexit 3\n");
        let repo = RepoId::new("acme", "widgets");
        let generator = ScriptGenerator::new("sh", script, OutputMode::Indicator);

        let err = generator
            .generate(request(&repo, scratch.path()))
            .await
            .unwrap_err();

        match err {
            GeneratorError::Exited { stderr, .. } => assert_eq!(stderr.trim(), "broken"),
            other => panic!("expected Exited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_indicator_is_failure() {
        let tools = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let script = write_script(tools.path(), "echo perhaps\n");
        let repo = RepoId::new("acme", "widgets");
        let generator = ScriptGenerator::new("sh", script, OutputMode::Indicator);

        let err = generator
            .generate(request(&repo, scratch.path()))
            .await
            .unwrap_err();

        assert!(matches!(err, GeneratorError::UnrecognizedOutput { .. }));
    }

    #[tokio::test]
    async fn payload_mode_writes_stdout_as_artifact() {
        let tools = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let script = write_script(tools.path(), "printf '{\"dockerfiles\":{}}'\n");
        let repo = RepoId::new("acme", "widgets");
        let generator = ScriptGenerator::new("sh", script, OutputMode::Payload);

        let run = generator.generate(request(&repo, scratch.path())).await.unwrap();

        let GeneratorOutcome::Changed(artifact) = run.outcome else {
            panic!("expected Changed");
        };
        let content = artifact.read().await.unwrap();
        assert_eq!(content.as_bytes(), br#"{"dockerfiles":{}}"#);
    }

    #[tokio::test]
    async fn payload_mode_creates_nested_artifact_directories() {
        let tools = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let script = write_script(tools.path(), "printf '{\"dockerfiles\":{}}'\n");
        let repo = RepoId::new("acme", "widgets");
        let generator = ScriptGenerator::new("sh", script, OutputMode::Payload);
        let nested = GenerateRequest {
            artifact_filename: "locks/docker.json",
            ..request(&repo, scratch.path())
        };

        let run = generator.generate(nested).await.unwrap();

        let GeneratorOutcome::Changed(artifact) = run.outcome else {
            panic!("expected Changed");
        };
        assert_eq!(artifact.path(), scratch.path().join("locks/docker.json"));
        let content = artifact.read().await.unwrap();
        assert_eq!(content.as_bytes(), br#"{"dockerfiles":{}}"#);
    }

    #[tokio::test]
    async fn payload_mode_false_is_unchanged() {
        let tools = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let script = write_script(tools.path(), "echo false\n");
        let repo = RepoId::new("acme", "widgets");
        let generator = ScriptGenerator::new("sh", script, OutputMode::Payload);

        let run = generator.generate(request(&repo, scratch.path())).await.unwrap();

        assert_eq!(run.outcome, GeneratorOutcome::Unchanged);
        assert!(!scratch.path().join("docker-lock.json").exists());
    }

    #[tokio::test]
    async fn missing_program_is_spawn_failure() {
        let scratch = tempfile::tempdir().unwrap();
        let repo = RepoId::new("acme", "widgets");
        let generator = ScriptGenerator::new(
            "/nonexistent/definitely-not-a-shell",
            "gen.sh",
            OutputMode::Indicator,
        );

        let err = generator
            .generate(request(&repo, scratch.path()))
            .await
            .unwrap_err();

        assert!(matches!(err, GeneratorError::Spawn(_)));
    }
}
