use std::path::Path;
use std::process::Command;

use orgmirror_core::credentials::redact;
use orgmirror_core::error::MirrorError;
use orgmirror_core::models::repo::TransferUrl;

/// Name of the metadata directory that marks a working copy.
pub const MARKER: &str = ".git";

/// Result of a git command execution.
#[derive(Debug)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

/// The two transfers the orchestrator needs from a version-control tool.
pub trait Transfer: Send + Sync {
    /// Create a new working copy of `url` at `dest`.
    fn clone_into(&self, url: &TransferUrl, dest: &Path) -> Result<(), MirrorError>;

    /// Bring the working copy at `dest` up to date.
    fn pull_into(&self, url: &TransferUrl, dest: &Path) -> Result<(), MirrorError>;
}

/// [`Transfer`] backed by the `git` executable.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitCli;

impl Transfer for GitCli {
    fn clone_into(&self, url: &TransferUrl, dest: &Path) -> Result<(), MirrorError> {
        clone(url, dest)
    }

    fn pull_into(&self, url: &TransferUrl, dest: &Path) -> Result<(), MirrorError> {
        pull(url, dest)
    }
}

/// True iff `root/name/.git` exists.
pub fn is_working_copy(root: &Path, name: &str) -> bool {
    root.join(name).join(MARKER).exists()
}

fn base_command() -> Command {
    let mut cmd = Command::new("git");
    // A daemon has nobody to answer a credential prompt.
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd
}

fn run(mut cmd: Command, what: &str) -> Result<GitOutput, MirrorError> {
    let output = cmd.output().map_err(|e| MirrorError::GitError {
        message: format!("failed to run git {what}: {e}"),
    })?;

    Ok(GitOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        success: output.status.success(),
    })
}

/// Run a git command in the given directory.
fn git(dir: &Path, args: &[&str]) -> Result<GitOutput, MirrorError> {
    let mut cmd = base_command();
    cmd.args(args).current_dir(dir);
    run(cmd, &args.join(" "))
}

/// Run a git command in the given directory, returning an error if it fails.
fn git_ok(dir: &Path, args: &[&str]) -> Result<String, MirrorError> {
    let out = git(dir, args)?;
    if !out.success {
        return Err(MirrorError::GitError {
            message: format!("git {} failed: {}", args.join(" "), out.stderr.trim()),
        });
    }
    Ok(out.stdout)
}

/// Keep the authenticated URL out of error messages.
fn scrub_url(text: &str, url: &TransferUrl) -> String {
    if url.is_authenticated() {
        text.replace(&url.authenticated, &redact(&url.authenticated))
    } else {
        text.to_string()
    }
}

/// Hand the credentials to this one git process as an `insteadOf` rewrite
/// from the plain URL to the authenticated one. Nothing is written to disk.
fn transient_credentials(cmd: &mut Command, url: &TransferUrl) {
    if url.is_authenticated() {
        cmd.env("GIT_CONFIG_COUNT", "1")
            .env("GIT_CONFIG_KEY_0", format!("url.{}.insteadOf", url.authenticated))
            .env("GIT_CONFIG_VALUE_0", &url.plain);
    }
}

/// Clone a repo to a local path.
///
/// The plain URL is what git records as `origin`; the token only reaches the
/// transport through [`transient_credentials`].
pub fn clone(url: &TransferUrl, dest: &Path) -> Result<(), MirrorError> {
    let dest_str = dest.to_string_lossy();
    let mut cmd = base_command();
    cmd.args(["clone", &url.plain, &dest_str]);
    transient_credentials(&mut cmd, url);
    let out = run(cmd, "clone")?;

    if !out.success {
        return Err(MirrorError::GitError {
            message: format!("git clone failed: {}", scrub_url(out.stderr.trim(), url)),
        });
    }
    Ok(())
}

/// Pull in an existing working copy.
///
/// `origin` is first pointed at the current plain URL, so a renamed or moved
/// repository still matches the credential rewrite.
pub fn pull(url: &TransferUrl, dest: &Path) -> Result<(), MirrorError> {
    match remote_url(dest, "origin") {
        Ok(current) if current == url.plain => {}
        _ => {
            git_ok(dest, &["remote", "set-url", "origin", &url.plain])?;
        }
    }

    let mut cmd = base_command();
    cmd.arg("pull").current_dir(dest);
    transient_credentials(&mut cmd, url);
    let out = run(cmd, "pull")?;

    if !out.success {
        return Err(MirrorError::GitError {
            message: format!("git pull failed: {}", scrub_url(out.stderr.trim(), url)),
        });
    }
    Ok(())
}

/// Set the global identity used for any commits git creates while pulling.
pub fn configure_identity(name: &str, email: &str) -> Result<(), MirrorError> {
    for (key, value) in [("user.name", name), ("user.email", email)] {
        let mut cmd = base_command();
        cmd.args(["config", "--global", key, value]);
        let out = run(cmd, "config")?;
        if !out.success {
            return Err(MirrorError::GitError {
                message: format!("git config {key} failed: {}", out.stderr.trim()),
            });
        }
    }
    Ok(())
}

/// Get the current branch name.
pub fn current_branch(dir: &Path) -> Result<String, MirrorError> {
    let stdout = git_ok(dir, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    Ok(stdout.trim().to_string())
}

/// Get the URL of a remote as stored in the repo config.
pub fn remote_url(dir: &Path, remote: &str) -> Result<String, MirrorError> {
    let key = format!("remote.{remote}.url");
    let stdout = git_ok(dir, &["config", "--get", &key])?;
    Ok(stdout.trim().to_string())
}
