use std::path::Path;

use crate::config::{ReleaseConfig, SshMode};
use crate::error::{CommandFailedDetails, Error, Result};
use crate::utils::command::{CommandOutput, CommandRunner, Invocation};

pub struct SshClient {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub identity_file: Option<String>,
    pub mode: SshMode,
    pub scp_flags: Vec<String>,
}

impl SshClient {
    pub fn from_config(config: &ReleaseConfig) -> Self {
        Self {
            host: config.host.clone(),
            user: config.user.clone(),
            port: config.port,
            identity_file: config.identity_file.clone(),
            mode: config.ssh_mode,
            scp_flags: config.scp_flags.clone(),
        }
    }

    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    fn ssh_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }

        if self.port != 22 {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }

        // Fail fast on stalled connections or unexpected prompts.
        for option in [
            "BatchMode=yes",
            "ConnectTimeout=10",
            "ServerAliveInterval=15",
            "ServerAliveCountMax=3",
        ] {
            args.push("-o".to_string());
            args.push(option.to_string());
        }

        args.push(self.destination());
        args
    }

    /// Build the invocation that runs `script` in one remote shell session.
    pub fn script_invocation(&self, script: &str, timeout_secs: u64) -> Invocation {
        let invocation = match self.mode {
            SshMode::Stdin => Invocation::new("ssh")
                .args(self.ssh_args())
                .args(["bash", "-s"])
                .stdin(script),
            SshMode::Argument => Invocation::new("ssh").args(self.ssh_args()).arg(script),
        };
        invocation.timeout_secs(timeout_secs)
    }

    pub fn run_script(
        &self,
        runner: &dyn CommandRunner,
        script: &str,
        timeout_secs: u64,
    ) -> Result<CommandOutput> {
        runner.run(&self.script_invocation(script, timeout_secs))
    }

    /// Build the scp invocation copying `local_path` to `remote_path` on the host.
    pub fn upload_invocation(&self, local_path: &Path, remote_path: &str, timeout_secs: u64) -> Invocation {
        let local = local_path.to_string_lossy().to_string();

        let mut args: Vec<String> = self.scp_flags.clone();
        if let Some(identity_file) = &self.identity_file {
            args.extend(["-i".to_string(), identity_file.clone()]);
        }
        if self.port != 22 {
            args.extend(["-P".to_string(), self.port.to_string()]);
        }
        args.extend(["-o".to_string(), "BatchMode=yes".to_string()]);
        args.extend(["-o".to_string(), "ConnectTimeout=10".to_string()]);
        args.push(local);
        args.push(format!("{}:{}", self.destination(), remote_path));

        Invocation::new("scp").args(args).timeout_secs(timeout_secs)
    }

    pub fn upload(
        &self,
        runner: &dyn CommandRunner,
        local_path: &Path,
        remote_path: &str,
        timeout_secs: u64,
    ) -> Result<CommandOutput> {
        let invocation = self.upload_invocation(local_path, remote_path, timeout_secs);
        let output = runner.run(&invocation)?;
        if !output.success {
            return Err(Error::transfer_failed(CommandFailedDetails {
                command: invocation.display(),
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            }));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(mode: SshMode) -> SshClient {
        SshClient {
            host: "203.0.113.10".to_string(),
            user: "root".to_string(),
            port: 22,
            identity_file: None,
            mode,
            scp_flags: Vec::new(),
        }
    }

    #[test]
    fn stdin_mode_pipes_script_to_bash() {
        let inv = client(SshMode::Stdin).script_invocation("cd /opt/yume", 300);
        assert_eq!(inv.program, "ssh");
        assert_eq!(inv.args.last().map(String::as_str), Some("-s"));
        assert!(inv.args.contains(&"root@203.0.113.10".to_string()));
        assert!(inv.args.contains(&"BatchMode=yes".to_string()));
        assert_eq!(inv.stdin.as_deref(), Some("cd /opt/yume"));
        assert_eq!(inv.timeout.map(|t| t.as_secs()), Some(300));
    }

    #[test]
    fn argument_mode_passes_script_last() {
        let inv = client(SshMode::Argument).script_invocation("cd /opt/yume", 0);
        assert_eq!(inv.args.last().map(String::as_str), Some("cd /opt/yume"));
        assert!(inv.stdin.is_none());
        assert!(inv.timeout.is_none());
    }

    #[test]
    fn custom_port_and_identity_are_forwarded() {
        let mut c = client(SshMode::Stdin);
        c.port = 2222;
        c.identity_file = Some("/keys/deploy".to_string());
        c.scp_flags = vec!["-O".to_string()];

        let ssh = c.script_invocation("true", 10);
        assert!(ssh.args.windows(2).any(|w| w == ["-p", "2222"]));
        assert!(ssh.args.windows(2).any(|w| w == ["-i", "/keys/deploy"]));

        let scp = c.upload_invocation(Path::new("/tmp/a.tar.gz"), "/tmp/.launchpad-a.tar.gz", 10);
        assert_eq!(scp.program, "scp");
        assert_eq!(scp.args.first().map(String::as_str), Some("-O"));
        assert!(scp.args.windows(2).any(|w| w == ["-P", "2222"]));
        assert_eq!(
            scp.args.last().map(String::as_str),
            Some("root@203.0.113.10:/tmp/.launchpad-a.tar.gz")
        );
    }

    #[test]
    fn localhost_still_goes_through_ssh_as_configured_user() {
        let mut c = client(SshMode::Stdin);
        c.host = "localhost".to_string();
        c.user = "deploy".to_string();
        c.port = 2222;

        let ssh = c.script_invocation("true", 1);
        assert_eq!(ssh.program, "ssh");
        assert!(ssh.args.contains(&"deploy@localhost".to_string()));
        assert!(ssh.args.windows(2).any(|w| w == ["-p", "2222"]));

        let scp = c.upload_invocation(Path::new("/a"), "/b", 1);
        assert_eq!(scp.program, "scp");
        assert_eq!(scp.args.last().map(String::as_str), Some("deploy@localhost:/b"));
    }
}
