//! Maven invocation

use super::project::{create_structure, Project};
use super::MavenError;
use crate::util::process::run_and_log;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const GLOBAL_SETTINGS_FILE: &str = "settings.xml";
pub const USER_SETTINGS_FILE: &str = "user-settings.xml";

#[derive(Debug, Clone, Default)]
pub struct MavenContext {
    /// Project directory, also the working directory of the process
    pub path: PathBuf,
    pub global_settings: Option<String>,
    pub user_settings: Option<String>,
    pub local_repository: Option<String>,
    pub additional_arguments: Vec<String>,
    pub extra_maven_opts: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl MavenContext {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn add_argument(&mut self, arg: impl Into<String>) {
        self.additional_arguments.push(arg.into());
    }

    pub fn add_system_property(&mut self, name: &str, value: &str) {
        self.additional_arguments.push(format!("-D{}={}", name, value));
    }

    /// Writes settings files next to the project so `arguments` can
    /// reference them
    pub fn write_settings(&self) -> Result<(), MavenError> {
        std::fs::create_dir_all(&self.path).map_err(|e| MavenError::io(&self.path, e))?;
        for (file, content) in [
            (GLOBAL_SETTINGS_FILE, &self.global_settings),
            (USER_SETTINGS_FILE, &self.user_settings),
        ] {
            if let Some(content) = content {
                let path = self.path.join(file);
                std::fs::write(&path, content).map_err(|e| MavenError::io(&path, e))?;
            }
        }
        Ok(())
    }

    /// Command line arguments after the executable
    pub fn arguments(&self) -> Vec<String> {
        let mut args = self.additional_arguments.clone();

        if let Some(repo) = &self.local_repository {
            if Path::new(repo).exists() {
                args.push(format!("-Dmaven.repo.local={}", repo));
            }
        }

        let global = self.path.join(GLOBAL_SETTINGS_FILE);
        if global.exists() {
            args.push("--global-settings".to_string());
            args.push(global.display().to_string());
        }

        let user = self.path.join(USER_SETTINGS_FILE);
        if user.exists() {
            args.push("--settings".to_string());
            args.push(user.display().to_string());
        }

        args.push("--batch-mode".to_string());
        args
    }

    /// `MAVEN_OPTS` merged with the extra options whose keys are not
    /// already present
    pub fn maven_opts(&self, inherited: Option<&str>) -> Option<String> {
        if self.extra_maven_opts.is_empty() {
            return None;
        }
        let mut options: Vec<String> = inherited
            .map(|o| o.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let extra: Vec<String> = self
            .extra_maven_opts
            .iter()
            .filter(|opt| {
                let key = opt.split('=').next().unwrap_or(opt.as_str());
                !options.iter().any(|o| o.starts_with(key))
            })
            .cloned()
            .collect();
        options.extend(extra);
        Some(options.join(" "))
    }

    /// Writes the project and settings, then runs `maven_cmd` with the
    /// computed arguments
    pub async fn run(
        &self,
        maven_cmd: &str,
        project: Option<&Project>,
        cancel: &CancellationToken,
    ) -> Result<(), MavenError> {
        if let Some(project) = project {
            create_structure(&self.path, project).map_err(|e| MavenError::io(&self.path, e))?;
        }
        self.write_settings()?;

        let args = self.arguments();
        let mut cmd = Command::new(maven_cmd);
        cmd.args(&args).current_dir(&self.path);

        let inherited = std::env::var("MAVEN_OPTS").ok();
        let maven_opts = self.maven_opts(inherited.as_deref());
        if let Some(opts) = &maven_opts {
            cmd.env("MAVEN_OPTS", opts);
        }
        for (k, v) in &self.env {
            cmd.env(k, v);
        }

        info!(
            maven_opts = maven_opts.as_deref().unwrap_or(""),
            "executing: {} {}",
            maven_cmd,
            args.join(" ")
        );

        run_and_log(cmd, cancel).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_arguments_include_existing_settings() {
        let temp = TempDir::new().unwrap();
        let mut ctx = MavenContext::new(temp.path());
        ctx.global_settings = Some("<settings/>".to_string());
        ctx.local_repository = Some(temp.path().display().to_string());
        ctx.add_argument("package");
        ctx.write_settings().unwrap();

        let args = ctx.arguments();
        assert_eq!(args[0], "package");
        assert!(args.contains(&format!("-Dmaven.repo.local={}", temp.path().display())));
        assert!(args.contains(&"--global-settings".to_string()));
        assert!(!args.contains(&"--settings".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--batch-mode"));
    }

    #[test]
    fn test_missing_local_repository_is_skipped() {
        let mut ctx = MavenContext::new("/nonexistent/project");
        ctx.local_repository = Some("/nonexistent/m2".to_string());
        assert!(!ctx.arguments().iter().any(|a| a.starts_with("-Dmaven.repo.local")));
    }

    #[test]
    fn test_maven_opts_merge() {
        let mut ctx = MavenContext::new("/tmp");
        assert_eq!(ctx.maven_opts(Some("-Xmx1g")), None);

        ctx.extra_maven_opts = vec![
            "-Djavax.net.ssl.trustStore=/tmp/trust.jks".to_string(),
            "-Xmx2g".to_string(),
        ];
        assert_eq!(
            ctx.maven_opts(Some("-Xmx1g")).unwrap(),
            "-Xmx1g -Djavax.net.ssl.trustStore=/tmp/trust.jks"
        );
        assert_eq!(
            ctx.maven_opts(None).unwrap(),
            "-Djavax.net.ssl.trustStore=/tmp/trust.jks -Xmx2g"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_failure_reports_exit_code() {
        let temp = TempDir::new().unwrap();
        let ctx = MavenContext::new(temp.path());
        let project = Project::new("g", "a", "1");
        let err = ctx
            .run("false", Some(&project), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exited with code 1"));
        assert!(temp.path().join("pom.xml").exists());
    }
}
