// src/compiler.rs

//! Model compilation seam.

use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info};

use crate::project::Project;

/// Recompiles a project's derived artifacts.
///
/// Must be safe to call repeatedly. Calls from the recompile supervisor are
/// sequential, but nothing stops other callers from compiling concurrently.
pub trait Compiler: Send + Sync {
    fn compile(&self) -> Result<()>;
}

/// Default compiler: runs `[compiler].cmd` from the project root.
///
/// Without a configured command, compiling is a no-op.
#[derive(Debug, Clone)]
pub struct ProjectCompiler {
    root: PathBuf,
    cmd: Option<String>,
}

impl ProjectCompiler {
    pub fn new(project: &Project) -> Self {
        Self {
            root: project.root().to_path_buf(),
            cmd: project.config().compiler().cmd.clone(),
        }
    }
}

impl Compiler for ProjectCompiler {
    fn compile(&self) -> Result<()> {
        let Some(cmdline) = self.cmd.as_deref() else {
            debug!("no [compiler].cmd configured; skipping compilation");
            return Ok(());
        };

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(cmdline);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(cmdline);
            c
        };

        let output = cmd
            .current_dir(&self.root)
            .output()
            .with_context(|| format!("running compiler command '{cmdline}'"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "compiler command '{}' exited with code {}: {}",
                cmdline,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            ));
        }

        info!(cmd = %cmdline, "models compiled");
        Ok(())
    }
}
