//! # Local adapter: workers as child processes.
//!
//! Spawns each worker as a local OS process, which makes a full
//! spawn/pair/recycle cycle runnable on one machine. The "control channel"
//! is the child's stdin: pushing a release copies the archive into the
//! worker's directory, and starting it writes a `load ...` control line the
//! worker program is expected to understand.
//!
//! Worker layout on disk:
//! ```text
//! <base_dir>/<worker-name>/           working directory of the process
//! <base_dir>/<worker-name>/release.tar.gz   pushed archive
//! ```

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::error::AdapterError;
use crate::labor::{Labor, Phase};
use crate::release::EntryPoint;

use super::{worker_name, Adapter};

/// Options for [`LocalAdapter`].
#[derive(Clone, Debug)]
pub struct LocalOptions {
    /// Worker name prefix.
    pub prefix: String,
    /// Directory under which per-worker directories are created.
    pub base_dir: PathBuf,
    /// Worker program and arguments.
    pub command: Vec<String>,
}

impl LocalOptions {
    /// Creates options with the default base directory
    /// (`<tmp>/overseer-workers`).
    pub fn new(prefix: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            prefix: prefix.into(),
            base_dir: std::env::temp_dir().join("overseer-workers"),
            command,
        }
    }
}

/// Local process-backed provisioning adapter.
pub struct LocalAdapter {
    opts: LocalOptions,
    children: DashMap<String, Arc<Mutex<Child>>>,
}

impl LocalAdapter {
    /// Creates the adapter.
    pub fn new(opts: LocalOptions) -> Self {
        Self {
            opts,
            children: DashMap::new(),
        }
    }

    fn worker_dir(&self, name: &str) -> PathBuf {
        self.opts.base_dir.join(name)
    }

    fn child(&self, name: &str) -> Option<Arc<Mutex<Child>>> {
        self.children.get(name).map(|entry| Arc::clone(&entry))
    }
}

#[async_trait]
impl Adapter for LocalAdapter {
    async fn spawn(&self, overseer_id: &str) -> Result<Labor, AdapterError> {
        let program = self
            .opts
            .command
            .first()
            .ok_or_else(|| AdapterError::SpawnFailed {
                reason: "empty worker command".to_string(),
            })?;

        let name = worker_name(&self.opts.prefix, "localhost");
        let dir = self.worker_dir(&name);
        tokio::fs::create_dir_all(&dir).await?;

        let child = Command::new(program)
            .args(&self.opts.command[1..])
            .env("OVERSEER_ID", overseer_id)
            .env("OVERSEER_WORKER", &name)
            .current_dir(&dir)
            .stdin(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AdapterError::SpawnFailed {
                reason: format!("{program}: {e}"),
            })?;

        let handle = child
            .id()
            .map(|pid| pid.to_string())
            .unwrap_or_else(|| "exited".to_string());
        self.children.insert(name.clone(), Arc::new(Mutex::new(child)));

        Ok(Labor::new(name, handle))
    }

    async fn terminate(&self, labor: &Labor) -> Result<Labor, AdapterError> {
        if let Some((_, child)) = self.children.remove(&labor.name) {
            let mut child = child.lock().await;
            // Already-exited children make start_kill fail; that is fine.
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        let _ = tokio::fs::remove_dir_all(self.worker_dir(&labor.name)).await;

        Ok(labor.clone().into_phase(Phase::Terminated))
    }

    async fn connect(&self, labor: &Labor) -> Result<(), AdapterError> {
        let child = self.child(&labor.name).ok_or_else(|| AdapterError::ConnectFailed {
            name: labor.name.clone(),
            reason: "no such worker process".to_string(),
        })?;

        let mut child = child.lock().await;
        match child.try_wait() {
            Ok(None) => Ok(()),
            Ok(Some(status)) => Err(AdapterError::ConnectFailed {
                name: labor.name.clone(),
                reason: format!("worker process exited: {status}"),
            }),
            Err(e) => Err(AdapterError::ConnectFailed {
                name: labor.name.clone(),
                reason: e.to_string(),
            }),
        }
    }

    async fn push_release(&self, labor: &Labor, archive: &std::path::Path) -> Result<(), AdapterError> {
        let dest = self.worker_dir(&labor.name).join("release.tar.gz");
        tokio::fs::copy(archive, &dest)
            .await
            .map_err(|e| AdapterError::PushFailed {
                name: labor.name.clone(),
                reason: format!("{} -> {}: {e}", archive.display(), dest.display()),
            })?;
        Ok(())
    }

    async fn start_release(
        &self,
        labor: &Labor,
        entry: Option<&EntryPoint>,
    ) -> Result<(), AdapterError> {
        let child = self.child(&labor.name).ok_or_else(|| AdapterError::StartFailed {
            name: labor.name.clone(),
            reason: "no such worker process".to_string(),
        })?;

        let line = match entry {
            Some(ep) => format!("load release.tar.gz {} {}\n", ep.module, ep.function),
            None => "load release.tar.gz\n".to_string(),
        };

        let mut child = child.lock().await;
        let stdin = child.stdin.as_mut().ok_or_else(|| AdapterError::StartFailed {
            name: labor.name.clone(),
            reason: "worker stdin closed".to_string(),
        })?;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| AdapterError::StartFailed {
                name: labor.name.clone(),
                reason: e.to_string(),
            })?;
        stdin.flush().await.map_err(|e| AdapterError::StartFailed {
            name: labor.name.clone(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat_adapter() -> LocalAdapter {
        LocalAdapter::new(LocalOptions::new("w", vec!["cat".to_string()]))
    }

    #[tokio::test]
    async fn spawn_connect_terminate_cycle() {
        let adapter = cat_adapter();
        let labor = adapter.spawn("overseer-test").await.expect("spawn");
        assert!(labor.name.starts_with("w-"));
        assert_eq!(labor.phase, Phase::Spawning);

        adapter.connect(&labor).await.expect("worker is running");

        let terminated = adapter.terminate(&labor).await.expect("terminate");
        assert_eq!(terminated.phase, Phase::Terminated);

        // Second terminate is idempotent.
        let again = adapter.terminate(&labor).await.expect("terminate again");
        assert_eq!(again.phase, Phase::Terminated);
    }

    #[tokio::test]
    async fn spawn_fails_for_missing_program() {
        let adapter = LocalAdapter::new(LocalOptions::new(
            "w",
            vec!["definitely-not-a-real-binary-3f9k".to_string()],
        ));
        assert!(matches!(
            adapter.spawn("overseer-test").await,
            Err(AdapterError::SpawnFailed { .. })
        ));
    }

    #[tokio::test]
    async fn start_release_writes_control_line() {
        let adapter = cat_adapter();
        let labor = adapter.spawn("overseer-test").await.expect("spawn");

        adapter
            .start_release(&labor, Some(&EntryPoint::new("fleet_worker", "start")))
            .await
            .expect("control line accepted");

        let _ = adapter.terminate(&labor).await;
    }
}
