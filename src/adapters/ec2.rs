//! # EC2 adapter: workers on freshly provisioned instances.
//!
//! Provisions one instance per worker through the AWS SDK (optionally as
//! spot capacity), waits for the instance to be running and reachable,
//! and uses an SSH session as the control channel: the release archive is
//! streamed over SSH and the worker's entry command is executed remotely.
//!
//! Instance options are forwarded verbatim to the cloud API; the adapter
//! does not interpret them beyond plumbing.
//!
//! Worker names are `prefix-<random>@<instance-id>`; the instance id is
//! also the labor handle, so terminate works even when the instance never
//! became reachable.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_ec2::error::ProvideErrorMetadata;
use aws_sdk_ec2::types::{InstanceMarketOptionsRequest, InstanceStateName, InstanceType, MarketType};
use dashmap::DashMap;
use openssh::{KnownHosts, Session, Stdio};
use tokio::time::Instant;

use crate::error::AdapterError;
use crate::labor::{Labor, Phase};
use crate::release::EntryPoint;

use super::{worker_name, Adapter};

/// Options for [`Ec2Adapter`], forwarded to the EC2 API.
#[derive(Clone, Debug)]
pub struct Ec2Options {
    /// Worker name prefix.
    pub prefix: String,
    /// AMI to launch.
    pub image: String,
    /// Instance type, e.g. `"c6i.large"`.
    pub instance_type: String,
    /// Request spot capacity instead of on-demand.
    pub spot: bool,
    /// Subnet to launch into.
    pub subnet: Option<String>,
    /// Region override; the default credential chain's region otherwise.
    pub region: Option<String>,
    /// Key pair name for SSH.
    pub key_name: Option<String>,
    /// Security group ids attached to the instance.
    pub security_group_ids: Vec<String>,
    /// SSH login user on the AMI.
    pub ssh_user: String,
    /// Remote directory releases are pushed into.
    pub remote_dir: String,
    /// How long `connect` waits for running-state and SSH readiness.
    pub ready_timeout: Duration,
}

impl Ec2Options {
    /// Creates options with `ssh_user = "ec2-user"`,
    /// `remote_dir = "/opt/overseer"`, and a 3 minute readiness window.
    pub fn new(
        prefix: impl Into<String>,
        image: impl Into<String>,
        instance_type: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            image: image.into(),
            instance_type: instance_type.into(),
            spot: false,
            subnet: None,
            region: None,
            key_name: None,
            security_group_ids: Vec::new(),
            ssh_user: "ec2-user".to_string(),
            remote_dir: "/opt/overseer".to_string(),
            ready_timeout: Duration::from_secs(180),
        }
    }
}

/// EC2-backed provisioning adapter.
pub struct Ec2Adapter {
    client: aws_sdk_ec2::Client,
    opts: Ec2Options,
    sessions: DashMap<String, Arc<Session>>,
}

impl Ec2Adapter {
    /// Creates the adapter, resolving credentials and region from the
    /// default chain (with the options' region override applied).
    pub async fn new(opts: Ec2Options) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = opts.region.clone() {
            loader = loader.region(aws_config::Region::new(region));
        }
        let shared = loader.load().await;

        Self {
            client: aws_sdk_ec2::Client::new(&shared),
            opts,
            sessions: DashMap::new(),
        }
    }

    fn session(&self, name: &str) -> Option<Arc<Session>> {
        self.sessions.get(name).map(|entry| Arc::clone(&entry))
    }

    /// Polls until the instance is running with an address, then opens the
    /// SSH session.
    async fn wait_ready(&self, labor: &Labor) -> Result<Arc<Session>, AdapterError> {
        let deadline = Instant::now() + self.opts.ready_timeout;
        let poll = Duration::from_secs(5);

        let address = loop {
            let described = self
                .client
                .describe_instances()
                .instance_ids(&labor.handle)
                .send()
                .await
                .map_err(|e| AdapterError::ConnectFailed {
                    name: labor.name.clone(),
                    reason: e.to_string(),
                })?;

            let instance = described
                .reservations()
                .first()
                .and_then(|r| r.instances().first());
            if let Some(instance) = instance {
                let running = instance
                    .state()
                    .and_then(|s| s.name())
                    .map(|n| n == &InstanceStateName::Running)
                    .unwrap_or(false);
                let address = instance
                    .public_ip_address()
                    .or(instance.private_ip_address());
                if running {
                    if let Some(ip) = address {
                        break ip.to_string();
                    }
                }
            }

            if Instant::now() >= deadline {
                return Err(AdapterError::ConnectFailed {
                    name: labor.name.clone(),
                    reason: format!(
                        "instance {} not running within {:?}",
                        labor.handle, self.opts.ready_timeout
                    ),
                });
            }
            tokio::time::sleep(poll).await;
        };

        loop {
            match Session::connect_mux(
                format!("{}@{}", self.opts.ssh_user, address),
                KnownHosts::Accept,
            )
            .await
            {
                Ok(session) => {
                    let session = Arc::new(session);
                    self.sessions
                        .insert(labor.name.clone(), Arc::clone(&session));
                    return Ok(session);
                }
                Err(e) => {
                    if Instant::now() >= deadline {
                        return Err(AdapterError::ConnectFailed {
                            name: labor.name.clone(),
                            reason: format!("ssh to {address}: {e}"),
                        });
                    }
                    tokio::time::sleep(poll).await;
                }
            }
        }
    }
}

#[async_trait]
impl Adapter for Ec2Adapter {
    async fn spawn(&self, _overseer_id: &str) -> Result<Labor, AdapterError> {
        let mut request = self
            .client
            .run_instances()
            .image_id(&self.opts.image)
            .instance_type(InstanceType::from(self.opts.instance_type.as_str()))
            .min_count(1)
            .max_count(1);

        if let Some(subnet) = &self.opts.subnet {
            request = request.subnet_id(subnet);
        }
        if let Some(key) = &self.opts.key_name {
            request = request.key_name(key);
        }
        for sg in &self.opts.security_group_ids {
            request = request.security_group_ids(sg);
        }
        if self.opts.spot {
            request = request.instance_market_options(
                InstanceMarketOptionsRequest::builder()
                    .market_type(MarketType::Spot)
                    .build(),
            );
        }

        let launched = request.send().await.map_err(|e| AdapterError::SpawnFailed {
            reason: e.to_string(),
        })?;
        let instance_id = launched
            .instances()
            .first()
            .and_then(|i| i.instance_id())
            .ok_or_else(|| AdapterError::SpawnFailed {
                reason: "run_instances returned no instance".to_string(),
            })?;

        let name = worker_name(&self.opts.prefix, instance_id);
        Ok(Labor::new(name, instance_id))
    }

    async fn terminate(&self, labor: &Labor) -> Result<Labor, AdapterError> {
        self.sessions.remove(&labor.name);

        let result = self
            .client
            .terminate_instances()
            .instance_ids(&labor.handle)
            .send()
            .await;

        match result {
            Ok(_) => Ok(labor.clone().into_phase(Phase::Terminated)),
            // A vanished instance means the work is already done.
            Err(e) if e.code().is_some_and(|c| c.starts_with("InvalidInstanceID")) => {
                Ok(labor.clone().into_phase(Phase::Terminated))
            }
            Err(e) => Err(AdapterError::TerminateFailed {
                name: labor.name.clone(),
                reason: e.to_string(),
            }),
        }
    }

    async fn connect(&self, labor: &Labor) -> Result<(), AdapterError> {
        if let Some(session) = self.session(&labor.name) {
            if session.check().await.is_ok() {
                return Ok(());
            }
            self.sessions.remove(&labor.name);
        }
        self.wait_ready(labor).await?;
        Ok(())
    }

    async fn push_release(&self, labor: &Labor, archive: &std::path::Path) -> Result<(), AdapterError> {
        let session = self.session(&labor.name).ok_or_else(|| AdapterError::PushFailed {
            name: labor.name.clone(),
            reason: "not connected".to_string(),
        })?;
        let remote = format!("{}/release.tar.gz", self.opts.remote_dir);

        let mkdir = session
            .command("mkdir")
            .arg("-p")
            .arg(&self.opts.remote_dir)
            .status()
            .await
            .map_err(|e| AdapterError::PushFailed {
                name: labor.name.clone(),
                reason: e.to_string(),
            })?;
        if !mkdir.success() {
            return Err(AdapterError::PushFailed {
                name: labor.name.clone(),
                reason: format!("mkdir -p {} failed: {mkdir}", self.opts.remote_dir),
            });
        }

        let mut receiver = session
            .command("sh")
            .arg("-c")
            .arg(format!("cat > {remote}"))
            .stdin(Stdio::piped())
            .spawn()
            .await
            .map_err(|e| AdapterError::PushFailed {
                name: labor.name.clone(),
                reason: e.to_string(),
            })?;

        let mut stdin = receiver.stdin().take().ok_or_else(|| AdapterError::PushFailed {
            name: labor.name.clone(),
            reason: "remote stdin unavailable".to_string(),
        })?;
        let mut file = tokio::fs::File::open(archive).await?;
        tokio::io::copy(&mut file, &mut stdin)
            .await
            .map_err(|e| AdapterError::PushFailed {
                name: labor.name.clone(),
                reason: e.to_string(),
            })?;
        drop(stdin);

        let status = receiver.wait().await.map_err(|e| AdapterError::PushFailed {
            name: labor.name.clone(),
            reason: e.to_string(),
        })?;
        if !status.success() {
            return Err(AdapterError::PushFailed {
                name: labor.name.clone(),
                reason: format!("remote write failed: {status}"),
            });
        }
        Ok(())
    }

    async fn start_release(
        &self,
        labor: &Labor,
        entry: Option<&EntryPoint>,
    ) -> Result<(), AdapterError> {
        let session = self.session(&labor.name).ok_or_else(|| AdapterError::StartFailed {
            name: labor.name.clone(),
            reason: "not connected".to_string(),
        })?;

        let entry_args = match entry {
            Some(ep) => format!(" {} {}", ep.module, ep.function),
            None => String::new(),
        };
        let command = format!(
            "cd {dir} && tar -xzf release.tar.gz && ./bin/start{entry_args}",
            dir = self.opts.remote_dir
        );

        let status = session
            .command("sh")
            .arg("-c")
            .arg(command)
            .status()
            .await
            .map_err(|e| AdapterError::StartFailed {
                name: labor.name.clone(),
                reason: e.to_string(),
            })?;
        if !status.success() {
            return Err(AdapterError::StartFailed {
                name: labor.name.clone(),
                reason: format!("remote start failed: {status}"),
            });
        }
        Ok(())
    }
}
