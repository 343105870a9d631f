//! Device-backed acquisition source.
//!
//! Access is checked once, when the stream is requested, by opening the
//! video device for reading. Each snapshot then runs the configured command,
//! which must print a single PNG image on stdout.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use trollbuddy_core::config::CaptureConfig;

use super::source::{AcquisitionError, AcquisitionSource, FrameStream};

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const DEVICE_PLACEHOLDER: &str = "{device}";

/// Camera behind a local video device.
#[derive(Debug, Clone)]
pub struct DeviceSource {
    device: PathBuf,
    command: Vec<String>,
}

impl DeviceSource {
    pub fn new(device: impl Into<PathBuf>, command: Vec<String>) -> Self {
        Self {
            device: device.into(),
            command,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.device.clone(), config.command.clone())
    }
}

#[async_trait]
impl AcquisitionSource for DeviceSource {
    async fn request(&self) -> Result<Box<dyn FrameStream>, AcquisitionError> {
        if self.command.is_empty() {
            return Err(AcquisitionError::Unavailable(
                "no snapshot command configured".to_string(),
            ));
        }

        let device = self.device.clone();
        let probe = tokio::fs::OpenOptions::new().read(true).open(&device).await;
        match probe {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(AcquisitionError::Denied(device.display().to_string()));
            }
            Err(e) => {
                return Err(AcquisitionError::Unavailable(format!(
                    "{}: {e}",
                    device.display()
                )));
            }
        }

        let device_str = device.display().to_string();
        let argv: Vec<String> = self
            .command
            .iter()
            .map(|arg| arg.replace(DEVICE_PLACEHOLDER, &device_str))
            .collect();

        info!(device = %device_str, program = %argv[0], "Camera stream granted");
        Ok(Box::new(DeviceStream { argv, live: true }))
    }
}

struct DeviceStream {
    argv: Vec<String>,
    live: bool,
}

#[async_trait]
impl FrameStream for DeviceStream {
    async fn snapshot(&mut self) -> Result<Vec<u8>, AcquisitionError> {
        if !self.live {
            return Err(AcquisitionError::Stopped);
        }
        let Some((program, args)) = self.argv.split_first() else {
            return Err(AcquisitionError::Stopped);
        };

        debug!(program = %program, ?args, "Taking snapshot");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AcquisitionError::Snapshot(format!("failed to spawn {program}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AcquisitionError::Snapshot(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if !output.stdout.starts_with(&PNG_SIGNATURE) {
            return Err(AcquisitionError::Snapshot(
                "snapshot command did not produce a PNG image".to_string(),
            ));
        }

        Ok(output.stdout)
    }

    fn active_tracks(&self) -> usize {
        usize::from(self.live)
    }

    fn stop(&mut self) {
        if self.live {
            debug!("Camera stream stopped");
        }
        self.live = false;
    }
}
