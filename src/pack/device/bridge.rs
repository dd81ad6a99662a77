//! Device bridge client.
//!
//! [`AdbBridge`] drives the `adb` executable; the bridge's own wire protocol
//! is left to the adb server.

use crate::pack::{
    error::{Error, Result},
    process::{CommandRunner, CommandSpec},
};
use async_trait::async_trait;
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

/// Connection state reported by the bridge for a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceState {
    /// Booted and authorized.
    Device,
    Offline,
    Unauthorized,
    Authorizing,
    Connecting,
    Bootloader,
    Recovery,
    Sideload,
    Host,
    NoPermissions,
    Unknown(String),
}

impl DeviceState {
    /// Only [`DeviceState::Device`] accepts transfers.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Device)
    }
}

impl FromStr for DeviceState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "device" => Self::Device,
            "offline" => Self::Offline,
            "unauthorized" => Self::Unauthorized,
            "authorizing" => Self::Authorizing,
            "connecting" => Self::Connecting,
            "bootloader" => Self::Bootloader,
            "recovery" => Self::Recovery,
            "sideload" => Self::Sideload,
            "host" => Self::Host,
            s if s.starts_with("no permissions") => Self::NoPermissions,
            other => Self::Unknown(other.to_string()),
        })
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Device => "device",
            Self::Offline => "offline",
            Self::Unauthorized => "unauthorized",
            Self::Authorizing => "authorizing",
            Self::Connecting => "connecting",
            Self::Bootloader => "bootloader",
            Self::Recovery => "recovery",
            Self::Sideload => "sideload",
            Self::Host => "host",
            Self::NoPermissions => "no permissions",
            Self::Unknown(other) => other,
        };
        f.write_str(s)
    }
}

/// A device as listed by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedDevice {
    pub serial: String,
    pub state: DeviceState,
}

impl ConnectedDevice {
    pub fn new(serial: impl Into<String>, state: DeviceState) -> Self {
        Self {
            serial: serial.into(),
            state,
        }
    }
}

/// Operations the pipeline needs from a device bridge.
#[async_trait]
pub trait DeviceBridge: Send + Sync {
    /// Starts the bridge server if it is not running.
    async fn ensure_server(&self) -> Result<()>;

    /// Lists connected devices with their states.
    async fn list_devices(&self) -> Result<Vec<ConnectedDevice>>;

    /// Copies `local` to the absolute `remote` path on device `serial`.
    async fn push(&self, serial: &str, local: &Path, remote: &str) -> Result<()>;
}

/// [`DeviceBridge`] that shells out to `adb`.
pub struct AdbBridge {
    adb: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl AdbBridge {
    pub fn new(adb: PathBuf, runner: Arc<dyn CommandRunner>) -> Self {
        Self { adb, runner }
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(&self.adb)
    }
}

#[async_trait]
impl DeviceBridge for AdbBridge {
    async fn ensure_server(&self) -> Result<()> {
        log::debug!("Starting adb server via {}", self.adb.display());
        let output = self
            .runner
            .run(&self.command().arg("start-server"))
            .await
            .map_err(|e| Error::BridgeServerUnavailable {
                reason: format!("unable to start the adb server: {e}"),
            })?;

        if !output.success() {
            return Err(Error::BridgeServerUnavailable {
                reason: format!(
                    "'adb start-server' returned {}: {}",
                    output
                        .exit_code
                        .map_or_else(|| "no exit code".to_string(), |c| c.to_string()),
                    output.failure_text()
                ),
            });
        }
        Ok(())
    }

    async fn list_devices(&self) -> Result<Vec<ConnectedDevice>> {
        let output = self.runner.run(&self.command().arg("devices")).await?;
        if !output.success() {
            return Err(Error::BridgeServerUnavailable {
                reason: format!("'adb devices' failed: {}", output.failure_text()),
            });
        }
        Ok(parse_device_list(&output.stdout))
    }

    async fn push(&self, serial: &str, local: &Path, remote: &str) -> Result<()> {
        let spec = self
            .command()
            .args(["-s", serial, "push"])
            .arg(local)
            .arg(remote);
        let output = self.runner.run(&spec).await?;
        if output.success() {
            Ok(())
        } else {
            Err(Error::GenericError(format!(
                "adb push exited with {:?}: {}",
                output.exit_code,
                output.failure_text()
            )))
        }
    }
}

/// Parses `adb devices` output.
///
/// Lines look like `<serial>\t<state>`; the header, daemon notices and blank
/// lines are skipped.
pub fn parse_device_list(stdout: &str) -> Vec<ConnectedDevice> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('*'))
        .filter(|line| !line.starts_with("List of devices"))
        .filter_map(|line| {
            let (serial, state) = line.split_once(char::is_whitespace)?;
            let state = state.trim().parse().ok()?;
            Some(ConnectedDevice::new(serial, state))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::{fakes::FakeCommandRunner, process::CommandOutput};

    #[test]
    fn parses_device_listing() {
        let out = "* daemon not running; starting now at tcp:5037\n\
                   * daemon started successfully\n\
                   List of devices attached\n\
                   emulator-5554\tdevice\n\
                   R58M12ABCDE\tunauthorized\n\
                   0123456789\tno permissions (user in plugdev group)\n\
                   \n";
        let devices = parse_device_list(out);
        assert_eq!(
            devices,
            vec![
                ConnectedDevice::new("emulator-5554", DeviceState::Device),
                ConnectedDevice::new("R58M12ABCDE", DeviceState::Unauthorized),
                ConnectedDevice::new("0123456789", DeviceState::NoPermissions),
            ]
        );
    }

    #[test]
    fn only_device_state_is_ready() {
        assert!(DeviceState::Device.is_ready());
        for state in ["offline", "unauthorized", "recovery", "weird"] {
            assert!(!state.parse::<DeviceState>().unwrap().is_ready());
        }
    }

    #[tokio::test]
    async fn start_server_failure_is_bridge_unavailable() {
        let runner = Arc::new(FakeCommandRunner::with_handler(|_| CommandOutput {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "cannot bind 'tcp:5037'".into(),
        }));
        let bridge = AdbBridge::new(PathBuf::from("adb"), runner);

        let err = bridge.ensure_server().await.unwrap_err();
        match err {
            Error::BridgeServerUnavailable { reason } => {
                assert!(reason.contains("returned 1"));
                assert!(reason.contains("tcp:5037"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn push_failure_keeps_stdout_message() {
        let runner = Arc::new(FakeCommandRunner::with_handler(|_| CommandOutput {
            exit_code: Some(1),
            stdout: "adb: error: failed to copy 'pack.jar' to '/sdcard/Packs/pack.jar': \
                     remote secure_mkdirs() failed: Permission denied\n"
                .into(),
            stderr: String::new(),
        }));
        let bridge = AdbBridge::new(PathBuf::from("adb"), runner);

        let err = bridge
            .push("phone1", Path::new("/out/pack.jar"), "/sdcard/Packs/pack.jar")
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("Some(1)"), "{message}");
        assert!(message.contains("Permission denied"), "{message}");
    }

    #[tokio::test]
    async fn push_invokes_adb_with_serial() {
        let runner = Arc::new(FakeCommandRunner::new());
        let bridge = AdbBridge::new(PathBuf::from("/sdk/platform-tools/adb"), runner.clone());

        bridge
            .push("emulator-5554", Path::new("/out/pack.jar"), "/sdcard/Packs/pack.jar")
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        let args: Vec<_> = calls[0]
            .get_args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            ["-s", "emulator-5554", "push", "/out/pack.jar", "/sdcard/Packs/pack.jar"]
        );
    }
}
