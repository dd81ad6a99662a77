//! In-memory fakes for the pipeline's external boundaries (testing only)
//!
//! Provides `FakeCommandRunner`, `MemoryDeviceBridge` and `KeystoreFixture`
//! so stages can be exercised without spawning tools or touching devices.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::pack::device::{ConnectedDevice, DeviceBridge, DeviceState};
use crate::pack::error::{Error, Result};
use crate::pack::process::{CommandOutput, CommandRunner, CommandSpec};
use crate::pack::sign::keystore::{
    JKS_MAGIC, KEY_PROTECTOR_OID, integrity_digest, key_check_digest, keystream, password_bytes,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// FakeCommandRunner
// ---------------------------------------------------------------------------

type Handler = Box<dyn Fn(&CommandSpec) -> CommandOutput + Send + Sync>;

/// Records every command and answers with a handler (exit 0 by default).
pub struct FakeCommandRunner {
    handler: Handler,
    calls: Mutex<Vec<CommandSpec>>,
}

impl Default for FakeCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCommandRunner {
    pub fn new() -> Self {
        Self::with_handler(|_| CommandOutput {
            exit_code: Some(0),
            ..Default::default()
        })
    }

    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&CommandSpec) -> CommandOutput + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Commands run so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl CommandRunner for FakeCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        lock(&self.calls).push(spec.clone());
        Ok((self.handler)(spec))
    }
}

// ---------------------------------------------------------------------------
// MemoryDeviceBridge
// ---------------------------------------------------------------------------

/// Device bridge over a fixed device list. Pushes are recorded, not performed.
#[derive(Debug, Default)]
pub struct MemoryDeviceBridge {
    devices: Vec<ConnectedDevice>,
    failing: HashSet<String>,
    server_down: bool,
    pushes: Mutex<Vec<(String, PathBuf, String)>>,
}

impl MemoryDeviceBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, serial: &str, state: DeviceState) -> Self {
        self.devices.push(ConnectedDevice::new(serial, state));
        self
    }

    /// Transfers to `serial` fail.
    pub fn failing(mut self, serial: &str) -> Self {
        self.failing.insert(serial.to_string());
        self
    }

    /// `ensure_server` fails.
    pub fn server_down(mut self) -> Self {
        self.server_down = true;
        self
    }

    /// Successful pushes as `(serial, local, remote)`.
    pub fn pushes(&self) -> Vec<(String, PathBuf, String)> {
        lock(&self.pushes).clone()
    }
}

#[async_trait]
impl DeviceBridge for MemoryDeviceBridge {
    async fn ensure_server(&self) -> Result<()> {
        if self.server_down {
            return Err(Error::BridgeServerUnavailable {
                reason: "'adb start-server' returned 1".into(),
            });
        }
        Ok(())
    }

    async fn list_devices(&self) -> Result<Vec<ConnectedDevice>> {
        Ok(self.devices.clone())
    }

    async fn push(&self, serial: &str, local: &Path, remote: &str) -> Result<()> {
        if self.failing.contains(serial) {
            return Err(Error::GenericError(format!("device '{serial}' not found")));
        }
        lock(&self.pushes).push((serial.to_string(), local.to_path_buf(), remote.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// KeystoreFixture
// ---------------------------------------------------------------------------

enum FixtureEntry {
    PrivateKey {
        alias: String,
        key_password: String,
        key: Vec<u8>,
    },
    TrustedCert {
        alias: String,
    },
}

/// Writes JKS (version 2) keystores.
pub struct KeystoreFixture {
    store_password: String,
    entries: Vec<FixtureEntry>,
}

impl KeystoreFixture {
    pub fn new(store_password: &str) -> Self {
        Self {
            store_password: store_password.to_string(),
            entries: Vec::new(),
        }
    }

    /// Adds a private key entry protected with `key_password`.
    pub fn private_key(mut self, alias: &str, key_password: &str, key: &[u8]) -> Self {
        self.entries.push(FixtureEntry::PrivateKey {
            alias: alias.to_lowercase(),
            key_password: key_password.to_string(),
            key: key.to_vec(),
        });
        self
    }

    pub fn trusted_cert(mut self, alias: &str) -> Self {
        self.entries.push(FixtureEntry::TrustedCert {
            alias: alias.to_lowercase(),
        });
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&JKS_MAGIC.to_be_bytes());
        out.extend_from_slice(&2u32.to_be_bytes());
        out.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());

        for (index, entry) in self.entries.iter().enumerate() {
            match entry {
                FixtureEntry::PrivateKey {
                    alias,
                    key_password,
                    key,
                } => {
                    out.extend_from_slice(&1u32.to_be_bytes());
                    write_utf(&mut out, alias);
                    out.extend_from_slice(&0u64.to_be_bytes());
                    let protected = encrypted_private_key_info(key_password, key, index as u8);
                    write_sized(&mut out, &protected);
                    out.extend_from_slice(&1u32.to_be_bytes());
                    write_certificate(&mut out);
                }
                FixtureEntry::TrustedCert { alias } => {
                    out.extend_from_slice(&2u32.to_be_bytes());
                    write_utf(&mut out, alias);
                    out.extend_from_slice(&0u64.to_be_bytes());
                    write_certificate(&mut out);
                }
            }
        }

        let digest = integrity_digest(&self.store_password, &out);
        out.extend_from_slice(&digest);
        out
    }
}

fn write_utf(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn write_sized(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn write_certificate(out: &mut Vec<u8>) {
    write_utf(out, "X.509");
    write_sized(out, b"not-a-real-certificate");
}

fn encrypted_private_key_info(key_password: &str, key: &[u8], seed: u8) -> Vec<u8> {
    let password = password_bytes(key_password);
    let salt = [seed.wrapping_add(0x5A); 20];
    let mut protected = salt.to_vec();
    protected.extend(
        key.iter()
            .zip(keystream(&password, &salt, key.len()))
            .map(|(p, k)| p ^ k),
    );
    protected.extend_from_slice(&key_check_digest(&password, key));

    let mut algorithm = der(0x06, KEY_PROTECTOR_OID);
    algorithm.extend(der(0x05, &[]));
    let mut info = der(0x30, &algorithm);
    info.extend(der(0x04, &protected));
    der(0x30, &info)
}

fn der(tag: u8, contents: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = contents.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes: Vec<u8> = len
            .to_be_bytes()
            .into_iter()
            .skip_while(|b| *b == 0)
            .collect();
        out.push(0x80 | bytes.len() as u8);
        out.extend(bytes);
    }
    out.extend_from_slice(contents);
    out
}
