//! Device targeting and transfer.

pub mod bridge;
pub mod config;
pub mod pusher;
pub mod resolver;

pub use bridge::{AdbBridge, ConnectedDevice, DeviceBridge, DeviceState};
pub use config::{DeviceRule, load_rules};
pub use pusher::{DevicePusher, PushReport};
pub use resolver::{DeviceRuleSet, ResolvedTarget, resolve};
