//! Device target resolution.
//!
//! Rules are folded once, in document order, into a [`DeviceRuleSet`]; the
//! connected devices are then looked up against it.

use super::{
    bridge::ConnectedDevice,
    config::{DEVICE_DEFAULT, DeviceRule, EMULATOR_DEFAULT},
};
use std::collections::HashMap;

/// A device selected for a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub serial: String,
    pub enabled: bool,
    /// Remote directory; not yet validated as absolute.
    pub directory: String,
}

/// Result of folding the device rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRuleSet {
    emulator_default: bool,
    device_default: bool,
    states: HashMap<String, bool>,
    paths: HashMap<String, String>,
}

impl Default for DeviceRuleSet {
    fn default() -> Self {
        Self {
            emulator_default: true,
            device_default: true,
            states: HashMap::new(),
            paths: HashMap::new(),
        }
    }
}

/// Serials containing `emulator` belong to the emulator class.
pub fn is_emulator(serial: &str) -> bool {
    serial.contains("emulator")
}

impl DeviceRuleSet {
    /// Folds `rules` in order.
    ///
    /// A class default only affects rules after it: an explicit state is
    /// recorded when a rule differs from its class default as set at that
    /// point. Path overrides are recorded only for rules that leave the
    /// device enabled and differ from `default_path`.
    pub fn fold(rules: &[DeviceRule], default_path: &str) -> Self {
        let mut set = Self::default();

        for rule in rules {
            let name = rule.name.as_str();

            if let Some(enabled) = rule.enabled {
                match name {
                    EMULATOR_DEFAULT => {
                        set.emulator_default = enabled;
                        continue;
                    }
                    DEVICE_DEFAULT => {
                        set.device_default = enabled;
                        continue;
                    }
                    _ => {}
                }
                if enabled != set.class_default(name) {
                    set.states.insert(name.to_string(), enabled);
                    if !enabled {
                        continue;
                    }
                }
            }

            if !rule.enabled.unwrap_or_else(|| set.class_default(name)) {
                continue;
            }

            if let Some(path) = rule.push_path.as_deref().filter(|p| *p != default_path) {
                set.paths.insert(name.to_string(), path.to_string());
            }
        }

        set
    }

    /// Current default for the class `serial` belongs to.
    pub fn class_default(&self, serial: &str) -> bool {
        if is_emulator(serial) {
            self.emulator_default
        } else {
            self.device_default
        }
    }

    /// Final enabled flag for `serial`.
    pub fn is_enabled(&self, serial: &str) -> bool {
        self.states
            .get(serial)
            .copied()
            .unwrap_or_else(|| self.class_default(serial))
    }

    /// Path override for `serial`, if any.
    pub fn path_override(&self, serial: &str) -> Option<&str> {
        self.paths.get(serial).map(String::as_str)
    }
}

/// Resolves the push targets among `connected`, in listing order.
///
/// Devices that are not ready are never targeted; disabled devices are
/// dropped.
pub fn resolve(
    rules: &[DeviceRule],
    connected: &[ConnectedDevice],
    default_path: &str,
) -> Vec<ResolvedTarget> {
    let set = DeviceRuleSet::fold(rules, default_path);

    connected
        .iter()
        .filter(|device| {
            if !device.state.is_ready() {
                log::debug!("Skipping {} ({})", device.serial, device.state);
            }
            device.state.is_ready()
        })
        .filter(|device| set.is_enabled(&device.serial))
        .map(|device| ResolvedTarget {
            serial: device.serial.clone(),
            enabled: true,
            directory: set
                .path_override(&device.serial)
                .unwrap_or(default_path)
                .to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::device::bridge::DeviceState;

    const DEFAULT_PATH: &str = "/storage/emulated/0/";

    fn ready(serial: &str) -> ConnectedDevice {
        ConnectedDevice::new(serial, DeviceState::Device)
    }

    fn serials(targets: &[ResolvedTarget]) -> Vec<&str> {
        targets.iter().map(|t| t.serial.as_str()).collect()
    }

    #[test]
    fn no_rules_targets_every_ready_device() {
        let targets = resolve(&[], &[ready("phone1"), ready("emulator-5554")], DEFAULT_PATH);
        assert_eq!(serials(&targets), ["phone1", "emulator-5554"]);
        assert!(targets.iter().all(|t| t.directory == DEFAULT_PATH && t.enabled));
    }

    #[test]
    fn disabling_device_default_keeps_emulators() {
        let rules = [DeviceRule::new("device_default").enabled(false)];
        let targets = resolve(&rules, &[ready("phone1"), ready("emulator-5554")], DEFAULT_PATH);
        assert_eq!(serials(&targets), ["emulator-5554"]);
    }

    #[test]
    fn per_device_path_override() {
        let rules = [DeviceRule::new("phone1")
            .enabled(true)
            .push_path("/sdcard/custom/")];
        let targets = resolve(&rules, &[ready("phone1")], DEFAULT_PATH);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].directory, "/sdcard/custom/");
    }

    #[test]
    fn unready_devices_are_never_targeted() {
        let rules = [DeviceRule::new("phone2").enabled(true)];
        let connected = [
            ConnectedDevice::new("phone2", DeviceState::Unauthorized),
            ConnectedDevice::new("emulator-5556", DeviceState::Offline),
            ready("phone3"),
        ];
        let targets = resolve(&rules, &connected, DEFAULT_PATH);
        assert_eq!(serials(&targets), ["phone3"]);
    }

    #[test]
    fn explicit_enable_survives_disabled_class_default() {
        let rules = [
            DeviceRule::new("device_default").enabled(false),
            DeviceRule::new("phone1").enabled(true),
        ];
        let targets = resolve(&rules, &[ready("phone1"), ready("phone2")], DEFAULT_PATH);
        assert_eq!(serials(&targets), ["phone1"]);
    }

    #[test]
    fn defaults_apply_in_document_order() {
        // phone1 agrees with the default when read, so no explicit state is
        // recorded and the later default decides.
        let rules = [
            DeviceRule::new("phone1").enabled(true),
            DeviceRule::new("device_default").enabled(false),
        ];
        let targets = resolve(&rules, &[ready("phone1")], DEFAULT_PATH);
        assert!(targets.is_empty());

        // Recorded before the default flips, the explicit disable stays.
        let rules = [
            DeviceRule::new("emulator-5554").enabled(false),
            DeviceRule::new("emulator_default").enabled(false),
            DeviceRule::new("emulator_default").enabled(true),
        ];
        let targets = resolve(&rules, &[ready("emulator-5554")], DEFAULT_PATH);
        assert!(targets.is_empty());
    }

    #[test]
    fn disabled_rule_records_no_path() {
        let rules = [DeviceRule::new("phone1")
            .enabled(false)
            .push_path("/sdcard/other/")];
        let set = DeviceRuleSet::fold(&rules, DEFAULT_PATH);
        assert!(!set.is_enabled("phone1"));
        assert_eq!(set.path_override("phone1"), None);
    }

    #[test]
    fn path_equal_to_default_is_not_an_override() {
        let rules = [DeviceRule::new("phone1").push_path(DEFAULT_PATH)];
        let set = DeviceRuleSet::fold(&rules, DEFAULT_PATH);
        assert_eq!(set.path_override("phone1"), None);
    }

    #[test]
    fn default_rule_without_flag_is_ignored() {
        let rules = [DeviceRule::new("device_default").push_path("/sdcard/")];
        let set = DeviceRuleSet::fold(&rules, DEFAULT_PATH);
        assert!(set.is_enabled("phone1"));
    }
}
