//! Audio device lookup
//!
//! Looks up output devices across every available cpal host so a device can
//! be chosen by name (and optionally host) in the configuration.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Host, HostId};

use super::config::DeviceId;
use super::error::{AudioError, AudioResult};

/// Get a human-readable name for a host ID
fn host_name(host_id: HostId) -> String {
    let name = format!("{:?}", host_id);
    match name.as_str() {
        "Alsa" => "ALSA".to_string(),
        "Jack" => "JACK".to_string(),
        "Wasapi" => "WASAPI".to_string(),
        _ => name,
    }
}

/// Get a host by its display name
fn get_host_by_name(name: &str) -> Option<Host> {
    cpal::available_hosts()
        .into_iter()
        .find(|id| host_name(*id) == name)
        .and_then(|id| cpal::host_from_id(id).ok())
}

/// Find a device by its ID
///
/// Uses the host named in the ID when present, otherwise searches every host.
pub fn find_device_by_id(id: &DeviceId) -> AudioResult<cpal::Device> {
    if let Some(host) = id.host.as_deref().and_then(get_host_by_name) {
        return host
            .output_devices()
            .map_err(|e| AudioError::ConfigError(e.to_string()))?
            .find(|d: &cpal::Device| d.name().ok().as_ref() == Some(&id.name))
            .ok_or_else(|| AudioError::DeviceNotFound(id.display_label()));
    }

    for host_id in cpal::available_hosts() {
        let Ok(host) = cpal::host_from_id(host_id) else { continue };
        let Ok(mut outputs) = host.output_devices() else { continue };
        if let Some(device) = outputs.find(|d: &cpal::Device| d.name().ok().as_ref() == Some(&id.name)) {
            return Ok(device);
        }
    }

    Err(AudioError::DeviceNotFound(id.display_label()))
}

/// Get the default output device from the default host
pub fn get_default_device() -> AudioResult<cpal::Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| AudioError::NoDefaultDevice("No default output device".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device_is_reported() {
        let id = DeviceId {
            name: "mixd-no-such-device".to_string(),
            host: Some("NoSuchHost".to_string()),
        };
        match find_device_by_id(&id) {
            Err(AudioError::DeviceNotFound(label)) => assert!(label.contains("mixd-no-such-device")),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("found a device that should not exist"),
        }
    }
}
