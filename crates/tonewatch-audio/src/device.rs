use cpal::traits::{DeviceTrait, HostTrait};
use regex::Regex;
use tonewatch_dtmf::CaptureError;

/// Names of the input and output devices on the default host.
pub struct DeviceList {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

pub fn list_devices() -> Result<DeviceList, CaptureError> {
    let host = cpal::default_host();
    let inputs = host
        .input_devices()
        .map_err(device_error)?
        .map(|dev| device_name(&dev))
        .collect();
    let outputs = host
        .output_devices()
        .map_err(device_error)?
        .map(|dev| device_name(&dev))
        .collect();
    Ok(DeviceList { inputs, outputs })
}

pub(crate) fn device_name(dev: &cpal::Device) -> String {
    dev.name().unwrap_or_else(|_| "<unknown>".to_string())
}

pub(crate) fn device_error(err: impl std::fmt::Display) -> CaptureError {
    CaptureError::Device(err.to_string())
}

/// First input device whose name matches `device_regex`, or the host default.
pub(crate) fn select_input_device(
    host: &cpal::Host,
    device_regex: Option<&str>,
) -> Result<cpal::Device, CaptureError> {
    if let Some(pattern) = device_regex {
        let re = Regex::new(pattern).map_err(device_error)?;
        for dev in host.input_devices().map_err(device_error)? {
            if re.is_match(&device_name(&dev)) {
                return Ok(dev);
            }
        }
        return Err(CaptureError::NoMatchingDevice(pattern.to_string()));
    }

    host.default_input_device().ok_or(CaptureError::NoDevice)
}

/// First output device whose name matches `device_regex`, or the host default.
pub(crate) fn select_output_device(
    host: &cpal::Host,
    device_regex: Option<&str>,
) -> Result<cpal::Device, CaptureError> {
    if let Some(pattern) = device_regex {
        let re = Regex::new(pattern).map_err(device_error)?;
        for dev in host.output_devices().map_err(device_error)? {
            if re.is_match(&device_name(&dev)) {
                return Ok(dev);
            }
        }
        return Err(CaptureError::NoMatchingDevice(pattern.to_string()));
    }

    host.default_output_device().ok_or(CaptureError::NoDevice)
}
