use portaudio::{DeviceIndex, DeviceInfo, OutputStreamSettings, PortAudio};
use portaudio as pa;
use std::error::Error;
use log::{debug, info};
use regex::Regex;
use simple_error::bail;

// PortAudio constants
const INTERLEAVED: bool = true;
const MONO: i32 = 1;
pub(crate) const FRAMES_PER_BUFFER: u32 = 256;
pub(crate) const SAMPLE_RATE: f64 = 44100.0;

// Parameters for a mono i16 output on this device, if it has outputs and takes our sample rate.
fn mono_output_params(pa: &PortAudio, idx: DeviceIndex, info: &DeviceInfo) -> Option<pa::StreamParameters<i16>> {
    if info.max_output_channels < MONO {
        return None;
    }
    let params = pa::StreamParameters::<i16>::new(idx, MONO, INTERLEAVED, info.default_low_output_latency);
    match pa.is_output_format_supported(params, SAMPLE_RATE) {
        Ok(_) => Some(params),
        Err(_) => None,
    }
}

/// Describes each output device that can play the tones, in the `index: name` form accepted by
/// `open_output_audio_device`.
pub fn list_audio_output_devices(pa: &PortAudio) -> Result<Vec<String>, Box<dyn Error>> {
    info!("Number of audio devices = {}", pa.device_count()?);
    let mut descriptions = vec![];
    for device in pa.devices()? {
        let (idx, info) = device?;
        if mono_output_params(pa, idx, &info).is_some() {
            debug!("{}: {} / OUT:{} @ {}Hz default", idx.0, info.name, info.max_output_channels, info.default_sample_rate);
            descriptions.push(format!("{}: {}", idx.0, info.name));
        }
    }
    Ok(descriptions)
}

// The dev_name may be prefixed with num: in which case this must match the device index.
pub(crate) fn parse_dev_name(dev_name: &str) -> Result<(Option<usize>, String), Box<dyn Error>> {
    let re = Regex::new(r"^(?:(\d*)\s*:)?\s*([^:].*)$")?;
    match re.captures(dev_name) {
        None => {
            bail!("Device name does not match pattern [number:] name");
        }
        Some(caps) => {
            debug!("caps is {:?}", caps);
            let maybe_index = match caps.get(1) {
                Some(index_str) if index_str.as_str().is_empty() => {
                    bail!("Missing device index number at start of '{}'", dev_name);
                }
                Some(index_str) => Some(index_str.as_str().parse::<usize>()?),
                None => None,
            };
            let device_name = caps.get(2).map_or("", |m| m.as_str()).to_string();
            Ok((maybe_index, device_name))
        }
    }
}

fn device_matches(idx: DeviceIndex, info: &DeviceInfo, maybe_index: Option<usize>, name: &str) -> bool {
    info.name == name && maybe_index.map_or(true, |index| index == idx.0 as usize)
}

pub fn output_audio_device_exists(pa: &PortAudio, dev_name: &str) -> Result<bool, Box<dyn Error>> {
    if dev_name.is_empty() {
        return Ok(pa.default_output_device().is_ok());
    }
    let (maybe_index, name) = parse_dev_name(dev_name)?;
    for device in pa.devices()? {
        let (idx, info) = device?;
        if device_matches(idx, &info, maybe_index, &name) && mono_output_params(pa, idx, &info).is_some() {
            return Ok(true)
        }
    }
    Ok(false)
}

/// Settings for a mono i16 output stream on the named device, or the system default output when
/// the name is empty.
pub fn open_output_audio_device(pa: &PortAudio, dev_name: &str) -> Result<OutputStreamSettings<i16>, Box<dyn Error>> {
    if dev_name.is_empty() {
        let idx = pa.default_output_device()?;
        let info = pa.device_info(idx)?;
        return match mono_output_params(pa, idx, &info) {
            Some(params) => {
                info!("Using default output device {:?}", info.name);
                Ok(OutputStreamSettings::new(params, SAMPLE_RATE, FRAMES_PER_BUFFER))
            }
            None => bail!("Default output device '{}' cannot play {}Hz mono", info.name, SAMPLE_RATE),
        };
    }

    let (maybe_index, name) = parse_dev_name(dev_name)?;
    for device in pa.devices()? {
        let (idx, info) = device?;
        if device_matches(idx, &info, maybe_index, &name) {
            if let Some(params) = mono_output_params(pa, idx, &info) {
                info!("Using {:?} as audio output device", info.name);
                return Ok(OutputStreamSettings::new(params, SAMPLE_RATE, FRAMES_PER_BUFFER));
            }
        }
    }
    Err(Box::<dyn Error + Send + Sync>::from(format!("Can't find output settings for device '{}'", dev_name)))
}

#[cfg(test)]
#[path = "./audio_devices_spec.rs"]
mod audio_devices_spec;
