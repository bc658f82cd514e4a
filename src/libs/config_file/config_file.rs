use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_derive::Deserialize;
use serde_derive::Serialize;

use crate::libs::keyer_io::keyer_io::{DEFAULT_KEYER_SPEED, KeyerSpeed, keyer_speed_is_usual, MAX_KEYER_SPEED, MIN_KEYER_SPEED};
use crate::libs::session::session::{DEFAULT_AMPLITUDE, DEFAULT_LOCAL_FREQUENCY, DEFAULT_POLL_INTERVAL, DEFAULT_REMOTE_FREQUENCY, SessionConfig};

pub const DEFAULT_RELAY_ADDRESS: &str = "127.0.0.1:8080";

// Sections missing from an older file take their defaults.
#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(default)]
struct Config {
    keyer: Keyer,
    tone: Tone,
    audio: Audio,
    relay: Relay,
    decoder: DecoderSettings,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
struct Keyer {
    wpm: KeyerSpeed,
}

impl Default for Keyer {
    fn default() -> Self {
        Self { wpm: DEFAULT_KEYER_SPEED }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
struct Tone {
    local_frequency: u16,
    remote_frequency: u16,
    amplitude: i16,
}

impl Default for Tone {
    fn default() -> Self {
        Self {
            local_frequency: DEFAULT_LOCAL_FREQUENCY,
            remote_frequency: DEFAULT_REMOTE_FREQUENCY,
            amplitude: DEFAULT_AMPLITUDE,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(default)]
struct Audio {
    out_device: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
struct Relay {
    address: String,
}

impl Default for Relay {
    fn default() -> Self {
        Self { address: DEFAULT_RELAY_ADDRESS.to_string() }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
struct DecoderSettings {
    poll_interval_ms: u64,
    unknown_placeholder: String,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            unknown_placeholder: String::new(),
        }
    }
}

const CONFIG_FILE_NAME: &str = "morserelay.toml";

pub struct ConfigurationStore {
    config_file_path: Box<Path>,
    config: Config,
}

impl ConfigurationStore {
    pub fn new(config_path: Box<Path>) -> Result<ConfigurationStore, String> {
        let mut config_file_path = PathBuf::new();
        config_file_path.push(config_path);
        config_file_path.push(CONFIG_FILE_NAME);
        debug!("Config file is {:?}", config_file_path);
        let config = if config_file_path.exists() {
            read_configuration(&config_file_path)?
        } else {
            debug!("Creating config file {:?}", config_file_path);
            let config = Config::default();
            save_configuration(&config_file_path, &config)?;
            config
        };
        Ok(ConfigurationStore {
            config_file_path: config_file_path.into_boxed_path(),
            config,
        })
    }

    pub fn get_config_file_path(&self) -> &Path {
        &self.config_file_path
    }

    fn save(&self) -> Result<(), String> {
        save_configuration(&self.config_file_path, &self.config)
    }

    pub fn set_wpm(&mut self, wpm: KeyerSpeed) -> Result<(), String> {
        if wpm == 0 {
            return Err("Keyer speed must be at least 1 WPM".to_owned());
        }
        if !keyer_speed_is_usual(wpm) {
            warn!("Keyer speed {} WPM is outside the usual range {}..={}", wpm, MIN_KEYER_SPEED, MAX_KEYER_SPEED);
        }
        self.config.keyer.wpm = wpm;
        self.save()
    }

    pub fn get_wpm(&self) -> KeyerSpeed {
        self.config.keyer.wpm
    }

    pub fn set_local_frequency(&mut self, frequency: u16) -> Result<(), String> {
        self.config.tone.local_frequency = frequency;
        self.save()
    }

    pub fn get_local_frequency(&self) -> u16 {
        self.config.tone.local_frequency
    }

    pub fn set_remote_frequency(&mut self, frequency: u16) -> Result<(), String> {
        self.config.tone.remote_frequency = frequency;
        self.save()
    }

    pub fn get_remote_frequency(&self) -> u16 {
        self.config.tone.remote_frequency
    }

    pub fn set_amplitude(&mut self, amplitude: i16) -> Result<(), String> {
        self.config.tone.amplitude = amplitude;
        self.save()
    }

    pub fn get_amplitude(&self) -> i16 {
        self.config.tone.amplitude
    }

    pub fn set_audio_out_device(&mut self, dev_name: String) -> Result<(), String> {
        self.config.audio.out_device = dev_name;
        self.save()
    }

    pub fn get_audio_out_device(&self) -> String {
        self.config.audio.out_device.clone()
    }

    pub fn set_relay_address(&mut self, address: String) -> Result<(), String> {
        self.config.relay.address = address;
        self.save()
    }

    pub fn get_relay_address(&self) -> String {
        self.config.relay.address.clone()
    }

    pub fn set_poll_interval_ms(&mut self, ms: u64) -> Result<(), String> {
        if ms == 0 {
            return Err("The poll interval must be at least 1ms".to_string());
        }
        self.config.decoder.poll_interval_ms = ms;
        self.save()
    }

    pub fn get_poll_interval_ms(&self) -> u64 {
        self.config.decoder.poll_interval_ms
    }

    pub fn set_unknown_placeholder(&mut self, placeholder: String) -> Result<(), String> {
        self.config.decoder.unknown_placeholder = placeholder;
        self.save()
    }

    pub fn get_unknown_placeholder(&self) -> String {
        self.config.decoder.unknown_placeholder.clone()
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            keyer_speed: self.get_wpm(),
            poll_interval: Duration::from_millis(self.get_poll_interval_ms().max(1)),
            unknown_placeholder: self.get_unknown_placeholder(),
        }
    }
}

fn save_configuration(config_file_path: &Path, config: &Config) -> Result<(), String> {
    let toml = toml::to_string(config)
        .map_err(|err| format!("Could not serialise configuration: {}", err))?;
    std::fs::write(config_file_path, toml)
        .map_err(|err| format!("Could not write config file {:?}: {}", config_file_path, err))
}

fn read_configuration(config_file_path: &Path) -> Result<Config, String> {
    let file_contents = std::fs::read_to_string(config_file_path);
    match file_contents {
        Ok(toml) => {
            let x: Result<Config, toml::de::Error> = toml::from_str(&*toml);
            match x {
                Ok(config) => {
                    Ok(config)
                }
                Err(err) => {
                    Err(format!("Could not parse config file {:?}: {}", config_file_path, err))
                }
            }
        }
        Err(e) => { Err(format!("Could not read config file {:?}: {}", config_file_path, e))}
    }
}

#[cfg(test)]
#[path = "./config_file_spec.rs"]
mod config_file_spec;
