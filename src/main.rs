#[macro_use]
extern crate clap;
extern crate portaudio;

use std::error::Error;
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::{Duration, Instant};

use clap::{App, Arg, ArgMatches};
use clap::arg_enum;
use log::{debug, error, info, warn};
use portaudio::PortAudio;

use morserelay::libs::application::application::{Application, ToneConfig};
use morserelay::libs::audio::audio_devices::{list_audio_output_devices, output_audio_device_exists};
use morserelay::libs::config_dir::config_dir;
use morserelay::libs::config_file::config_file::ConfigurationStore;
use morserelay::libs::decoder::symbol_state::SymbolState;
use morserelay::libs::keyer_io::keyer_io::{KeyerSpeed, KeyInput};
use morserelay::libs::keyer_io::text_keyer::TextKeyer;
use morserelay::libs::session::session::Session;
use morserelay::libs::util::logging::initialise_logging;
use morserelay::libs::util::version::VERSION;

const AUDIO_OUT_DEVICE: &'static str = "audio-out-device";
const NO_AUDIO: &'static str = "no-audio";
const KEYER_SPEED_WPM: &'static str = "keyer-speed-wpm";
const RELAY_ADDRESS: &'static str = "relay-address";
const NO_RELAY: &'static str = "no-relay";
const MESSAGE: &'static str = "message";

const WAIT_INTERVAL: Duration = Duration::from_millis(100);

arg_enum! {
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum Mode {
        Session,
        Relay,
        ConfigFileLocation,
        ListOutputDevices
    }
}

fn parse_command_line<'a>() -> (ArgMatches<'a>, Mode) {
    let result = App::new("morserelay")
        .version(VERSION)
        .author("Matt Gumbley <matt.gumbley@gmail.com>")
        .about("Morse keying decoder, sidetone and relay")

        .arg(Arg::from_usage("<mode> 'The mode to use, usually Session.'").possible_values(&Mode::variants()).default_value("Session"))

        .arg(Arg::with_name(AUDIO_OUT_DEVICE)
            .short("a").long("audioout").help("Sets the audio device name to use for the speaker/headphone output")
            .value_name("speaker/headphone audio output device name").takes_value(true))

        .arg(Arg::with_name(NO_AUDIO)
            .short("q").long("quiet").help("Runs the session without local or remote tones"))

        .arg(Arg::with_name(KEYER_SPEED_WPM)
            .short("w").long("keyerwpm").help("Sets the typical keying speed in words per minute")
            .value_name("keyer speed in WPM").takes_value(true))

        .arg(Arg::with_name(RELAY_ADDRESS)
            .short("r").long("relay").help("Sets the host:port of the relay; in Relay mode, the address to listen on")
            .value_name("relay address").takes_value(true))

        .arg(Arg::with_name(NO_RELAY)
            .short("n").long("norelay").help("Runs the session without connecting to a relay"))

        .arg(Arg::with_name(MESSAGE)
            .short("m").long("message").help("Keys this text, waits for it to be decoded, then exits")
            .value_name("text to key").takes_value(true))

        .get_matches();

    let mode = value_t!(result.value_of("mode"), Mode).unwrap_or(Mode::Session);

    return (result, mode);
}

fn run(arguments: ArgMatches, mode: Mode) -> Result<i32, Box<dyn Error>> {
    let home_dir = dirs::home_dir();
    let config_path = config_dir::configuration_directory(home_dir)?;
    let config_path_clone = config_path.clone();
    let mut config = ConfigurationStore::new(config_path)?;
    if mode == Mode::ConfigFileLocation {
        info!("Configuration path is [{:?}]", config_path_clone);
        info!("Configuration file is [{:?}]", config.get_config_file_path());
        return Ok(0)
    }

    if mode == Mode::ListOutputDevices {
        let pa = PortAudio::new()?;
        for device in list_audio_output_devices(&pa)? {
            info!("{}", device);
        }
        return Ok(0)
    }

    // Options on the command line set values in the configuration file; the system is then
    // initialised from the configuration.
    configure(&arguments, &mut config)?;

    let terminate = Arc::new(AtomicBool::new(false));
    info!("Initialising Application...");
    let mut application = Application::new(terminate);
    application.set_ctrlc_handler()?;

    if mode == Mode::Relay {
        let address = application.start_relay_server(&config.get_relay_address())?;
        info!("Relay listening on {}; Ctrl-C to stop", address);
        while !application.terminated() {
            thread::sleep(WAIT_INTERVAL);
        }
        info!("Exiting");
        return Ok(0)
    }

    let tone_config = if arguments.is_present(NO_AUDIO) {
        None
    } else {
        check_audio_device(&config)
    };
    let relay_address = if arguments.is_present(NO_RELAY) {
        None
    } else {
        Some(config.get_relay_address())
    };

    info!("Initialising session...");
    let session = application.start_session(config.session_config(), tone_config, relay_address.as_deref())?;
    let input: Arc<dyn KeyInput> = session.clone();
    let mut keyer = TextKeyer::new(input, config.get_wpm(), application.terminate_flag())?;

    if let Some(message) = arguments.value_of(MESSAGE) {
        keyer.send(message);
        keyer.wait();
        wait_for_word_boundary(&session, config.get_wpm(), &application);
        info!("Decoded: [{}]", session.decoded_text());
        application.terminate();
        return Ok(0)
    }

    info!("Type text to key it; Ctrl-C to stop");
    let (line_tx, line_rx) = mpsc::channel();
    // Reading stdin blocks, so this thread is not joined; it ends with the process.
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Could not read input: {}", e);
                    break;
                }
            }
        }
    });

    let mut shown_text = String::new();
    let mut shown_remote = String::new();
    while !application.terminated() {
        match line_rx.recv_timeout(WAIT_INTERVAL) {
            Ok(line) => {
                keyer.send(&line);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!("End of input");
                keyer.wait();
                wait_for_word_boundary(&session, config.get_wpm(), &application);
                application.terminate();
            }
        }
        let text = session.decoded_text();
        if text != shown_text {
            info!("Decoded: [{}] ({})", text, session.snapshot().display_morse());
            shown_text = text;
        }
        let remote = session.remote_text();
        if remote != shown_remote {
            info!("Remote:  [{}]", remote);
            shown_remote = remote;
        }
        for e in session.take_errors() {
            warn!("{}", e);
        }
    }
    info!("Decoded: [{}]", session.decoded_text());
    info!("Exiting");
    Ok(0)
}

// A word boundary follows the last release after seven units; allow some slack for polling.
fn wait_for_word_boundary(session: &Session, wpm: KeyerSpeed, application: &Application) {
    let unit_ms = 1200 / wpm.max(1) as u64;
    let deadline = Instant::now() + Duration::from_millis(unit_ms * 10);
    while Instant::now() < deadline && !application.terminated() {
        if session.snapshot().state == SymbolState::WordBoundary {
            return;
        }
        thread::sleep(Duration::from_millis(unit_ms));
    }
}

fn configure(arguments: &ArgMatches, config: &mut ConfigurationStore) -> Result<(), Box<dyn Error>> {
    if let Some(dev) = arguments.value_of(AUDIO_OUT_DEVICE) {
        let pa = PortAudio::new()?;
        if output_audio_device_exists(&pa, dev)? {
            info!("Setting audio output device to '{}'", dev);
            config.set_audio_out_device(dev.to_string())?;
        } else {
            warn!("Setting {}: No output audio device named '{}' is present in your system.", AUDIO_OUT_DEVICE, dev);
            return Err("Configuration error when setting audio devices. To show current audio devices, use the ListOutputDevices mode.".into())
        }
    }

    if let Some(wpm_str) = arguments.value_of(KEYER_SPEED_WPM) {
        match wpm_str.parse::<KeyerSpeed>() {
            Ok(wpm) if wpm > 0 => {
                info!("Setting keyer speed to {} WPM", wpm);
                config.set_wpm(wpm)?;
            }
            _ => {
                warn!("Setting {}: Keyer speed of '{}' is not a whole number of WPM from 1 to {}", KEYER_SPEED_WPM, wpm_str, KeyerSpeed::MAX);
                return Err("Configuration error in keyer speed.".into())
            }
        }
    }

    if let Some(address) = arguments.value_of(RELAY_ADDRESS) {
        info!("Setting relay address to '{}'", address);
        config.set_relay_address(address.to_string())?;
    }
    Ok(())
}

// A missing or unusable output device leaves the session silent rather than stopping it.
fn check_audio_device(config: &ConfigurationStore) -> Option<ToneConfig> {
    let dev = config.get_audio_out_device();
    let exists = PortAudio::new()
        .map_err(|e| Box::new(e) as Box<dyn Error>)
        .and_then(|pa| output_audio_device_exists(&pa, &dev));
    match exists {
        Ok(true) => {
            info!("Audio output device is '{}'", if dev.is_empty() { "(default)" } else { dev.as_str() });
            Some(ToneConfig {
                local_frequency: config.get_local_frequency(),
                remote_frequency: config.get_remote_frequency(),
                amplitude: config.get_amplitude(),
                out_device: dev,
            })
        }
        Ok(false) => {
            warn!("Checking {}: No output audio device named '{}' is present in your system; tones are off.", AUDIO_OUT_DEVICE, dev);
            None
        }
        Err(e) => {
            warn!("Could not check audio devices: {}; tones are off.", e);
            None
        }
    }
}

fn main() {
    initialise_logging();

    let (arguments, mode) = parse_command_line();
    debug!("Command line parsed");

    match run(arguments, mode) {
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        }
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
    }
}
