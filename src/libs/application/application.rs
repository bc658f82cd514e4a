use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

use bus::{Bus, BusReader};
use log::{debug, info, warn};

use crate::libs::audio::tone_generator::ToneGenerator;
use crate::libs::bridge::bridge_event::RelayMessage;
use crate::libs::clock::clock::{Clock, MonotonicClock};
use crate::libs::relay::relay::Relay;
use crate::libs::relay::tcp_transport::{RelayLink, RelayServer};
use crate::libs::session::session::{Session, SessionConfig};
use crate::libs::util::errors::MorseRelayError;

// Events queued between the session and the relay link before new ones are dropped.
const RELAY_BUS_SIZE: usize = 256;

pub trait BusOutput<T> {
    fn clear_output_tx(&mut self);
    fn set_output_tx(&mut self, output_tx: Arc<Mutex<Bus<T>>>);
}

pub trait BusInput<T> {
    fn clear_input_rx(&mut self);
    fn set_input_rx(&mut self, input_rx: Arc<Mutex<BusReader<T>>>);
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToneConfig {
    pub local_frequency: u16,
    pub remote_frequency: u16,
    pub amplitude: i16,
    pub out_device: String,
}

// The Application handles all the wiring between the active components of the system: the
// session, its tones, and the relay link or server. Anything that can't be set up (no audio
// device, no relay) is left out with a warning; the rest still works.
// It also holds the termination flag.
pub struct Application {
    terminate_flag: Arc<AtomicBool>,
    clock: Arc<dyn Clock>,
    session: Option<Arc<Session>>,
    relay_link: Option<RelayLink>,
    relay_server: Option<RelayServer>,
}

impl Application {
    pub fn new(terminate_flag: Arc<AtomicBool>) -> Self {
        debug!("Constructing Application");
        Self {
            terminate_flag,
            clock: Arc::new(MonotonicClock::new()),
            session: None,
            relay_link: None,
            relay_server: None,
        }
    }

    /// Start the operator's session. Tones need `tone_config`; talking to a peer needs
    /// `relay_address`.
    pub fn start_session(&mut self, config: SessionConfig, tone_config: Option<ToneConfig>, relay_address: Option<&str>) -> Result<Arc<Session>, String> {
        let (local_tone, remote_tone) = match tone_config {
            None => (None, None),
            Some(tones) => {
                info!("Initialising tones on audio output '{}'", tones.out_device);
                (tone_or_none(ToneGenerator::with_device("local", tones.local_frequency, tones.amplitude, &tones.out_device)),
                 tone_or_none(ToneGenerator::with_device("remote", tones.remote_frequency, tones.amplitude, &tones.out_device)))
            }
        };

        let mut session = Session::new(config, self.clock.clone(), local_tone, remote_tone, self.terminate_flag.clone())?;

        if let Some(address) = relay_address {
            match RelayLink::connect(address, self.terminate_flag.clone()) {
                Ok(mut link) => {
                    let mut outbound_bus = Bus::new(RELAY_BUS_SIZE);
                    let outbound_rx = outbound_bus.add_rx();
                    session.set_output_tx(Arc::new(Mutex::new(outbound_bus)));
                    link.set_input_rx(Arc::new(Mutex::new(outbound_rx)));

                    let mut inbound_bus = Bus::new(RELAY_BUS_SIZE);
                    let inbound_rx = inbound_bus.add_rx();
                    link.set_output_tx(Arc::new(Mutex::new(inbound_bus)));
                    session.set_input_rx(Arc::new(Mutex::new(inbound_rx)));
                    self.relay_link = Some(link);
                }
                Err(e) => {
                    warn!("{}; continuing without a peer", e);
                }
            }
        }

        let session = Arc::new(session);
        self.session = Some(session.clone());
        Ok(session)
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.clone()
    }

    pub fn got_relay_link(&self) -> bool {
        self.relay_link.is_some()
    }

    /// Serve a relay for other sessions to connect to. Returns the address actually bound.
    pub fn start_relay_server(&mut self, address: &str) -> Result<SocketAddr, MorseRelayError> {
        let server = RelayServer::bind(address, Arc::new(Relay::new()), self.terminate_flag.clone())?;
        let local_addr = server.local_addr();
        self.relay_server = Some(server);
        Ok(local_addr)
    }

    // Initialise the Ctrl-C handler. Called once by the application.
    pub fn set_ctrlc_handler(&mut self) -> Result<(), String> {
        debug!("Setting Ctrl-C handler");
        let ctrlc_arc_terminate = self.terminate_flag();
        ctrlc::set_handler(move || {
            info!("Setting terminate flag...");
            ctrlc_arc_terminate.store(true, Ordering::SeqCst);
            info!("... terminate flag set");
        }).map_err(|e| format!("Error setting Ctrl-C handler: {}", e))
    }

    // Setting the terminate AtomicBool will allow the threads to stop on their own.
    pub fn terminate(&mut self) {
        info!("Terminating Application");
        self.terminate_flag.store(true, Ordering::SeqCst);
        if let Some(session) = &self.session {
            session.terminate();
        }
        info!("Terminated Application");
    }

    // Has the Application been terminated
    pub fn terminated(&self) -> bool {
        self.terminate_flag.load(Ordering::SeqCst)
    }

    // Obtain a clone of the global terminate flag.
    pub fn terminate_flag(&self) -> Arc<AtomicBool> {
        self.terminate_flag.clone()
    }
}

fn tone_or_none(tone: Result<ToneGenerator, MorseRelayError>) -> Option<ToneGenerator> {
    match tone {
        Ok(tone) => Some(tone),
        Err(e) => {
            warn!("{}; continuing without that tone", e);
            None
        }
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        debug!("Application signalling termination on drop");
        self.terminate();
        // The link and server join their threads now that the flag is set.
        self.relay_link.take();
        self.relay_server.take();
    }
}

#[cfg(test)]
#[path = "./application_spec.rs"]
mod application_spec;
