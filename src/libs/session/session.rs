use std::sync::{Arc, Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use bus::{Bus, BusReader};
use log::{debug, info, warn};
use crate::libs::application::application::{BusInput, BusOutput};
use crate::libs::audio::tone_generator::ToneGenerator;
use crate::libs::bridge::bridge_event::{BridgeEvent, offer, RelayMessage, SessionId};
use crate::libs::clock::clock::Clock;
use crate::libs::decoder::decoder::{DecodedOutput, Decoder, DecoderSnapshot};
use crate::libs::keyer_io::keyer_io::{DEFAULT_KEYER_SPEED, KeyerSpeed, KeyingEdge, KeyInput};
use crate::libs::timing::keying_timing::{DefaultKeyingTiming, KeyingTiming};
use crate::libs::util::errors::MorseRelayError;
use crate::libs::util::util::epoch_ms_at;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
pub const DEFAULT_LOCAL_FREQUENCY: u16 = 400;
pub const DEFAULT_REMOTE_FREQUENCY: u16 = 250;
pub const DEFAULT_AMPLITUDE: i16 = 8192;

const INBOUND_WAIT: Duration = Duration::from_millis(50);

#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub keyer_speed: KeyerSpeed,
    pub poll_interval: Duration,
    pub unknown_placeholder: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keyer_speed: DEFAULT_KEYER_SPEED,
            poll_interval: DEFAULT_POLL_INTERVAL,
            unknown_placeholder: String::new(),
        }
    }
}

enum PollerCommand {
    Edge(KeyingEdge),
    SetKeyerSpeed(KeyerSpeed),
    Clear,
}

/// One operator's session: the key, the decoder, the local and remote tones, and the bridge to
/// the peer.
///
/// Key edges drive the local tone immediately and are queued to the poller thread, which is the
/// only thread that touches the decoder. The poller also ticks the decoder every poll interval.
/// Events from the peer only sound the remote tone and fill the mirrored remote text; they never
/// reach the local decoder. Tones and bridge are optional: without them the session is a plain
/// decoder.
pub struct Session {
    id: SessionId,
    clock: Arc<dyn Clock>,
    terminate: Arc<AtomicBool>,
    // Held while an edge is forwarded, so tone, poller and bridge all see edges in the same order.
    key_down: Mutex<bool>,
    poller_tx: Mutex<Sender<PollerCommand>>,
    snapshot: Arc<RwLock<DecoderSnapshot>>,
    remote_text: Arc<RwLock<String>>,
    local_tone: Option<ToneGenerator>,
    remote_tone: Option<Arc<ToneGenerator>>,
    // Shared between the session and its threads
    output_tx: Arc<Mutex<Option<Arc<Mutex<Bus<RelayMessage>>>>>>,
    input_rx: Arc<Mutex<Option<Arc<Mutex<BusReader<RelayMessage>>>>>>,
    thread_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl BusOutput<RelayMessage> for Session {
    fn clear_output_tx(&mut self) {
        match self.output_tx.lock() {
            Ok(mut locked) => { *locked = None; }
            Err(_) => {}
        }
    }

    fn set_output_tx(&mut self, output_tx: Arc<Mutex<Bus<RelayMessage>>>) {
        match self.output_tx.lock() {
            Ok(mut locked) => { *locked = Some(output_tx); }
            Err(_) => {}
        }
    }
}

impl BusInput<RelayMessage> for Session {
    fn clear_input_rx(&mut self) {
        match self.input_rx.lock() {
            Ok(mut locked) => { *locked = None; }
            Err(_) => {}
        }
    }

    fn set_input_rx(&mut self, input_rx: Arc<Mutex<BusReader<RelayMessage>>>) {
        match self.input_rx.lock() {
            Ok(mut locked) => { *locked = Some(input_rx); }
            Err(_) => {}
        }
    }
}

// Publishing outward never blocks decoding or keying; a full or missing bus loses the event.
fn publish(output_tx: &Mutex<Option<Arc<Mutex<Bus<RelayMessage>>>>>, message: RelayMessage) {
    if let Ok(locked) = output_tx.lock() {
        if let Some(bus) = locked.as_ref() {
            if let Err(e) = offer(bus, message) {
                warn!("Outbound {}", e);
            }
        }
    }
}

impl Session {
    pub fn new(config: SessionConfig,
               clock: Arc<dyn Clock>,
               local_tone: Option<ToneGenerator>,
               remote_tone: Option<ToneGenerator>,
               terminate: Arc<AtomicBool>) -> Result<Self, String> {
        let timing = DefaultKeyingTiming::new(config.keyer_speed)?;
        if !timing.poll_interval_is_adequate(config.poll_interval) {
            warn!("Polling every {:?} is slow for {} WPM; dits and dahs may be misjudged", config.poll_interval, config.keyer_speed);
        }
        let id = SessionId::new_random();
        info!("Session {} starting at {} WPM", id, config.keyer_speed);
        let decoder = Decoder::new(timing).with_unknown_placeholder(&config.unknown_placeholder);
        let snapshot = Arc::new(RwLock::new(decoder.snapshot()));
        let remote_text = Arc::new(RwLock::new(String::new()));
        let output_tx: Arc<Mutex<Option<Arc<Mutex<Bus<RelayMessage>>>>>> = Arc::new(Mutex::new(None));
        let input_rx: Arc<Mutex<Option<Arc<Mutex<BusReader<RelayMessage>>>>>> = Arc::new(Mutex::new(None));
        let remote_tone = remote_tone.map(Arc::new);
        let (poller_tx, poller_rx) = mpsc::channel();

        let poller = Poller {
            id,
            decoder,
            clock: clock.clone(),
            poll_interval: config.poll_interval,
            snapshot: snapshot.clone(),
            output_tx: output_tx.clone(),
            terminate: terminate.clone(),
        };
        let poller_handle = thread::spawn(move || poller.run(poller_rx));

        let listener = InboundListener {
            id,
            remote_tone: remote_tone.clone(),
            remote_text: remote_text.clone(),
            input_rx: input_rx.clone(),
            terminate: terminate.clone(),
            remote_key_down: false,
            channel_lost: false,
        };
        let listener_handle = thread::spawn(move || listener.run());

        Ok(Self {
            id,
            clock,
            terminate,
            key_down: Mutex::new(false),
            poller_tx: Mutex::new(poller_tx),
            snapshot,
            remote_text,
            local_tone,
            remote_tone,
            output_tx,
            input_rx,
            thread_handles: Mutex::new(vec![poller_handle, listener_handle]),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn key_down(&self) -> bool {
        self.key_down_at(self.clock.now())
    }

    pub fn key_up(&self) -> bool {
        self.key_up_at(self.clock.now())
    }

    fn key_edge(&self, edge: KeyingEdge) -> bool {
        if self.is_terminated() {
            return false;
        }
        let mut key_down = match self.key_down.lock() {
            Ok(locked) => locked,
            Err(_) => return false,
        };
        if *key_down == edge.down {
            return false;
        }
        *key_down = edge.down;
        debug!("{}", edge);
        if let Some(tone) = &self.local_tone {
            if edge.down {
                tone.start(None, None);
            } else {
                tone.stop();
            }
        }
        self.send_to_poller(PollerCommand::Edge(edge));
        publish(&self.output_tx, RelayMessage::new(self.id, BridgeEvent::KeyState { on: edge.down, timestamp_ms: epoch_ms_at(edge.at) }));
        true
    }

    fn send_to_poller(&self, command: PollerCommand) {
        let sent = match self.poller_tx.lock() {
            Ok(locked) => locked.send(command).is_ok(),
            Err(_) => false,
        };
        if !sent {
            debug!("Session {} poller has stopped", self.id);
        }
    }

    pub fn is_key_down(&self) -> bool {
        self.key_down.lock().map(|locked| *locked).unwrap_or(false)
    }

    /// Takes effect for edges keyed after this call.
    pub fn set_keyer_speed(&self, speed: KeyerSpeed) -> Result<(), String> {
        DefaultKeyingTiming::new(speed)?;
        self.send_to_poller(PollerCommand::SetKeyerSpeed(speed));
        Ok(())
    }

    /// Forget what has been decoded locally and mirrored from the peer.
    pub fn clear(&self) {
        self.send_to_poller(PollerCommand::Clear);
        if let Ok(mut locked) = self.remote_text.write() {
            locked.clear();
        }
    }

    /// The decoder as of its latest change.
    pub fn snapshot(&self) -> DecoderSnapshot {
        match self.snapshot.read() {
            Ok(locked) => locked.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn decoded_text(&self) -> String {
        self.snapshot().decoded_text
    }

    /// What the peer's decoder has produced, as it told us.
    pub fn remote_text(&self) -> String {
        match self.remote_text.read() {
            Ok(locked) => locked.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Tone failures since the last call.
    pub fn take_errors(&self) -> Vec<MorseRelayError> {
        let mut errors = vec![];
        if let Some(tone) = &self.local_tone {
            errors.extend(tone.take_error());
        }
        if let Some(tone) = &self.remote_tone {
            errors.extend(tone.take_error());
        }
        errors
    }

    pub fn is_terminated(&self) -> bool {
        self.terminate.load(Ordering::SeqCst)
    }

    /// Stop the poller and the inbound listener, and silence both tones. Returns once all of
    /// them have finished.
    pub fn terminate(&self) {
        self.terminate.store(true, Ordering::SeqCst);
        if let Ok(mut handles) = self.thread_handles.lock() {
            if !handles.is_empty() {
                debug!("Session {} joining threads...", self.id);
            }
            for handle in handles.drain(..) {
                let _ = handle.join();
            }
        }
        if let Some(tone) = &self.local_tone {
            tone.stop_and_wait();
        }
        if let Some(tone) = &self.remote_tone {
            tone.stop_and_wait();
        }
    }
}

impl KeyInput for Session {
    fn key_down_at(&self, at: Instant) -> bool {
        self.key_edge(KeyingEdge::down_at(at))
    }

    fn key_up_at(&self, at: Instant) -> bool {
        self.key_edge(KeyingEdge::up_at(at))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.terminate();
        info!("Session {} stopped", self.id);
    }
}

// The single writer of decoder state.
struct Poller {
    id: SessionId,
    decoder: Decoder,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    snapshot: Arc<RwLock<DecoderSnapshot>>,
    output_tx: Arc<Mutex<Option<Arc<Mutex<Bus<RelayMessage>>>>>>,
    terminate: Arc<AtomicBool>,
}

impl Poller {
    fn run(mut self, commands: Receiver<PollerCommand>) {
        debug!("Session {} poller started", self.id);
        let mut last_snapshot = self.decoder.snapshot();
        loop {
            if self.terminate.load(Ordering::SeqCst) {
                break;
            }
            let outputs = match commands.recv_timeout(self.poll_interval) {
                Ok(PollerCommand::Edge(edge)) => {
                    if edge.down {
                        self.decoder.on_key_down(edge.at)
                    } else {
                        self.decoder.on_key_up(edge.at)
                    }
                }
                Ok(PollerCommand::SetKeyerSpeed(speed)) => {
                    if let Err(e) = self.decoder.set_keyer_speed(speed) {
                        warn!("{}", e);
                    }
                    vec![]
                }
                Ok(PollerCommand::Clear) => {
                    self.decoder.clear();
                    vec![]
                }
                Err(RecvTimeoutError::Timeout) => self.decoder.tick(self.clock.now()),
                Err(RecvTimeoutError::Disconnected) => break,
            };

            let snapshot = self.decoder.snapshot();
            if snapshot != last_snapshot {
                match self.snapshot.write() {
                    Ok(mut locked) => *locked = snapshot.clone(),
                    Err(poisoned) => *poisoned.into_inner() = snapshot.clone(),
                }
                last_snapshot = snapshot;
            }
            for output in outputs {
                self.publish_decoded(output);
            }
        }
        debug!("Session {} poller stopped", self.id);
    }

    fn publish_decoded(&self, output: DecodedOutput) {
        if let DecodedOutput::Character(_) = &output {
            info!("Decoded '{}'; text now '{}'", output.text(), last_word(&self.decoder.snapshot().decoded_text));
        }
        publish(&self.output_tx, RelayMessage::new(self.id, BridgeEvent::DecodedChar { text: output.text().to_owned() }));
    }
}

fn last_word(text: &str) -> &str {
    text.trim_end().rsplit(' ').next().unwrap_or("")
}

struct InboundListener {
    id: SessionId,
    remote_tone: Option<Arc<ToneGenerator>>,
    remote_text: Arc<RwLock<String>>,
    input_rx: Arc<Mutex<Option<Arc<Mutex<BusReader<RelayMessage>>>>>>,
    terminate: Arc<AtomicBool>,
    // As last told by the peer.
    remote_key_down: bool,
    channel_lost: bool,
}

impl InboundListener {
    fn run(mut self) {
        debug!("Session {} inbound listener started", self.id);
        loop {
            if self.terminate.load(Ordering::SeqCst) {
                break;
            }
            // Can be updated by the BusInput<RelayMessage> above
            let mut need_sleep = false;
            let mut disconnected = false;
            let mut received = None;
            match self.input_rx.lock() {
                Ok(locked) => match locked.as_deref() {
                    None => need_sleep = true,
                    Some(input_rx) => {
                        if let Ok(mut reader) = input_rx.lock() {
                            match reader.recv_timeout(INBOUND_WAIT) {
                                Ok(message) => received = Some(message),
                                Err(RecvTimeoutError::Timeout) => {}
                                Err(RecvTimeoutError::Disconnected) => disconnected = true,
                            }
                        }
                    }
                },
                Err(_) => need_sleep = true,
            }
            if let Some(message) = received {
                self.channel_lost = false;
                self.handle(message);
            }
            if disconnected {
                self.lost();
                need_sleep = true;
            }
            if need_sleep {
                thread::sleep(INBOUND_WAIT);
            }
        }
        debug!("Session {} inbound listener stopped", self.id);
    }

    // The peer can no longer release its key, so silence the remote tone on its behalf.
    fn lost(&mut self) {
        if self.channel_lost {
            return;
        }
        self.channel_lost = true;
        warn!("Session {} inbound channel has gone", self.id);
        if self.remote_key_down {
            self.remote_key_down = false;
            if let Some(tone) = &self.remote_tone {
                tone.stop();
            }
        }
    }

    fn handle(&mut self, message: RelayMessage) {
        if message.origin == self.id {
            debug!("Ignoring own event {}", message);
            return;
        }
        debug!("Inbound {}", message);
        match message.event {
            BridgeEvent::KeyState { on, .. } => {
                self.remote_key_down = on;
                if let Some(tone) = &self.remote_tone {
                    if on {
                        tone.start(None, None);
                    } else {
                        tone.stop();
                    }
                }
            }
            BridgeEvent::DecodedChar { text } => {
                match self.remote_text.write() {
                    Ok(mut locked) => locked.push_str(&text),
                    Err(poisoned) => poisoned.into_inner().push_str(&text),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "./session_spec.rs"]
mod session_spec;
