use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::mpsc::{Sender, TryRecvError};
use std::thread;
use std::thread::JoinHandle;
use log::{debug, info, warn};

use crate::libs::audio::sample_sink::{PortAudioSink, SampleSink};
use crate::libs::audio::sine_samples::SineSamples;
use crate::libs::util::errors::MorseRelayError;

// Samples per write. Small enough that a stop is noticed within a few milliseconds.
pub const CHUNK_SAMPLES: usize = 256;

/// Produces the sink on the audio thread; the sink never leaves that thread.
pub type SinkOpener = Box<dyn FnOnce() -> Result<Box<dyn SampleSink>, MorseRelayError> + Send>;

enum ToneCommand {
    Start { frequency: Option<u16>, amplitude: Option<i16> },
    // Optionally acknowledged once the sink has been flushed.
    Stop(Option<Sender<()>>),
    Shutdown,
}

/// One continuous tone on one output device. All writing happens on the generator's own thread,
/// which is the only owner of the device; `start` and `stop` are requests to it, processed in
/// order.
pub struct ToneGenerator {
    name: String,
    command_tx: Mutex<Sender<ToneCommand>>,
    running: Arc<AtomicBool>,
    last_error: Arc<Mutex<Option<MorseRelayError>>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ToneGenerator {
    /// Starts the audio thread and opens the sink there. If the sink can't be opened, the thread
    /// exits and the failure is returned.
    pub fn new(name: &str, frequency: u16, amplitude: i16, opener: SinkOpener) -> Result<Self, MorseRelayError> {
        let (command_tx, command_rx) = mpsc::channel::<ToneCommand>();
        let (open_tx, open_rx) = mpsc::channel::<Result<u32, MorseRelayError>>();
        let running = Arc::new(AtomicBool::new(false));
        let last_error: Arc<Mutex<Option<MorseRelayError>>> = Arc::new(Mutex::new(None));
        let thread_running = running.clone();
        let thread_last_error = last_error.clone();
        let thread_name = name.to_owned();

        info!("Initialising {} tone generator at {}Hz", name, frequency);
        let thread_handle = thread::spawn(move || {
            let mut sink = match opener() {
                Ok(sink) => {
                    let _ = open_tx.send(Ok(sink.sample_rate()));
                    sink
                }
                Err(e) => {
                    let _ = open_tx.send(Err(e));
                    return;
                }
            };
            debug!("{} tone generator thread started", thread_name);
            let mut frequency = frequency;
            let mut amplitude = amplitude;
            let mut wave: Option<SineSamples> = None;
            let mut chunk = vec![0i16; CHUNK_SAMPLES];
            loop {
                // Only block for commands when there is nothing to play.
                let command = if wave.is_some() {
                    match command_rx.try_recv() {
                        Ok(command) => Some(command),
                        Err(TryRecvError::Empty) => None,
                        Err(TryRecvError::Disconnected) => Some(ToneCommand::Shutdown),
                    }
                } else {
                    Some(command_rx.recv().unwrap_or(ToneCommand::Shutdown))
                };

                match command {
                    Some(ToneCommand::Start { frequency: new_frequency, amplitude: new_amplitude }) => {
                        if wave.is_some() {
                            debug!("{} tone already running", thread_name);
                        } else {
                            frequency = new_frequency.unwrap_or(frequency);
                            amplitude = new_amplitude.unwrap_or(amplitude);
                            wave = Some(SineSamples::new(frequency, amplitude, sink.sample_rate()));
                            thread_running.store(true, Ordering::SeqCst);
                        }
                    }
                    Some(ToneCommand::Stop(ack)) => {
                        if wave.take().is_some() {
                            thread_running.store(false, Ordering::SeqCst);
                            if let Err(e) = sink.flush() {
                                warn!("{} tone could not flush: {}", thread_name, e);
                            }
                        }
                        if let Some(ack) = ack {
                            let _ = ack.send(());
                        }
                    }
                    Some(ToneCommand::Shutdown) => {
                        break;
                    }
                    None => {}
                }

                if let Some(samples) = wave.as_mut() {
                    for sample in chunk.iter_mut() {
                        *sample = samples.next().unwrap_or(0);
                    }
                    if let Err(e) = sink.write(&chunk) {
                        warn!("{} tone stopped: {}", thread_name, e);
                        wave = None;
                        thread_running.store(false, Ordering::SeqCst);
                        if let Ok(mut locked) = thread_last_error.lock() {
                            *locked = Some(e);
                        }
                    }
                }
            }
            thread_running.store(false, Ordering::SeqCst);
            if let Err(e) = sink.flush() {
                warn!("{} tone could not flush: {}", thread_name, e);
            }
            debug!("{} tone generator thread stopped", thread_name);
        });

        match open_rx.recv() {
            Ok(Ok(sample_rate)) => {
                info!("{} tone generator ready at {}Hz sample rate", name, sample_rate);
                Ok(Self {
                    name: name.to_owned(),
                    command_tx: Mutex::new(command_tx),
                    running,
                    last_error,
                    thread_handle: Some(thread_handle),
                })
            }
            Ok(Err(e)) => {
                let _ = thread_handle.join();
                warn!("{} tone unavailable: {}", name, e);
                Err(e)
            }
            Err(_) => {
                let _ = thread_handle.join();
                Err(MorseRelayError::DeviceUnavailable(format!("{} tone generator thread exited", name)))
            }
        }
    }

    /// A generator playing on a PortAudio output device; an empty device name is the default
    /// output.
    pub fn with_device(name: &str, frequency: u16, amplitude: i16, dev_name: &str) -> Result<Self, MorseRelayError> {
        let dev_name = dev_name.to_owned();
        Self::new(name, frequency, amplitude, Box::new(move || {
            PortAudioSink::open(&dev_name).map(|sink| Box::new(sink) as Box<dyn SampleSink>)
        }))
    }

    /// Begin the tone, optionally changing the frequency and amplitude that it (and later starts)
    /// use. Does nothing if the tone is already running.
    pub fn start(&self, frequency: Option<u16>, amplitude: Option<i16>) {
        self.send(ToneCommand::Start { frequency, amplitude });
    }

    /// End the tone and discard anything queued for the device. Safe when already stopped.
    pub fn stop(&self) {
        self.send(ToneCommand::Stop(None));
    }

    /// As `stop`, returning once the device has been flushed.
    pub fn stop_and_wait(&self) {
        let (ack_tx, ack_rx) = mpsc::channel();
        if self.send(ToneCommand::Stop(Some(ack_tx))) {
            let _ = ack_rx.recv();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The write failure that stopped the tone, if any. Reported once.
    pub fn take_error(&self) -> Option<MorseRelayError> {
        match self.last_error.lock() {
            Ok(mut locked) => locked.take(),
            Err(_) => None,
        }
    }

    fn send(&self, command: ToneCommand) -> bool {
        let sent = match self.command_tx.lock() {
            Ok(locked) => locked.send(command).is_ok(),
            Err(_) => false,
        };
        if !sent {
            debug!("{} tone generator thread has gone", self.name);
        }
        sent
    }
}

impl Drop for ToneGenerator {
    fn drop(&mut self) {
        debug!("ToneGenerator {} shutting down...", self.name);
        self.send(ToneCommand::Shutdown);
        debug!("ToneGenerator {} joining thread handle...", self.name);
        self.thread_handle.take().map(JoinHandle::join);
        debug!("ToneGenerator {} ...joined thread handle", self.name);
    }
}

#[cfg(test)]
#[path = "./tone_generator_spec.rs"]
mod tone_generator_spec;
