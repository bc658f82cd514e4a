use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use log::{debug, info, warn};
use portaudio::{NonBlocking, Output, PortAudio, Stream};
use portaudio as pa;
use crate::libs::audio::audio_devices::{FRAMES_PER_BUFFER, open_output_audio_device};
use crate::libs::util::errors::MorseRelayError;

// Enough for a few callbacks' worth; writers block beyond this.
const MAX_QUEUED_SAMPLES: usize = FRAMES_PER_BUFFER as usize * 4;
const BACKPRESSURE_WAIT: Duration = Duration::from_millis(2);

/// Where generated samples go: an audio device, or a recording in tests. A sink is used only on
/// the thread that opened it.
pub trait SampleSink {
    fn sample_rate(&self) -> u32;

    /// Queue samples for playing, blocking until the device has room for them.
    fn write(&mut self, samples: &[i16]) -> Result<(), MorseRelayError>;

    /// Discard anything written but not yet played.
    fn flush(&mut self) -> Result<(), MorseRelayError>;
}

// Thanks to BartMassey's PortAudio-rs examples at https://github.com/BartMassey/portaudio-rs-demos
pub struct PortAudioSink {
    // Declared before the PortAudio so the stream is closed first.
    stream: Stream<NonBlocking, Output<i16>>,
    queue: Arc<Mutex<VecDeque<i16>>>,
    sample_rate: u32,
    _pa: PortAudio,
}

impl PortAudioSink {
    /// Opens and starts a mono output stream on the named device (empty for the default output).
    pub fn open(dev_name: &str) -> Result<Self, MorseRelayError> {
        let unavailable = |e: &dyn std::fmt::Display| MorseRelayError::DeviceUnavailable(format!("'{}': {}", dev_name, e));
        let pa = PortAudio::new().map_err(|e| unavailable(&e))?;
        let mut output_settings = open_output_audio_device(&pa, dev_name).map_err(|e| unavailable(&e))?;
        // we won't output out of range samples so don't bother clipping them.
        output_settings.flags = pa::stream_flags::CLIP_OFF;
        let sample_rate = output_settings.sample_rate as u32;

        let queue = Arc::new(Mutex::new(VecDeque::with_capacity(MAX_QUEUED_SAMPLES)));
        let callback_queue = queue.clone();
        let callback = move |pa::OutputStreamCallbackArgs::<i16> { buffer, .. }| {
            // Mono, so one sample per frame. Silence when the generator has nothing queued.
            match callback_queue.lock() {
                Ok(mut locked) => {
                    for sample in buffer.iter_mut() {
                        *sample = locked.pop_front().unwrap_or(0);
                    }
                }
                Err(_) => {
                    for sample in buffer.iter_mut() {
                        *sample = 0;
                    }
                }
            }
            pa::Continue
        };

        let mut stream = pa.open_non_blocking_stream(output_settings, callback).map_err(|e| unavailable(&e))?;
        stream.start().map_err(|e| unavailable(&e))?;
        info!("Opened audio output '{}' at {}Hz", dev_name, sample_rate);
        Ok(Self { stream, queue, sample_rate, _pa: pa })
    }

    fn stream_failure(&self) -> Option<String> {
        match self.stream.is_active() {
            Ok(true) => None,
            Ok(false) => Some("output stream is no longer active".to_owned()),
            Err(e) => Some(e.to_string()),
        }
    }
}

impl SampleSink for PortAudioSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, samples: &[i16]) -> Result<(), MorseRelayError> {
        let mut remaining = samples;
        while !remaining.is_empty() {
            let written = {
                let mut locked = self.queue.lock().map_err(|_| MorseRelayError::DeviceWrite("sample queue poisoned".to_owned()))?;
                let room = MAX_QUEUED_SAMPLES.saturating_sub(locked.len());
                let n = room.min(remaining.len());
                locked.extend(&remaining[..n]);
                n
            };
            remaining = &remaining[written..];
            if !remaining.is_empty() {
                // A full queue the device isn't draining means the stream has gone away.
                if let Some(failure) = self.stream_failure() {
                    return Err(MorseRelayError::DeviceWrite(failure));
                }
                thread::sleep(BACKPRESSURE_WAIT);
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), MorseRelayError> {
        let mut locked = self.queue.lock().map_err(|_| MorseRelayError::DeviceWrite("sample queue poisoned".to_owned()))?;
        debug!("Discarding {} queued samples", locked.len());
        locked.clear();
        Ok(())
    }
}

impl Drop for PortAudioSink {
    fn drop(&mut self) {
        if let Ok(mut locked) = self.queue.lock() {
            locked.clear();
        }
        debug!("PortAudioSink stopping stream...");
        if let Err(e) = self.stream.stop() {
            warn!("Error stopping audio output stream: {}", e);
        }
    }
}
