pub mod audio_devices;
pub mod sample_sink;
pub mod sine_samples;
pub mod tone_generator;
