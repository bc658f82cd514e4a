use std::time::{Instant, SystemTime, UNIX_EPOCH};

// Wall-clock time, only used to stamp outbound events for remote listeners. Decoding uses the
// monotonic Clock.
pub fn get_epoch_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// The wall-clock time of a past monotonic instant, to the millisecond.
pub fn epoch_ms_at(at: Instant) -> u64 {
    let ago = Instant::now().saturating_duration_since(at).as_millis();
    get_epoch_ms().saturating_sub(ago) as u64
}

#[cfg(test)]
#[path = "./util_spec.rs"]
mod util_spec;
