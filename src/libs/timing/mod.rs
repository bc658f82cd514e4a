pub mod keying_timing;
