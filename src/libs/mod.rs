pub mod application;
pub mod audio;
pub mod bridge;
pub mod clock;
pub mod config_dir;
pub mod config_file;
pub mod decoder;
pub mod keyer_io;
pub mod morse;
pub mod relay;
pub mod session;
pub mod timing;
pub mod util;
