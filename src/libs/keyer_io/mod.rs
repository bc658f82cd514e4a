pub mod keyer_io;
pub mod text_keyer;
