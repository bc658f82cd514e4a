pub mod decoder;
pub mod symbol_state;
