pub mod morse_table;
