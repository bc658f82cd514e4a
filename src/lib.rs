extern crate lazy_static;

pub mod libs;

#[cfg(test)]
#[macro_use]
extern crate serial_test;
