#![recursion_limit = "256"]

#[macro_use]
extern crate getset;

#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;

#[macro_use]
extern crate enum_primitive_derive;
#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate bitfield;

pub mod config;
pub mod ctl;
pub mod ds;
pub mod err;
