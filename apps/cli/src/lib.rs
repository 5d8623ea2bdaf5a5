#![deny(warnings)]

//! Command-line front end for the clinic pricing engine: argument parsing,
//! scenario files, session state and text rendering.

pub mod args;
pub mod config;
pub mod render;
pub mod session;
