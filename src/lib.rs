//! This "library" build is here as a hack for loading unit tests to run on local arch, without depending on any hardware-related stuff.
//! (This is necessary as main.rs is inherently hardware-related code.)
//! Run them with `cargo test --lib --no-default-features`.

#![cfg_attr(not(test), no_std)]

#[allow(dead_code, unused_imports)]
mod command;
#[allow(dead_code, unused_imports)]
mod dispatch;
#[allow(dead_code, unused_imports)]
mod effect;
#[allow(dead_code, unused_imports)]
mod keymap;
#[allow(dead_code, unused_imports)]
mod lighting;
#[allow(dead_code, unused_imports)]
mod render;
#[allow(dead_code, unused_imports)]
mod rotary;
#[allow(dead_code, unused_imports)]
mod scan;
