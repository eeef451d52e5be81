//! Shared test helpers

#![allow(dead_code)]

pub mod audio_generator;
pub mod fakes;
pub mod log_capture;
