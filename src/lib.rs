//! Presence hub library: coordination core for a radar presence sensor.
//!
//! A 60 GHz FMCW radar streams frames into a presence-detection engine;
//! detected transitions are published to an MQTT broker, and the broker
//! can push configuration updates back. This crate owns the coordination
//! between those pieces with no platform dependencies, testable on any
//! host with `cargo test`. The firmware binary is a thin consumer that
//! supplies the radar driver, the presence algorithm and the MQTT client
//! through the traits in [`engine`].
//!
//! Tasks and their shared state:
//! - [`detection`]: frame-ready interrupt wake, acquisition, preprocessing,
//!   engine invocation, event publishing.
//! - [`configurator`]: decodes queued configuration payloads and applies
//!   them to the engine, answering on the status topic.
//! - [`publisher`]: drains the publish queue into the broker transport.
//! - [`context`]: locks, queues and the interrupt signal they share.
//!
//! `no_std`, no allocator.

#![cfg_attr(not(test), no_std)]

pub mod board;
pub mod config;
pub mod configurator;
pub mod context;
pub mod decode;
pub mod detection;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod publisher;

#[cfg(test)]
mod testing;
