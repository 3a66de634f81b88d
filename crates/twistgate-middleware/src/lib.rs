//! `twistgate-middleware` – The Wiring
//!
//! Moves data in and out of the gate without caring what it means.
//!
//! # Modules
//!
//! - [`bus`] – Headless, typed, topic-based publish/subscribe event bus built
//!   on Tokio broadcast channels; the gate's outputs land here.
//! - [`adapter`] – the [`FragmentSource`] trait input adapters implement.
//! - [`json_lines`] – a [`FragmentSource`] decoding newline-delimited JSON.

pub mod adapter;
pub mod bus;
pub mod json_lines;

pub use adapter::FragmentSource;
pub use bus::{EventBus, Topic, TopicReceiver};
pub use json_lines::JsonLinesSource;
