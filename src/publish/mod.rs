//! Publish queue, social client and publisher
//!
//! - [`queue`] - per-source FIFO of downloaded clips
//! - [`client`] - social-media API seam ([`SocialClient`]) and its HTTP implementation
//! - [`publisher`] - one-item-per-trigger publish state machine

pub mod client;
pub mod publisher;
pub mod queue;

pub use client::{MediaId, PostId, SocialClient, XClient};
pub use publisher::Publisher;
pub use queue::PublishQueue;
