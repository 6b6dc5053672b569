#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! Client side of the Web eID protocol.
//!
//! A relying-party page asks the user's ID card for an authentication token or a signature
//! through [`EidClient`]. Requests travel to the browser extension over a [`MessageBus`], or to
//! the mobile authenticator app through a deep link or QR code, with the outcome polled from the
//! relying party's server.

mod action;
pub use action::*;

mod bus;
pub use bus::*;

mod client;
pub use client::*;

mod config;
pub use config::*;

mod deep_link;
pub use deep_link::*;

mod error;
pub use error::*;

mod host;
pub use host::*;

mod message;
pub use message::*;

mod operations;
pub use operations::*;

mod qr;
pub use qr::*;

mod status;
pub use status::*;

pub mod logger;

mod http_request;
pub use http_request::PollUrlPolicy;

// private modules
mod mobile;
mod registry;
