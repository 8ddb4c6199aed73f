//! Sightline - webcam vision relay
//!
//! This library provides both halves of the Sightline system:
//! - The relay: validates `{image, prompt}`, calls a vision-language model
//!   (Gemini), answers `{text}`; served over HTTP or as a one-shot function
//! - The client: camera capture, relay client, voice output and the session
//!   controller that ties them together
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      Client                          │
//! │   Capture  │  Session  │  Relay client  │  Voice    │
//! └────────────────────┬────────────────────────────────┘
//!                      │ POST {image, prompt}
//! ┌────────────────────▼────────────────────────────────┐
//! │                      Relay                           │
//! │   HTTP server (/gemini-vision)  │  Function invoke   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │            Vision provider (Gemini)                  │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod capture;
pub mod client;
pub mod config;
pub mod error;
pub mod function;
pub mod provider;
pub mod relay;
pub mod session;
pub mod voice;

pub use api::{ApiServer, ApiServerBuilder, ApiState};
pub use client::RelayClient;
pub use config::Config;
pub use error::{Error, Result};
pub use relay::{PromptStyle, RelayService, VisionRequest, VisionResponse};
pub use session::{SessionController, SessionState, UiEvent};
