//! Core library for the `avatard` weather-avatar daemon.
//!
//! This crate defines:
//! - Configuration handling
//! - The weather client with bounded retries, backed by an on-disk icon cache
//! - The avatar renderer (static image and animated-to-video paths)
//! - The publisher contract and the polling loop driving one cycle at a time
//!
//! It is used by `avatar-daemon`, but can also be reused by other binaries.

pub mod config;
pub mod error;
pub mod icons;
pub mod model;
pub mod pipeline;
pub mod publish;
pub mod render;
pub mod weather;

pub use config::{Config, PublisherConfig};
pub use error::AvatarError;
pub use icons::IconCache;
pub use model::{Artifact, ArtifactKind, WeatherSnapshot};
pub use pipeline::{LoopConfig, PollingLoop};
pub use publish::{HttpProfilePublisher, PhotoHandle, ProfilePublisher, replace_profile};
pub use render::{AvatarRender, AvatarRenderer, RenderConfig};
pub use weather::{WeatherClient, WeatherSource};
