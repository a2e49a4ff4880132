pub mod adapter;
pub mod config;
pub mod error;
pub mod http;
pub mod jellyfin;
pub mod models;
pub mod pagination;
pub mod plex;
pub mod session;
pub mod ticks;

pub use adapter::{ImageResolver, Library, MediaAdapter, Mutations, Playback};
pub use error::{MediaError, Result};
pub use http::HttpClient;
pub use session::{PlaybackSession, ReportOutcome};
