//! Clients for YouTube-side collaborators: SupaData transcripts and the
//! YouTube Data API uploads playlist.

pub mod error;
pub mod playlist;
pub mod transcript;

pub use error::YouTubeError;
pub use playlist::{uploads_playlist_id, ChannelVideo, YouTubeClient, YouTubeConfig};
pub use transcript::{SupaDataClient, TranscriptConfig};
