//! # Audio Module
//!
//! Per-guild playback state and the continuation engine that drains it.
//!
//! ## Architecture
//!
//! ### [`player`] - Playback Coordinator
//! - Owns one [`session::GuildSession`] per guild behind an async mutex
//! - Runs the "play next" continuation on every completion
//! - Handles voice joins, leaves and involuntary disconnects
//!
//! ### [`queue`] - Queue Management
//! - Strict FIFO queue with 1-based positional editing
//! - Repeat modes and the history used to replay a whole queue
//!
//! ### [`inactivity`] / [`recovery`]
//! - Auto-disconnect timers for connected but idle guilds
//! - Snapshots of a dropped session, valid for a fixed window
//!
//! ### [`backend`] / [`songbird_backend`]
//! - Traits for voice, audio output and notifications
//! - Production implementation on top of songbird
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! # use std::sync::Arc;
//! # use crate::audio::player::PlaybackCoordinator;
//! # async fn example(coordinator: Arc<PlaybackCoordinator>, track: crate::sources::Track) -> anyhow::Result<()> {
//! use serenity::all::{ChannelId, GuildId};
//!
//! let guild_id = GuildId::new(123456789);
//! coordinator.join(guild_id, ChannelId::new(42)).await?;
//! coordinator.enqueue(guild_id, track).await?;
//! coordinator.ensure_playing(guild_id).await;
//!
//! coordinator.pause(guild_id).await?;
//! coordinator.resume(guild_id).await?;
//! coordinator.skip(guild_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod inactivity;
pub mod player;
pub mod queue;
pub mod recovery;
pub mod session;
pub mod songbird_backend;

#[cfg(test)]
pub(crate) mod testing;
