//! Pooled voice and streaming-buffer management for OpenAL-style backends.
//!
//! A game creates many [`AudioSource`]s but the backend only mixes a handful
//! of hardware voices. [`VoiceManager`] hands voices out on [`play`], keeps
//! them fed and parameterised from [`update`], and takes them back once the
//! backend reports them stopped. Streaming content is fed through a shared
//! pool of pre-generated buffers; static content is uploaded once.
//!
//! ```no_run
//! use petalvoice::{AudioContext, SimulatedBackend, VoiceManager, VoicePoolDesc};
//! use petalvoice::audio_data::{LoadOptions, load_static};
//!
//! # fn main() -> petalvoice::error::Result<()> {
//! let ctx = AudioContext::init(SimulatedBackend::new())?;
//! let manager = VoiceManager::new(&ctx, VoicePoolDesc::default())?;
//!
//! let clip = load_static("res/step.wav", &LoadOptions::default())?;
//! let source = manager.source(clip);
//! manager.play(&ctx, &source);
//! manager.update(&ctx);
//!
//! manager.shutdown(&ctx);
//! ctx.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! [`play`]: VoiceManager::play
//! [`update`]: VoiceManager::update

pub mod audio;
pub mod audio_data;
pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
mod filler;
pub mod listener;
pub mod manager;
pub mod math;
pub mod pool;
pub mod source;
pub mod ticker;

pub use audio::{Audio, AudioContent, AudioInfo};
pub use backend::{AudioBackend, HandleId, PcmFormat, SimulatedBackend, VoiceState};
pub use config::VoicePoolDesc;
pub use context::AudioContext;
pub use error::PetalVoiceError;
pub use events::VoiceEvent;
pub use listener::Listener;
pub use manager::VoiceManager;
pub use math::{Orientation, Vec3};
pub use source::{AudioSource, DirtyParams, SourceId};
pub use ticker::UpdateTicker;
