/// Control plane for a remote real-time generative-video stream
///
/// Creates streaming sessions on the rendering service, composes the
/// parameter documents that steer the visuals (prompt text, sampling
/// schedule, conditioning layers, style transfer), pushes them to the
/// running session, and recovers from dispatch failures by rotating
/// the session.

pub mod augment;
pub mod compose;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod params;
pub mod session;

pub use augment::{LlmAugmenter, PassthroughAugmenter, PromptAugmenter};
pub use compose::{
    encode_style_image, GenerationIntent, ModeTag, PromptComposer, RandomSource, ThreadRngSource,
};
pub use config::{Dimensions, StreamConfig, DEFAULT_PIPELINE};
pub use controller::{ControllerState, SessionController};
pub use dispatch::{DispatchClient, HttpDispatchClient};
pub use error::{ConfigError, ServiceError, SubmitError};
pub use params::{
    ConditioningLayer, GenerationParameters, MotionProfile, SamplerSchedule, StyleAdapter,
};
pub use session::{Session, SessionStatus, SessionStore};
