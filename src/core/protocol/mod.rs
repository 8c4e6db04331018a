// src/core/protocol/mod.rs

pub mod coerce;
pub mod reply;
pub mod resp_frame;
pub use reply::ReplyValue;
pub use resp_frame::{RespFrame, RespFrameCodec};
