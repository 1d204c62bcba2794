//! Image captioning service: a caption proxy endpoint in front of a hosted
//! image-to-text model, plus the client that validates uploads and keeps a
//! bounded local history of results.

pub mod api;
pub mod client;
pub mod codec;
pub mod history;
pub mod remote;
pub mod utils;
