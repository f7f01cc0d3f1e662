//! babel-im：实时聊天中继，按接收方语言个性化翻译，并提供语音转译管线
//! babel-im: a realtime chat relay that personalizes messages per recipient
//! language and exposes a speech-to-speech translation pipeline.

pub mod audio;
pub mod config;
pub mod delivery;
pub mod directory;
pub mod domain;
pub mod error;
pub mod fanout;
pub mod lang;
pub mod logging;
pub mod presence;
pub mod providers;
pub mod retry;
pub mod rooms;
pub mod server;
pub mod speech;
pub mod storage;
pub mod tasks;
pub mod translate;
pub mod ws;

pub use error::{RelayError, RelayResult};
pub use logging::init_tracing;
pub use server::BabelServer;
