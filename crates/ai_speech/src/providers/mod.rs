//! Speech provider implementations

pub mod http_stt;
pub mod http_tts;

pub use http_stt::HttpSpeechToText;
pub use http_tts::HttpTextToSpeech;
