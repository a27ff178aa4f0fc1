mod lrc;

pub use lrc::LrcParser;
