//! Tagging infrastructure module

mod id3_tagger;

pub use id3_tagger::{build_tag, Cover, Id3Tagger};
