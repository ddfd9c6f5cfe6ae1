pub mod inverted;
pub mod posting;
pub mod postings_codec;
