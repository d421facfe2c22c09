//! Value nodes

mod value_extractor;

pub use value_extractor::ValueExtractor;
