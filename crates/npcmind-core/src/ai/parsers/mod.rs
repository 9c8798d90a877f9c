//! Model output parsers

mod json_ladder;

pub use json_ladder::{
    decode_ladder, extract_outermost_object, remove_trailing_commas, DecodeStep, ParseFailure,
};
