pub mod parser;
pub mod value;

pub use parser::{decode, DecodeError};
pub use value::TableValue;
