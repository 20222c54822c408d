pub mod extract;
pub mod reader;

pub use extract::extract_table_literal;
pub use reader::{AuctionSource, FileSource, SourceError};

#[cfg(test)]
pub use reader::MockAuctionSource;
