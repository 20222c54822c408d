use thiserror::Error;

use crate::decoder::{self, DecodeError};
use crate::selector::{self, Item};
use crate::source::{extract_table_literal, AuctionSource, SourceError};

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("auction data not found at {path}")]
    SourceMissing { path: String },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("failed to decode auction data: {0}")]
    Decode(#[from] DecodeError),

    #[error("reload task aborted: {0}")]
    Aborted(String),
}

impl ReloadError {
    /// Metric/health label for this failure.
    pub fn outcome(&self) -> &'static str {
        match self {
            ReloadError::SourceMissing { .. } | ReloadError::Source(_) => "source_unavailable",
            ReloadError::Decode(_) => "decode_error",
            ReloadError::Aborted(_) => "aborted",
        }
    }
}

/// read -> extract -> decode -> select, with no side effects on the store.
pub struct ReloadPipeline<S> {
    source: S,
}

impl<S: AuctionSource> ReloadPipeline<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn load(&self) -> Result<Vec<Item>, ReloadError> {
        let text = self
            .source
            .read()?
            .ok_or_else(|| ReloadError::SourceMissing {
                path: self.source.describe(),
            })?;

        let literal = extract_table_literal(&text)?;
        let tree = decoder::decode(literal)?;
        Ok(selector::select_latest_items(&tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MockAuctionSource;

    fn pipeline_with(text: Option<&'static str>) -> ReloadPipeline<MockAuctionSource> {
        let mut source = MockAuctionSource::new();
        source
            .expect_read()
            .returning(move || Ok(text.map(str::to_string)));
        source
            .expect_describe()
            .returning(|| "data/auction.lua".to_string());
        ReloadPipeline::new(source)
    }

    #[test]
    fn test_load_selects_items() {
        let pipeline = pipeline_with(Some(
            r#"AuctionDB = { auctions = { ["2024-01-01"] = { scans = { { timestamp = 100, items = { { buyoutAmount = 500, name="Sword" }, { buyoutAmount = 0, name="Junk" } } } } } } }"#,
        ));
        let items = pipeline.load().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].buyout_amount(), Some(500.0));
    }

    #[test]
    fn test_missing_source() {
        let err = pipeline_with(None).load().unwrap_err();
        assert!(matches!(err, ReloadError::SourceMissing { .. }));
        assert_eq!(err.outcome(), "source_unavailable");
        assert!(err.to_string().contains("data/auction.lua"));
    }

    #[test]
    fn test_no_assignment() {
        let err = pipeline_with(Some("garbage")).load().unwrap_err();
        assert!(matches!(err, ReloadError::Decode(DecodeError::NoAssignment)));
        assert_eq!(err.outcome(), "decode_error");
    }

    #[test]
    fn test_malformed_literal() {
        let err = pipeline_with(Some("data = { auctions = { ,, } }")).load().unwrap_err();
        assert!(matches!(err, ReloadError::Decode(DecodeError::Syntax { .. })));
    }

    #[test]
    fn test_well_formed_but_empty_shape_is_ok() {
        let items = pipeline_with(Some("data = { auctions = {} }")).load().unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_unreadable_source() {
        let mut source = MockAuctionSource::new();
        source.expect_read().returning(|| {
            Err(SourceError::Unreadable {
                path: "data/auction.lua".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            })
        });
        let err = ReloadPipeline::new(source).load().unwrap_err();
        assert!(matches!(err, ReloadError::Source(_)));
        assert_eq!(err.outcome(), "source_unavailable");
    }
}
