//! Common types shared across the WFS paging services.

pub mod error;
pub mod kvp;
pub mod request;
pub mod token;

pub use error::{WfsError, WfsResult};
pub use kvp::{KvpMap, RawKvp};
pub use request::{
    GetFeatureRequest, PageResultsRequest, ResultType, WfsRequest, DEFAULT_COUNT,
    DEFAULT_OUTPUT_FORMAT, DEFAULT_START_INDEX, DEFAULT_VERSION,
};
pub use token::is_valid_token;
