//! Integration tests: the full pipeline against an in-memory source.

mod mock_source;
mod pipeline;
