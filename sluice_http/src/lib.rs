//! Elasticsearch-compatible HTTP backend for sluice.
pub mod bulk;

pub use bulk::{
    ElasticsearchBulkClient, HttpBulkClientError, decode_bulk_response, encode_bulk_body,
    parse_bulk_response,
};
