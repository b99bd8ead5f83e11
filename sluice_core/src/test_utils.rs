use serde_json::json;

use crate::{
    batcher::InFlightBatch,
    record::{BulkAction, CommandPair},
};

/// Create a command pair for the `test` index with the given id.
///
/// The document contains the id, to tell documents apart in assertions.
pub fn command(id: &str) -> CommandPair {
    CommandPair::new(
        BulkAction {
            index: "test".to_string(),
            doc_type: "doc".to_string(),
            id: id.to_string(),
        },
        json!({ "id": id }),
    )
}

/// Create an in-flight batch with one command per id.
pub fn batch(ids: &[&str]) -> InFlightBatch {
    InFlightBatch {
        id: 0,
        commands: ids.iter().map(|id| command(id)).collect(),
    }
}
