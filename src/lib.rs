pub use schema_transfer_config::{config, preferences};
pub use schema_transfer_core::{
    activity, client, error, index, model, redact, relations, schema, test_utils, transfer,
};
