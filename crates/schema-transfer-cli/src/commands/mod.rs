pub mod activity;
pub mod collections;
pub mod common;
pub mod folders;
pub mod instances;
pub mod provision;
pub mod schema;
pub mod transfer;

pub use common::Context;
