//! Core data model: the source message view, headers, MIME tree, and addresses.

pub mod address;
pub mod attachment;
pub mod header;
pub mod message;
pub mod mime;
