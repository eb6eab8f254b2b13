//! MSG reading and text decoding: compound file properties, compressed RTF,
//! charset resolution, transfer-encoding detection and header blocks.

pub mod autodecode;
pub mod charset;
pub mod header;
pub mod msg;
pub mod property;
pub mod rtf;
