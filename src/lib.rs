//! `msg2eml`: convert Outlook MSG files to standard RFC 5322 / MIME EML.
//!
//! The library reads the MSG compound file into a [`model::message::SourceMessage`],
//! reconciles its transport headers with synthesized and MSG-specific ones,
//! and serializes a MIME tree. [`convert::Converter`] is the entry point;
//! [`export::batch`] converts many files on a worker thread.

pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod inspect;
pub mod model;
pub mod parser;
