//! mlseq Conversion Service Client
//!
//! [`HttpBackend`] implements [`mlseq_core::ConversionBackend`] over HTTP:
//! - `POST {url}/convert/{model}` with a multipart body holding the payload
//!   (part named after its format), `options` as JSON and `bpm`
//! - `GET {url}/models` for the model catalog, falling back to the backup URL
//!
//! Any non-success status fails the conversion. Dropping a conversion future
//! cancels the underlying request.

pub mod client;
pub mod error;

pub use client::HttpBackend;
pub use error::{BackendError, BackendResult};
