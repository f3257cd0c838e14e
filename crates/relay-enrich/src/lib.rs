//! Image enrichment for the relay pipeline.
//!
//! For each record with a resolvable identity: fetch the record's image
//! from the authenticated image API, draw the bounding-box annotation when
//! one is present, upload the result to blob storage, and attach the
//! resulting URL to the record. Everything past the per-run bearer token
//! is best-effort.

mod annotate;
mod bbox;
mod blob;
mod client;
mod enricher;
mod error;

pub use annotate::draw_bounding_box;
pub use bbox::{has_annotation, parse_bbox, BoundingBox};
pub use blob::{BlobRef, BlobStore};
pub use client::{BearerToken, FetchedImage, ImageApiClient, ImageFetch};
pub use enricher::{EnrichOutcome, ImageEnricher};
pub use error::EnrichError;
