//! Per-record image enrichment.
//!
//! Enrichment is best-effort: every failure below the bearer-token fetch
//! degrades the single record and leaves the pipeline running.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use relay_types::EventRecord;

use crate::annotate::draw_bounding_box;
use crate::bbox::{has_annotation, parse_bbox};
use crate::blob::BlobStore;
use crate::client::{BearerToken, FetchedImage, ImageFetch};
use crate::error::EnrichError;

/// How enrichment went for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichOutcome {
    /// Image fetched, uploaded, and the URL attached.
    Enriched,
    /// The API had no image for this record.
    NoImage,
    /// Record identity was incomplete; nothing attempted.
    SkippedNoIdentity,
    /// Fetch or upload failed; record left unmodified.
    Degraded,
}

/// Fetches, annotates, and uploads a per-record image, attaching the
/// resulting URL to the record.
pub struct ImageEnricher {
    fetcher: Arc<dyn ImageFetch>,
    blobs: Arc<dyn BlobStore>,
    storage_prefix: String,
}

impl ImageEnricher {
    pub fn new(
        fetcher: Arc<dyn ImageFetch>,
        blobs: Arc<dyn BlobStore>,
        storage_prefix: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            blobs,
            storage_prefix: storage_prefix.into(),
        }
    }

    /// Obtain the bearer token for this run.
    ///
    /// Called once per run; failure here is fatal and aborts the run.
    pub async fn begin_run(&self) -> Result<BearerToken, EnrichError> {
        self.fetcher.authorize().await
    }

    /// Enrich a single record in place.
    pub async fn enrich(&self, token: &BearerToken, record: &mut EventRecord) -> EnrichOutcome {
        if !record.has_identity() {
            debug!("Record without identity, skipping enrichment");
            return EnrichOutcome::SkippedNoIdentity;
        }

        let image = match self
            .fetcher
            .fetch(token, &record.source_index, &record.source_id)
            .await
        {
            Ok(Some(image)) => image,
            Ok(None) => return EnrichOutcome::NoImage,
            Err(e) => {
                warn!(
                    collection = %record.source_index,
                    id = %record.source_id,
                    error = %e,
                    "Image fetch failed"
                );
                return EnrichOutcome::Degraded;
            }
        };

        let (bytes, content_type) = self.annotate(record, image);
        let path = self.destination_path(record);
        let download_token = Uuid::new_v4().simple().to_string();

        match self
            .blobs
            .upload(bytes, &path, &content_type, &download_token)
            .await
        {
            Ok(blob) => {
                record.set_image_url(blob.preferred_url());
                info!(
                    collection = %record.source_index,
                    id = %record.source_id,
                    path = %blob.path,
                    "Attached image URL to record"
                );
                EnrichOutcome::Enriched
            }
            Err(e) => {
                warn!(
                    collection = %record.source_index,
                    id = %record.source_id,
                    error = %e,
                    "Image upload failed"
                );
                EnrichOutcome::Degraded
            }
        }
    }

    /// Apply the bounding-box annotation when the record carries one.
    ///
    /// Returns the bytes to upload and their content type. Any parse or
    /// draw problem falls back to the original bytes unchanged.
    fn annotate(&self, record: &EventRecord, image: FetchedImage) -> (Vec<u8>, String) {
        let position = match record.image_position() {
            Some(position) if has_annotation(position) => position.to_string(),
            _ => {
                debug!(id = %record.source_id, "No annotation marker, uploading original image");
                return (image.bytes, image.content_type);
            }
        };

        let bbox = match parse_bbox(&position) {
            Some(bbox) => bbox,
            None => {
                warn!(
                    id = %record.source_id,
                    position = %position,
                    "Unparseable annotation, uploading original image"
                );
                return (image.bytes, image.content_type);
            }
        };

        match draw_bounding_box(&image.bytes, bbox) {
            Ok(annotated) => (annotated, "image/jpeg".to_string()),
            Err(e) => {
                warn!(id = %record.source_id, error = %e, "Annotation failed, uploading original image");
                (image.bytes, image.content_type)
            }
        }
    }

    /// Blob path keyed by date and record identity.
    fn destination_path(&self, record: &EventRecord) -> String {
        format!(
            "{}/{}/{}_{}.jpg",
            self.storage_prefix,
            Utc::now().format("%Y/%m/%d"),
            record.source_index,
            record.source_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::BlobRef;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct FakeFetcher {
        image: Option<FetchedImage>,
        fail: bool,
    }

    #[async_trait]
    impl ImageFetch for FakeFetcher {
        async fn authorize(&self) -> Result<BearerToken, EnrichError> {
            if self.fail {
                Err(EnrichError::Auth("denied".into()))
            } else {
                Ok(BearerToken::new("token"))
            }
        }

        async fn fetch(
            &self,
            _token: &BearerToken,
            _collection: &str,
            _id: &str,
        ) -> Result<Option<FetchedImage>, EnrichError> {
            if self.fail {
                Err(EnrichError::Fetch("boom".into()))
            } else {
                Ok(self.image.clone())
            }
        }
    }

    #[derive(Default)]
    struct RecordingBlobs {
        uploads: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl BlobStore for RecordingBlobs {
        async fn upload(
            &self,
            _bytes: Vec<u8>,
            path: &str,
            content_type: &str,
            download_token: &str,
        ) -> Result<BlobRef, EnrichError> {
            if self.fail {
                return Err(EnrichError::Upload("bucket missing".into()));
            }
            self.uploads
                .lock()
                .unwrap()
                .push((path.to_string(), content_type.to_string()));
            Ok(BlobRef {
                bucket: "media".to_string(),
                path: path.to_string(),
                url: format!("https://blob/{}", path),
                url_with_token: format!("https://blob/{}?token={}", path, download_token),
            })
        }
    }

    fn jpeg_fixture() -> FetchedImage {
        use image::{Rgb, RgbImage};
        let mut buffer = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([200, 200, 200])))
            .write_to(&mut buffer, image::ImageFormat::Jpeg)
            .unwrap();
        FetchedImage {
            bytes: buffer.into_inner(),
            content_type: "image/jpeg".to_string(),
        }
    }

    fn enricher(fetcher: FakeFetcher, blobs: RecordingBlobs) -> (ImageEnricher, Arc<RecordingBlobs>) {
        let blobs = Arc::new(blobs);
        (
            ImageEnricher::new(Arc::new(fetcher), blobs.clone(), "events"),
            blobs,
        )
    }

    #[tokio::test]
    async fn test_enrich_attaches_token_url() {
        let (enricher, blobs) = enricher(
            FakeFetcher {
                image: Some(jpeg_fixture()),
                fail: false,
            },
            RecordingBlobs::default(),
        );

        let token = enricher.begin_run().await.unwrap();
        let mut record = EventRecord::new("security-events", "e1");
        let outcome = enricher.enrich(&token, &mut record).await;

        assert_eq!(outcome, EnrichOutcome::Enriched);
        let url = record.image_url().unwrap();
        assert!(url.contains("?token="));
        assert!(url.contains("security-events_e1.jpg"));

        let uploads = blobs.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert!(uploads[0].0.starts_with("events/"));
    }

    #[tokio::test]
    async fn test_no_image_leaves_record_unmodified() {
        let (enricher, _) = enricher(
            FakeFetcher {
                image: None,
                fail: false,
            },
            RecordingBlobs::default(),
        );

        let token = enricher.begin_run().await.unwrap();
        let mut record = EventRecord::new("idx", "e1");
        let outcome = enricher.enrich(&token, &mut record).await;

        assert_eq!(outcome, EnrichOutcome::NoImage);
        assert!(record.image_url().is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_degrades() {
        let (enricher, _) = enricher(
            FakeFetcher {
                image: None,
                fail: true,
            },
            RecordingBlobs::default(),
        );

        let token = BearerToken::new("token");
        let mut record = EventRecord::new("idx", "e1");
        assert_eq!(
            enricher.enrich(&token, &mut record).await,
            EnrichOutcome::Degraded
        );
        assert!(record.image_url().is_none());
    }

    #[tokio::test]
    async fn test_upload_failure_degrades() {
        let (enricher, _) = enricher(
            FakeFetcher {
                image: Some(jpeg_fixture()),
                fail: false,
            },
            RecordingBlobs {
                fail: true,
                ..Default::default()
            },
        );

        let token = enricher.begin_run().await.unwrap();
        let mut record = EventRecord::new("idx", "e1");
        assert_eq!(
            enricher.enrich(&token, &mut record).await,
            EnrichOutcome::Degraded
        );
        assert!(record.image_url().is_none());
    }

    #[tokio::test]
    async fn test_missing_identity_is_skipped() {
        let (enricher, _) = enricher(
            FakeFetcher {
                image: Some(jpeg_fixture()),
                fail: false,
            },
            RecordingBlobs::default(),
        );

        let token = enricher.begin_run().await.unwrap();
        let mut record = EventRecord::new("", "e1");
        assert_eq!(
            enricher.enrich(&token, &mut record).await,
            EnrichOutcome::SkippedNoIdentity
        );
    }

    #[tokio::test]
    async fn test_auth_failure_is_fatal() {
        let (enricher, _) = enricher(
            FakeFetcher {
                image: None,
                fail: true,
            },
            RecordingBlobs::default(),
        );
        assert!(matches!(
            enricher.begin_run().await,
            Err(EnrichError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_bbox_uploads_original_bytes() {
        let (enricher, blobs) = enricher(
            FakeFetcher {
                image: Some(FetchedImage {
                    bytes: b"raw-image".to_vec(),
                    content_type: "image/png".to_string(),
                }),
                fail: false,
            },
            RecordingBlobs::default(),
        );

        let token = enricher.begin_run().await.unwrap();
        let mut record =
            EventRecord::new("idx", "e1").with_field("image_position", json!("BBOX (1,2,3)"));
        let outcome = enricher.enrich(&token, &mut record).await;

        // Upload still happens, with the untouched original content type.
        assert_eq!(outcome, EnrichOutcome::Enriched);
        let uploads = blobs.uploads.lock().unwrap();
        assert_eq!(uploads[0].1, "image/png");
    }

    #[tokio::test]
    async fn test_valid_bbox_reencodes_as_jpeg() {
        let (enricher, blobs) = enricher(
            FakeFetcher {
                image: Some(jpeg_fixture()),
                fail: false,
            },
            RecordingBlobs::default(),
        );

        let token = enricher.begin_run().await.unwrap();
        let mut record = EventRecord::new("idx", "e1")
            .with_field("image_position", json!("BBOX (2,2,20,20)"));
        enricher.enrich(&token, &mut record).await;

        let uploads = blobs.uploads.lock().unwrap();
        assert_eq!(uploads[0].1, "image/jpeg");
    }
}
