//! Thumbnail derivation.
//!
//! Produces an encrypted preview artifact for media items. Actual bitmap
//! decoding is platform territory and stays behind [`PreviewDecoder`]; this
//! module owns the sizing policy (power-of-two subsampling against a 512px
//! long edge, which bounds decode memory) and the encrypt-and-place step.
//!
//! Derivation failure is never fatal to ingestion: every failure path here
//! is logged at `warn` and collapses to "no thumbnail".

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::catalog::MediaKind;
use crate::codec::CipherCodec;
use crate::crypto;

/// Target bound for the preview's long edge, in pixels.
pub const PREVIEW_LONG_EDGE: u32 = 512;

/// Why a preview could not be derived. Carried in logs only; ingestion
/// callers never see it.
#[derive(Debug)]
pub struct PreviewError {
    reason: String,
}

impl PreviewError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PreviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "preview derivation failed: {}", self.reason)
    }
}

impl std::error::Error for PreviewError {}

/// Platform media decoding, as consumed by the pipeline.
///
/// Implementations decode a plaintext media file into an encoded preview
/// image (any common format — the viewer decrypts and decodes it the same
/// way). For video, `render` is expected to extract the first frame;
/// `probe` reports its dimensions.
pub trait PreviewDecoder: Send + Sync {
    /// Report the pixel dimensions of the media without a full decode.
    fn probe(&self, path: &Path, kind: MediaKind) -> Result<(u32, u32), PreviewError>;

    /// Decode at `sample_size` (power-of-two subsampling factor) and
    /// return the encoded preview bytes.
    fn render(&self, path: &Path, kind: MediaKind, sample_size: u32)
        -> Result<Vec<u8>, PreviewError>;
}

/// Decoder for deployments without a media stack: every item simply gets
/// no thumbnail.
pub struct NoPreviewDecoder;

impl PreviewDecoder for NoPreviewDecoder {
    fn probe(&self, _path: &Path, _kind: MediaKind) -> Result<(u32, u32), PreviewError> {
        Err(PreviewError::new("no decoder available"))
    }

    fn render(
        &self,
        _path: &Path,
        _kind: MediaKind,
        _sample_size: u32,
    ) -> Result<Vec<u8>, PreviewError> {
        Err(PreviewError::new("no decoder available"))
    }
}

/// Largest power-of-two subsampling factor that keeps both edges at or
/// above `target` when halved — decoding at this factor stays within a
/// bounded multiple of the target resolution.
pub fn sample_size_for(width: u32, height: u32, target: u32) -> u32 {
    let mut sample = 1;
    if width > target || height > target {
        let half_w = width / 2;
        let half_h = height / 2;
        while half_h / sample >= target && half_w / sample >= target {
            sample *= 2;
        }
    }
    sample
}

/// Derive, encode, and encrypt a preview for the plaintext at `source`.
///
/// Returns the encrypted preview's path, or `None` for non-media kinds and
/// for any failure (logged, swallowed).
pub(crate) async fn derive_encrypted_preview(
    decoder: &Arc<dyn PreviewDecoder>,
    codec: &CipherCodec,
    source: &Path,
    kind: MediaKind,
    thumbnail_dir: &Path,
) -> Option<PathBuf> {
    if !kind.previewable() {
        return None;
    }

    let decoder = Arc::clone(decoder);
    let source_path = source.to_path_buf();
    let rendered = tokio::task::spawn_blocking(move || {
        let (width, height) = decoder.probe(&source_path, kind)?;
        let sample = sample_size_for(width, height, PREVIEW_LONG_EDGE);
        decoder.render(&source_path, kind, sample)
    })
    .await;

    let bytes = match rendered {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            warn!(error = %e, "thumbnail derivation failed");
            return None;
        }
        Err(e) => {
            warn!(error = %e, "thumbnail derivation task aborted");
            return None;
        }
    };

    let token = match crypto::random_token() {
        Ok(token) => token,
        Err(e) => {
            warn!(error = %e, "thumbnail naming failed");
            return None;
        }
    };
    let dest = thumbnail_dir.join(format!("thm-{}", token));
    match codec.encrypt_bytes(&bytes, &dest).await {
        Ok(()) => Some(dest),
        Err(e) => {
            warn!(error = %e, "thumbnail encryption failed");
            None
        }
    }
}
