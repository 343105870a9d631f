//! Periodic camera capture.
//!
//! - [`AcquisitionSource`]: camera capability, granted once per scheduler.
//! - [`CaptureWindow`]: bounded most-recent-first image window.
//! - [`CaptureScheduler`]: drives the tick loop, uploads frames and
//!   reconciles the remote collection after each upload.

mod device;
mod reconcile;
mod scheduler;
mod source;
mod synthetic;
mod window;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

pub use device::DeviceSource;
pub use reconcile::{ReconcileReport, reconcile};
pub use scheduler::{CaptureHandle, CaptureScheduler, CaptureState, StopReason};
pub use source::{AcquisitionError, AcquisitionSource, FrameStream};
pub use synthetic::SyntheticSource;
pub use window::CaptureWindow;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// One still frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    /// Acquisition time in milliseconds; also the image's store key.
    pub captured_at: i64,
    /// `data:image/png;base64,...` payload.
    pub data_url: String,
}

impl CapturedImage {
    pub fn from_png(captured_at: i64, png: &[u8]) -> Self {
        Self {
            captured_at,
            data_url: format!("{PNG_DATA_URL_PREFIX}{}", STANDARD.encode(png)),
        }
    }

    /// Base64 payload without the data-URL header.
    pub fn base64_payload(&self) -> &str {
        self.data_url
            .split_once(',')
            .map_or(self.data_url.as_str(), |(_, payload)| payload)
    }
}

/// Parse an image store key. Keys that are not integers have no recency.
pub(crate) fn parse_timestamp_key(key: &str) -> Option<i64> {
    key.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_is_encoded_as_data_url() {
        let image = CapturedImage::from_png(7, &[0x89, b'P', b'N', b'G']);
        assert_eq!(image.data_url, "data:image/png;base64,iVBORw==");
        assert_eq!(image.base64_payload(), "iVBORw==");
    }

    #[test]
    fn timestamp_keys() {
        assert_eq!(parse_timestamp_key("1700000000000"), Some(1_700_000_000_000));
        assert_eq!(parse_timestamp_key("-Nabc"), None);
    }
}
