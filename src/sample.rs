use chrono::NaiveDateTime;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Timestamp format shown to clients
pub const RECORD_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Timestamp format embedded in stored sample file names
pub const FILENAME_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
/// Route prefix under which stored samples are served
pub const SAMPLES_ROUTE: &str = "/samples";
/// Extension of every stored sample; nothing else is served from the samples dir
pub const SAMPLE_EXTENSION: &str = "jpg";

pub const DEFAULT_USER_NAME: &str = "unknown_user";
pub const DEFAULT_DEVICE_ID: &str = "unknown_device";

/// Identifies one capture; increases with every replacement of the record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SampleId(u64);

impl SampleId {
    fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Who asked for a capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub user_name: String,
    pub device_id: String,
}

impl Default for Requester {
    fn default() -> Self {
        Self {
            user_name: DEFAULT_USER_NAME.to_string(),
            device_id: DEFAULT_DEVICE_ID.to_string(),
        }
    }
}

impl Requester {
    /// Fill in defaults for missing or blank fields
    pub fn from_optional(user_name: Option<String>, device_id: Option<String>) -> Self {
        let pick = |value: Option<String>, default: &str| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            user_name: pick(user_name, DEFAULT_USER_NAME),
            device_id: pick(device_id, DEFAULT_DEVICE_ID),
        }
    }
}

/// The most recent capture and its inference result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleRecord {
    pub id: SampleId,
    pub timestamp: String,
    pub sample_filename: String,
    pub egg_count: Option<u32>,
    pub requester: Requester,
}

impl SampleRecord {
    pub fn is_empty(&self) -> bool {
        self.sample_filename.is_empty()
    }
}

/// Single-slot store for the current `SampleRecord`.
///
/// The lock is held only to swap or copy the record, never across an await.
#[derive(Debug, Default)]
pub struct SampleStore {
    record: Mutex<SampleRecord>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the record with a fresh, uncounted sample
    pub fn replace(
        &self,
        captured_at: NaiveDateTime,
        sample_filename: String,
        requester: Requester,
    ) -> SampleId {
        let mut record = self.record.lock();
        let id = record.id.next();
        *record = SampleRecord {
            id,
            timestamp: captured_at.format(RECORD_TIMESTAMP_FORMAT).to_string(),
            sample_filename,
            egg_count: None,
            requester,
        };
        id
    }

    /// Store an inference result if the record still describes `id`.
    ///
    /// Returns false when a newer capture has replaced the record.
    pub fn set_egg_count(&self, id: SampleId, egg_count: u32) -> bool {
        let mut record = self.record.lock();
        if record.id != id {
            return false;
        }
        record.egg_count = Some(egg_count);
        true
    }

    pub fn snapshot(&self) -> SampleRecord {
        self.record.lock().clone()
    }

    pub fn current_id(&self) -> SampleId {
        self.record.lock().id
    }
}

/// JSON view of the record served by `/last_sample`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastSample {
    pub timestamp: String,
    pub sample_image_filename: String,
    #[serde(serialize_with = "serialize_egg_count")]
    pub egg_count: Option<u32>,
    pub sample_image_url: Option<String>,
    pub user_name: String,
    pub device_id: String,
}

impl From<SampleRecord> for LastSample {
    fn from(record: SampleRecord) -> Self {
        let sample_image_url = (!record.sample_filename.is_empty())
            .then(|| format!("{}/{}", SAMPLES_ROUTE, record.sample_filename));

        Self {
            timestamp: record.timestamp,
            sample_image_filename: record.sample_filename,
            egg_count: record.egg_count,
            sample_image_url,
            user_name: record.requester.user_name,
            device_id: record.requester.device_id,
        }
    }
}

/// Unset counts are reported as an empty string
fn serialize_egg_count<S: Serializer>(value: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(count) => serializer.serialize_u32(*count),
        None => serializer.serialize_str(""),
    }
}

/// Reduce a prefix to `[A-Za-z0-9_-]`, falling back to `default` when empty
pub fn sanitize_prefix(prefix: &str, default: &str) -> String {
    let cleaned: String = prefix
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        default.to_string()
    } else {
        cleaned
    }
}

/// `<prefix>_<YYYYmmdd-HHMMSS>.jpg`; captures within the same second collide
pub fn sample_filename(prefix: &str, captured_at: NaiveDateTime) -> String {
    format!(
        "{}_{}.{}",
        prefix,
        captured_at.format(FILENAME_TIMESTAMP_FORMAT),
        SAMPLE_EXTENSION
    )
}
