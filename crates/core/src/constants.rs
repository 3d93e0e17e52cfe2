//! Constants used throughout the dispensary core crate.

use std::time::Duration;

/// Default directory for record storage when no explicit directory is configured.
pub const DEFAULT_PATIENT_DATA_DIR: &str = "patient_data";

/// Default base URL of the dispensing device.
pub const DEFAULT_DEVICE_URL: &str = "http://192.168.1.100:80";

/// Round-trip bound applied to every device call.
pub const DEFAULT_DEVICE_TIMEOUT: Duration = Duration::from_secs(10);

/// Quantity sent to the device when the caller does not ask for one.
pub const DEFAULT_DISPENSE_QUANTITY: u32 = 1;

/// Number of guarded writes attempted before giving up on a commit.
pub const MAX_COMMIT_ATTEMPTS: usize = 3;

/// Maximum number of results returned by a medicine search.
pub const MEDICINE_SEARCH_LIMIT: usize = 10;

/// Timestamp format understood by the device firmware.
pub const DEVICE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Filename holding a stored document inside its sharded directory.
pub const DOCUMENT_FILENAME: &str = "document.json";

/// Device endpoint accepting a single dispense command.
pub const DEVICE_DISPENSE_PATH: &str = "/dispense";

/// Device endpoint accepting an informational prescription bundle.
pub const DEVICE_PRESCRIPTIONS_PATH: &str = "/prescriptions";

/// Device diagnostics endpoint.
pub const DEVICE_STATUS_PATH: &str = "/status";
