use serde::{Deserialize, Serialize};

const BYTES_PER_MEGABYTE: u64 = 1024 * 1024;

/// A single downloadable package, as presented to the browsing client.
///
/// Entries are derived fresh on every scan and never persisted; `id` only
/// means something within the response it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageEntry {
    /// 1-based position within a single scan.
    pub id: u64,
    /// Human-readable label derived from the file name.
    pub name: String,
    /// Exact on-disk file name.
    pub filename: String,
    /// Size in megabytes with two decimals, e.g. `"3.00 MB"`.
    pub size: String,
    /// Path that streams the file byte-for-byte.
    pub download_url: String,
}
impl PackageEntry {
    pub fn new(id: u64, filename: impl Into<String>, bytes: u64, suffix: &str, mount: &str) -> Self {
        let filename = filename.into();
        Self {
            id,
            name: display_name(&filename, suffix),
            size: format_size(bytes),
            download_url: download_url(mount, &filename),
            filename,
        }
    }
}

/// Derives a display label: the package suffix is stripped, then every
/// underscore and hyphen becomes a space.
///
/// ```
/// use apkdrop_inventory::display_name;
/// assert_eq!(display_name("My_App-2.apk", ".apk"), "My App 2");
/// ```
pub fn display_name(filename: &str, suffix: &str) -> String {
    filename.strip_suffix(suffix).unwrap_or(filename).replace(['_', '-'], " ")
}

/// Formats a byte count as megabytes with exactly two fraction digits.
///
/// Rounding is done on integers, half away from zero, so values that land
/// exactly between two hundredths (e.g. 131,072 bytes = 0.125 MB) round up.
///
/// ```
/// use apkdrop_inventory::format_size;
/// assert_eq!(format_size(2_621_440), "2.50 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    let megabyte = u128::from(BYTES_PER_MEGABYTE);
    let hundredths = (u128::from(bytes) * 100 + megabyte / 2) / megabyte;
    format!("{}.{:02} MB", hundredths / 100, hundredths % 100)
}

fn download_url(mount: &str, filename: &str) -> String {
    format!("{}/{}", mount.trim_end_matches('/'), filename)
}
