//! Memory model: property flags, heaps, memory types and the layout that ties
//! them together.
//!
//! | Item | Purpose |
//! |------|---------|
//! | [`MemoryPropertyFlags`] | Combinable memory property bits (DL, HV, HCO, HCA, LZ, PT) |
//! | [`MemoryHeap`] | Fixed-capacity physical heap |
//! | [`MemoryType`] | Property flags plus owning heap |
//! | [`MemoryLayout`] | Immutable per-device table, read once at device creation |

mod flags;
mod layout;

pub use flags::{BufferUsage, ImageUsage, MemoryPropertyFlags};
pub use layout::{MemoryHeap, MemoryLayout, MemoryType};

/// Binary units used when printing sizes.
const SIZE_UNITS: [&str; 5] = ["B ", "KB", "MB", "GB", "TB"];

/// Format a byte count with binary units, right-aligned to five characters.
///
/// ```
/// use membench_device::human_readable_size;
/// assert_eq!(human_readable_size(256 * 1024 * 1024), "256.0 MB");
/// assert_eq!(human_readable_size(512), "512.0 B ");
/// ```
pub fn human_readable_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:>5.1} {}", size, SIZE_UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_readable_size_units() {
        assert_eq!(human_readable_size(0), "  0.0 B ");
        assert_eq!(human_readable_size(1536), "  1.5 KB");
        assert_eq!(human_readable_size(32 * 1024 * 1024), " 32.0 MB");
        assert_eq!(human_readable_size(2 * 1024 * 1024 * 1024), "  2.0 GB");
        println!("[PASS] Sizes print with binary units");
    }
}
