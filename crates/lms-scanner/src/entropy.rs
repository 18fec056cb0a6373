//! Byte entropy for payload inspection

/// Shannon entropy of a byte slice, in bits per byte (0.0..=8.0)
///
/// Packed, compressed or encrypted blobs sit close to 8.0; prose sits
/// between 4 and 5.
#[inline]
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let mut freq = [0u32; 256];
    for &byte in data {
        freq[byte as usize] += 1;
    }

    let len = data.len() as f64;
    let mut entropy = 0.0;

    for &count in &freq {
        if count > 0 {
            let p = count as f64 / len;
            entropy -= p * p.log2();
        }
    }

    entropy
}

/// Highest entropy over fixed windows, so a small encrypted blob hidden
/// in a large plain buffer still stands out.
pub fn max_window_entropy(data: &[u8], window: usize) -> f64 {
    if window == 0 || data.len() <= window {
        return shannon_entropy(data);
    }

    data.chunks(window)
        .filter(|chunk| chunk.len() == window)
        .map(shannon_entropy)
        .fold(0.0, f64::max)
}
