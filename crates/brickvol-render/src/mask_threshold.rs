//! CPU mask thresholding over read-back brick payloads.

use rayon::prelude::*;

/// Voxels per rayon work item.
const CHUNK: usize = 16 * 1024;

/// Keeps mask voxels whose data value lies in `[lo, hi]` (normalized to `0..=1`).
///
/// Mask voxels outside the range, or where the mask is already zero, are cleared; kept
/// voxels become 255. Returns the number of kept voxels. Both slices are processed up
/// to the shorter length.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn threshold_mask(data: &[u8], mask: &mut [u8], lo: f64, hi: f64) -> usize {
    let len = data.len().min(mask.len());
    let lo = (lo.clamp(0.0, 1.0) * 255.0).round() as u8;
    let hi = (hi.clamp(0.0, 1.0) * 255.0).round() as u8;

    mask[..len]
        .par_chunks_mut(CHUNK)
        .zip(data[..len].par_chunks(CHUNK))
        .map(|(m, d)| {
            let mut kept = 0;
            for (mv, &dv) in m.iter_mut().zip(d) {
                if *mv > 0 && (lo..=hi).contains(&dv) {
                    *mv = u8::MAX;
                    kept += 1;
                } else {
                    *mv = 0;
                }
            }
            kept
        })
        .sum()
}
