//! CPU mip chain for normal-map images.
//!
//! Texels encode unit normals, so each reduced texel is the renormalized
//! average of the decoded normals it covers rather than a plain byte average.

use globus_segment::NormalMapImage;

/// Number of mip levels for a square image of `size` texels.
pub fn mip_level_count(size: u32) -> u32 {
    (size.max(1) as f32).log2().floor() as u32 + 1
}

#[inline]
fn decode(b: u8) -> f32 {
    f32::from(b) / 255.0 * 2.0 - 1.0
}

#[inline]
fn encode(v: f32) -> u8 {
    ((v * 0.5 + 0.5).clamp(0.0, 1.0) * 255.0).round() as u8
}

fn reduce(image: &NormalMapImage) -> NormalMapImage {
    let size = (image.size / 2).max(1);
    let last = image.size.saturating_sub(1);
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for row in 0..size {
        for column in 0..size {
            let mut n = [0.0_f32; 3];
            let mut alpha = 0u32;
            let mut count = 0u32;
            for (dr, dc) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                let r = (row * 2 + dr).min(last);
                let c = (column * 2 + dc).min(last);
                if let Some(texel) = image.texel(r, c) {
                    n[0] += decode(texel[0]);
                    n[1] += decode(texel[1]);
                    n[2] += decode(texel[2]);
                    alpha += u32::from(texel[3]);
                    count += 1;
                }
            }
            let length = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            let n = if length > f32::EPSILON {
                n.map(|c| c / length)
            } else {
                [0.0; 3]
            };
            pixels.extend(n.map(encode));
            pixels.push((alpha / count.max(1)) as u8);
        }
    }
    NormalMapImage { size, pixels }
}

/// Every level from the full image down to 1x1.
pub fn mip_chain(image: &NormalMapImage) -> Vec<NormalMapImage> {
    let levels = mip_level_count(image.size);
    let mut chain = Vec::with_capacity(levels as usize);
    chain.push(image.clone());
    for _ in 1..levels {
        let Some(previous) = chain.last() else {
            break;
        };
        let next = reduce(previous);
        chain.push(next);
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(size: u32, texel: [u8; 4]) -> NormalMapImage {
        NormalMapImage {
            size,
            pixels: texel.repeat((size * size) as usize),
        }
    }

    #[test]
    fn test_level_count() {
        assert_eq!(mip_level_count(1), 1);
        assert_eq!(mip_level_count(2), 2);
        assert_eq!(mip_level_count(33), 6);
        assert_eq!(mip_level_count(64), 7);
    }

    #[test]
    fn test_chain_sizes_for_odd_image() {
        let chain = mip_chain(&flat(33, [128, 128, 255, 255]));
        let sizes: Vec<u32> = chain.iter().map(|m| m.size).collect();
        assert_eq!(sizes, vec![33, 16, 8, 4, 2, 1]);
        for level in &chain {
            assert_eq!(level.pixels.len(), (level.size * level.size * 4) as usize);
        }
    }

    #[test]
    fn test_uniform_normal_survives_reduction() {
        let chain = mip_chain(&flat(8, [255, 128, 128, 255]));
        let smallest = chain.last().unwrap();
        let texel = smallest.texel(0, 0).unwrap();
        assert_eq!(texel[0], 255);
        assert!((i32::from(texel[1]) - 128).abs() <= 1);
        assert_eq!(texel[3], 255);
    }

    #[test]
    fn test_transparent_stays_transparent() {
        let chain = mip_chain(&NormalMapImage::transparent());
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].texel(0, 0), Some([0, 0, 0, 0]));
    }
}
