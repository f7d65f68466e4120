//! Pure helper functions shared by the pixel-domain detectors.
//!
//! Nothing in this module retains a frame reference past the call that
//! received it, keeping every detector's `process_pair` a pure function of
//! its two input frames.

use image::{GrayImage, Luma, RgbImage};

use crate::config::ColorSpace;

/// SSIM constants (`C1 = (0.01*255)^2`, `C2 = (0.03*255)^2`).
const SSIM_C1: f64 = 0.01 * 255.0 * 0.01 * 255.0;
const SSIM_C2: f64 = 0.03 * 255.0 * 0.03 * 255.0;

/// Resizes so the shorter side equals `target_height`, preserving aspect
/// ratio, the way every pixel-domain detector downscales before comparing
/// frames.
pub fn resize_shorter_side(img: &RgbImage, target_height: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    let short = w.min(h);
    if short == 0 || short == target_height {
        return img.clone();
    }
    let scale = target_height as f64 / short as f64;
    let new_w = ((w as f64) * scale).round().max(1.0) as u32;
    let new_h = ((h as f64) * scale).round().max(1.0) as u32;
    image::imageops::resize(img, new_w, new_h, image::imageops::FilterType::Triangle)
}

/// 5x5 Gaussian blur applied before grayscale conversion to reduce sensor
/// noise.
pub fn gaussian_blur_rgb(img: &RgbImage) -> RgbImage {
    imageproc::filter::gaussian_blur_f32(img, 1.0)
}

pub fn to_gray(img: &RgbImage) -> GrayImage {
    image::imageops::grayscale(img)
}

/// Mean absolute pixel difference, normalized to `[0, 1]`.
pub fn mean_abs_diff_gray(a: &GrayImage, b: &GrayImage) -> f64 {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let n = (a.width() as usize) * (a.height() as usize);
    if n == 0 {
        return 0.0;
    }
    let sum: u64 = a
        .pixels()
        .zip(b.pixels())
        .map(|(pa, pb)| (pa.0[0] as i32 - pb.0[0] as i32).unsigned_abs() as u64)
        .sum();
    (sum as f64 / n as f64) / 255.0
}

/// Sobel gradient magnitude at every pixel (3x3 kernel).
pub fn sobel_magnitude(img: &GrayImage) -> Vec<f32> {
    let gx = imageproc::gradients::horizontal_sobel(img);
    let gy = imageproc::gradients::vertical_sobel(img);
    gx.pixels()
        .zip(gy.pixels())
        .map(|(px, py)| {
            let x = px.0[0] as f32;
            let y = py.0[0] as f32;
            (x * x + y * y).sqrt()
        })
        .collect()
}

/// Mean absolute difference between the two frames' gradient-magnitude
/// fields, normalized by 255.
pub fn gradient_diff(a: &GrayImage, b: &GrayImage) -> f64 {
    let mag_a = sobel_magnitude(a);
    let mag_b = sobel_magnitude(b);
    let n = mag_a.len().max(1);
    let sum: f64 = mag_a
        .iter()
        .zip(mag_b.iter())
        .map(|(x, y)| (x - y).abs() as f64)
        .sum();
    (sum / n as f64) / 255.0
}

/// `1 - SSIM` over an 11x11 Gaussian window (sigma 1.5).
pub fn ssim_distance(a: &GrayImage, b: &GrayImage) -> f64 {
    let (w, h) = a.dimensions();
    let n = (w as usize) * (h as usize);
    if n == 0 {
        return 0.0;
    }

    let af: Vec<f64> = a.pixels().map(|p| p.0[0] as f64).collect();
    let bf: Vec<f64> = b.pixels().map(|p| p.0[0] as f64).collect();
    let a2: Vec<f64> = af.iter().map(|v| v * v).collect();
    let b2: Vec<f64> = bf.iter().map(|v| v * v).collect();
    let ab: Vec<f64> = af.iter().zip(bf.iter()).map(|(x, y)| x * y).collect();

    let mu_a = gaussian_blur_f64(&af, w, h, 1.5);
    let mu_b = gaussian_blur_f64(&bf, w, h, 1.5);
    let mu_a2_blur = gaussian_blur_f64(&a2, w, h, 1.5);
    let mu_b2_blur = gaussian_blur_f64(&b2, w, h, 1.5);
    let mu_ab_blur = gaussian_blur_f64(&ab, w, h, 1.5);

    let mut ssim_sum = 0.0;
    for i in 0..n {
        let mu_a_sq = mu_a[i] * mu_a[i];
        let mu_b_sq = mu_b[i] * mu_b[i];
        let mu_ab = mu_a[i] * mu_b[i];
        let sigma_a_sq = mu_a2_blur[i] - mu_a_sq;
        let sigma_b_sq = mu_b2_blur[i] - mu_b_sq;
        let sigma_ab = mu_ab_blur[i] - mu_ab;

        let numerator = (2.0 * mu_ab + SSIM_C1) * (2.0 * sigma_ab + SSIM_C2);
        let denominator = (mu_a_sq + mu_b_sq + SSIM_C1) * (sigma_a_sq + sigma_b_sq + SSIM_C2);
        ssim_sum += if denominator.abs() > f64::EPSILON {
            numerator / denominator
        } else {
            1.0
        };
    }
    1.0 - (ssim_sum / n as f64)
}

/// Gaussian-blurs an `f64` field stored as a dense `width*height` raster by
/// round-tripping through `imageproc`'s `f32` Gaussian filter on a Luma
/// image carrying the rescaled field. Kept local to `ssim_distance` because
/// it operates on raw statistics rather than on pixel colors.
fn gaussian_blur_f64(field: &[f64], width: u32, height: u32, sigma: f32) -> Vec<f64> {
    let max = field.iter().cloned().fold(1.0_f64, f64::max);
    let scale = if max > 0.0 { 255.0 / max } else { 1.0 };
    let raster: Vec<u8> = field.iter().map(|v| (v * scale).clamp(0.0, 255.0) as u8).collect();
    let img = GrayImage::from_raw(width, height, raster)
        .expect("field length matches width*height by construction");
    let blurred = imageproc::filter::gaussian_blur_f32(&img, sigma);
    blurred
        .pixels()
        .map(|p: &Luma<u8>| (p.0[0] as f64) / scale)
        .collect()
}

/// Blends the original grayscale frame (weight 0.7) with its normalized
/// Sobel magnitude (weight 0.3) — an optional edge-enhancement pass a
/// detector can apply before scoring.
pub fn enhance_edges(img: &GrayImage) -> GrayImage {
    let magnitude = sobel_magnitude(img);
    let max = magnitude.iter().cloned().fold(0.0_f32, f32::max).max(1.0);
    let (w, h) = img.dimensions();
    let mut out = GrayImage::new(w, h);
    for (i, px) in img.pixels().enumerate() {
        let normalized = (magnitude[i] / max) * 255.0;
        let blended = 0.7 * px.0[0] as f32 + 0.3 * normalized;
        out.put_pixel(
            (i as u32) % w,
            (i as u32) / w,
            Luma([blended.clamp(0.0, 255.0) as u8]),
        );
    }
    out
}

/// Estimates a single translation vector `(dx, dy)` between `prev` and
/// `curr` via exhaustive block matching of a patch at the frame center, in
/// place of optical flow (see DESIGN.md for the tradeoff).
pub fn estimate_translation(prev: &GrayImage, curr: &GrayImage) -> (i32, i32) {
    const PATCH: i32 = 16;
    const SEARCH_RADIUS: i32 = 8;

    let (w, h) = prev.dimensions();
    let (w, h) = (w as i32, h as i32);
    let cx = w / 2 - PATCH / 2;
    let cy = h / 2 - PATCH / 2;
    if w < PATCH + 2 * SEARCH_RADIUS || h < PATCH + 2 * SEARCH_RADIUS {
        return (0, 0);
    }

    let patch: Vec<u8> = (0..PATCH)
        .flat_map(|py| (0..PATCH).map(move |px| (px, py)))
        .map(|(px, py)| prev.get_pixel((cx + px) as u32, (cy + py) as u32).0[0])
        .collect();

    let mut best = (0, 0);
    let mut best_sad = u64::MAX;
    for dy in -SEARCH_RADIUS..=SEARCH_RADIUS {
        for dx in -SEARCH_RADIUS..=SEARCH_RADIUS {
            let mut sad = 0u64;
            for py in 0..PATCH {
                for px in 0..PATCH {
                    let sx = cx + px + dx;
                    let sy = cy + py + dy;
                    let curr_val = curr.get_pixel(sx as u32, sy as u32).0[0];
                    let prev_val = patch[(py * PATCH + px) as usize];
                    sad += (curr_val as i32 - prev_val as i32).unsigned_abs() as u64;
                }
            }
            if sad < best_sad {
                best_sad = sad;
                best = (dx, dy);
            }
        }
    }
    best
}

/// Warps `img` by a fixed integer translation, clamping at the borders.
/// Used to undo the estimated motion before scoring.
pub fn warp_translate(img: &RgbImage, dx: i32, dy: i32) -> RgbImage {
    let (w, h) = img.dimensions();
    let mut out = RgbImage::new(w, h);
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let sx = (x - dx).clamp(0, w as i32 - 1) as u32;
            let sy = (y - dy).clamp(0, h as i32 - 1) as u32;
            out.put_pixel(x as u32, y as u32, *img.get_pixel(sx, sy));
        }
    }
    out
}

/// Converts an sRGB pixel to `(h, s, v)` with `h` in `[0, 360)`.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let (r, g, b) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta.abs() < f32::EPSILON {
        0.0
    } else if (max - r).abs() < f32::EPSILON {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if (max - g).abs() < f32::EPSILON {
        60.0 * (((b - r) / delta) + 2.0)
    } else {
        60.0 * (((r - g) / delta) + 4.0)
    };
    let s = if max.abs() < f32::EPSILON { 0.0 } else { delta / max };
    (h, s, max)
}

/// Converts an sRGB pixel to CIE L*a*b* (D65 white point).
pub fn rgb_to_lab(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    fn to_linear(c: u8) -> f32 {
        let c = c as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    }
    let (r, g, b) = (to_linear(r), to_linear(g), to_linear(b));

    let x = r * 0.4124 + g * 0.3576 + b * 0.1805;
    let y = r * 0.2126 + g * 0.7152 + b * 0.0722;
    let z = r * 0.0193 + g * 0.1192 + b * 0.9505;

    let (xn, yn, zn) = (0.95047, 1.0, 1.08883);
    fn f(t: f32) -> f32 {
        if t > 0.008856 {
            t.cbrt()
        } else {
            7.787 * t + 16.0 / 116.0
        }
    }
    let (fx, fy, fz) = (f(x / xn), f(y / yn), f(z / zn));

    let l = 116.0 * fy - 16.0;
    let a = 500.0 * (fx - fy);
    let bb = 200.0 * (fy - fz);
    (l, a, bb)
}

/// A normalized histogram: a flat `f64` bin array summing to 1 (or all
/// zero if the source had no samples).
pub type Histogram = Vec<f64>;

fn normalize(mut bins: Vec<f64>) -> Histogram {
    let sum: f64 = bins.iter().sum();
    if sum > 0.0 {
        for b in &mut bins {
            *b /= sum;
        }
    }
    bins
}

/// Joint per-channel color histogram over a region. `bins_per_channel` bins
/// per channel; HSV mode uses only H and S.
pub fn color_histogram(img: &RgbImage, bins_per_channel: u32, color_space: ColorSpace) -> Histogram {
    let bins_per_channel = bins_per_channel.max(1);
    match color_space {
        ColorSpace::Hsv => {
            let mut bins = vec![0.0_f64; (bins_per_channel * bins_per_channel) as usize];
            for px in img.pixels() {
                let (h, s, _v) = rgb_to_hsv(px.0[0], px.0[1], px.0[2]);
                let hb = bin_index(h, 0.0, 360.0, bins_per_channel);
                let sb = bin_index(s, 0.0, 1.0, bins_per_channel);
                bins[(hb * bins_per_channel + sb) as usize] += 1.0;
            }
            normalize(bins)
        }
        ColorSpace::Rgb => {
            let mut bins = vec![0.0_f64; (bins_per_channel.pow(3)) as usize];
            for px in img.pixels() {
                let rb = bin_index(px.0[0] as f32, 0.0, 256.0, bins_per_channel);
                let gb = bin_index(px.0[1] as f32, 0.0, 256.0, bins_per_channel);
                let bb = bin_index(px.0[2] as f32, 0.0, 256.0, bins_per_channel);
                let idx = (rb * bins_per_channel + gb) * bins_per_channel + bb;
                bins[idx as usize] += 1.0;
            }
            normalize(bins)
        }
        ColorSpace::Lab => {
            let mut bins = vec![0.0_f64; (bins_per_channel.pow(3)) as usize];
            for px in img.pixels() {
                let (l, a, b) = rgb_to_lab(px.0[0], px.0[1], px.0[2]);
                let lb = bin_index(l, 0.0, 100.0, bins_per_channel);
                let ab = bin_index(a, -128.0, 128.0, bins_per_channel);
                let bb = bin_index(b, -128.0, 128.0, bins_per_channel);
                let idx = (lb * bins_per_channel + ab) * bins_per_channel + bb;
                bins[idx as usize] += 1.0;
            }
            normalize(bins)
        }
    }
}

fn bin_index(value: f32, min: f32, max: f32, bins: u32) -> u32 {
    let span = (max - min).max(f32::EPSILON);
    let clamped = value.clamp(min, max - f32::EPSILON * span.max(1.0));
    (((clamped - min) / span) * bins as f32).floor().clamp(0.0, (bins - 1) as f32) as u32
}

/// 4x4-grid (configurable) spatial block histograms.
pub fn spatial_histograms(
    img: &RgbImage,
    grid_size: u32,
    bins_per_channel: u32,
    color_space: ColorSpace,
) -> Vec<Histogram> {
    let (w, h) = img.dimensions();
    let grid_size = grid_size.max(1);
    let block_w = (w / grid_size).max(1);
    let block_h = (h / grid_size).max(1);
    let mut out = Vec::with_capacity((grid_size * grid_size) as usize);
    for gy in 0..grid_size {
        for gx in 0..grid_size {
            let x0 = gx * block_w;
            let y0 = gy * block_h;
            let x1 = if gx + 1 == grid_size { w } else { (x0 + block_w).min(w) };
            let y1 = if gy + 1 == grid_size { h } else { (y0 + block_h).min(h) };
            if x1 <= x0 || y1 <= y0 {
                out.push(vec![0.0; bins_per_channel.pow(3).max(1) as usize]);
                continue;
            }
            let block = image::imageops::crop_imm(img, x0, y0, x1 - x0, y1 - y0).to_image();
            out.push(color_histogram(&block, bins_per_channel, color_space));
        }
    }
    out
}

/// Edge-orientation histogram over Canny edges (thresholds 50/150), bucketed
/// by gradient direction quantized into `bins` buckets over `[0, 180)`.
pub fn edge_orientation_histogram(gray: &GrayImage, bins: u32) -> Histogram {
    let bins = bins.max(1);
    let edges = imageproc::edges::canny(gray, 50.0, 150.0);
    let gx = imageproc::gradients::horizontal_sobel(gray);
    let gy = imageproc::gradients::vertical_sobel(gray);

    let mut histogram = vec![0.0_f64; bins as usize];
    for (((edge_px, gx_px), gy_px), _) in edges
        .pixels()
        .zip(gx.pixels())
        .zip(gy.pixels())
        .zip(gray.pixels())
    {
        if edge_px.0[0] == 0 {
            continue;
        }
        let angle = (gy_px.0[0] as f32).atan2(gx_px.0[0] as f32);
        let degrees = ((angle + std::f32::consts::PI) / (2.0 * std::f32::consts::PI)) * 180.0;
        let bucket = bin_index(degrees, 0.0, 180.0, bins);
        histogram[bucket as usize] += 1.0;
    }
    normalize(histogram)
}

/// Concatenation point for [`color_histogram`], [`spatial_histograms`] and
/// [`edge_orientation_histogram`], used to build the multi-channel
/// descriptor.
pub fn concat_histograms(parts: impl IntoIterator<Item = Histogram>) -> Histogram {
    parts.into_iter().flatten().collect()
}

/// Chi-square distance, scaled by 1/1000 and clamped to `[0, 1]`.
pub fn chi_square_distance(h1: &[f64], h2: &[f64]) -> f64 {
    let raw: f64 = h1
        .iter()
        .zip(h2.iter())
        .map(|(a, b)| {
            let denom = a + b;
            if denom > 0.0 {
                (a - b) * (a - b) / denom
            } else {
                0.0
            }
        })
        .sum();
    (raw / 1000.0).clamp(0.0, 1.0)
}

/// `1 - Bhattacharyya coefficient`, bounded to `[0, 1]` since both
/// histograms are normalized to sum to 1.
pub fn bhattacharyya_distance(h1: &[f64], h2: &[f64]) -> f64 {
    let bc: f64 = h1.iter().zip(h2.iter()).map(|(a, b)| (a * b).sqrt()).sum();
    (1.0 - bc).clamp(0.0, 1.0)
}

/// `1 - correlation`, clamped to `[0, 1]`.
pub fn correlation_distance(h1: &[f64], h2: &[f64]) -> f64 {
    let n = h1.len().max(1) as f64;
    let mean1 = h1.iter().sum::<f64>() / n;
    let mean2 = h2.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var1 = 0.0;
    let mut var2 = 0.0;
    for (a, b) in h1.iter().zip(h2.iter()) {
        let da = a - mean1;
        let db = b - mean2;
        cov += da * db;
        var1 += da * da;
        var2 += db * db;
    }
    let denom = (var1 * var2).sqrt();
    let correlation = if denom > f64::EPSILON { cov / denom } else { 1.0 };
    (1.0 - correlation).clamp(0.0, 1.0)
}

/// `1 - (intersection / sum(h1))`.
pub fn intersection_distance(h1: &[f64], h2: &[f64]) -> f64 {
    let intersection: f64 = h1.iter().zip(h2.iter()).map(|(a, b)| a.min(*b)).sum();
    let sum_h1: f64 = h1.iter().sum();
    if sum_h1 > 0.0 {
        (1.0 - intersection / sum_h1).clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// Weighted fusion of the four histogram distances into one score (spec
/// §4.2.2: `0.3*chi2 + 0.3*bhatt + 0.2*(1-corr) + 0.2*inter_dist`).
pub fn histogram_score(h1: &[f64], h2: &[f64]) -> f64 {
    0.3 * chi_square_distance(h1, h2)
        + 0.3 * bhattacharyya_distance(h1, h2)
        + 0.2 * correlation_distance(h1, h2)
        + 0.2 * intersection_distance(h1, h2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(color: [u8; 3], w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |_, _| image::Rgb(color))
    }

    #[test]
    fn mean_abs_diff_of_identical_frames_is_zero() {
        let gray = to_gray(&solid([10, 20, 30], 8, 8));
        assert_eq!(mean_abs_diff_gray(&gray, &gray), 0.0);
    }

    #[test]
    fn mean_abs_diff_black_white_is_one() {
        let black = to_gray(&solid([0, 0, 0], 8, 8));
        let white = to_gray(&solid([255, 255, 255], 8, 8));
        assert!((mean_abs_diff_gray(&black, &white) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn histogram_of_identical_frames_scores_zero() {
        let img = solid([100, 150, 200], 16, 16);
        let h1 = color_histogram(&img, 8, ColorSpace::Rgb);
        let h2 = color_histogram(&img, 8, ColorSpace::Rgb);
        assert!(histogram_score(&h1, &h2) < 1e-9);
    }

    #[test]
    fn histogram_sums_to_one() {
        let img = solid([100, 150, 200], 16, 16);
        let h = color_histogram(&img, 8, ColorSpace::Rgb);
        let sum: f64 = h.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ssim_distance_of_identical_frames_is_near_zero() {
        let gray = to_gray(&solid([80, 80, 80], 32, 32));
        assert!(ssim_distance(&gray, &gray) < 1e-3);
    }

    #[test]
    fn estimate_translation_of_identical_frames_is_zero() {
        let gray = to_gray(&solid([64, 64, 64], 64, 64));
        assert_eq!(estimate_translation(&gray, &gray), (0, 0));
    }
}
