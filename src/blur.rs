use crate::error::{LoopcardError, LoopcardResult};

/// Separable Gaussian blur over a single-channel coverage mask.
///
/// `src` is `width * height` bytes of glyph coverage. Edge pixels clamp.
pub fn blur_mask(
    src: &[u8],
    width: u32,
    height: u32,
    radius: u32,
    sigma: f32,
) -> LoopcardResult<Vec<u8>> {
    let expected_len = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| LoopcardError::render("blur buffer size overflow"))?;
    if src.len() != expected_len {
        return Err(LoopcardError::render(
            "blur_mask expects src matching width*height",
        ));
    }
    if radius == 0 || src.is_empty() {
        return Ok(src.to_vec());
    }

    let kernel = gaussian_kernel_q16(radius, sigma)?;
    let mut tmp = vec![0u8; expected_len];
    let mut out = vec![0u8; expected_len];

    horizontal_pass(src, &mut tmp, width, height, &kernel);
    vertical_pass(&tmp, &mut out, width, height, &kernel);
    Ok(out)
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> LoopcardResult<Vec<u32>> {
    if radius == 0 {
        return Ok(vec![1 << 16]);
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(LoopcardError::validation("blur sigma must be > 0"));
    }

    let r = radius as i32;
    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;
    for i in -r..=r {
        let x = f64::from(i);
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }
    if sum <= 0.0 {
        return Err(LoopcardError::render("gaussian kernel sum is zero"));
    }

    // Fixed-point Q16 weights, nudged at the center so they sum to exactly 1.
    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = (((wf / sum) * 65536.0).round() as i64).clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        let new_mid = (i64::from(weights[mid]) + delta).clamp(0, 65536);
        weights[mid] = new_mid as u32;
    }

    Ok(weights)
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        for x in 0..w {
            let mut acc = 0u64;
            for (ki, &kw) in k.iter().enumerate() {
                let sx = (x + ki as i32 - radius).clamp(0, w - 1);
                acc += u64::from(kw) * u64::from(src[(y * w + sx) as usize]);
            }
            dst[(y * w + x) as usize] = q16_to_u8(acc);
        }
    }
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0u64;
            for (ki, &kw) in k.iter().enumerate() {
                let sy = (y + ki as i32 - radius).clamp(0, h - 1);
                acc += u64::from(kw) * u64::from(src[(sy * w + x) as usize]);
            }
            dst[(y * w + x) as usize] = q16_to_u8(acc);
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    (((acc + 32768) >> 16).min(255)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_0_is_identity() {
        let src = vec![1u8, 2, 3, 4, 5, 6];
        let out = blur_mask(&src, 3, 2, 0, 1.0).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn constant_mask_is_identity() {
        let src = vec![137u8; 12];
        let out = blur_mask(&src, 4, 3, 3, 2.0).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn energy_spreads_from_single_pixel() {
        let (w, h) = (5u32, 5u32);
        let mut src = vec![0u8; (w * h) as usize];
        src[(2 * w + 2) as usize] = 255;

        let out = blur_mask(&src, w, h, 2, 1.2).unwrap();

        let nonzero = out.iter().filter(|&&v| v != 0).count();
        assert!(nonzero > 1);

        let sum: u32 = out.iter().map(|&v| u32::from(v)).sum();
        assert!((sum as i32 - 255).abs() <= 4);
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        assert!(blur_mask(&[0u8; 5], 3, 2, 1, 1.0).is_err());
    }
}
