use std::f64::consts::PI;

use crate::{
    ease::{ease_in_out_cubic, lerp},
    error::LoopcardResult,
    palette::Palette,
    params::{ParameterSet, ShapeStyle},
    surface::Surface,
    text::{TextMask, Typeface},
};

/// The background animation repeats every 6 seconds.
pub const CYCLE_SECONDS: f64 = 6.0;

const CIRCLE_RADIUS_MIN: f64 = 260.0;
const CIRCLE_RADIUS_MAX: f64 = 320.0;
const WAVE_AMPLITUDE_MIN: f64 = 40.0;
const WAVE_AMPLITUDE_MAX: f64 = 80.0;
const WAVE_SAMPLE_STEP: u32 = 30;
const WAVE_BASELINE_FRACTION: f64 = 0.62;
const DIAGONAL_TILT_DEG: f64 = -12.0;
const DIAGONAL_OFFSET_MIN: f64 = -120.0;
const DIAGONAL_OFFSET_MAX: f64 = 120.0;

const OVERLAY_WHITE: [u8; 3] = [255, 255, 255];
const SHADOW_INK: [u8; 3] = [10, 12, 20];
const BUTTON_INK: [u8; 3] = [18, 18, 24];

const TITLE_PX: f32 = 72.0;
const SUBTITLE_PX: f32 = 30.0;
const CALLOUT_PX: f32 = 26.0;
const TEXT_PAD: u32 = 24;

/// Paint one complete frame for elapsed time `t` (seconds).
///
/// Pure in `t` and the parameters: identical inputs produce identical
/// pixels. `face` is optional so headless setups without a font still get
/// the animated background and the callout button.
pub fn render_frame(
    surface: &mut Surface,
    params: &ParameterSet,
    face: Option<&Typeface>,
    t: f64,
) -> LoopcardResult<()> {
    render_background(surface, Palette::by_id(params.palette), params.shape, t)?;
    render_foreground(surface, params, face, t)
}

/// Background pass: palette gradient plus the animated overlay shape.
pub fn render_background(
    surface: &mut Surface,
    palette: &Palette,
    shape: ShapeStyle,
    t: f64,
) -> LoopcardResult<()> {
    let stops = palette.stops_rgb()?;
    fill_gradient(surface, &stops);

    let phase = t.rem_euclid(CYCLE_SECONDS);
    let smooth = ease_in_out_cubic((phase.sin() + 1.0) / 2.0);

    match shape {
        ShapeStyle::Circle => overlay_circle(surface, smooth),
        ShapeStyle::Wave => overlay_wave(surface, phase, smooth),
        ShapeStyle::Diagonal => overlay_diagonal(surface, smooth),
    }
    Ok(())
}

/// Horizontal linear gradient with the stops evenly spaced by index.
/// A single stop degenerates to a flat fill.
pub fn fill_gradient(surface: &mut Surface, stops: &[[u8; 3]]) {
    let Some(first) = stops.first() else {
        return;
    };
    if stops.len() == 1 {
        surface.fill(*first);
        return;
    }

    let w = surface.width();
    let h = surface.height();
    let mut row = Vec::with_capacity(w as usize);
    for x in 0..w {
        let u = if w > 1 {
            f64::from(x) / f64::from(w - 1)
        } else {
            0.0
        };
        row.push(gradient_color(stops, u));
    }
    for y in 0..h {
        for (x, rgb) in row.iter().enumerate() {
            surface.put_pixel(x as i64, i64::from(y), *rgb);
        }
    }
}

/// Sample the gradient at `u` in [0,1].
pub fn gradient_color(stops: &[[u8; 3]], u: f64) -> [u8; 3] {
    match stops {
        [] => [0, 0, 0],
        [only] => *only,
        _ => {
            let u = u.clamp(0.0, 1.0);
            let span = (stops.len() - 1) as f64;
            let pos = u * span;
            let i = (pos.floor() as usize).min(stops.len() - 2);
            let frac = pos - i as f64;
            let a = stops[i];
            let b = stops[i + 1];
            [
                lerp(f64::from(a[0]), f64::from(b[0]), frac).round() as u8,
                lerp(f64::from(a[1]), f64::from(b[1]), frac).round() as u8,
                lerp(f64::from(a[2]), f64::from(b[2]), frac).round() as u8,
            ]
        }
    }
}

fn overlay_circle(surface: &mut Surface, smooth: f64) {
    let radius = lerp(CIRCLE_RADIUS_MIN, CIRCLE_RADIUS_MAX, smooth);
    let cx = f64::from(surface.width()) / 2.0;
    let cy = f64::from(surface.height()) / 2.0;

    let x0 = ((cx - radius).floor() as i64).max(0);
    let x1 = ((cx + radius).ceil() as i64).min(i64::from(surface.width()) - 1);
    let y0 = ((cy - radius).floor() as i64).max(0);
    let y1 = ((cy + radius).ceil() as i64).min(i64::from(surface.height()) - 1);

    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as f64 + 0.5 - cx;
            let dy = y as f64 + 0.5 - cy;
            let dist = (dx * dx + dy * dy).sqrt();
            // 1px antialiased rim.
            let coverage = (radius + 0.5 - dist).clamp(0.0, 1.0);
            if coverage > 0.0 {
                surface.blend_pixel(x, y, OVERLAY_WHITE, (coverage * 0.12) as f32);
            }
        }
    }
}

fn overlay_wave(surface: &mut Surface, phase: f64, smooth: f64) {
    let w = surface.width();
    let h = surface.height();
    let amplitude = lerp(WAVE_AMPLITUDE_MIN, WAVE_AMPLITUDE_MAX, smooth);
    let baseline = f64::from(h) * WAVE_BASELINE_FRACTION;

    // Sample the curve every WAVE_SAMPLE_STEP pixels, closing at x = width.
    let mut sample_xs: Vec<u32> = (0..w).step_by(WAVE_SAMPLE_STEP as usize).collect();
    if sample_xs.last() != Some(&w) {
        sample_xs.push(w);
    }
    let sample_ys: Vec<f64> = sample_xs
        .iter()
        .map(|&x| {
            let angle = 2.0 * PI * f64::from(x) / f64::from(w) + phase;
            baseline - amplitude - amplitude * angle.sin()
        })
        .collect();

    for x in 0..w {
        let seg = ((x / WAVE_SAMPLE_STEP) as usize).min(sample_xs.len() - 2);
        let x_a = f64::from(sample_xs[seg]);
        let x_b = f64::from(sample_xs[seg + 1]);
        let frac = if x_b > x_a {
            (f64::from(x) - x_a) / (x_b - x_a)
        } else {
            0.0
        };
        let y_curve = lerp(sample_ys[seg], sample_ys[seg + 1], frac);

        let y_start = y_curve.floor().max(0.0) as i64;
        for y in y_start..i64::from(h) {
            // Partial coverage on the boundary row.
            let coverage = ((y as f64 + 1.0) - y_curve).clamp(0.0, 1.0);
            surface.blend_pixel(i64::from(x), y, OVERLAY_WHITE, (coverage * 0.10) as f32);
        }
    }
}

fn overlay_diagonal(surface: &mut Surface, smooth: f64) {
    let offset = lerp(DIAGONAL_OFFSET_MIN, DIAGONAL_OFFSET_MAX, smooth);
    let cx = f64::from(surface.width()) / 2.0;
    let cy = f64::from(surface.height()) / 2.0;

    // Undo the band tilt per pixel and test against the band extents.
    let tilt = -DIAGONAL_TILT_DEG.to_radians();
    let (sin_t, cos_t) = tilt.sin_cos();

    // (center offset from mid-surface, half width, opacity)
    let bands: [(f64, f64, f32); 2] = [(-80.0, 120.0, 0.14), (180.0, 80.0, 0.07)];

    for y in 0..surface.height() {
        for x in 0..surface.width() {
            let dx = f64::from(x) + 0.5 - cx;
            let dy = f64::from(y) + 0.5 - cy;
            let rx = dx * cos_t - dy * sin_t;
            for (band_center, half_width, opacity) in bands {
                let d = (rx - (band_center + offset)).abs();
                let coverage = (half_width + 0.5 - d).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    surface.blend_pixel(
                        i64::from(x),
                        i64::from(y),
                        OVERLAY_WHITE,
                        coverage as f32 * opacity,
                    );
                }
            }
        }
    }
}

/// Foreground pass: drifting shadow copy, glowing headline/subtitle, and
/// the static callout button.
pub fn render_foreground(
    surface: &mut Surface,
    params: &ParameterSet,
    face: Option<&Typeface>,
    t: f64,
) -> LoopcardResult<()> {
    let accent = params.accent_rgb()?;

    if let Some(face) = face {
        let headline = params.title.to_uppercase();
        let title = TextMask::rasterize_line(face, &headline, TITLE_PX, TEXT_PAD);
        let subtitle = TextMask::rasterize_line(face, &params.subtitle, SUBTITLE_PX, TEXT_PAD);

        let shadow_dx = 8.0 * (t.rem_euclid(4.0) * PI / 2.0).sin();
        let glow_radius = 10.0 + 6.0 * (t.rem_euclid(3.0) * 2.0 * PI).sin();

        let surface_w = i64::from(surface.width());
        let title_top: i64 = 150;
        let title_content_h = i64::from(title.height) - 2 * i64::from(title.pad);
        let subtitle_top = title_top + title_content_h + 24;

        for (mask, top) in [(&title, title_top), (&subtitle, subtitle_top)] {
            let x = (surface_w - i64::from(mask.width)) / 2;
            let y = top - i64::from(mask.pad);

            let shadow = mask.blurred(6)?;
            shadow.blit(
                surface,
                x + shadow_dx.round() as i64,
                y + 6,
                SHADOW_INK,
                0.55,
            );

            let glow = mask.blurred(glow_radius.round().max(1.0) as u32)?;
            glow.blit(surface, x, y, OVERLAY_WHITE, 0.5);
            mask.blit(surface, x, y, OVERLAY_WHITE, 1.0);
        }
    }

    draw_callout_button(surface, params, face, accent);
    Ok(())
}

/// Solid accent pill with the callout text. Fixed position, no animation.
fn draw_callout_button(
    surface: &mut Surface,
    params: &ParameterSet,
    face: Option<&Typeface>,
    accent: [u8; 3],
) {
    let callout = face.map(|f| TextMask::rasterize_line(f, &params.callout, CALLOUT_PX, 8));

    let (content_w, content_h) = match &callout {
        Some(mask) => (
            i64::from(mask.width) - 2 * i64::from(mask.pad),
            i64::from(mask.height) - 2 * i64::from(mask.pad),
        ),
        None => (180, 26),
    };

    let button_w = content_w + 64;
    let button_h = content_h + 26;
    let center_x = i64::from(surface.width()) / 2;
    let center_y: i64 = 440;
    let x0 = center_x - button_w / 2;
    let y0 = center_y - button_h / 2;

    fill_rounded_rect(surface, x0, y0, button_w, button_h, button_h / 2, accent);

    if let Some(mask) = &callout {
        let x = center_x - i64::from(mask.width) / 2;
        let y = center_y - i64::from(mask.height) / 2;
        mask.blit(surface, x, y, BUTTON_INK, 1.0);
    }
}

fn fill_rounded_rect(surface: &mut Surface, x0: i64, y0: i64, w: i64, h: i64, r: i64, rgb: [u8; 3]) {
    let r = r.min(w / 2).min(h / 2).max(0);
    let corners = [
        (x0 + r, y0 + r),
        (x0 + w - r - 1, y0 + r),
        (x0 + r, y0 + h - r - 1),
        (x0 + w - r - 1, y0 + h - r - 1),
    ];
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            let in_core = (x >= x0 + r && x < x0 + w - r) || (y >= y0 + r && y < y0 + h - r);
            let covered = in_core
                || corners
                    .iter()
                    .any(|&(cx, cy)| (x - cx).pow(2) + (y - cy).pow(2) <= r * r);
            if covered {
                surface.put_pixel(x, y, rgb);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_color_hits_exact_stops() {
        let stops = [[255, 0, 0], [0, 255, 0], [0, 0, 255]];
        assert_eq!(gradient_color(&stops, 0.0), [255, 0, 0]);
        assert_eq!(gradient_color(&stops, 0.5), [0, 255, 0]);
        assert_eq!(gradient_color(&stops, 1.0), [0, 0, 255]);
    }

    #[test]
    fn gradient_single_stop_is_flat() {
        let stops = [[10, 20, 30]];
        for i in 0..=10 {
            assert_eq!(gradient_color(&stops, f64::from(i) / 10.0), [10, 20, 30]);
        }
    }

    #[test]
    fn gradient_interpolates_midway_between_stops() {
        let stops = [[0, 0, 0], [200, 100, 50]];
        assert_eq!(gradient_color(&stops, 0.5), [100, 50, 25]);
    }

    #[test]
    fn rounded_rect_fills_center_but_not_corner() {
        let mut s = Surface::new(40, 20).unwrap();
        s.fill([0, 0, 0]);
        fill_rounded_rect(&mut s, 0, 0, 40, 20, 10, [255, 255, 255]);
        assert_eq!(s.pixel(20, 10), [255, 255, 255, 255]);
        assert_eq!(s.pixel(0, 0), [0, 0, 0, 255]);
    }
}
