//! Scalar-ratio → RGB color models for transfer functions.
//!
//! Everything here is a pure function of `(mode, t)`. The diverging models
//! blend between the classic cool/warm anchors; two of them pass through
//! white in a perceptual space (CIELAB, CIELUV), the third interpolates
//! directly in Msh so the midpoint desaturates without an explicit white.

use serde::{Deserialize, Serialize};

use crate::structs::Color;

/// Cool anchor of the diverging models (a desaturated blue).
const COOL: [f32; 3] = [0.2314, 0.2980, 0.7529];
/// Warm anchor of the diverging models (a desaturated red).
const WARM: [f32; 3] = [0.7059, 0.0157, 0.1490];

/// Color model selector. `CyclicHue` is the legacy inverted-rainbow sweep;
/// the diverging models are preferred for signed/centered data.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ColorMode {
    #[default]
    CyclicHue,
    Grayscale,
    DivergingLab,
    DivergingLuv,
    DivergingMsh,
}

/// Maps a ratio `t` in [0, 1] to an opaque RGB color. Out-of-range input is
/// caller error and is clamped.
pub fn compute_color(mode: ColorMode, t: f32) -> Color {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let [r, g, b] = match mode {
        ColorMode::CyclicHue => hsv_to_rgb(260.0 * (1.0 - t), 1.0, 1.0),
        ColorMode::Grayscale => [t, t, t],
        ColorMode::DivergingLab => diverging_through_white(t, lab_from_rgb, rgb_from_lab),
        ColorMode::DivergingLuv => diverging_through_white(t, luv_from_rgb, rgb_from_luv),
        ColorMode::DivergingMsh => diverging_msh(t),
    };
    Color::from_f32(r, g, b, 1.0)
}

/// Cold→white over [0, 0.5], white→warm over [0.5, 1], blended in the space
/// defined by the given conversion pair.
fn diverging_through_white(
    t: f32,
    to_space: fn([f32; 3]) -> [f32; 3],
    from_space: fn([f32; 3]) -> [f32; 3],
) -> [f32; 3] {
    let white = to_space([1.0, 1.0, 1.0]);
    let (a, b, f) = if t < 0.5 {
        (to_space(COOL), white, t * 2.0)
    } else {
        (white, to_space(WARM), t * 2.0 - 1.0)
    };
    let mixed = [
        a[0] + (b[0] - a[0]) * f,
        a[1] + (b[1] - a[1]) * f,
        a[2] + (b[2] - a[2]) * f,
    ];
    from_space(mixed)
}

// ---------------------- HSV ----------------------

fn hsv_to_rgb(h_deg: f32, s: f32, v: f32) -> [f32; 3] {
    let h = (h_deg.rem_euclid(360.0)) / 60.0;
    let i = h.floor();
    let f = h - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let u = v * (1.0 - s * (1.0 - f));
    match i as u32 {
        0 => [v, u, p],
        1 => [q, v, p],
        2 => [p, v, u],
        3 => [p, q, v],
        4 => [u, p, v],
        _ => [v, p, q],
    }
}

// ---------------------- sRGB <-> XYZ ----------------------

const WHITE_XYZ: [f32; 3] = [0.950_47, 1.0, 1.088_83];

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn xyz_from_rgb(rgb: [f32; 3]) -> [f32; 3] {
    let r = srgb_to_linear(rgb[0]);
    let g = srgb_to_linear(rgb[1]);
    let b = srgb_to_linear(rgb[2]);
    [
        0.412_456_4 * r + 0.357_576_1 * g + 0.180_437_5 * b,
        0.212_672_9 * r + 0.715_152_2 * g + 0.072_175_0 * b,
        0.019_333_9 * r + 0.119_192_0 * g + 0.950_304_1 * b,
    ]
}

fn rgb_from_xyz(xyz: [f32; 3]) -> [f32; 3] {
    let [x, y, z] = xyz;
    let r = 3.240_454_2 * x - 1.537_138_5 * y - 0.498_531_4 * z;
    let g = -0.969_266_0 * x + 1.876_010_8 * y + 0.041_556_0 * z;
    let b = 0.055_643_4 * x - 0.204_025_9 * y + 1.057_225_2 * z;
    [linear_to_srgb(r), linear_to_srgb(g), linear_to_srgb(b)]
}

// ---------------------- CIELAB ----------------------

const LAB_EPS: f32 = 216.0 / 24389.0;
const LAB_KAPPA: f32 = 24389.0 / 27.0;

fn lab_f(t: f32) -> f32 {
    if t > LAB_EPS {
        t.cbrt()
    } else {
        (LAB_KAPPA * t + 16.0) / 116.0
    }
}

fn lab_f_inv(f: f32) -> f32 {
    let f3 = f * f * f;
    if f3 > LAB_EPS {
        f3
    } else {
        (116.0 * f - 16.0) / LAB_KAPPA
    }
}

fn lab_from_rgb(rgb: [f32; 3]) -> [f32; 3] {
    let xyz = xyz_from_rgb(rgb);
    let fx = lab_f(xyz[0] / WHITE_XYZ[0]);
    let fy = lab_f(xyz[1] / WHITE_XYZ[1]);
    let fz = lab_f(xyz[2] / WHITE_XYZ[2]);
    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

fn rgb_from_lab(lab: [f32; 3]) -> [f32; 3] {
    let [l, a, b] = lab;
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;
    let yr = if l > LAB_KAPPA * LAB_EPS {
        fy * fy * fy
    } else {
        l / LAB_KAPPA
    };
    rgb_from_xyz([
        lab_f_inv(fx) * WHITE_XYZ[0],
        yr * WHITE_XYZ[1],
        lab_f_inv(fz) * WHITE_XYZ[2],
    ])
}

// ---------------------- CIELUV ----------------------

fn uv_prime(xyz: [f32; 3]) -> (f32, f32) {
    let denom = xyz[0] + 15.0 * xyz[1] + 3.0 * xyz[2];
    if denom == 0.0 {
        (0.0, 0.0)
    } else {
        (4.0 * xyz[0] / denom, 9.0 * xyz[1] / denom)
    }
}

fn luv_from_rgb(rgb: [f32; 3]) -> [f32; 3] {
    let xyz = xyz_from_rgb(rgb);
    let yr = xyz[1] / WHITE_XYZ[1];
    let l = if yr > LAB_EPS {
        116.0 * yr.cbrt() - 16.0
    } else {
        LAB_KAPPA * yr
    };
    let (up, vp) = uv_prime(xyz);
    let (upn, vpn) = uv_prime(WHITE_XYZ);
    [l, 13.0 * l * (up - upn), 13.0 * l * (vp - vpn)]
}

fn rgb_from_luv(luv: [f32; 3]) -> [f32; 3] {
    let [l, u, v] = luv;
    if l <= 0.0 {
        return [0.0, 0.0, 0.0];
    }
    let (upn, vpn) = uv_prime(WHITE_XYZ);
    let up = u / (13.0 * l) + upn;
    let vp = v / (13.0 * l) + vpn;
    let y = if l > LAB_KAPPA * LAB_EPS {
        let fy = (l + 16.0) / 116.0;
        fy * fy * fy
    } else {
        l / LAB_KAPPA
    } * WHITE_XYZ[1];
    let x = y * 9.0 * up / (4.0 * vp);
    let z = y * (12.0 - 3.0 * up - 20.0 * vp) / (4.0 * vp);
    rgb_from_xyz([x, y, z])
}

// ---------------------- Msh ----------------------

fn msh_from_rgb(rgb: [f32; 3]) -> [f32; 3] {
    let [l, a, b] = lab_from_rgb(rgb);
    let m = (l * l + a * a + b * b).sqrt();
    if m == 0.0 {
        return [0.0, 0.0, 0.0];
    }
    [m, (l / m).clamp(-1.0, 1.0).acos(), b.atan2(a)]
}

fn rgb_from_msh(msh: [f32; 3]) -> [f32; 3] {
    let [m, s, h] = msh;
    rgb_from_lab([m * s.cos(), m * s.sin() * h.cos(), m * s.sin() * h.sin()])
}

/// Hue for an unsaturated endpoint so the desaturation path bends away from
/// the saturated color's hue.
fn adjust_hue(sat: [f32; 3], m_unsat: f32) -> f32 {
    let [m, s, h] = sat;
    if m >= m_unsat {
        return h;
    }
    let spin = s * (m_unsat * m_unsat - m * m).sqrt() / (m * s.sin());
    if h > -std::f32::consts::FRAC_PI_3 {
        h + spin
    } else {
        h - spin
    }
}

/// Continuous cool→warm interpolation in Msh space. Saturated endpoints with
/// hues further apart than 60° get an unsaturated spline midpoint instead of
/// an explicit white control point.
fn diverging_msh(t: f32) -> [f32; 3] {
    let mut lo = msh_from_rgb(COOL);
    let mut hi = msh_from_rgb(WARM);
    let mut t = t;

    let hue_gap = {
        let d = (lo[2] - hi[2]).abs() % (2.0 * std::f32::consts::PI);
        d.min(2.0 * std::f32::consts::PI - d)
    };
    if lo[1] > 0.05 && hi[1] > 0.05 && hue_gap > std::f32::consts::FRAC_PI_3 {
        let m_mid = lo[0].max(hi[0]).max(88.0);
        if t < 0.5 {
            hi = [m_mid, 0.0, 0.0];
            t *= 2.0;
        } else {
            lo = [m_mid, 0.0, 0.0];
            t = 2.0 * t - 1.0;
        }
    }
    if lo[1] < 0.05 && hi[1] > 0.05 {
        lo[2] = adjust_hue(hi, lo[0]);
    } else if hi[1] < 0.05 && lo[1] > 0.05 {
        hi[2] = adjust_hue(lo, hi[0]);
    }

    rgb_from_msh([
        lo[0] + (hi[0] - lo[0]) * t,
        lo[1] + (hi[1] - lo[1]) * t,
        lo[2] + (hi[2] - lo[2]) * t,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grayscale_boundaries() {
        assert_eq!(compute_color(ColorMode::Grayscale, 0.0), Color::rgb(0, 0, 0));
        assert_eq!(
            compute_color(ColorMode::Grayscale, 1.0),
            Color::rgb(255, 255, 255)
        );
    }

    #[test]
    fn cyclic_hue_sweep_endpoints_are_saturated() {
        // 260° end: violet-blue, 0° end: red. Both fully saturated.
        let start = compute_color(ColorMode::CyclicHue, 0.0);
        let end = compute_color(ColorMode::CyclicHue, 1.0);
        assert_eq!((start.b, start.g), (255, 0));
        assert_eq!((end.r, end.g, end.b), (255, 0, 0));
    }

    #[test]
    fn out_of_range_input_clamps() {
        assert_eq!(
            compute_color(ColorMode::Grayscale, 2.5),
            compute_color(ColorMode::Grayscale, 1.0)
        );
        assert_eq!(
            compute_color(ColorMode::Grayscale, -1.0),
            compute_color(ColorMode::Grayscale, 0.0)
        );
    }

    #[test]
    fn lab_round_trip() {
        for rgb in [[0.2, 0.5, 0.8], [1.0, 1.0, 1.0], [0.05, 0.0, 0.6]] {
            let back = rgb_from_lab(lab_from_rgb(rgb));
            for i in 0..3 {
                assert!((back[i] - rgb[i]).abs() < 1e-3, "{rgb:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn luv_round_trip() {
        for rgb in [[0.2, 0.5, 0.8], [0.9, 0.4, 0.1]] {
            let back = rgb_from_luv(luv_from_rgb(rgb));
            for i in 0..3 {
                assert!((back[i] - rgb[i]).abs() < 1e-3, "{rgb:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn lab_diverging_passes_through_white() {
        let mid = compute_color(ColorMode::DivergingLab, 0.5);
        assert!(mid.r >= 250 && mid.g >= 250 && mid.b >= 250, "{mid:?}");
    }

    #[test]
    fn msh_diverging_desaturates_in_the_middle() {
        let mid = compute_color(ColorMode::DivergingMsh, 0.5);
        let spread = mid.r.abs_diff(mid.g).max(mid.g.abs_diff(mid.b));
        assert!(spread < 40, "midpoint should be near-neutral: {mid:?}");
        // Endpoints keep their temperature.
        let cold = compute_color(ColorMode::DivergingMsh, 0.0);
        let warm = compute_color(ColorMode::DivergingMsh, 1.0);
        assert!(cold.b > cold.r);
        assert!(warm.r > warm.b);
    }
}
