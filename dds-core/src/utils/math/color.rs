//! Wheel-speed indicator colors.
//!
//! A wheel's speed magnitude, normalized by the speed limit and halved, picks a
//! hue between red (stopped) and cyan (full speed) at half saturation.

use smart_leds_trait::RGB8;

const SATURATION: f64 = 0.5;
const VALUE: f64 = 1.0;

/// Color for a wheel running at `speed` on a robot limited to `max_speed`.
pub fn speed_to_color(
    speed: f64,
    max_speed: f64,
) -> RGB8 {
    let hue = libm::fabs(speed / max_speed) / 2.0;
    hsv_to_rgb(hue, SATURATION, VALUE)
}

/// Convert HSV (all components in `[0, 1]`, hue in turns) to 8-bit RGB.
pub fn hsv_to_rgb(
    h: f64,
    s: f64,
    v: f64,
) -> RGB8 {
    let (r, g, b) = if s == 0.0 {
        (v, v, v)
    } else {
        let sector = libm::floor(h * 6.0);
        let f = h * 6.0 - sector;
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));
        match (sector as i64).rem_euclid(6) {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        }
    };
    RGB8 {
        r: to_u8(r),
        g: to_u8(g),
        b: to_u8(b),
    }
}

fn to_u8(c: f64) -> u8 {
    libm::round(c.clamp(0.0, 1.0) * 255.0) as u8
}
