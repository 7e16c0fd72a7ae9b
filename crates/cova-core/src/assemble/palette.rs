//! Evenly spaced line colours.

/// `n` colours spread evenly around the hue wheel, as `(r, g, b)` bytes.
pub fn evenly_spaced(n: usize) -> Vec<(u8, u8, u8)> {
    (0..n)
        .map(|i| hsv_to_rgb(i as f64 / n as f64, 0.75, 0.85))
        .collect()
}

/// CSS form understood by the plotting front-end.
pub fn css_rgb((r, g, b): (u8, u8, u8)) -> String {
    format!("rgb({r},{g},{b})")
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (u8, u8, u8) {
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);
    let (r, g, b) = match sector as i64 % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    let byte = |x: f64| (x * 255.0).round().clamp(0.0, 255.0) as u8;
    (byte(r), byte(g), byte(b))
}
