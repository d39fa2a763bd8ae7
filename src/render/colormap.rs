/// Sequential light-to-dark blue ramp, sampled at nine evenly spaced anchors.
const BLUES: [[u8; 3]; 9] = [
    [0xf7, 0xfb, 0xff],
    [0xde, 0xeb, 0xf7],
    [0xc6, 0xdb, 0xef],
    [0x9e, 0xca, 0xe1],
    [0x6b, 0xae, 0xd6],
    [0x42, 0x92, 0xc6],
    [0x21, 0x71, 0xb5],
    [0x08, 0x51, 0x9c],
    [0x08, 0x30, 0x6b],
];

#[derive(Debug, Clone, Copy)]
pub struct Colormap {
    anchors: &'static [[u8; 3]],
}

impl Colormap {
    pub fn blues() -> Self {
        Self { anchors: &BLUES }
    }

    /// Colour for `value` in `[0, 1]`; out-of-range and NaN values are clamped.
    pub fn map(&self, value: f32) -> [u8; 3] {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        let last = self.anchors.len() - 1;
        let position = value * last as f32;
        let lower = (position.floor() as usize).min(last);
        let upper = (lower + 1).min(last);
        let t = position - lower as f32;

        let a = self.anchors[lower];
        let b = self.anchors[upper];
        [
            lerp(a[0], b[0], t),
            lerp(a[1], b[1], t),
            lerp(a[2], b[2], t),
        ]
    }
}

impl Default for Colormap {
    fn default() -> Self {
        Self::blues()
    }
}

fn lerp(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round() as u8
}
