use bridge_protocol::PixelBuffer;

/// Strength reached at 100% blur.
pub const FULL_BLUR_STRENGTH: f32 = 32.0;

const BOX_PASSES: usize = 3;

/// Maps a 0..=100 blur percentage to filter strength, `clamp(percent / 100 * 32, 0, inf)`.
pub fn blur_strength(blur_percent: f32) -> f32 {
    // f32::max drops NaN in favour of the other operand.
    (blur_percent / 100.0 * FULL_BLUR_STRENGTH).max(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurFilter {
    strength: f32,
}

impl BlurFilter {
    pub fn new(strength: f32) -> Self {
        Self {
            strength: strength.max(0.0),
        }
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub fn set_strength(&mut self, strength: f32) {
        self.strength = strength.max(0.0);
    }

    /// Radius of each box pass; three passes approximate a gaussian of that width.
    pub fn box_radius(&self) -> usize {
        if !self.strength.is_finite() {
            return 0;
        }
        (self.strength / BOX_PASSES as f32).round() as usize
    }

    /// How far blurred content can spread beyond the source bounds.
    pub fn padding(&self) -> usize {
        self.box_radius() * BOX_PASSES
    }

    pub fn apply(&self, layer: &mut PixelBuffer) {
        let radius = self.box_radius();
        if radius == 0 || layer.is_empty() {
            return;
        }
        let width = layer.width() as usize;
        let height = layer.height() as usize;
        let mut current = premultiply(layer.data());
        let mut scratch = vec![[0.0f32; 4]; current.len()];
        for _ in 0..BOX_PASSES {
            box_pass(&current, &mut scratch, width, height, radius, Axis::Horizontal);
            box_pass(&scratch, &mut current, width, height, radius, Axis::Vertical);
        }
        unpremultiply(&current, layer.data_mut());
    }
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

fn premultiply(bytes: &[u8]) -> Vec<[f32; 4]> {
    bytes
        .chunks_exact(4)
        .map(|pixel| {
            let alpha = pixel[3] as f32 / 255.0;
            [
                pixel[0] as f32 / 255.0 * alpha,
                pixel[1] as f32 / 255.0 * alpha,
                pixel[2] as f32 / 255.0 * alpha,
                alpha,
            ]
        })
        .collect()
}

fn unpremultiply(pixels: &[[f32; 4]], bytes: &mut [u8]) {
    for (pixel, out) in pixels.iter().zip(bytes.chunks_exact_mut(4)) {
        let alpha = pixel[3].clamp(0.0, 1.0);
        if alpha <= f32::EPSILON {
            out.copy_from_slice(&[0, 0, 0, 0]);
            continue;
        }
        for channel in 0..3 {
            out[channel] = to_byte(pixel[channel] / alpha);
        }
        out[3] = to_byte(alpha);
    }
}

fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// One box pass along `axis`; samples outside the layer count as transparent.
fn box_pass(
    source: &[[f32; 4]],
    target: &mut [[f32; 4]],
    width: usize,
    height: usize,
    radius: usize,
    axis: Axis,
) {
    let (line_count, line_len) = match axis {
        Axis::Horizontal => (height, width),
        Axis::Vertical => (width, height),
    };
    let index = |line: usize, position: usize| match axis {
        Axis::Horizontal => line * width + position,
        Axis::Vertical => position * width + line,
    };
    let window = (2 * radius + 1) as f32;
    let mut prefix = vec![[0.0f32; 4]; line_len + 1];
    for line in 0..line_count {
        for position in 0..line_len {
            let sample = source[index(line, position)];
            for channel in 0..4 {
                prefix[position + 1][channel] = prefix[position][channel] + sample[channel];
            }
        }
        for position in 0..line_len {
            let low = position.saturating_sub(radius);
            let high = (position + radius + 1).min(line_len);
            let out = &mut target[index(line, position)];
            for channel in 0..4 {
                out[channel] = (prefix[high][channel] - prefix[low][channel]) / window;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_protocol::Rgba;

    #[test]
    fn strength_is_linear_in_percent_and_clamped_at_zero() {
        assert_eq!(blur_strength(0.0), 0.0);
        assert_eq!(blur_strength(50.0), 16.0);
        assert_eq!(blur_strength(100.0), 32.0);
        assert_eq!(blur_strength(-20.0), 0.0);
        assert_eq!(blur_strength(f32::NAN), 0.0);

        let mut previous = blur_strength(0.0);
        for percent in 1..=100 {
            let strength = blur_strength(percent as f32);
            assert!(strength >= previous);
            previous = strength;
        }
    }

    #[test]
    fn zero_strength_leaves_pixels_untouched() {
        let mut layer = PixelBuffer::transparent(5, 5).expect("valid buffer");
        layer.set_pixel(2, 2, Rgba::WHITE);
        let before = layer.clone();
        BlurFilter::new(0.0).apply(&mut layer);
        assert_eq!(layer, before);
    }

    #[test]
    fn blur_spreads_a_single_pixel() {
        let mut layer = PixelBuffer::transparent(15, 15).expect("valid buffer");
        layer.set_pixel(7, 7, Rgba::WHITE);
        let filter = BlurFilter::new(3.0);
        assert_eq!(filter.box_radius(), 1);
        filter.apply(&mut layer);

        let center = layer.pixel(7, 7).expect("in bounds");
        let neighbour = layer.pixel(8, 7).expect("in bounds");
        let far = layer.pixel(0, 0).expect("in bounds");
        assert!(center.a < 255);
        assert!(neighbour.a > 0);
        assert_eq!(far.a, 0);
        // Color of blurred coverage stays white once alpha is divided back out.
        assert_eq!(neighbour.r, 255);
    }
}
