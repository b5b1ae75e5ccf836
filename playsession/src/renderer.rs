//! Scales the native framebuffer into a host-owned screen buffer (spec §4.5).

use image::{ImageBuffer, Rgba, RgbaImage};

/// Holds an offscreen RGBA image sized to the screen and renders into it each
/// frame. Stateless across sessions aside from this buffer.
pub struct FramebufferRenderer {
    screen: RgbaImage,
}

impl FramebufferRenderer {
    pub fn new(screen_w: u32, screen_h: u32) -> Self {
        Self { screen: ImageBuffer::from_pixel(screen_w, screen_h, Rgba([0, 0, 0, 255])) }
    }

    pub fn resize(&mut self, screen_w: u32, screen_h: u32) {
        self.screen = ImageBuffer::from_pixel(screen_w, screen_h, Rgba([0, 0, 0, 255]));
    }

    pub fn screen(&self) -> &RgbaImage {
        &self.screen
    }

    /// Writes `pixels` (RGBA, `stride` bytes per row, `active_height` rows) into
    /// the screen buffer, nearest-neighbor scaled and centered. Silently does
    /// nothing if the inputs don't describe a usable frame.
    pub fn draw(&mut self, pixels: &[u8], stride: usize, active_height: usize) {
        if stride == 0 || active_height == 0 || stride * active_height > pixels.len() {
            return;
        }
        let native_w = (stride / 4) as u32;
        let native_h = active_height as u32;
        if native_w == 0 || native_h == 0 {
            return;
        }

        let (screen_w, screen_h) = self.screen.dimensions();
        let fit = (screen_w as f64 / native_w as f64).min(screen_h as f64 / native_h as f64);
        // Integer-uniform scale: nearest-neighbor replication must use the
        // same factor on every axis, never a fractional ratio (tetanes
        // floors the same way in its renderer config).
        let scale = fit.floor().max(1.0);
        let scaled_w = ((native_w as f64 * scale) as u32).max(1).min(screen_w);
        let scaled_h = ((native_h as f64 * scale) as u32).max(1).min(screen_h);
        let offset_x = (screen_w - scaled_w) / 2;
        let offset_y = (screen_h - scaled_h) / 2;

        for canvas_y in 0..screen_h {
            for canvas_x in 0..screen_w {
                let within_x = canvas_x.checked_sub(offset_x);
                let within_y = canvas_y.checked_sub(offset_y);
                let pixel = match (within_x, within_y) {
                    (Some(x), Some(y)) if x < scaled_w && y < scaled_h => {
                        let src_x = ((x as f64 / scale) as u32).min(native_w - 1);
                        let src_y = ((y as f64 / scale) as u32).min(native_h - 1);
                        let idx = src_y as usize * stride + src_x as usize * 4;
                        Rgba([pixels[idx], pixels[idx + 1], pixels[idx + 2], pixels[idx + 3]])
                    }
                    _ => Rgba([0, 0, 0, 255]),
                };
                self.screen.put_pixel(canvas_x, canvas_y, pixel);
            }
        }
    }

    /// Returns the native-resolution image directly, for upstream filters
    /// (e.g. xBR) that operate before scale-to-fit.
    pub fn native_image(pixels: &[u8], stride: usize, active_height: usize) -> Option<RgbaImage> {
        if stride == 0 || active_height == 0 || stride * active_height > pixels.len() {
            return None;
        }
        let native_w = (stride / 4) as u32;
        ImageBuffer::from_raw(native_w, active_height as u32, pixels[..stride * active_height].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_ignores_degenerate_input() {
        let mut renderer = FramebufferRenderer::new(64, 64);
        renderer.draw(&[], 0, 0);
        renderer.draw(&[0; 4], 8, 1); // stride*active_height > pixels.len()
    }

    #[test]
    fn draw_centers_scaled_image() {
        let mut renderer = FramebufferRenderer::new(8, 8);
        // 2x2 native image, all white.
        let pixels = vec![255u8; 2 * 2 * 4];
        renderer.draw(&pixels, 2 * 4, 2);
        // scale = min(8/2, 8/2) = 4, scaled to 8x8 filling the whole screen.
        assert_eq!(*renderer.screen().get_pixel(0, 0), Rgba([255, 255, 255, 255]));
        assert_eq!(*renderer.screen().get_pixel(7, 7), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn native_image_round_trips_dimensions() {
        let pixels = vec![1u8; 4 * 4 * 4];
        let image = FramebufferRenderer::native_image(&pixels, 16, 4).unwrap();
        assert_eq!(image.dimensions(), (4, 4));
    }
}
