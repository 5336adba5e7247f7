//! Local placeholder renderer used when every backend has been exhausted.
//!
//! Output depends only on the request, so the same request always renders
//! the same pixels.

use std::io::Cursor;
use std::path::PathBuf;

use image::{ImageFormat, Rgb, RgbImage};
use memeforge_contracts::request::GenerationRequest;
use sha2::{Digest, Sha256};

use crate::error::StoreError;
use crate::store::ArtifactStore;

pub const MOCK_SIZE: u32 = 512;
pub const PROMPT_PREVIEW_CHARS: usize = 25;

const BACKGROUND: Rgb<u8> = Rgb([0x1E, 0x29, 0x3B]);
const DISC: Rgb<u8> = Rgb([0x33, 0x41, 0x55]);
const PROMPT_INK: Rgb<u8> = Rgb([0xF8, 0xFA, 0xFC]);
const STYLE_INK: Rgb<u8> = Rgb([0x94, 0xA3, 0xB8]);
pub const MARKER_INK: Rgb<u8> = Rgb([0xF4, 0x3F, 0x5E]);

const GLYPH_WIDTH: u32 = 5;

#[derive(Debug, Clone, Copy, Default)]
pub struct MockRenderer;

impl MockRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render_png(&self, request: &GenerationRequest) -> Result<Vec<u8>, StoreError> {
        let image = self.draw(request);
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    pub async fn render(
        &self,
        request: &GenerationRequest,
        store: &dyn ArtifactStore,
    ) -> Result<PathBuf, StoreError> {
        let png = self.render_png(request)?;
        store.write(&png, "png").await
    }

    fn draw(&self, request: &GenerationRequest) -> RgbImage {
        let mut image = RgbImage::from_pixel(MOCK_SIZE, MOCK_SIZE, BACKGROUND);
        let center_x = MOCK_SIZE as i64 / 2;

        fill_disc(&mut image, center_x, 190, 130, color_from_prompt(&request.prompt));
        fill_disc(&mut image, center_x, 190, 118, DISC);

        draw_centered(&mut image, &prompt_preview(&request.prompt), 360, 2, PROMPT_INK);
        draw_centered(
            &mut image,
            &format!("STYLE: {}", request.style.label()),
            396,
            2,
            STYLE_INK,
        );
        draw_centered(&mut image, "[MOCK]", 436, 4, MARKER_INK);
        image
    }
}

pub fn prompt_preview(prompt: &str) -> String {
    let prompt = prompt.trim();
    if prompt.chars().count() <= PROMPT_PREVIEW_CHARS {
        return prompt.to_string();
    }
    prompt.chars().take(PROMPT_PREVIEW_CHARS).collect::<String>() + "..."
}

fn color_from_prompt(prompt: &str) -> Rgb<u8> {
    let digest = Sha256::digest(prompt.as_bytes());
    Rgb([digest[0] | 0x40, digest[1] | 0x40, digest[2] | 0x40])
}

fn fill_disc(image: &mut RgbImage, cx: i64, cy: i64, radius: i64, color: Rgb<u8>) {
    let (width, height) = image.dimensions();
    for y in (cy - radius).max(0)..(cy + radius + 1).min(height as i64) {
        for x in (cx - radius).max(0)..(cx + radius + 1).min(width as i64) {
            let (dx, dy) = (x - cx, y - cy);
            if dx * dx + dy * dy <= radius * radius {
                image.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

fn draw_centered(image: &mut RgbImage, text: &str, top: u32, scale: u32, color: Rgb<u8>) {
    let advance = (GLYPH_WIDTH + 1) * scale;
    let chars = text.chars().count() as u32;
    let text_width = (chars * advance).saturating_sub(scale);
    let left = image.width().saturating_sub(text_width) / 2;
    for (index, ch) in text.chars().enumerate() {
        draw_glyph(image, glyph(ch), left + index as u32 * advance, top, scale, color);
    }
}

fn draw_glyph(image: &mut RgbImage, rows: [u8; 7], left: u32, top: u32, scale: u32, color: Rgb<u8>) {
    let (width, height) = image.dimensions();
    for (row, bits) in rows.iter().enumerate() {
        for col in 0..GLYPH_WIDTH {
            if bits & (0x10 >> col) == 0 {
                continue;
            }
            for dy in 0..scale {
                for dx in 0..scale {
                    let x = left + col * scale + dx;
                    let y = top + row as u32 * scale + dy;
                    if x < width && y < height {
                        image.put_pixel(x, y, color);
                    }
                }
            }
        }
    }
}

// 5x7 rows, bit 4 is the leftmost column.
fn glyph(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        ' ' => [0x00; 7],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ',' => [0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '!' => [0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x04],
        '[' => [0x0E, 0x08, 0x08, 0x08, 0x08, 0x08, 0x0E],
        ']' => [0x0E, 0x02, 0x02, 0x02, 0x02, 0x02, 0x0E],
        '\'' => [0x04, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00],
        '/' => [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        '(' => [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02],
        ')' => [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08],
        _ => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
    }
}

#[cfg(test)]
mod tests {
    use memeforge_contracts::request::{GenerationRequest, Style};

    use super::{glyph, prompt_preview, MockRenderer, MARKER_INK, MOCK_SIZE};
    use crate::store::{ArtifactStore, LocalArtifactStore};

    #[test]
    fn rendering_is_deterministic() -> anyhow::Result<()> {
        let renderer = MockRenderer::new();
        let request = GenerationRequest::new("cat wearing sunglasses", Style::Retro);
        assert_eq!(renderer.render_png(&request)?, renderer.render_png(&request)?);

        let other = GenerationRequest::new("dog wearing sunglasses", Style::Retro);
        assert_ne!(renderer.render_png(&request)?, renderer.render_png(&other)?);
        Ok(())
    }

    #[test]
    fn placeholder_has_fixed_size_and_marker() -> anyhow::Result<()> {
        let request = GenerationRequest::new("anything", Style::Custom("vaporwave".into()))
            .with_dimensions(1024, 768);
        let png = MockRenderer::new().render_png(&request)?;
        let decoded = image::load_from_memory(&png)?.to_rgb8();
        assert_eq!(decoded.dimensions(), (MOCK_SIZE, MOCK_SIZE));
        assert!(decoded.pixels().any(|pixel| *pixel == MARKER_INK));
        Ok(())
    }

    #[tokio::test]
    async fn render_writes_one_artifact() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = LocalArtifactStore::new(temp.path())?;
        let path = MockRenderer::new()
            .render(&GenerationRequest::new("hello", Style::Cartoon), &store)
            .await?;
        assert!(store.exists(&path));
        assert_eq!(std::fs::read_dir(temp.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn long_prompts_are_truncated() {
        assert_eq!(prompt_preview("  short  "), "short");
        assert_eq!(
            prompt_preview("abcdefghijklmnopqrstuvwxyz0123"),
            "abcdefghijklmnopqrstuvwxy..."
        );
    }

    #[test]
    fn unsupported_characters_fall_back_to_question_mark() {
        assert_eq!(glyph('开'), glyph('?'));
        assert_eq!(glyph('a'), glyph('A'));
    }
}
