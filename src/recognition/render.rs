use super::Region;
use crate::event::Identity;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, ImageResult, Rgb, RgbImage};

/// JPEG quality for frames forwarded to viewers
pub const FRAME_QUALITY: u8 = 85;

/// JPEG quality for face crops sent to the hub
pub const CROP_QUALITY: u8 = 80;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: u32 = 2;
const LABEL_SCALE: u32 = 2;

/// A face region with the identity drawn next to it
#[derive(Debug, Clone, PartialEq)]
pub struct FaceBox {
    pub region: Region,
    pub identity: Identity,
}

/// Decode an incoming frame; `None` for anything that is not an image.
pub fn decode_frame(bytes: &[u8]) -> Option<RgbImage> {
    image::load_from_memory(bytes).ok().map(|img| img.to_rgb8())
}

pub fn encode_jpeg(img: &RgbImage, quality: u8) -> ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode_image(img)?;
    Ok(buf)
}

/// Crop `region` out of `frame`, clamped to the frame; `None` if empty.
pub fn crop(frame: &RgbImage, region: &Region) -> Option<RgbImage> {
    let (left, top, right, bottom) = clamp(frame, region);
    if right <= left || bottom <= top {
        return None;
    }
    Some(imageops::crop_imm(frame, left, top, right - left, bottom - top).to_image())
}

/// Crop `region` and encode it at [`CROP_QUALITY`]; `None` if the crop is
/// empty or cannot be encoded.
pub fn encode_crop(frame: &RgbImage, region: &Region) -> Option<Vec<u8>> {
    let face = crop(frame, region)?;
    encode_jpeg(&face, CROP_QUALITY)
        .map_err(|e| tracing::warn!(error = %e, "Failed to encode face crop"))
        .ok()
}

/// Draw every box and its identity label onto `frame`.
pub fn annotate(frame: &mut RgbImage, faces: &[FaceBox]) {
    for face in faces {
        let (left, top, right, bottom) = clamp(frame, &face.region);
        if right <= left || bottom <= top {
            continue;
        }
        draw_rect(frame, left, top, right, bottom);

        let glyph_h = 5 * LABEL_SCALE;
        let label_y = top.saturating_sub(glyph_h + 4);
        draw_text(frame, left, label_y, face.identity.key());
    }
}

fn clamp(frame: &RgbImage, region: &Region) -> (u32, u32, u32, u32) {
    let (w, h) = frame.dimensions();
    (
        region.left.min(w),
        region.top.min(h),
        region.right.min(w),
        region.bottom.min(h),
    )
}

fn draw_rect(frame: &mut RgbImage, left: u32, top: u32, right: u32, bottom: u32) {
    for t in 0..BOX_THICKNESS {
        for x in left..right {
            put(frame, x, top + t);
            put(frame, x, (bottom - 1).saturating_sub(t));
        }
        for y in top..bottom {
            put(frame, left + t, y);
            put(frame, (right - 1).saturating_sub(t), y);
        }
    }
}

fn draw_text(frame: &mut RgbImage, x: u32, y: u32, text: &str) {
    let advance = 4 * LABEL_SCALE;
    for (i, ch) in text.chars().enumerate() {
        let origin_x = x + i as u32 * advance;
        if origin_x >= frame.width() {
            break;
        }
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..3u32 {
                if bits & (0b100 >> col) == 0 {
                    continue;
                }
                for dy in 0..LABEL_SCALE {
                    for dx in 0..LABEL_SCALE {
                        put(
                            frame,
                            origin_x + col * LABEL_SCALE + dx,
                            y + row as u32 * LABEL_SCALE + dy,
                        );
                    }
                }
            }
        }
    }
}

fn put(frame: &mut RgbImage, x: u32, y: u32) {
    if x < frame.width() && y < frame.height() {
        frame.put_pixel(x, y, BOX_COLOR);
    }
}

// 3x5 glyphs, one row per entry, MSB is the left column
fn glyph(ch: char) -> [u8; 5] {
    match ch.to_ascii_uppercase() {
        'A' => [2, 5, 7, 5, 5],
        'B' => [6, 5, 6, 5, 6],
        'C' => [3, 4, 4, 4, 3],
        'D' => [6, 5, 5, 5, 6],
        'E' => [7, 4, 6, 4, 7],
        'F' => [7, 4, 6, 4, 4],
        'G' => [3, 4, 5, 5, 3],
        'H' => [5, 5, 7, 5, 5],
        'I' => [7, 2, 2, 2, 7],
        'J' => [1, 1, 1, 5, 2],
        'K' => [5, 5, 6, 5, 5],
        'L' => [4, 4, 4, 4, 7],
        'M' => [5, 7, 7, 5, 5],
        'N' => [6, 5, 5, 5, 5],
        'O' => [2, 5, 5, 5, 2],
        'P' => [6, 5, 6, 4, 4],
        'Q' => [2, 5, 5, 6, 3],
        'R' => [6, 5, 6, 5, 5],
        'S' => [3, 4, 2, 1, 6],
        'T' => [7, 2, 2, 2, 2],
        'U' => [5, 5, 5, 5, 7],
        'V' => [5, 5, 5, 5, 2],
        'W' => [5, 5, 7, 7, 5],
        'X' => [5, 5, 2, 5, 5],
        'Y' => [5, 5, 2, 2, 2],
        'Z' => [7, 1, 2, 4, 7],
        '0' => [7, 5, 5, 5, 7],
        '1' => [2, 6, 2, 2, 7],
        '2' => [6, 1, 2, 4, 7],
        '3' => [6, 1, 2, 1, 6],
        '4' => [5, 5, 7, 1, 1],
        '5' => [7, 4, 6, 1, 6],
        '6' => [3, 4, 6, 5, 2],
        '7' => [7, 1, 2, 2, 2],
        '8' => [2, 5, 2, 5, 2],
        '9' => [2, 5, 3, 1, 6],
        '-' => [0, 0, 7, 0, 0],
        '_' => [0, 0, 0, 0, 7],
        _ => [0; 5],
    }
}
