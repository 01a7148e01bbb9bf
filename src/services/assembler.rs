use crate::error::{Result, VolcanoError};
use crate::types::{ChatMessage, ContentItem, ContentPart, ImageRef, MediaUrl};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use ndarray::{ArrayD, Axis, IxDyn};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

pub struct MessageAssembler;

impl MessageAssembler {
    /// Builds the system entry (when `system_prompt` is non-empty) and one
    /// user entry whose parts follow the order of `items`.
    pub fn build_messages(items: &[ContentItem], system_prompt: &str) -> Result<Vec<ChatMessage>> {
        if items.is_empty() {
            return Err(VolcanoError::EmptyInput {
                reason: "content list must not be empty".to_string(),
            });
        }

        let parts = items
            .iter()
            .map(Self::to_part)
            .collect::<Result<Vec<_>>>()?;

        debug!("Assembled {} content parts", parts.len());

        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(ChatMessage::system(system_prompt));
        }
        messages.push(ChatMessage::user_parts(parts));
        Ok(messages)
    }

    pub fn build_text_messages(prompt: &str, system_prompt: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(ChatMessage::system(system_prompt));
        }
        messages.push(ChatMessage::user_text(prompt));
        messages
    }

    fn to_part(item: &ContentItem) -> Result<ContentPart> {
        let part = match item {
            ContentItem::Text(text) => ContentPart::Text { text: text.clone() },
            ContentItem::Image(image) => ContentPart::ImageUrl {
                image_url: MediaUrl {
                    url: Self::encode_image(image)?,
                },
            },
            // Local video files are sent as given; nothing is uploaded or encoded.
            ContentItem::Video(reference) => ContentPart::VideoUrl {
                video_url: MediaUrl {
                    url: reference.clone(),
                },
            },
        };
        Ok(part)
    }

    /// Resolves an image to a URL: URLs and data URIs pass through, anything
    /// else becomes a base64 PNG data URI.
    pub fn encode_image(image: &ImageRef) -> Result<String> {
        let bytes = match image {
            ImageRef::Reference(reference) => {
                if Self::is_ready_url(reference) {
                    return Ok(reference.clone());
                }
                Self::read_image_file(Path::new(reference))?
            }
            ImageRef::Bitmap(bitmap) => Self::png_bytes(bitmap)?,
            ImageRef::Pixels(pixels) => Self::png_bytes(&Self::pixels_to_image(pixels)?)?,
        };

        Ok(format!("{}{}", PNG_DATA_URI_PREFIX, BASE64_STANDARD.encode(bytes)))
    }

    fn is_ready_url(reference: &str) -> bool {
        reference.starts_with("http") || reference.starts_with("data:")
    }

    fn read_image_file(path: &Path) -> Result<Vec<u8>> {
        if !path.is_file() {
            return Err(VolcanoError::ImageEncoding {
                reason: format!("image file not found: {}", path.display()),
            });
        }
        Ok(std::fs::read(path)?)
    }

    fn png_bytes(image: &DynamicImage) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| VolcanoError::ImageEncoding {
                reason: format!("Failed to write PNG: {}", e),
            })?;
        Ok(buffer.into_inner())
    }

    /// Normalises a pixel array to an 8-bit image: values up to 1.0 are
    /// scaled to 0..=255, a leading batch axis is dropped, and channel-first
    /// layouts are moved to channel-last.
    pub fn pixels_to_image(pixels: &ArrayD<f32>) -> Result<DynamicImage> {
        let mut array = pixels.clone();

        let max = array.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if max <= 1.0 {
            array.mapv_inplace(|v| v * 255.0);
        }

        if array.ndim() == 4 {
            array = array.index_axis_move(Axis(0), 0);
        }

        if array.ndim() == 3 && matches!(array.shape()[0], 1 | 3 | 4) {
            array = array.permuted_axes(IxDyn(&[1, 2, 0]));
        }

        let shape = array.shape().to_vec();
        let bytes: Vec<u8> = array.iter().map(|v| *v as u8).collect();

        let invalid = || VolcanoError::ImageEncoding {
            reason: format!("unsupported pixel array shape {:?}", shape),
        };

        let image = match shape.as_slice() {
            [h, w] => GrayImage::from_raw(*w as u32, *h as u32, bytes).map(DynamicImage::ImageLuma8),
            [h, w, 1] => {
                GrayImage::from_raw(*w as u32, *h as u32, bytes).map(DynamicImage::ImageLuma8)
            }
            [h, w, 3] => {
                RgbImage::from_raw(*w as u32, *h as u32, bytes).map(DynamicImage::ImageRgb8)
            }
            [h, w, 4] => {
                RgbaImage::from_raw(*w as u32, *h as u32, bytes).map(DynamicImage::ImageRgba8)
            }
            _ => None,
        };

        image.ok_or_else(invalid)
    }
}
