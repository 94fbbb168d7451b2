//! Signature image decoding
//!
//! Drawn signatures arrive as `data:image/png;base64,...` URLs from the
//! editor canvas. They are turned into PDF Image XObjects with the alpha
//! channel split off into a soft mask.

use std::io::{Cursor, Write};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use flate2::{write::ZlibEncoder, Compression};
use lopdf::{dictionary, Object, Stream};

use crate::error::OverlayError;

/// Split a base64 data URL into its media type and decoded payload
pub fn parse_data_url(url: &str) -> Result<(String, Vec<u8>), OverlayError> {
    let rest = url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| OverlayError::ImageError("not a data URL".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| OverlayError::ImageError("data URL has no payload".to_string()))?;

    let mut parts = meta.split(';');
    let mime = parts.next().unwrap_or_default().to_ascii_lowercase();
    if !parts.any(|p| p.eq_ignore_ascii_case("base64")) {
        return Err(OverlayError::ImageError(
            "only base64 data URLs are supported".to_string(),
        ));
    }

    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| OverlayError::ImageError(format!("invalid base64: {}", e)))?;
    Ok((mime, bytes))
}

/// Decoded signature raster, ready to be written as an Image XObject
#[derive(Debug, Clone)]
pub struct SignatureImage {
    pub width: u32,
    pub height: u32,
    /// Interleaved 8-bit samples in `color_space` order
    color: Vec<u8>,
    color_space: &'static str,
    /// One 8-bit alpha sample per pixel, if the PNG carried alpha
    alpha: Option<Vec<u8>>,
}

impl SignatureImage {
    pub fn from_data_url(url: &str) -> Result<Self, OverlayError> {
        let (mime, bytes) = parse_data_url(url)?;
        if mime != "image/png" {
            return Err(OverlayError::ImageError(format!(
                "unsupported signature image type '{}'",
                mime
            )));
        }
        Self::from_png(&bytes)
    }

    pub fn from_png(bytes: &[u8]) -> Result<Self, OverlayError> {
        let mut decoder = png::Decoder::new(Cursor::new(bytes));
        decoder.set_transformations(png::Transformations::normalize_to_color8());
        let mut reader = decoder
            .read_info()
            .map_err(|e| OverlayError::ImageError(e.to_string()))?;

        let mut buf = vec![0; reader.output_buffer_size()];
        let frame = reader
            .next_frame(&mut buf)
            .map_err(|e| OverlayError::ImageError(e.to_string()))?;
        buf.truncate(frame.buffer_size());

        let (color_space, channels, has_alpha) = match frame.color_type {
            png::ColorType::Grayscale => ("DeviceGray", 1, false),
            png::ColorType::GrayscaleAlpha => ("DeviceGray", 2, true),
            png::ColorType::Rgb => ("DeviceRGB", 3, false),
            png::ColorType::Rgba => ("DeviceRGB", 4, true),
            png::ColorType::Indexed => {
                return Err(OverlayError::ImageError(
                    "palette image was not expanded".to_string(),
                ))
            }
        };

        let (color, alpha) = if has_alpha {
            let color_channels = channels - 1;
            let pixels = buf.len() / channels;
            let mut color = Vec::with_capacity(pixels * color_channels);
            let mut alpha = Vec::with_capacity(pixels);
            for px in buf.chunks_exact(channels) {
                color.extend_from_slice(&px[..color_channels]);
                alpha.push(px[color_channels]);
            }
            (color, Some(alpha))
        } else {
            (buf, None)
        };

        Ok(Self {
            width: frame.width,
            height: frame.height,
            color,
            color_space,
            alpha,
        })
    }

    pub fn has_alpha(&self) -> bool {
        self.alpha.is_some()
    }

    /// Build the image stream and, when present, its soft mask stream.
    /// The caller adds the mask object first and links it via `SMask`.
    pub fn to_streams(&self) -> Result<(Stream, Option<Stream>), OverlayError> {
        let image = self.image_stream(self.color_space, &self.color)?;
        let mask = match &self.alpha {
            Some(alpha) => Some(self.image_stream("DeviceGray", alpha)?),
            None => None,
        };
        Ok((image, mask))
    }

    fn image_stream(&self, color_space: &str, samples: &[u8]) -> Result<Stream, OverlayError> {
        let data = deflate(samples)?;
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => self.width as i64,
            "Height" => self.height as i64,
            "ColorSpace" => Object::Name(color_space.as_bytes().to_vec()),
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        };
        Ok(Stream::new(dict, data))
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, OverlayError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| OverlayError::ImageError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| OverlayError::ImageError(e.to_string()))
}


#[cfg(test)]
mod tests {
    use super::test_images::*;
    use super::*;

    fn color_space(stream: &Stream) -> &[u8] {
        stream
            .dict
            .get(b"ColorSpace")
            .and_then(Object::as_name)
            .unwrap()
    }

    #[test]
    fn test_parse_data_url() {
        let (mime, bytes) = parse_data_url("data:text/plain;base64,aGk=").unwrap();
        assert_eq!(mime, "text/plain");
        assert_eq!(bytes, b"hi");
    }

    #[test]
    fn test_parse_data_url_rejects_plain_text() {
        assert!(parse_data_url("J. Doe").is_err());
        assert!(parse_data_url("data:image/png,rawbytes").is_err());
        assert!(parse_data_url("data:image/png;base64").is_err());
    }

    #[test]
    fn test_rgba_splits_alpha() {
        let image = SignatureImage::from_data_url(&png_data_url(4, 2, png::ColorType::Rgba)).unwrap();
        assert_eq!((image.width, image.height), (4, 2));
        assert!(image.has_alpha());
        assert_eq!(image.color.len(), 4 * 2 * 3);
        assert!(image.alpha.as_ref().unwrap().iter().all(|a| *a == 128));
    }

    #[test]
    fn test_rgb_has_no_mask() {
        let image = SignatureImage::from_png(&png_bytes(3, 3, png::ColorType::Rgb)).unwrap();
        let (stream, mask) = image.to_streams().unwrap();
        assert!(mask.is_none());
        assert_eq!(color_space(&stream), b"DeviceRGB");
    }

    #[test]
    fn test_gray_alpha_mask_is_gray() {
        let image =
            SignatureImage::from_png(&png_bytes(2, 2, png::ColorType::GrayscaleAlpha)).unwrap();
        let (stream, mask) = image.to_streams().unwrap();
        let mask = mask.unwrap();
        assert_eq!(color_space(&stream), b"DeviceGray");
        assert_eq!(color_space(&mask), b"DeviceGray");
    }

    #[test]
    fn test_non_png_rejected() {
        let url = format!("data:image/jpeg;base64,{}", BASE64.encode(b"\xFF\xD8\xFF"));
        let err = SignatureImage::from_data_url(&url).unwrap_err();
        assert!(err.to_string().contains("image/jpeg"));
    }

    #[test]
    fn test_corrupt_png_rejected() {
        let url = format!("data:image/png;base64,{}", BASE64.encode(b"not a png"));
        assert!(matches!(
            SignatureImage::from_data_url(&url),
            Err(OverlayError::ImageError(_))
        ));
    }
}
