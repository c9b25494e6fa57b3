use std::str::FromStr;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use image::DynamicImage;
use image::imageops::FilterType;
use ndarray::Array4;

use super::InferenceError;

// Uploads from browsers and scripts disagree about trailing '=' padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMethod {
    Nearest,
    Bilinear,
    Bicubic,
    Lanczos,
}

impl ResizeMethod {
    pub fn filter(&self) -> FilterType {
        match self {
            ResizeMethod::Nearest => FilterType::Nearest,
            ResizeMethod::Bilinear => FilterType::Triangle,
            ResizeMethod::Bicubic => FilterType::CatmullRom,
            ResizeMethod::Lanczos => FilterType::Lanczos3,
        }
    }
}

impl FromStr for ResizeMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(ResizeMethod::Nearest),
            "bilinear" | "triangle" => Ok(ResizeMethod::Bilinear),
            "bicubic" | "catmullrom" => Ok(ResizeMethod::Bicubic),
            "lanczos" | "lanczos3" => Ok(ResizeMethod::Lanczos),
            other => Err(format!("unknown resize method '{}'", other)),
        }
    }
}

/// Pixel scaling applied after resizing. Must match the scheme the loaded
/// model was trained with; a mismatch produces confident-looking garbage
/// rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelScaling {
    /// `x / 127.5 - 1`, the MobileNetV2 convention.
    MinusOneToOne,
    /// `x / 255`.
    UnitRange,
    /// Untouched `0..=255` values.
    Raw,
}

impl PixelScaling {
    pub fn apply(&self, value: u8) -> f32 {
        let value = value as f32;
        match self {
            PixelScaling::MinusOneToOne => value / 127.5 - 1.0,
            PixelScaling::UnitRange => value / 255.0,
            PixelScaling::Raw => value,
        }
    }
}

impl FromStr for PixelScaling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minus_one_to_one" | "mobilenet" | "tf" => Ok(PixelScaling::MinusOneToOne),
            "unit" | "zero_to_one" => Ok(PixelScaling::UnitRange),
            "raw" | "none" => Ok(PixelScaling::Raw),
            other => Err(format!("unknown pixel scaling '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessConfig {
    pub size: u32,
    pub resize_method: ResizeMethod,
    pub scaling: PixelScaling,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            size: 224,
            resize_method: ResizeMethod::Bicubic,
            scaling: PixelScaling::MinusOneToOne,
        }
    }
}

/// Returns the part after the first comma, which drops a data URL header such
/// as `data:image/png;base64,`.
pub fn strip_data_url(encoded: &str) -> &str {
    match encoded.split_once(',') {
        Some((_, payload)) => payload,
        None => encoded,
    }
}

pub fn decode_base64_image(encoded: &str) -> Result<Vec<u8>, InferenceError> {
    let payload: String = strip_data_url(encoded.trim())
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if payload.is_empty() {
        return Err(InferenceError::Decode("empty image payload".to_string()));
    }
    LENIENT_BASE64
        .decode(payload.as_bytes())
        .map_err(|e| InferenceError::Decode(format!("invalid base64 payload: {}", e)))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn load_image(&self, bytes: &[u8]) -> Result<DynamicImage, InferenceError> {
        image::load_from_memory(bytes)
            .map_err(|e| InferenceError::Decode(format!("unrecognized image data: {}", e)))
    }

    /// RGB conversion, direct resize (aspect ratio is not kept) and scaling
    /// into a `(1, H, W, 3)` tensor.
    pub fn to_tensor(&self, image: &DynamicImage) -> Array4<f32> {
        let rgb = image.to_rgb8();
        let size = self.config.size;
        let resized =
            image::imageops::resize(&rgb, size, size, self.config.resize_method.filter());
        let scaling = self.config.scaling;
        Array4::from_shape_fn((1, size as usize, size as usize, 3), |(_, y, x, c)| {
            scaling.apply(resized.get_pixel(x as u32, y as u32)[c])
        })
    }

    pub fn preprocess(&self, bytes: &[u8]) -> Result<Array4<f32>, InferenceError> {
        let image = self.load_image(bytes)?;
        Ok(self.to_tensor(&image))
    }

    /// Zero tensor of the expected input shape, used for the startup probe.
    pub fn blank_tensor(&self) -> Array4<f32> {
        let size = self.config.size as usize;
        Array4::zeros((1, size, size, 3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::testing::{encode_png, solid_image};
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    #[test]
    fn data_url_header_is_stripped_at_first_comma() {
        assert_eq!(strip_data_url("data:image/png;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_url("QUJD"), "QUJD");
        assert_eq!(strip_data_url("a,b,c"), "b,c");
    }

    #[test]
    fn base64_decoding_tolerates_whitespace_and_missing_padding() {
        assert_eq!(decode_base64_image("QUI=").unwrap(), b"AB");
        assert_eq!(decode_base64_image("QUI").unwrap(), b"AB");
        assert_eq!(decode_base64_image(" QU\nI= ").unwrap(), b"AB");
        assert_eq!(decode_base64_image("data:text/plain;base64,QUI=").unwrap(), b"AB");
    }

    #[test]
    fn malformed_base64_is_a_decode_error() {
        assert!(matches!(
            decode_base64_image("***not base64***"),
            Err(InferenceError::Decode(_))
        ));
        assert!(matches!(
            decode_base64_image("data:image/png;base64,"),
            Err(InferenceError::Decode(_))
        ));
    }

    #[test]
    fn non_image_bytes_are_a_decode_error() {
        let preprocessor = Preprocessor::default();
        assert!(matches!(
            preprocessor.preprocess(b"definitely not an image"),
            Err(InferenceError::Decode(_))
        ));
    }

    #[test]
    fn small_black_png_becomes_a_minus_one_tensor() {
        let preprocessor = Preprocessor::default();
        let bytes = encode_png(&solid_image(50, 50, [0, 0, 0]));
        let tensor = preprocessor.preprocess(&bytes).unwrap();
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        assert!(tensor.iter().all(|v| (*v + 1.0).abs() < 1e-6));
    }

    #[test]
    fn non_square_input_is_stretched_to_the_target_size() {
        let preprocessor = Preprocessor::new(PreprocessConfig {
            size: 32,
            resize_method: ResizeMethod::Nearest,
            scaling: PixelScaling::Raw,
        });
        let bytes = encode_png(&solid_image(300, 20, [255, 128, 0]));
        let tensor = preprocessor.preprocess(&bytes).unwrap();
        assert_eq!(tensor.shape(), &[1, 32, 32, 3]);
        assert_eq!(tensor[[0, 31, 31, 0]], 255.0);
        assert_eq!(tensor[[0, 0, 0, 1]], 128.0);
        assert_eq!(tensor[[0, 16, 5, 2]], 0.0);
    }

    #[test]
    fn alpha_channel_is_dropped() {
        let rgba = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 0]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(rgba)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        let preprocessor = Preprocessor::new(PreprocessConfig {
            size: 4,
            resize_method: ResizeMethod::Bilinear,
            scaling: PixelScaling::UnitRange,
        });
        let tensor = preprocessor.preprocess(&bytes).unwrap();
        assert_eq!(tensor.shape(), &[1, 4, 4, 3]);
        assert!(tensor.iter().all(|v| (*v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn scaling_schemes() {
        assert_eq!(PixelScaling::MinusOneToOne.apply(0), -1.0);
        assert_eq!(PixelScaling::MinusOneToOne.apply(255), 1.0);
        assert_eq!(PixelScaling::UnitRange.apply(255), 1.0);
        assert_eq!(PixelScaling::Raw.apply(17), 17.0);
        assert_eq!("mobilenet".parse::<PixelScaling>(), Ok(PixelScaling::MinusOneToOne));
        assert_eq!("Lanczos".parse::<ResizeMethod>(), Ok(ResizeMethod::Lanczos));
        assert!("area".parse::<ResizeMethod>().is_err());
    }
}
