use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ImageError {
    #[error("Upload a valid image. The file you uploaded was either not an image or a corrupted image.")]
    NotAnImage,
    #[error("Invalid image data URI.")]
    InvalidDataUri,
    #[error("Image exceeds the maximum size of {0} bytes.")]
    TooLarge(usize),
    #[error("The submitted file is empty.")]
    Empty,
}

#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub extension: String,
}

impl DecodedImage {
    /// Key under which the image is stored, unique per upload.
    pub fn storage_key(&self) -> String {
        format!("recipes/images/{}.{}", uuid::Uuid::new_v4(), self.extension)
    }
}

/// Decodes `data:image/<type>;base64,<payload>`. A bare base64 string is
/// accepted too.
pub fn decode_data_uri(input: &str, max_size: usize) -> Result<DecodedImage, ImageError> {
    let input = input.trim();
    let payload = match input.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest.split_once(',').ok_or(ImageError::InvalidDataUri)?;
            if !header.ends_with(";base64") {
                return Err(ImageError::InvalidDataUri);
            }
            payload
        }
        None => input,
    };

    // Rough pre-check before allocating: base64 inflates by 4/3.
    if payload.len() / 4 * 3 > max_size + 3 {
        return Err(ImageError::TooLarge(max_size));
    }

    let data = STANDARD
        .decode(payload.as_bytes())
        .map_err(|_| ImageError::InvalidDataUri)?;

    sniff_image(data, max_size)
}

/// Validates raw bytes by magic signature.
pub fn sniff_image(data: Vec<u8>, max_size: usize) -> Result<DecodedImage, ImageError> {
    if data.is_empty() {
        return Err(ImageError::Empty);
    }
    if data.len() > max_size {
        return Err(ImageError::TooLarge(max_size));
    }

    let kind = infer::get(&data).ok_or(ImageError::NotAnImage)?;
    if kind.matcher_type() != infer::MatcherType::Image {
        return Err(ImageError::NotAnImage);
    }

    Ok(DecodedImage {
        mime_type: kind.mime_type().to_string(),
        extension: kind.extension().to_string(),
        data,
    })
}
