/// Image metadata extraction and upload pipeline
pub mod pipeline;
pub mod uploader;

use chrono::{DateTime, NaiveDateTime, Utc};
use exif::{In, Tag, Value};

use crate::records::image::{ExifInfo, FileInfo, ImageMetadata};

/// MIME types accepted by the upload pipeline
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Extract dimensions, format, and EXIF metadata from raw image bytes.
///
/// Dimension/format decoding and EXIF parsing are both best-effort; a file
/// that decodes as none of the supported formats still gets a FileInfo with
/// size and declared MIME type.
pub fn extract_metadata(data: &[u8], mime_type: &str) -> ImageMetadata {
    let mut file = FileInfo {
        size: data.len() as u64,
        mime_type: mime_type.to_string(),
        ..Default::default()
    };

    match image::load_from_memory(data) {
        Ok(img) => {
            file.width = Some(img.width());
            file.height = Some(img.height());
        }
        Err(e) => {
            tracing::warn!("Failed to decode image for dimensions: {}", e);
        }
    }

    if let Ok(format) = image::guess_format(data) {
        file.format = Some(format!("{:?}", format).to_lowercase());
    }

    let exif = extract_exif(data);

    ImageMetadata { file, exif }
}

fn exif_string(exif: &exif::Exif, tag: Tag) -> Option<String> {
    exif.get_field(tag, In::PRIMARY).and_then(|field| match &field.value {
        Value::Ascii(values) => values.first().map(|bytes| {
            String::from_utf8_lossy(bytes)
                .trim_matches(char::from(0))
                .trim()
                .to_string()
        }),
        _ => None,
    })
}

fn exif_uint(exif: &exif::Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
}

fn exif_rational(exif: &exif::Exif, tag: Tag) -> Option<f64> {
    exif.get_field(tag, In::PRIMARY).and_then(|field| match &field.value {
        Value::Rational(values) => values.first().map(|r| r.to_f64()),
        _ => None,
    })
}

/// Degrees/minutes/seconds to signed decimal degrees
fn gps_coordinate(exif: &exif::Exif, value_tag: Tag, ref_tag: Tag) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let dms = match &field.value {
        Value::Rational(values) if values.len() >= 3 => values,
        _ => return None,
    };

    let degrees = dms[0].to_f64() + dms[1].to_f64() / 60.0 + dms[2].to_f64() / 3600.0;

    let reference = exif_string(exif, ref_tag)?;
    match reference.as_str() {
        "S" | "W" => Some(-degrees),
        _ => Some(degrees),
    }
}

/// EXIF DateTimeOriginal is "YYYY:MM:DD HH:MM:SS" without a zone; treated as UTC
fn parse_exif_datetime(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn extract_exif(data: &[u8]) -> Option<ExifInfo> {
    let mut cursor = std::io::Cursor::new(data);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;

    let info = ExifInfo {
        make: exif_string(&exif, Tag::Make),
        model: exif_string(&exif, Tag::Model),
        lens_model: exif_string(&exif, Tag::LensModel),
        date_time_original: exif_string(&exif, Tag::DateTimeOriginal)
            .as_deref()
            .and_then(parse_exif_datetime),
        latitude: gps_coordinate(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef),
        longitude: gps_coordinate(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef),
        iso: exif_uint(&exif, Tag::PhotographicSensitivity),
        f_number: exif_rational(&exif, Tag::FNumber),
        exposure_time: exif
            .get_field(Tag::ExposureTime, In::PRIMARY)
            .map(|f| f.display_value().to_string()),
        focal_length: exif_rational(&exif, Tag::FocalLength),
        software: exif_string(&exif, Tag::Software),
    };

    if info == ExifInfo::default() {
        None
    } else {
        Some(info)
    }
}
