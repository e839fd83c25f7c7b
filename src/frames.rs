//! Keyframe selection and stacking.
//!
//! Vision backends cap the number of images per request, so frame evidence is
//! budgeted: the critic distributes a fixed budget of 10 frames across its
//! timestamps, and search-backed queries keep the first 10 hits as individual
//! images and stack the remainder horizontally in groups of 3.

use crate::error::{GlimtError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

/// Total frame budget for one critic review.
pub const CRITIC_FRAME_BUDGET: usize = 10;

/// Frames looked at before the nearest match in a vision window query.
pub const WINDOW_BEFORE: usize = 4;
/// Frames looked at after the nearest match in a vision window query.
pub const WINDOW_AFTER: usize = 5;

/// Check that a video's frame and timestamp lists are parallel.
///
/// Both artifacts come from the same extraction run; a length mismatch means
/// one of them is stale or truncated, and a window centered through the
/// longer list would index past the end of the shorter one.
pub fn check_frame_alignment(video_id: &str, frames: usize, timestamps: usize) -> Result<()> {
    if frames != timestamps {
        return Err(GlimtError::Frame(format!(
            "Video {} has {} frames but {} frame timestamps",
            video_id, frames, timestamps
        )));
    }
    Ok(())
}

/// Index of the frame whose timestamp is closest to `target_ms`.
pub fn nearest_frame_index(frame_timestamps_ms: &[f64], target_ms: f64) -> Option<usize> {
    frame_timestamps_ms
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (*a - target_ms)
                .abs()
                .partial_cmp(&(*b - target_ms).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
}

/// Inclusive index window of `before` frames before and `after` frames after
/// `center`, clamped to `len`.
pub fn frame_window(center: usize, before: usize, after: usize, len: usize) -> (usize, usize) {
    let start = center.saturating_sub(before);
    let end = (center + after).min(len.saturating_sub(1));
    (start, end)
}

/// Frame counts per timestamp for a critic review: `floor(budget/n)` each,
/// with the remainder assigned to the last timestamp.
pub fn critic_allocation(timestamp_count: usize) -> Vec<usize> {
    if timestamp_count == 0 {
        return Vec::new();
    }
    let per = CRITIC_FRAME_BUDGET / timestamp_count;
    let remainder = CRITIC_FRAME_BUDGET % timestamp_count;

    let mut allocation = vec![per; timestamp_count];
    if let Some(last) = allocation.last_mut() {
        *last += remainder;
    }
    allocation
}

/// Decode a base64-encoded frame into an image.
pub fn decode_base64_frame(encoded: &str) -> Result<DynamicImage> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| GlimtError::Frame(format!("Invalid base64 frame: {}", e)))?;
    image::load_from_memory(&bytes)
        .map_err(|e| GlimtError::Frame(format!("Undecodable frame image: {}", e)))
}

/// Encode an image as base64 PNG.
pub fn encode_image_base64(image: &DynamicImage) -> Result<String> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| GlimtError::Frame(format!("Failed to encode frame: {}", e)))?;
    Ok(BASE64.encode(buffer.into_inner()))
}

/// Stack images left-to-right onto a single canvas.
pub fn stack_horizontally(images: &[DynamicImage]) -> Result<DynamicImage> {
    if images.is_empty() {
        return Err(GlimtError::Frame("No images to stack".to_string()));
    }

    let total_width: u32 = images.iter().map(|i| i.width()).sum();
    let max_height: u32 = images.iter().map(|i| i.height()).max().unwrap_or(1);

    let mut canvas = RgbaImage::new(total_width, max_height);
    let mut x_offset: i64 = 0;
    for img in images {
        image::imageops::replace(&mut canvas, &img.to_rgba8(), x_offset, 0);
        x_offset += i64::from(img.width());
    }
    Ok(DynamicImage::ImageRgba8(canvas))
}

/// Stack a window of base64 frames into `groups` stacked images.
///
/// Groups are `window.len() / groups` frames wide, with the remainder folded
/// into the last group.
pub fn stack_window_into_groups(window: &[String], groups: usize) -> Result<Vec<String>> {
    if groups == 0 || window.len() < groups {
        return Ok(window.to_vec());
    }

    let stack_size = window.len() / groups;
    let remainder = window.len() % groups;

    let mut stacked = Vec::with_capacity(groups);
    for group_index in 0..groups {
        let start = group_index * stack_size;
        let mut end = start + stack_size;
        if group_index == groups - 1 {
            end += remainder;
        }

        let images: Vec<DynamicImage> = window[start..end]
            .iter()
            .map(|frame| decode_base64_frame(frame))
            .collect::<Result<_>>()?;
        stacked.push(encode_image_base64(&stack_horizontally(&images)?)?);
    }
    Ok(stacked)
}

/// Bound an arbitrary frame list to the vision model's image-count limit.
///
/// The first 10 frames stay individual; the remainder is stacked in groups
/// of 3. Returns the processed base64 frames and the number of frames that
/// ended up stacked.
pub fn batch_frames_for_vision(frames: &[DynamicImage]) -> Result<(Vec<String>, usize)> {
    const INDIVIDUAL_LIMIT: usize = 10;
    const STACK_GROUP: usize = 3;

    let mut processed = Vec::new();
    for frame in frames.iter().take(INDIVIDUAL_LIMIT) {
        processed.push(encode_image_base64(frame)?);
    }

    let remaining = &frames[frames.len().min(INDIVIDUAL_LIMIT)..];
    let mut stacked_count = 0;
    for group in remaining.chunks(STACK_GROUP) {
        processed.push(encode_image_base64(&stack_horizontally(group)?)?);
        stacked_count += group.len();
    }

    Ok((processed, stacked_count))
}
