//! Pixel frame types for acquired image data in CPU memory.
//!
//! Frames are stored as a single tightly packed plane so that a ring slot
//! can be pre-allocated once and reused for every subsequent acquisition.

use crate::error::{EchoTrackError, Result};
use serde::{Deserialize, Serialize};

/// Scalar type of one pixel component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScalarType {
    /// 8-bit unsigned (B-mode brightness data)
    #[default]
    U8,
    /// 8-bit signed
    I8,
    /// 16-bit unsigned
    U16,
    /// 16-bit signed (RF data)
    I16,
    /// 32-bit unsigned
    U32,
    /// 32-bit signed
    I32,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
}

impl ScalarType {
    /// Width of one scalar in bytes.
    pub fn bytes_per_scalar(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /// Human-readable name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

/// Symbolic orientation of the image axes.
///
/// The first letter names the +x direction (Marked or Unmarked transducer
/// side), the second the +y direction (Far or Near from the transducer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageOrientation {
    /// Marked left, far down (the canonical acquisition orientation)
    #[default]
    Mf,
    /// Marked left, near down
    Mn,
    /// Unmarked left, far down
    Uf,
    /// Unmarked left, near down
    Un,
}

impl ImageOrientation {
    /// Flip recipe that converts an image from `self` into `target`.
    pub fn flip_to(self, target: ImageOrientation) -> FlipInfo {
        let (from_x, from_y) = self.axes();
        let (to_x, to_y) = target.axes();
        FlipInfo {
            flip_x: from_x != to_x,
            flip_y: from_y != to_y,
            flip_z: false,
        }
    }

    fn axes(self) -> (bool, bool) {
        // (x axis starts at the marked side, y axis starts at the far side)
        match self {
            Self::Mf => (true, true),
            Self::Mn => (true, false),
            Self::Uf => (false, true),
            Self::Un => (false, false),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mf => "MF",
            Self::Mn => "MN",
            Self::Uf => "UF",
            Self::Un => "UN",
        }
    }
}

/// Kind of data the pixels encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageType {
    /// Envelope-detected B-mode brightness
    #[default]
    Brightness,
    /// Raw radio-frequency samples
    Rf,
}

/// Axis flips to apply when re-orienting or cropping a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlipInfo {
    pub flip_x: bool,
    pub flip_y: bool,
    pub flip_z: bool,
}

impl FlipInfo {
    pub const NONE: Self = Self {
        flip_x: false,
        flip_y: false,
        flip_z: false,
    };

    pub fn any(self) -> bool {
        self.flip_x || self.flip_y || self.flip_z
    }
}

/// Clip rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipRect {
    pub origin: [u32; 3],
    pub size: [u32; 3],
}

impl ClipRect {
    /// 2-D rectangle covering a single slice.
    pub fn new_2d(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            origin: [x, y, 0],
            size: [width, height, 1],
        }
    }
}

/// An acquired image frame in CPU memory.
///
/// The payload is one contiguous plane of exactly
/// `W * H * D * components * bytes_per_scalar` bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoFrame {
    /// Frame size in pixels; depth is 1 for single-slice images.
    pub size: [u32; 3],
    /// Scalar type of one component.
    pub scalar_type: ScalarType,
    /// Components per pixel (1 for grayscale).
    pub components: u32,
    /// Orientation tag of the stored pixels.
    pub orientation: ImageOrientation,
    /// Kind of data the pixels encode.
    pub image_type: ImageType,
    /// Raw pixel data.
    pub data: Vec<u8>,
}

impl VideoFrame {
    /// Create a zero-filled frame with the given geometry.
    pub fn new(size: [u32; 3], scalar_type: ScalarType, components: u32) -> Self {
        let mut frame = Self {
            size,
            scalar_type,
            components,
            orientation: ImageOrientation::default(),
            image_type: ImageType::default(),
            data: Vec::new(),
        };
        frame.allocate(size, scalar_type, components);
        frame
    }

    /// Total bytes needed for the given geometry.
    pub fn byte_len(size: [u32; 3], scalar_type: ScalarType, components: u32) -> usize {
        size[0] as usize
            * size[1] as usize
            * size[2] as usize
            * components as usize
            * scalar_type.bytes_per_scalar()
    }

    /// Resize the owned buffer for a new geometry, zero-filled.
    /// The allocation is reused when the byte length is unchanged.
    pub fn allocate(&mut self, size: [u32; 3], scalar_type: ScalarType, components: u32) {
        let len = Self::byte_len(size, scalar_type, components);
        self.size = size;
        self.scalar_type = scalar_type;
        self.components = components;
        if self.data.len() != len {
            self.data.resize(len, 0);
        }
        self.data.fill(0);
    }

    /// Bytes per pixel (all components).
    pub fn bytes_per_pixel(&self) -> usize {
        self.components as usize * self.scalar_type.bytes_per_scalar()
    }

    /// Number of pixels in the frame.
    pub fn pixel_count(&self) -> usize {
        self.size[0] as usize * self.size[1] as usize * self.size[2] as usize
    }

    /// True when the frame holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fill a 2-D rectangle with a gray level.
    ///
    /// Only supported for 8-bit single-component frames; the gray level is
    /// clamped to 0..=255.
    pub fn fill_rectangle(&mut self, origin: [u32; 2], size: [u32; 2], gray: i32) -> Result<()> {
        if self.scalar_type != ScalarType::U8 || self.components != 1 {
            return Err(EchoTrackError::InvalidParameter(format!(
                "fill rectangle supports 8-bit single-component frames only (got {} x{})",
                self.scalar_type.name(),
                self.components
            )));
        }
        let [w, h, _] = self.size;
        if origin[0] >= w || origin[1] >= h {
            return Err(EchoTrackError::InvalidParameter(format!(
                "fill rectangle origin ({}, {}) is outside the {}x{} image",
                origin[0], origin[1], w, h
            )));
        }
        if size[0] == 0 || size[1] == 0 || origin[0] + size[0] > w || origin[1] + size[1] > h {
            return Err(EchoTrackError::InvalidParameter(format!(
                "fill rectangle {}x{} at ({}, {}) does not fit the {}x{} image",
                size[0], size[1], origin[0], origin[1], w, h
            )));
        }

        let fill = gray.clamp(0, 255) as u8;
        for y in origin[1]..origin[1] + size[1] {
            let start = (y * w + origin[0]) as usize;
            self.data[start..start + size[0] as usize].fill(fill);
        }
        Ok(())
    }

    /// Output geometry of a flip + optional clip applied to `input_size`.
    pub fn oriented_output_size(input_size: [u32; 3], clip: Option<ClipRect>) -> [u32; 3] {
        match clip {
            Some(rect) => rect.size,
            None => input_size,
        }
    }

    /// Copy `src` pixels into this frame, applying a flip recipe and an
    /// optional clip rectangle, without allocating.
    ///
    /// The clip rectangle is taken in source coordinates; the flips are then
    /// applied within the clipped region. This frame's geometry must already
    /// equal the output geometry.
    pub fn copy_oriented_from(
        &mut self,
        src: &[u8],
        src_size: [u32; 3],
        flip: FlipInfo,
        clip: Option<ClipRect>,
    ) -> Result<()> {
        let (clip_origin, out_size) = match clip {
            Some(rect) => {
                for axis in 0..3 {
                    if rect.size[axis] == 0 || rect.origin[axis] + rect.size[axis] > src_size[axis]
                    {
                        return Err(EchoTrackError::InvalidParameter(format!(
                            "clip rectangle {:?}+{:?} does not fit the frame size {:?}",
                            rect.origin, rect.size, src_size
                        )));
                    }
                }
                (rect.origin, rect.size)
            }
            None => ([0, 0, 0], src_size),
        };

        let bpp = self.bytes_per_pixel();
        if out_size != self.size {
            return Err(EchoTrackError::FormatMismatch(format!(
                "oriented output size {:?} does not match the target frame size {:?}",
                out_size, self.size
            )));
        }
        let expected = Self::byte_len(src_size, self.scalar_type, self.components);
        if src.len() != expected {
            return Err(EchoTrackError::FormatMismatch(format!(
                "source pixel buffer holds {} bytes, geometry requires {expected}",
                src.len()
            )));
        }

        let [sw, sh, _] = src_size;
        let [ow, oh, od] = out_size;

        for z in 0..od {
            let sz = clip_origin[2] + if flip.flip_z { od - 1 - z } else { z };
            for y in 0..oh {
                let sy = clip_origin[1] + if flip.flip_y { oh - 1 - y } else { y };
                for x in 0..ow {
                    let sx = clip_origin[0] + if flip.flip_x { ow - 1 - x } else { x };
                    let src_off = ((sz * sh + sy) as usize * sw as usize + sx as usize) * bpp;
                    let dst_off = ((z * oh + y) as usize * ow as usize + x as usize) * bpp;
                    self.data[dst_off..dst_off + bpp]
                        .copy_from_slice(&src[src_off..src_off + bpp]);
                }
            }
        }
        Ok(())
    }

    /// Produce a flipped and clipped copy of this frame.
    pub fn flipped_clipped(&self, flip: FlipInfo, clip: Option<ClipRect>) -> Result<VideoFrame> {
        let out_size = Self::oriented_output_size(self.size, clip);
        let mut out = VideoFrame::new(out_size, self.scalar_type, self.components);
        out.orientation = self.orientation;
        out.image_type = self.image_type;
        out.copy_oriented_from(&self.data, self.size, flip, clip)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_len() {
        assert_eq!(VideoFrame::byte_len([640, 480, 1], ScalarType::U8, 1), 640 * 480);
        assert_eq!(
            VideoFrame::byte_len([64, 64, 2], ScalarType::I16, 2),
            64 * 64 * 2 * 2 * 2
        );
    }

    #[test]
    fn test_allocate_reuses_when_same_len() {
        let mut frame = VideoFrame::new([10, 10, 1], ScalarType::U8, 1);
        frame.data[0] = 42;
        let ptr = frame.data.as_ptr();
        frame.allocate([10, 10, 1], ScalarType::U8, 1);
        assert_eq!(frame.data.as_ptr(), ptr);
        assert_eq!(frame.data[0], 0); // zeroed
    }

    #[test]
    fn test_orientation_flip_recipe() {
        let flip = ImageOrientation::Mf.flip_to(ImageOrientation::Uf);
        assert!(flip.flip_x);
        assert!(!flip.flip_y);

        let flip = ImageOrientation::Mf.flip_to(ImageOrientation::Un);
        assert!(flip.flip_x);
        assert!(flip.flip_y);

        assert!(!ImageOrientation::Mn.flip_to(ImageOrientation::Mn).any());
    }

    #[test]
    fn test_fill_rectangle() {
        let mut frame = VideoFrame::new([10, 10, 1], ScalarType::U8, 1);
        frame.fill_rectangle([2, 3], [4, 5], 128).unwrap();

        let mut filled = 0;
        for y in 0..10u32 {
            for x in 0..10u32 {
                let v = frame.data[(y * 10 + x) as usize];
                if (2..6).contains(&x) && (3..8).contains(&y) {
                    assert_eq!(v, 128);
                    filled += 1;
                } else {
                    assert_eq!(v, 0);
                }
            }
        }
        assert_eq!(filled, 20);
    }

    #[test]
    fn test_fill_rectangle_clamps_gray() {
        let mut frame = VideoFrame::new([4, 4, 1], ScalarType::U8, 1);
        frame.fill_rectangle([0, 0], [4, 4], 999).unwrap();
        assert!(frame.data.iter().all(|&v| v == 255));
    }

    #[test]
    fn test_fill_rectangle_rejects_non_u8() {
        let mut frame = VideoFrame::new([4, 4, 1], ScalarType::I16, 1);
        assert!(frame.fill_rectangle([0, 0], [2, 2], 10).is_err());
    }

    #[test]
    fn test_clip_without_flip() {
        let mut frame = VideoFrame::new([4, 4, 1], ScalarType::U8, 1);
        for (i, v) in frame.data.iter_mut().enumerate() {
            *v = i as u8;
        }
        let clipped = frame
            .flipped_clipped(FlipInfo::NONE, Some(ClipRect::new_2d(1, 1, 2, 2)))
            .unwrap();
        assert_eq!(clipped.size, [2, 2, 1]);
        assert_eq!(clipped.data, vec![5, 6, 9, 10]);
    }

    #[test]
    fn test_flip_x() {
        let mut frame = VideoFrame::new([3, 1, 1], ScalarType::U8, 1);
        frame.data.copy_from_slice(&[1, 2, 3]);
        let flip = FlipInfo {
            flip_x: true,
            ..FlipInfo::NONE
        };
        let flipped = frame.flipped_clipped(flip, None).unwrap();
        assert_eq!(flipped.data, vec![3, 2, 1]);
    }

    #[test]
    fn test_flip_y_then_clip() {
        let mut frame = VideoFrame::new([2, 3, 1], ScalarType::U8, 1);
        frame.data.copy_from_slice(&[1, 2, 3, 4, 5, 6]);
        let flip = FlipInfo {
            flip_y: true,
            ..FlipInfo::NONE
        };
        // Clip to the top two rows, then flip vertically within the region.
        let out = frame
            .flipped_clipped(flip, Some(ClipRect::new_2d(0, 0, 2, 2)))
            .unwrap();
        assert_eq!(out.data, vec![3, 4, 1, 2]);
    }

    #[test]
    fn test_clip_out_of_bounds() {
        let frame = VideoFrame::new([4, 4, 1], ScalarType::U8, 1);
        let result = frame.flipped_clipped(FlipInfo::NONE, Some(ClipRect::new_2d(2, 2, 4, 4)));
        assert!(result.is_err());
    }
}
