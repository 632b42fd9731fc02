//! CLI argument definitions using clap.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// EchoTrack sequence editor - batch operations on tracked sequence files
#[derive(Parser, Debug)]
#[command(
    name = "echotrack-seqedit",
    author,
    version,
    about = "Edit tracked sequence files",
    long_about = "Reads one or more tracked sequence files, applies an editing \n\
                  operation (trim, decimate, field edits, derived transforms, \n\
                  image fill/crop, ...), and writes the result to a new file."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Input sequence file to edit
    #[arg(long)]
    pub source_seq_file: Option<PathBuf>,

    /// Input sequence file list to edit (for MERGE)
    #[arg(long, num_args = 1..)]
    pub source_seq_files: Vec<PathBuf>,

    /// Output sequence file for the result
    #[arg(long)]
    pub output_seq_file: Option<PathBuf>,

    /// Operation to apply to the sequence
    #[arg(long, value_enum, ignore_case = true)]
    pub operation: Option<Operation>,

    /// First frame index kept by TRIM (the first frame of the sequence is 0)
    #[arg(long)]
    pub first_frame_index: Option<usize>,

    /// Last frame index kept by TRIM
    #[arg(long)]
    pub last_frame_index: Option<usize>,

    /// Keep every N-th frame for DECIMATE
    #[arg(long, default_value = "2")]
    pub decimation_factor: usize,

    /// Field name to edit
    #[arg(long)]
    pub field_name: Option<String>,

    /// Updated field name after the edit
    #[arg(long)]
    pub updated_field_name: Option<String>,

    /// Updated field value after the edit ({frame-scalar} and
    /// {frame-transform} are substituted per frame)
    #[arg(long)]
    pub updated_field_value: Option<String>,

    /// Starting value for the {frame-scalar} sentinel
    #[arg(long, default_value = "0.0")]
    pub frame_scalar_start: f64,

    /// Per-frame increment for the {frame-scalar} sentinel
    #[arg(long, default_value = "1.0")]
    pub frame_scalar_increment: f64,

    /// Decimal digits written for frame field values
    #[arg(long, default_value = "5")]
    pub frame_scalar_decimal_digits: usize,

    /// Starting 4x4 matrix for the {frame-transform} sentinel
    /// (16 space-separated numbers, row-major; default identity)
    #[arg(long)]
    pub frame_transform_start: Option<String>,

    /// Per-frame 4x4 increment matrix for the {frame-transform} sentinel
    #[arg(long)]
    pub frame_transform_increment: Option<String>,

    /// When set, the increment is applied as many times as the value of
    /// this per-frame field
    #[arg(long)]
    pub frame_transform_index_field_name: Option<String>,

    /// Re-parent all ToolToReference transforms to ToolToTracker using this
    /// reference transform
    #[arg(long)]
    pub update_reference_transform: Option<String>,

    /// Compress the output sequence file
    #[arg(long)]
    pub use_compression: bool,

    /// Rebase timestamps in the order of the input files when merging
    #[arg(long)]
    pub increment_timestamps: bool,

    /// Transforms to add to each frame (comma-separated, e.g.
    /// StylusTipToReference,ProbeToReference)
    #[arg(long)]
    pub add_transform: Option<String>,

    /// Device set configuration file for ADD_TRANSFORM
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// Fill/crop rectangle top-left corner, in pixels (X Y [Z])
    #[arg(long, num_args = 2..=3)]
    pub rect_origin: Vec<u32>,

    /// Fill/crop rectangle size, in pixels (W H [D])
    #[arg(long, num_args = 2..=3)]
    pub rect_size: Vec<u32>,

    /// Flip the image along the X axis during CROP
    #[arg(long = "flipX")]
    pub flip_x: bool,

    /// Flip the image along the Y axis during CROP
    #[arg(long = "flipY")]
    pub flip_y: bool,

    /// Flip the image along the Z axis during CROP
    #[arg(long = "flipZ")]
    pub flip_z: bool,

    /// Rectangle fill gray level, 0 = black, 255 = white
    #[arg(long, default_value = "0")]
    pub fill_gray_level: i32,
}

/// Sequence editing operations.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// Rename a field on every frame
    UpdateFrameFieldName,
    /// Update a field value on every frame
    UpdateFrameFieldValue,
    /// Delete a field from every frame
    DeleteFrameField,
    /// Rename a sequence-level field
    UpdateFieldName,
    /// Update a sequence-level field value
    UpdateFieldValue,
    /// Delete a sequence-level field
    DeleteField,
    /// Add transforms resolved through the device set configuration
    AddTransform,
    /// Keep frames between --first-frame-index and --last-frame-index
    Trim,
    /// Keep every N-th frame
    Decimate,
    /// Concatenate the input files (see --increment-timestamps)
    Merge,
    /// Fill a rectangle in every image (e.g. to mask burned-in patient data)
    FillImageRectangle,
    /// Crop a rectangle out of every image
    Crop,
    /// Write only the tracking metadata, dropping the image payloads
    RemoveImageData,
}
