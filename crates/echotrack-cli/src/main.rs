//! EchoTrack sequence editor.
//!
//! Reads one or more sequence files, applies an operation, and writes the
//! result. Argument validation failures are fatal before any file is
//! written; per-frame errors inside an operation are logged and skipped.

mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Operation};
use echotrack_core::transform::matrix_from_string;
use echotrack_core::{FlipInfo, TransformName};
use echotrack_edit::{FrameFieldUpdate, RepositoryConfig};
use echotrack_sequence::{read_sequence, write_sequence, TrackedFrameList};
use glam::DMat4;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to initialise logging");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    // ── Validate arguments before touching any file ─────────────

    let mut input_files: Vec<PathBuf> = Vec::new();
    if let Some(path) = &cli.source_seq_file {
        input_files.push(path.clone());
    }
    input_files.extend(cli.source_seq_files.iter().cloned());
    if input_files.is_empty() {
        bail!("at least one input file name is mandatory");
    }

    let Some(output_file) = cli.output_seq_file.clone() else {
        bail!("please set the output file name");
    };

    let operation = cli.operation;
    if operation.is_none() {
        info!(
            "no modification operation has been specified \
             (use --operation to change the input sequence)"
        );
    }

    let frame_transform_start = parse_matrix_arg(cli.frame_transform_start.as_deref())
        .context("string to matrix conversion failed for the transform start matrix")?;
    let frame_transform_increment = parse_matrix_arg(cli.frame_transform_increment.as_deref())
        .context("string to matrix conversion failed for the transform increment matrix")?;

    // ── Read and merge the inputs ───────────────────────────────

    let mut list = TrackedFrameList::new();
    for path in &input_files {
        info!(path = %path.display(), "read input sequence file");
        let input = read_sequence(path)
            .with_context(|| format!("couldn't read sequence file '{}'", path.display()))?;
        list.append_list(input, cli.increment_timestamps);
    }

    // ── Apply the operation ─────────────────────────────────────

    match operation {
        None | Some(Operation::Merge) => {
            // Nothing to do beyond the merge that already happened.
        }
        Some(Operation::Trim) => {
            let first = cli.first_frame_index.unwrap_or(0);
            let last = cli.last_frame_index.unwrap_or(0);
            echotrack_edit::trim(&mut list, first, last).context("failed to trim the sequence")?;
        }
        Some(Operation::Decimate) => {
            echotrack_edit::decimate(&mut list, cli.decimation_factor)
                .context("failed to decimate the sequence")?;
        }
        Some(Operation::UpdateFrameFieldName) => {
            let update = FrameFieldUpdate {
                field_name: required(&cli.field_name, "--field-name")?,
                updated_field_name: required(&cli.updated_field_name, "--updated-field-name")?,
                ..Default::default()
            };
            echotrack_edit::update_frame_field(&mut list, &update)
                .context("failed to update the frame field name")?;
        }
        Some(Operation::UpdateFrameFieldValue) => {
            let update = FrameFieldUpdate {
                field_name: cli.field_name.clone().unwrap_or_default(),
                updated_field_name: cli.updated_field_name.clone().unwrap_or_default(),
                updated_field_value: cli.updated_field_value.clone().unwrap_or_default(),
                frame_scalar_start: cli.frame_scalar_start,
                frame_scalar_increment: cli.frame_scalar_increment,
                frame_scalar_decimal_digits: cli.frame_scalar_decimal_digits,
                frame_transform_start,
                frame_transform_increment,
                frame_transform_index_field_name: cli.frame_transform_index_field_name.clone(),
            };
            echotrack_edit::update_frame_field(&mut list, &update)
                .context("failed to update the frame field value")?;
        }
        Some(Operation::DeleteFrameField) => {
            echotrack_edit::delete_frame_field(&mut list, &required(&cli.field_name, "--field-name")?)
                .context("failed to delete the frame field")?;
        }
        Some(Operation::UpdateFieldName) => {
            echotrack_edit::update_field_name(
                &mut list,
                &required(&cli.field_name, "--field-name")?,
                &required(&cli.updated_field_name, "--updated-field-name")?,
            )
            .context("failed to update the field name")?;
        }
        Some(Operation::UpdateFieldValue) => {
            echotrack_edit::update_field_value(
                &mut list,
                &required(&cli.field_name, "--field-name")?,
                &required(&cli.updated_field_value, "--updated-field-value")?,
            )
            .context("failed to update the field value")?;
        }
        Some(Operation::DeleteField) => {
            echotrack_edit::delete_field(&mut list, &required(&cli.field_name, "--field-name")?)
                .context("failed to delete the field")?;
        }
        Some(Operation::AddTransform) => {
            let names_arg = required(&cli.add_transform, "--add-transform")?;
            let names = names_arg
                .split(',')
                .map(|token| TransformName::parse(token.trim()))
                .collect::<echotrack_core::Result<Vec<_>>>()
                .context("invalid transform name in --add-transform")?;
            let Some(config_path) = cli.config_file.as_deref() else {
                bail!("the device set configuration file name is empty");
            };
            let config = RepositoryConfig::from_file(config_path).with_context(|| {
                format!(
                    "unable to read the configuration from '{}'",
                    config_path.display()
                )
            })?;
            echotrack_edit::add_transforms(&mut list, &names, &config)
                .context("failed to add transforms")?;
        }
        Some(Operation::FillImageRectangle) => {
            if cli.rect_origin.len() != 2 || cli.rect_size.len() != 2 {
                bail!("--rect-origin and --rect-size must both be given as X Y");
            }
            echotrack_edit::fill_rectangle(
                &mut list,
                [cli.rect_origin[0], cli.rect_origin[1]],
                [cli.rect_size[0], cli.rect_size[1]],
                cli.fill_gray_level,
            )
            .context("failed to fill the rectangle")?;
        }
        Some(Operation::Crop) => {
            if cli.rect_origin.len() < 2 || cli.rect_size.len() < 2 {
                bail!(
                    "--rect-origin and --rect-size must be of the form \
                     --rect-origin X Y [Z] and --rect-size W H [D]"
                );
            }
            let origin = [
                cli.rect_origin[0],
                cli.rect_origin[1],
                cli.rect_origin.get(2).copied().unwrap_or(0),
            ];
            let size = [
                cli.rect_size[0],
                cli.rect_size[1],
                cli.rect_size.get(2).copied().unwrap_or(1),
            ];
            let flip = FlipInfo {
                flip_x: cli.flip_x,
                flip_y: cli.flip_y,
                flip_z: cli.flip_z,
            };
            echotrack_edit::crop_rectangle(&mut list, origin, size, flip)
                .context("failed to crop the rectangle")?;
        }
        Some(Operation::RemoveImageData) => {
            // No in-memory change; the writer omits the image payloads.
        }
    }

    // ── Optional reference re-parenting ─────────────────────────

    if let Some(reference) = &cli.update_reference_transform {
        let reference = TransformName::parse(reference)
            .with_context(|| format!("reference transform name is invalid: {reference}"))?;
        echotrack_edit::update_reference_transform(&mut list, &reference)
            .context("failed to update the reference transform")?;
    }

    // ── Write the output ────────────────────────────────────────

    info!(path = %output_file.display(), "save output sequence file");
    let include_image_data = operation != Some(Operation::RemoveImageData);
    write_sequence(&output_file, &list, cli.use_compression, include_image_data)
        .with_context(|| format!("couldn't write sequence file '{}'", output_file.display()))?;

    info!("sequence file editing was successful");
    Ok(())
}

fn required(value: &Option<String>, flag: &str) -> Result<String> {
    match value {
        Some(text) if !text.is_empty() => Ok(text.clone()),
        _ => bail!("{flag} is required for this operation"),
    }
}

fn parse_matrix_arg(text: Option<&str>) -> Result<DMat4> {
    match text {
        None => Ok(DMat4::IDENTITY),
        Some(text) => Ok(matrix_from_string(text)?),
    }
}
