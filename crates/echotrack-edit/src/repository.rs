//! Transform repository: a graph of coordinate frames.
//!
//! The repository is seeded from a device-set configuration (fixed,
//! calibrated transforms) plus one frame's measured transforms, and answers
//! arbitrary `<From>To<To>` queries by composing matrices along the path
//! between the two coordinate frames, inverting edges as needed.

use echotrack_core::{EchoTrackError, FieldStatus, Result, TransformName};
use echotrack_sequence::TrackedFrame;
use glam::DMat4;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

/// One calibrated transform in a device-set configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfiguredTransform {
    pub from: String,
    pub to: String,
    /// 16 numbers, row-major.
    pub matrix: Vec<f64>,
}

/// Device-set configuration: the fixed transforms of the setup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub transforms: Vec<ConfiguredTransform>,
}

impl RepositoryConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            EchoTrackError::Config(format!(
                "invalid device set configuration '{}': {e}",
                path.display()
            ))
        })
    }
}

#[derive(Debug, Clone)]
struct Edge {
    to: String,
    matrix: DMat4,
    valid: bool,
}

/// Coordinate-frame graph answering composed transform queries.
#[derive(Debug, Clone, Default)]
pub struct TransformRepository {
    edges: HashMap<String, Vec<Edge>>,
}

impl TransformRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository holding a configuration's fixed transforms.
    pub fn from_config(config: &RepositoryConfig) -> Result<Self> {
        let mut repository = Self::new();
        for entry in &config.transforms {
            if entry.matrix.len() != 16 {
                return Err(EchoTrackError::Config(format!(
                    "transform {}To{} must have 16 matrix elements, got {}",
                    entry.from,
                    entry.to,
                    entry.matrix.len()
                )));
            }
            let mut elements = [0.0; 16];
            elements.copy_from_slice(&entry.matrix);
            let matrix = DMat4::from_cols_array(&elements).transpose();
            repository.set_transform(
                &TransformName::new(entry.from.clone(), entry.to.clone()),
                matrix,
                true,
            );
        }
        Ok(repository)
    }

    /// Insert or replace a transform edge (and its inverse).
    pub fn set_transform(&mut self, name: &TransformName, matrix: DMat4, valid: bool) {
        self.set_edge(&name.from, &name.to, matrix, valid);
        self.set_edge(&name.to, &name.from, matrix.inverse(), valid);
    }

    fn set_edge(&mut self, from: &str, to: &str, matrix: DMat4, valid: bool) {
        let edges = self.edges.entry(from.to_string()).or_default();
        if let Some(edge) = edges.iter_mut().find(|edge| edge.to == to) {
            edge.matrix = matrix;
            edge.valid = valid;
        } else {
            edges.push(Edge {
                to: to.to_string(),
                matrix,
                valid,
            });
        }
    }

    /// Seed the repository with every transform stored in a frame.
    pub fn set_transforms_from_frame(&mut self, frame: &TrackedFrame) -> Result<()> {
        for name in frame.transform_names() {
            let matrix = frame.transform(&name)?;
            let valid = frame.transform_status(&name) == FieldStatus::Ok;
            self.set_transform(&name, matrix, valid);
        }
        Ok(())
    }

    /// Resolve a transform by composing along the frame graph.
    ///
    /// Returns the composed matrix and whether every edge on the path was
    /// valid. Fails when the two coordinate frames are not connected.
    pub fn transform(&self, name: &TransformName) -> Result<(DMat4, bool)> {
        if name.from == name.to {
            return Ok((DMat4::IDENTITY, true));
        }

        // Breadth-first search accumulating the composed from->current matrix.
        let mut queue = VecDeque::new();
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(name.from.as_str());
        queue.push_back((name.from.as_str(), DMat4::IDENTITY, true));

        while let Some((current, accumulated, valid)) = queue.pop_front() {
            let Some(edges) = self.edges.get(current) else {
                continue;
            };
            for edge in edges {
                if visited.contains(edge.to.as_str()) {
                    continue;
                }
                let composed = edge.matrix * accumulated;
                let composed_valid = valid && edge.valid;
                if edge.to == name.to {
                    return Ok((composed, composed_valid));
                }
                visited.insert(edge.to.as_str());
                queue.push_back((edge.to.as_str(), composed, composed_valid));
            }
        }

        Err(EchoTrackError::NotFound(format!(
            "no transform path from {} to {}",
            name.from, name.to
        )))
    }
}
