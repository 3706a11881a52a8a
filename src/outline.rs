//! Bounding-box outline backend
//!
//! Traces the XY extents of a program's motion at the program's top Z.
//! In laser mode the trace runs with the laser at minimum power instead of
//! lifting to a safe height.

use std::sync::Arc;

use async_trait::async_trait;
use cncflow_core::OutlineError;
use cncflow_workflow::{OutlineBackend, OutlineRequest};

/// Axis extents collected from a program
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extents {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub max_z: f64,
}

/// Parse the value following `axis` in an upper-cased G-code line
fn word_value(line: &str, axis: char) -> Option<f64> {
    let pos = line.find(axis)?;
    let remaining = &line[pos + axis.len_utf8()..];
    let end = remaining
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(remaining.len());
    remaining[..end].parse::<f64>().ok()
}

fn strip_comment(line: &str) -> &str {
    let line = line.split(';').next().unwrap_or("");
    line.split('(').next().unwrap_or("")
}

/// Collect absolute-mode XY extents and the highest Z
///
/// Returns `None` when the program never moves in X or Y.
pub fn program_extents(program: &str) -> Option<Extents> {
    let mut position = (0.0_f64, 0.0_f64, 0.0_f64);
    let mut extents: Option<Extents> = None;
    let mut max_z = f64::MIN;

    for raw in program.lines() {
        let line = strip_comment(raw).to_uppercase();
        if line.trim().is_empty() {
            continue;
        }

        let x = word_value(&line, 'X');
        let y = word_value(&line, 'Y');
        let z = word_value(&line, 'Z');

        if let Some(z) = z {
            position.2 = z;
            max_z = max_z.max(z);
        }
        if x.is_none() && y.is_none() {
            continue;
        }
        position.0 = x.unwrap_or(position.0);
        position.1 = y.unwrap_or(position.1);

        let e = extents.get_or_insert(Extents {
            min_x: position.0,
            max_x: position.0,
            min_y: position.1,
            max_y: position.1,
            max_z: position.2,
        });
        e.min_x = e.min_x.min(position.0);
        e.max_x = e.max_x.max(position.0);
        e.min_y = e.min_y.min(position.1);
        e.max_y = e.max_y.max(position.1);
    }

    extents.map(|mut e| {
        e.max_z = if max_z == f64::MIN { 0.0 } else { max_z };
        e
    })
}

/// Highest Z the program reaches, 0 when it never sets Z
///
/// Counts Z words on every line, including programs without XY motion.
pub fn program_z_max(program: &str) -> f64 {
    program
        .lines()
        .filter_map(|raw| word_value(&strip_comment(raw).to_uppercase(), 'Z'))
        .reduce(f64::max)
        .unwrap_or(0.0)
}

/// Render the perimeter trace for `extents`
pub fn trace_program(extents: &Extents, laser_mode: bool) -> String {
    let corners = [
        (extents.min_x, extents.min_y),
        (extents.max_x, extents.min_y),
        (extents.max_x, extents.max_y),
        (extents.min_x, extents.max_y),
        (extents.min_x, extents.min_y),
    ];

    let mut out = vec!["G21 G90".to_string()];
    if laser_mode {
        out.push(format!("G0 X{:.3} Y{:.3}", corners[0].0, corners[0].1));
        out.push("M3 S1".to_string());
        for (x, y) in &corners[1..] {
            out.push(format!("G1 X{:.3} Y{:.3} F3000", x, y));
        }
        out.push("M5".to_string());
    } else {
        out.push(format!("G0 Z{:.3}", extents.max_z));
        for (x, y) in &corners {
            out.push(format!("G0 X{:.3} Y{:.3}", x, y));
        }
    }
    out.join("\n")
}

/// Outline backend that traces the program's bounding box
#[derive(Debug, Default, Clone, Copy)]
pub struct BoundingBoxOutline;

#[async_trait]
impl OutlineBackend for BoundingBoxOutline {
    async fn compute(&self, request: OutlineRequest) -> Result<Arc<str>, OutlineError> {
        let program = request.program_text.clone();
        let laser_mode = request.laser_mode;
        let trace = tokio::task::spawn_blocking(move || {
            program_extents(&program).map(|extents| trace_program(&extents, laser_mode))
        })
        .await
        .map_err(|e| OutlineError::WorkerFailed {
            reason: e.to_string(),
        })?;

        match trace {
            Some(trace) => {
                tracing::debug!("Outline {} ready", request.id);
                Ok(Arc::from(trace))
            }
            None => Err(OutlineError::Backend {
                reason: "program has no XY motion".to_string(),
            }),
        }
    }
}
