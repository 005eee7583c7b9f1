// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! On-disk frame format: parsing and serialization.
//!
//! A recorded frame is a UTF-8 text file named `<frame_number>.txt`. Per
//! subject it contains a `Subject:` line, a `Marker Positions:` mapping, a
//! `Segment Poses:` mapping (16-element row-major 4x4 matrices or `None`),
//! and - in the current layout - a `Segment Local Rotations:` mapping
//! (9-element row-major 3x3 matrices or `None`), followed by a blank line.
//! An older layout omits the local-rotations line; the parser accepts both by
//! checking the line prefix explicitly rather than peeking at blankness.
//!
//! The mapping literals are Python/numpy reprs, e.g.
//! `{'LASI': array([0.1, 0.2, 0.3]), 'Root': None}`. They are parsed with a
//! small hand-rolled scanner to avoid dragging in a Python-literal dependency
//! for a three-production grammar.

use std::collections::BTreeMap;

use nalgebra::{Matrix3, Matrix4, Point3};

use crate::error::{MocapError, Result};

const SUBJECT_PREFIX: &str = "Subject: ";
const MARKER_POSITIONS_PREFIX: &str = "Marker Positions: ";
const SEGMENT_POSES_PREFIX: &str = "Segment Poses: ";
const SEGMENT_LOCAL_ROTATIONS_PREFIX: &str = "Segment Local Rotations: ";

/// The recorded data for one subject in one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubjectRecord {
    /// Visible marker positions in metres, indexed by marker name.
    pub marker_positions: BTreeMap<String, Point3<f64>>,
    /// Segment-from-world transforms, `None` where the segment was occluded.
    pub segment_poses: BTreeMap<String, Option<Matrix4<f64>>>,
    /// Parent-relative segment rotations, `None` where occluded or unrecorded.
    pub segment_local_rotations: BTreeMap<String, Option<Matrix3<f64>>>,
}

/// All subjects recorded in a single frame, indexed by subject name.
pub type FrameData = BTreeMap<String, SubjectRecord>;

/// Parse the contents of a frame file.
///
/// # Errors
///
/// Returns [`MocapError::Parse`] on any deviation from the two known layouts,
/// with the offending line number in the message.
pub fn parse_frame(text: &str) -> Result<FrameData> {
    let lines: Vec<&str> = text.lines().collect();
    let mut frame = FrameData::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].trim().is_empty() {
            i += 1;
            continue;
        }

        let subject_name = strip_line_prefix(&lines, i, SUBJECT_PREFIX)?.to_string();
        let markers_src = strip_line_prefix(&lines, i + 1, MARKER_POSITIONS_PREFIX)?;
        let poses_src = strip_line_prefix(&lines, i + 2, SEGMENT_POSES_PREFIX)?;

        let mut record = SubjectRecord {
            marker_positions: parse_marker_dict(markers_src)
                .map_err(|e| at_line(e, i + 2))?,
            ..SubjectRecord::default()
        };

        for (name, values) in parse_matrix_dict(poses_src, 16).map_err(|e| at_line(e, i + 3))? {
            record
                .segment_poses
                .insert(name, values.map(|v| Matrix4::from_row_slice(&v)));
        }

        // The legacy layout stops after the segment poses; the current one
        // adds a local-rotations line.
        if let Some(rotations_src) =
            try_strip_line_prefix(&lines, i + 3, SEGMENT_LOCAL_ROTATIONS_PREFIX)
        {
            for (name, values) in
                parse_matrix_dict(rotations_src, 9).map_err(|e| at_line(e, i + 4))?
            {
                record
                    .segment_local_rotations
                    .insert(name, values.map(|v| Matrix3::from_row_slice(&v)));
            }
            i += 4;
        } else {
            i += 3;
        }

        frame.insert(subject_name, record);
    }

    Ok(frame)
}

/// Serialize a frame to the canonical (five-line-per-subject) layout.
#[must_use]
pub fn write_frame(frame: &FrameData) -> String {
    let mut output = String::new();

    for (subject_name, record) in frame {
        output.push_str(SUBJECT_PREFIX);
        output.push_str(subject_name);
        output.push('\n');

        output.push_str(MARKER_POSITIONS_PREFIX);
        write_dict(&mut output, &record.marker_positions, |out, p| {
            write_array(out, &[p.x, p.y, p.z]);
        });
        output.push('\n');

        output.push_str(SEGMENT_POSES_PREFIX);
        write_dict(&mut output, &record.segment_poses, |out, pose| match pose {
            Some(m) => write_array(out, m.transpose().as_slice()),
            None => out.push_str("None"),
        });
        output.push('\n');

        output.push_str(SEGMENT_LOCAL_ROTATIONS_PREFIX);
        write_dict(
            &mut output,
            &record.segment_local_rotations,
            |out, rotation| match rotation {
                Some(m) => write_array(out, m.transpose().as_slice()),
                None => out.push_str("None"),
            },
        );
        output.push_str("\n\n");
    }

    output
}

fn strip_line_prefix<'a>(lines: &[&'a str], index: usize, prefix: &str) -> Result<&'a str> {
    lines
        .get(index)
        .and_then(|line| line.strip_prefix(prefix))
        .ok_or_else(|| {
            MocapError::Parse(format!(
                "expected a line starting with {prefix:?} at line {}",
                index + 1
            ))
        })
}

fn try_strip_line_prefix<'a>(lines: &[&'a str], index: usize, prefix: &str) -> Option<&'a str> {
    lines.get(index).and_then(|line| line.strip_prefix(prefix))
}

fn at_line(err: MocapError, index: usize) -> MocapError {
    match err {
        MocapError::Parse(msg) => MocapError::Parse(format!("{msg} (line {})", index + 1)),
        other => other,
    }
}

// --- Mapping-literal scanning ---

fn parse_marker_dict(src: &str) -> Result<BTreeMap<String, Point3<f64>>> {
    let mut scanner = Scanner::new(src);
    let mut result = BTreeMap::new();
    scanner.parse_dict(|scanner, key| {
        let values = scanner.parse_array(3)?;
        result.insert(key, Point3::new(values[0], values[1], values[2]));
        Ok(())
    })?;
    Ok(result)
}

fn parse_matrix_dict(src: &str, expected_len: usize) -> Result<BTreeMap<String, Option<Vec<f64>>>> {
    let mut scanner = Scanner::new(src);
    let mut result = BTreeMap::new();
    scanner.parse_dict(|scanner, key| {
        if scanner.eat("None") {
            result.insert(key, None);
        } else {
            result.insert(key, Some(scanner.parse_array(expected_len)?));
        }
        Ok(())
    })?;
    Ok(result)
}

/// Cursor over a single mapping literal.
struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(MocapError::Parse(format!(
                "expected {token:?} at column {}",
                self.pos + 1
            )))
        }
    }

    /// Parse `{'key': <value>, ...}`, calling `parse_value` for each entry.
    fn parse_dict(
        &mut self,
        mut parse_value: impl FnMut(&mut Self, String) -> Result<()>,
    ) -> Result<()> {
        self.skip_whitespace();
        self.expect("{")?;
        self.skip_whitespace();
        if self.eat("}") {
            return Ok(());
        }

        loop {
            let key = self.parse_quoted_string()?;
            self.skip_whitespace();
            self.expect(":")?;
            self.skip_whitespace();
            parse_value(self, key)?;
            self.skip_whitespace();
            if self.eat(",") {
                self.skip_whitespace();
            } else {
                self.expect("}")?;
                return Ok(());
            }
        }
    }

    fn parse_quoted_string(&mut self) -> Result<String> {
        let quote = if self.eat("'") {
            '\''
        } else if self.eat("\"") {
            '"'
        } else {
            return Err(MocapError::Parse(format!(
                "expected a quoted key at column {}",
                self.pos + 1
            )));
        };

        match self.rest().find(quote) {
            Some(end) => {
                let key = self.rest()[..end].to_string();
                self.pos += end + 1;
                Ok(key)
            }
            None => Err(MocapError::Parse("unterminated string".to_string())),
        }
    }

    /// Parse `array([a, b, ...])` with exactly `expected_len` elements.
    fn parse_array(&mut self, expected_len: usize) -> Result<Vec<f64>> {
        self.expect("array(")?;
        self.skip_whitespace();
        self.expect("[")?;

        let mut values = Vec::with_capacity(expected_len);
        loop {
            self.skip_whitespace();
            if self.eat("]") {
                break;
            }
            values.push(self.parse_number()?);
            self.skip_whitespace();
            // Elements are comma-separated; numpy omits the trailing comma.
            self.eat(",");
        }

        self.skip_whitespace();
        self.expect(")")?;

        if values.len() == expected_len {
            Ok(values)
        } else {
            Err(MocapError::Parse(format!(
                "expected {expected_len} array elements, found {}",
                values.len()
            )))
        }
    }

    fn parse_number(&mut self) -> Result<f64> {
        let start = self.pos;
        let end = self
            .rest()
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')))
            .map_or(self.input.len(), |offset| self.pos + offset);

        let token = &self.input[start..end];
        self.pos = end;

        token.parse::<f64>().map_err(|_| {
            MocapError::Parse(format!("invalid number {token:?} at column {}", start + 1))
        })
    }
}

fn write_dict<V>(
    output: &mut String,
    entries: &BTreeMap<String, V>,
    mut write_value: impl FnMut(&mut String, &V),
) {
    output.push('{');
    for (i, (key, value)) in entries.iter().enumerate() {
        if i > 0 {
            output.push_str(", ");
        }
        output.push('\'');
        output.push_str(key);
        output.push_str("': ");
        write_value(output, value);
    }
    output.push('}');
}

fn write_array(output: &mut String, values: &[f64]) {
    output.push_str("array([");
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            output.push_str(", ");
        }
        output.push_str(&format!("{value:?}"));
    }
    output.push_str("])");
}
