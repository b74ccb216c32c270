//! CSV persistence for [`Trajectory`].
//!
//! File layout
//! -----------------
//! ```text
//! # delta_t: 0.1
//! # file: cell_01.csv
//! frame,t,x,y,x_err,y_err,f,f_err,mol,mol_err,n
//! 12,1.2,0.31,-0.07,NaN,NaN,0.8,...
//! ```
//!
//! * Annotations come first, one `# key: value` line each.
//! * Only the columns of attributes that are present are written; `frame`,
//!   `t`, `x` and `y` are always there.
//! * Missing samples are written as `NaN`.
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::constants::Frame;
use crate::trajalign_errors::TrajalignError;

use super::{Attribute, Trajectory};

const COMMENT: char = '#';

impl Trajectory {
    /// Write the trajectory to `path` (see the module documentation for the format).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TrajalignError> {
        let mut out = BufWriter::new(fs::File::create(path.as_ref())?);
        for (key, value) in self.annotations() {
            writeln!(out, "{COMMENT} {key}: {value}")?;
        }

        let columns = self.columns();
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(columns.iter().map(|(name, _)| name.as_str()))?;
        for i in 0..self.len() {
            let mut record = vec![self.frames()[i].to_string()];
            record.extend(columns[1..].iter().map(|(_, col)| col[i].to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        log::debug!(
            "saved trajectory with {} samples to {}",
            self.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Read a trajectory written by [`Trajectory::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Trajectory, TrajalignError> {
        let text = fs::read_to_string(path.as_ref())?;

        let annotations: Vec<(String, String)> = text
            .lines()
            .filter_map(|l| l.trim_start().strip_prefix(COMMENT))
            .filter_map(|l| l.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();

        let mut reader = csv::ReaderBuilder::new()
            .comment(Some(COMMENT as u8))
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut table: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for record in reader.records() {
            let record = record?;
            for (column, field) in table.iter_mut().zip(record.iter()) {
                column.push(field.to_string());
            }
        }

        let column = |name: &str| -> Option<&Vec<String>> {
            headers.iter().position(|h| h == name).map(|i| &table[i])
        };
        let required = |name: &str| -> Result<Vec<f64>, TrajalignError> {
            let raw = column(name)
                .ok_or_else(|| TrajalignError::MissingColumn(name.to_string()))?;
            parse_column(name, raw)
        };

        let frames: Vec<Frame> = required("frame")?.iter().map(|&v| v as Frame).collect();
        let mut trajectory = Trajectory::from_frames_and_times(frames, required("t")?)?;
        trajectory.set_values(Attribute::Coord, &[required("x")?, required("y")?])?;

        if let (Some(ex), Some(ey)) = (column("x_err"), column("y_err")) {
            trajectory.set_errors(
                Attribute::Coord,
                &[parse_column("x_err", ex)?, parse_column("y_err", ey)?],
            )?;
        }
        for attr in [Attribute::F, Attribute::Mol, Attribute::N] {
            if let Some(raw) = column(attr.name()) {
                trajectory.set_values(attr, &[parse_column(attr.name(), raw)?])?;
            }
            let err_name = format!("{}_err", attr.name());
            if let Some(raw) = column(&err_name) {
                trajectory.set_errors(attr, &[parse_column(&err_name, raw)?])?;
            }
        }
        for (key, value) in annotations {
            trajectory.set_annotation(key, value);
        }
        Ok(trajectory)
    }

    /// `(column name, values)` for every present attribute, `frame` first.
    fn columns(&self) -> Vec<(String, Vec<f64>)> {
        let mut columns = vec![
            ("frame".to_string(), Vec::new()),
            ("t".to_string(), self.t().to_vec()),
            ("x".to_string(), self.x()),
            ("y".to_string(), self.y()),
        ];
        if let [ex, ey] = self.errors(Attribute::Coord).as_slice() {
            columns.push(("x_err".to_string(), ex.clone()));
            columns.push(("y_err".to_string(), ey.clone()));
        }
        for attr in [Attribute::F, Attribute::Mol, Attribute::N] {
            if let Some(values) = self.values(attr).pop() {
                columns.push((attr.name().to_string(), values));
            }
            if let Some(errors) = self.errors(attr).pop() {
                columns.push((format!("{}_err", attr.name()), errors));
            }
        }
        columns
    }
}

fn parse_column(name: &str, raw: &[String]) -> Result<Vec<f64>, TrajalignError> {
    raw.iter()
        .map(|v| {
            v.parse::<f64>().map_err(|_| TrajalignError::ParseColumn {
                column: name.to_string(),
                value: v.clone(),
            })
        })
        .collect()
}
