#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

use i94_warehouse::config::{ImmigrationInput, InputFormat, PipelineConfig};

pub const IMMIGRATION_HEADER: &str = "cicid,i94yr,i94mon,i94cit,i94res,arrdate,i94addr,depdate,dtadfile,biryear,gender,airline,fltno,visatype,occup";

pub const TEMPERATURE_HEADER: &str =
    "dt,AverageTemperature,AverageTemperatureUncertainty,City,Country,Latitude,Longitude";

/// One raw I-94 line for `cicid` arriving on SAS day `arrdate` in the given
/// year and month. `occup` is not carried into the output.
pub fn immigration_line(cicid: u32, year: u32, month: u32, arrdate: &str, occup: &str) -> String {
    format!(
        "{cicid}.0,{year}.0,{month}.0,692.0,692.0,{arrdate},NY,20554.0,20160401,1979.0,M,QF,00011,B2,{occup}"
    )
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn input_dir(&self) -> PathBuf {
        self.path().join("input")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.path().join("output")
    }

    /// Writes `contents` under the workspace, creating parent directories,
    /// and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    /// Writes an input file made of `header` followed by `lines`.
    pub fn write_input(&self, name: &str, header: &str, lines: &[String]) -> PathBuf {
        let mut contents = String::from(header);
        contents.push('\n');
        for line in lines {
            contents.push_str(line);
            contents.push('\n');
        }
        self.write(&format!("input/{name}"), &contents)
    }

    /// Writes a small but complete set of inputs: duplicated arrivals in
    /// April 2016, two USA January observations, and both lookups.
    pub fn write_sample_inputs(&self) {
        self.write_input(
            "immigration.csv",
            IMMIGRATION_HEADER,
            &[
                immigration_line(1, 2016, 4, "20545.0", "STU"),
                immigration_line(1, 2016, 4, "20545.0", "OTH"),
                immigration_line(2, 2016, 4, "20546.0", "STU"),
                immigration_line(3, 2016, 5, "20575.0", "STU"),
            ],
        );
        self.write_input(
            "GlobalLandTemperaturesByCity.csv",
            TEMPERATURE_HEADER,
            &[
                "1999-01-01,5.0,0.3,Boston,USA,42.59N,72.00W".to_string(),
                "2000-01-01,7.0,0.3,Denver,USA,39.38N,104.05W".to_string(),
                "2000-02-01,,0.3,Denver,USA,39.38N,104.05W".to_string(),
            ],
        );
        self.write_input(
            "countries.csv",
            "code,country",
            &["236,AFGHANISTAN".to_string(), "101,ALBANIA".to_string()],
        );
        self.write_input(
            "states.csv",
            "code,state",
            &["NY,NEW YORK".to_string(), "CA,CALIFORNIA".to_string()],
        );
    }

    /// Configuration pointing at this workspace with a CSV immigration input.
    pub fn config(&self) -> PipelineConfig {
        PipelineConfig {
            input_root: self.input_dir(),
            output_root: self.output_dir(),
            immigration: ImmigrationInput {
                path: PathBuf::from("immigration.csv"),
                format: InputFormat::Csv,
            },
            ..PipelineConfig::default()
        }
    }
}
