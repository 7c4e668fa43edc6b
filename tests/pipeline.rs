mod common;

use std::fs;

use chrono::NaiveDate;
use common::{IMMIGRATION_HEADER, TestWorkspace, immigration_line};
use i94_warehouse::{
    config::{ImmigrationInput, InputFormat, PipelineConfig},
    context::ExecutionContext,
    data::{Table, Value},
    pipeline::{Pipeline, PipelineState, Step, StepOutcome},
    schema::TableSchema,
    source::read_table_dir,
    tables,
    writer::{OverwriteMode, write_table},
};

fn pipeline(config: PipelineConfig) -> Pipeline {
    Pipeline::new(ExecutionContext::new(config).expect("context"))
}

fn cell(table: &Table, row: usize, column: &str) -> Option<Value> {
    table.rows[row][table.column(column).expect("column")].clone()
}

fn ymd(y: i32, m: u32, d: u32) -> Value {
    Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

#[test]
fn full_run_writes_every_table() {
    let workspace = TestWorkspace::new();
    workspace.write_sample_inputs();

    let mut pipeline = pipeline(workspace.config());
    assert_eq!(pipeline.state(), &PipelineState::NotStarted);
    let report = pipeline.run(&[]);

    assert_eq!(report.state, PipelineState::Completed);
    assert_eq!(pipeline.state(), &PipelineState::Completed);
    assert_eq!(
        report.steps.iter().map(|s| s.step).collect::<Vec<_>>(),
        Step::ALL.to_vec()
    );
    let output = workspace.output_dir();
    for table in [
        tables::IMMIGRATION,
        tables::DATE,
        tables::TEMPERATURE,
        tables::COUNTRY,
        tables::STATE,
    ] {
        assert!(output.join(table).join("_SUCCESS").is_file(), "{table}");
    }
}

#[test]
fn duplicate_arrivals_collapse_into_their_month_partition() {
    let workspace = TestWorkspace::new();
    workspace.write_sample_inputs();
    let report = pipeline(workspace.config()).run(&[Step::Immigration]);
    assert_eq!(report.state, PipelineState::Completed);

    let StepOutcome::Completed { tables: written } = &report.steps[0].outcome else {
        panic!("immigration step failed: {:?}", report.steps[0]);
    };
    assert_eq!(written[0].rows, 3);
    assert_eq!(
        written[0].partitions,
        vec!["i94yr=2016/i94mon=4", "i94yr=2016/i94mon=5"]
    );

    let april = workspace
        .output_dir()
        .join("immigration/i94yr=2016/i94mon=4");
    assert!(april.join("part-00000.parquet").is_file());

    let immigration = read_table_dir(&workspace.output_dir().join("immigration")).unwrap();
    assert_eq!(immigration.len(), 3);
    assert_eq!(immigration.schema.partition_by, vec!["i94yr", "i94mon"]);
    assert_eq!(cell(&immigration, 0, "cicid"), Some(Value::Integer(1)));
    assert_eq!(cell(&immigration, 0, "arrdate"), Some(ymd(2016, 4, 1)));
    assert_eq!(cell(&immigration, 0, "i94mon"), Some(Value::Integer(4)));
    assert_eq!(cell(&immigration, 0, "dtadfile"), Some(Value::Integer(20_160_401)));
    assert!(immigration.column("occup").is_err());

    let dates = read_table_dir(&workspace.output_dir().join("date")).unwrap();
    assert_eq!(dates.len(), 3);
    assert_eq!(cell(&dates, 0, "date"), Some(ymd(2016, 4, 1)));
    assert_eq!(cell(&dates, 0, "week"), Some(Value::Integer(13)));
    assert_eq!(cell(&dates, 0, "weekday"), Some(Value::Integer(6)));
    assert_eq!(cell(&dates, 2, "month"), Some(Value::Integer(5)));
}

#[test]
fn january_observations_average_across_years() {
    let workspace = TestWorkspace::new();
    workspace.write_sample_inputs();
    let report = pipeline(workspace.config()).run(&[Step::Temperature]);
    assert_eq!(report.state, PipelineState::Completed);

    let temperature = read_table_dir(&workspace.output_dir().join("temperature")).unwrap();
    assert_eq!(
        temperature.headers(),
        vec!["Country", "Month", "AverageTemperature", "Latitude", "Longitude"]
    );
    assert_eq!(temperature.len(), 2);
    assert_eq!(cell(&temperature, 0, "Month"), Some(Value::Integer(1)));
    assert_eq!(
        cell(&temperature, 0, "AverageTemperature"),
        Some(Value::Float(6.0))
    );
    assert_eq!(
        cell(&temperature, 0, "Latitude"),
        Some(Value::String("42.59N".into()))
    );
    assert_eq!(cell(&temperature, 1, "AverageTemperature"), None);
}

#[test]
fn lookups_pass_through_unchanged() {
    let workspace = TestWorkspace::new();
    workspace.write_sample_inputs();
    let report = pipeline(workspace.config()).run(&[Step::Country, Step::State]);
    assert_eq!(report.state, PipelineState::Completed);

    let country = read_table_dir(&workspace.output_dir().join("country")).unwrap();
    assert_eq!(country.headers(), vec!["code", "country"]);
    assert_eq!(
        country.rows,
        vec![
            vec![
                Some(Value::String("236".into())),
                Some(Value::String("AFGHANISTAN".into()))
            ],
            vec![
                Some(Value::String("101".into())),
                Some(Value::String("ALBANIA".into()))
            ],
        ]
    );
    let state = read_table_dir(&workspace.output_dir().join("state")).unwrap();
    assert_eq!(state.len(), 2);
}

#[test]
fn a_failing_step_does_not_block_the_others() {
    let workspace = TestWorkspace::new();
    workspace.write_sample_inputs();
    fs::remove_file(workspace.input_dir().join("states.csv")).unwrap();
    workspace.write_input("countries.csv", "id,country", &["236,AFGHANISTAN".to_string()]);

    let report = pipeline(workspace.config()).run(&[]);
    let failures = report.failures().collect::<Vec<_>>();
    assert_eq!(failures.len(), 2);

    match &failures[0].outcome {
        StepOutcome::Failed { kind, cause } => {
            assert_eq!(failures[0].step, Step::Country);
            assert_eq!(kind, "SchemaMismatch");
            assert!(cause.contains("code"), "{cause}");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    match &failures[1].outcome {
        StepOutcome::Failed { kind, .. } => {
            assert_eq!(failures[1].step, Step::State);
            assert_eq!(kind, "SourceUnavailable");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(matches!(
        report.state,
        PipelineState::Failed {
            step: Step::Country,
            ..
        }
    ));

    let output = workspace.output_dir();
    assert!(output.join("immigration/_SUCCESS").is_file());
    assert!(output.join("temperature/_SUCCESS").is_file());
    assert!(!output.join("country").exists());
    assert!(!output.join("state").exists());
}

#[test]
fn parquet_immigration_directory_is_read() {
    let workspace = TestWorkspace::new();
    workspace.write_sample_inputs();

    // Stage the raw extract as Parquet by round-tripping the CSV through
    // the source reader.
    let raw = i94_warehouse::source::read_source(
        &workspace.input_dir().join("immigration.csv"),
        &i94_warehouse::source::SourceFormat::csv(),
        &tables::immigration_source(),
    )
    .unwrap();
    let raw = Table::new(
        TableSchema::new("sas_data", raw.schema.columns),
        raw.rows,
    );
    write_table(&raw, &workspace.input_dir().join("sas_data"), OverwriteMode::Table).unwrap();

    let config = PipelineConfig {
        immigration: ImmigrationInput {
            format: InputFormat::Parquet,
            ..ImmigrationInput::default()
        },
        ..workspace.config()
    };
    let report = pipeline(config).run(&[Step::Immigration]);
    assert_eq!(report.state, PipelineState::Completed, "{:?}", report.steps);

    let immigration = read_table_dir(&workspace.output_dir().join("immigration")).unwrap();
    assert_eq!(immigration.len(), 3);
    assert_eq!(cell(&immigration, 0, "arrdate"), Some(ymd(2016, 4, 1)));
}

#[test]
fn rerunning_produces_identical_files() {
    let workspace = TestWorkspace::new();
    workspace.write_sample_inputs();
    let partition = workspace
        .output_dir()
        .join("immigration/i94yr=2016/i94mon=4/part-00000.parquet");

    pipeline(workspace.config()).run(&[Step::Immigration]);
    let first = fs::read(&partition).unwrap();
    pipeline(workspace.config()).run(&[Step::Immigration]);
    let second = fs::read(&partition).unwrap();
    assert_eq!(first, second);
}

#[test]
fn parallel_run_matches_sequential_output() {
    let sequential = TestWorkspace::new();
    sequential.write_sample_inputs();
    pipeline(sequential.config()).run(&[]);

    let parallel = TestWorkspace::new();
    parallel.write_sample_inputs();
    let report = pipeline(parallel.config()).parallel(true).run(&[]);
    assert_eq!(report.state, PipelineState::Completed);
    assert_eq!(report.steps.len(), 4);

    for table in ["immigration", "date", "temperature", "country", "state"] {
        let left = read_table_dir(&sequential.output_dir().join(table)).unwrap();
        let right = read_table_dir(&parallel.output_dir().join(table)).unwrap();
        assert_eq!(left.rows, right.rows, "{table}");
    }
}

#[test]
fn report_lists_each_step() {
    let workspace = TestWorkspace::new();
    workspace.write_sample_inputs();
    let report = pipeline(workspace.config()).run(&[Step::State, Step::Country, Step::State]);
    assert_eq!(report.steps.len(), 2);

    let path = workspace.path().join("report.json");
    report.save(&path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["state"]["state"], "completed");
    assert_eq!(json["steps"][0]["step"], "country");
    assert_eq!(json["steps"][0]["status"], "completed");
    assert_eq!(json["steps"][1]["tables"][0]["rows"], 2);
}

#[test]
fn empty_immigration_rows_are_ignored() {
    let workspace = TestWorkspace::new();
    workspace.write_sample_inputs();
    workspace.write_input(
        "immigration.csv",
        IMMIGRATION_HEADER,
        &[
            immigration_line(7, 2016, 4, "20545.0", "STU"),
            ",,,,,,,,,,,,,,".to_string(),
        ],
    );
    let report = pipeline(workspace.config()).run(&[Step::Immigration]);
    let StepOutcome::Completed { tables: written } = &report.steps[0].outcome else {
        panic!("immigration step failed");
    };
    assert_eq!(written[0].rows, 1);
    assert_eq!(written[1].rows, 1);
}
