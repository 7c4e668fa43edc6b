mod common;

use common::{TEMPERATURE_HEADER, TestWorkspace};
use i94_warehouse::{
    data::Value,
    source::{SourceFormat, read_source},
    tables,
};

#[test]
fn short_and_long_lines_are_read_permissively() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_input(
        "GlobalLandTemperaturesByCity.csv",
        TEMPERATURE_HEADER,
        &[
            "1999-01-01,5.0,0.3,Boston,USA,42.59N,72.00W".to_string(),
            "2000-01-01,7.0,0.3,Austin,USA,30.27N".to_string(),
            "2001-01-01,9.0,0.3,Denver,USA,39.38N,104.05W,extra".to_string(),
        ],
    );

    let table = read_source(&path, &SourceFormat::csv(), &tables::temperature_source()).unwrap();
    assert_eq!(table.len(), 3);
    assert!(table.rows.iter().all(|row| row.len() == table.schema.columns.len()));

    let longitude = table.column("Longitude").unwrap();
    let temperature = table.column("AverageTemperature").unwrap();
    assert_eq!(table.rows[1][longitude], None);
    assert_eq!(table.rows[1][temperature], Some(Value::Float(7.0)));
    assert_eq!(
        table.rows[2][longitude],
        Some(Value::String("104.05W".into()))
    );
}

#[test]
fn unparseable_cells_become_null() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_input(
        "GlobalLandTemperaturesByCity.csv",
        TEMPERATURE_HEADER,
        &["sometime,warm,0.3,Boston,USA,42.59N,72.00W".to_string()],
    );

    let table = read_source(&path, &SourceFormat::csv(), &tables::temperature_source()).unwrap();
    assert_eq!(table.rows[0][table.column("dt").unwrap()], None);
    assert_eq!(table.rows[0][table.column("AverageTemperature").unwrap()], None);
    assert_eq!(
        table.rows[0][table.column("Country").unwrap()],
        Some(Value::String("USA".into()))
    );
}
