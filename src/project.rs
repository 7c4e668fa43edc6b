use crate::{
    data::{Row, Table},
    error::{EtlError, Result},
    schema::TableSchema,
};

#[derive(Debug, Clone)]
pub struct Projection {
    indices: Vec<usize>,
    schema: TableSchema,
}

impl Projection {
    pub fn new<S: AsRef<str>>(source: &TableSchema, allow_list: &[S]) -> Result<Self> {
        let mut indices = Vec::with_capacity(allow_list.len());
        for field in allow_list {
            let field = field.as_ref();
            let idx = source
                .column_index(field)
                .ok_or_else(|| EtlError::UnknownField {
                    field: field.to_string(),
                    available: source.headers(),
                })?;
            indices.push(idx);
        }
        let columns = indices
            .iter()
            .map(|&idx| source.columns[idx].clone())
            .collect();
        Ok(Self {
            indices,
            schema: TableSchema::new(source.name.clone(), columns),
        })
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn apply(&self, row: &Row) -> Row {
        self.indices
            .iter()
            .map(|&idx| row.get(idx).cloned().flatten())
            .collect()
    }
}

pub fn project<S: AsRef<str>>(table: &Table, allow_list: &[S]) -> Result<Table> {
    let projection = Projection::new(&table.schema, allow_list)?;
    let rows = table.rows.iter().map(|row| projection.apply(row)).collect();
    Ok(Table::new(projection.schema().clone(), rows))
}

pub fn drop_empty_rows(table: &mut Table) -> usize {
    let before = table.rows.len();
    table.rows.retain(|row| row.iter().any(Option::is_some));
    before - table.rows.len()
}
