use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DataType {
    Serial,
    Integer,
    Boolean,
    Date,
    Varchar(u32),
}

impl DataType {
    pub fn to_sql_type(&self) -> String {
        match self {
            DataType::Serial => "SERIAL".to_string(),
            DataType::Integer => "INTEGER".to_string(),
            DataType::Boolean => "BOOLEAN".to_string(),
            DataType::Date => "DATE".to_string(),
            DataType::Varchar(len) => format!("VARCHAR({})", len),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: DataType,
    /// Trailing constraints, e.g. `PRIMARY KEY` or `NOT NULL UNIQUE`.
    pub constraints: Option<String>,
}

impl ColumnSchema {
    fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            constraints: None,
        }
    }

    fn with_constraints(mut self, constraints: &str) -> Self {
        self.constraints = Some(constraints.to_string());
        self
    }

    pub fn to_sql_definition(&self) -> String {
        match &self.constraints {
            Some(c) => format!("{} {} {}", self.name, self.data_type.to_sql_type(), c),
            None => format!("{} {}", self.name, self.data_type.to_sql_type()),
        }
    }
}

/// Description of the one table the pipeline may query. Fixed at build time
/// and handed to the components that need it as generation context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDescription {
    pub table: String,
    pub columns: Vec<ColumnSchema>,
}

impl SchemaDescription {
    /// The student records table.
    pub fn alunos() -> Self {
        Self {
            table: "alunos".to_string(),
            columns: vec![
                ColumnSchema::new("id", DataType::Serial).with_constraints("PRIMARY KEY"),
                ColumnSchema::new("aluno_data_nascimento", DataType::Date),
                ColumnSchema::new("aluno_genero", DataType::Varchar(255)),
                ColumnSchema::new("raca", DataType::Varchar(255)),
                ColumnSchema::new("bolsa_familia", DataType::Boolean),
                ColumnSchema::new("zona_localizacao", DataType::Varchar(255)),
                ColumnSchema::new("bairro", DataType::Varchar(255)),
                ColumnSchema::new("cidade", DataType::Varchar(255)),
                ColumnSchema::new("escola", DataType::Varchar(255)),
                ColumnSchema::new("curso", DataType::Varchar(255)),
                ColumnSchema::new("serie", DataType::Varchar(255)),
                ColumnSchema::new("matricula_id", DataType::Integer).with_constraints("NOT NULL UNIQUE"),
            ],
        }
    }

    // DDL string used as LLM context
    pub fn to_ddl(&self) -> String {
        let columns_sql: Vec<String> = self
            .columns
            .iter()
            .map(|col| col.to_sql_definition())
            .collect();

        format!("{} (\n  {}\n);", self.table, columns_sql.join(",\n  "))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alunos_ddl_lists_every_column() {
        let schema = SchemaDescription::alunos();
        let ddl = schema.to_ddl();
        assert!(ddl.starts_with("alunos (\n  id SERIAL PRIMARY KEY,"));
        assert!(ddl.contains("bolsa_familia BOOLEAN"));
        assert!(ddl.contains("matricula_id INTEGER NOT NULL UNIQUE\n);"));
        assert_eq!(schema.column_names().count(), 12);
    }
}
