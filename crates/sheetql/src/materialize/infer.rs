use rusqlite::types::Value as SqlValue;
use serde::Serialize;

use crate::workbook::CellValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Integer,
    Real,
}

impl ColumnType {
    #[must_use]
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Real => "real",
        }
    }

    /// Storage value of one cell under this column type.
    #[must_use]
    pub fn to_sql_value(self, cell: &CellValue) -> SqlValue {
        let Some(text) = cell.to_text() else {
            return SqlValue::Null;
        };
        match self {
            Self::Integer => text
                .parse::<i64>()
                .map_or(SqlValue::Text(text), SqlValue::Integer),
            Self::Real => match parse_real(&text) {
                Some(number) => SqlValue::Real(number),
                None => SqlValue::Text(text),
            },
            Self::Text => SqlValue::Text(text),
        }
    }
}

/// Integer when every non-null value parses as an integer, real when every
/// one parses as a finite float, text otherwise (including all-null columns).
pub fn infer_column_type<'a>(values: impl IntoIterator<Item = &'a CellValue>) -> ColumnType {
    let mut seen_value = false;
    let mut all_integer = true;
    let mut all_real = true;

    for text in values.into_iter().filter_map(CellValue::to_text) {
        seen_value = true;
        if all_integer && text.parse::<i64>().is_err() {
            all_integer = false;
        }
        if !all_integer && parse_real(&text).is_none() {
            all_real = false;
            break;
        }
    }

    match (seen_value, all_integer, all_real) {
        (false, _, _) => ColumnType::Text,
        (true, true, _) => ColumnType::Integer,
        (true, false, true) => ColumnType::Real,
        (true, false, false) => ColumnType::Text,
    }
}

fn parse_real(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|number| number.is_finite())
}

#[cfg(test)]
mod tests {
    use super::{ColumnType, infer_column_type};
    use crate::workbook::CellValue;
    use rusqlite::types::Value as SqlValue;

    fn texts(values: &[&str]) -> Vec<CellValue> {
        values
            .iter()
            .map(|value| CellValue::Text((*value).to_string()))
            .collect()
    }

    #[test]
    fn infers_integer_real_and_text() {
        assert_eq!(infer_column_type(&texts(&["1", "2", "3"])), ColumnType::Integer);
        assert_eq!(infer_column_type(&texts(&["1.5"])), ColumnType::Real);
        assert_eq!(infer_column_type(&texts(&["1", "2.25"])), ColumnType::Real);
        assert_eq!(infer_column_type(&texts(&["1", "abc"])), ColumnType::Text);
    }

    #[test]
    fn nulls_are_ignored_and_all_null_is_text() {
        let values = vec![CellValue::Empty, CellValue::Number(4.0), CellValue::Text(String::new())];
        assert_eq!(infer_column_type(&values), ColumnType::Integer);
        assert_eq!(infer_column_type(&[CellValue::Empty]), ColumnType::Text);
        assert_eq!(infer_column_type(&Vec::<CellValue>::new()), ColumnType::Text);
    }

    #[test]
    fn non_finite_floats_are_text() {
        assert_eq!(infer_column_type(&texts(&["1.5", "inf"])), ColumnType::Text);
        assert_eq!(infer_column_type(&texts(&["NaN"])), ColumnType::Text);
    }

    #[test]
    fn booleans_infer_as_integers() {
        let values = vec![CellValue::Boolean(true), CellValue::Boolean(false)];
        assert_eq!(infer_column_type(&values), ColumnType::Integer);
        assert_eq!(
            ColumnType::Integer.to_sql_value(&CellValue::Boolean(true)),
            SqlValue::Integer(1)
        );
    }

    #[test]
    fn converts_cells_to_storage_values() {
        assert_eq!(
            ColumnType::Integer.to_sql_value(&CellValue::Number(12.0)),
            SqlValue::Integer(12)
        );
        assert_eq!(
            ColumnType::Real.to_sql_value(&CellValue::Number(0.5)),
            SqlValue::Real(0.5)
        );
        assert_eq!(
            ColumnType::Text.to_sql_value(&CellValue::Number(3.0)),
            SqlValue::Text("3".to_string())
        );
        assert_eq!(ColumnType::Text.to_sql_value(&CellValue::Empty), SqlValue::Null);
    }
}
