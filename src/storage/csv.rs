use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use super::table::{Column, DataType, Row, Schema, Table, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Empty CSV file")]
    EmptyFile,
}

#[derive(Debug, Clone)]
pub struct CsvReader {
    delimiter: char,
    has_header: bool,
    index_column: bool,
}

impl Default for CsvReader {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvReader {
    pub fn new() -> Self {
        Self {
            delimiter: ',',
            has_header: true,
            index_column: false,
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Treat the first column as a row index and leave it out of the table.
    pub fn with_index_column(mut self, index_column: bool) -> Self {
        self.index_column = index_column;
        self
    }

    pub fn read_file(&self, path: &Path) -> Result<Table, CsvError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let table_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("table")
            .to_string();

        self.read_from_reader(reader, &table_name)
    }

    pub fn read_from_reader<R: BufRead>(&self, reader: R, table_name: &str) -> Result<Table, CsvError> {
        let mut records = self
            .read_records(reader)?
            .into_iter()
            .skip_while(|(_, fields)| fields.is_empty());

        let (first_line, first_row) = records.next().ok_or(CsvError::EmptyFile)?;

        let mut raw_rows: Vec<Vec<RawField>> = Vec::new();

        let mut headers: Vec<String> = if self.has_header {
            first_row
                .into_iter()
                .enumerate()
                .map(|(i, field)| {
                    if field.text.is_empty() {
                        format!("Unnamed: {}", i)
                    } else {
                        field.text
                    }
                })
                .collect()
        } else {
            let headers = (0..first_row.len())
                .map(|i| format!("column{}", i + 1))
                .collect();
            raw_rows.push(first_row);
            headers
        };

        let width = headers.len();

        for (line, mut row) in records {
            // A blank line is a NULL row only when the table has one column
            if row.is_empty() {
                if width != 1 {
                    continue;
                }
                row.push(RawField::default());
            }
            if row.len() > width {
                return Err(CsvError::Parse {
                    line,
                    message: format!("expected {} fields, saw {}", width, row.len()),
                });
            }
            row.resize(width, RawField::default());
            raw_rows.push(row);
        }

        if self.index_column {
            if width < 2 {
                return Err(CsvError::Parse {
                    line: first_line,
                    message: "index column leaves no data columns".to_string(),
                });
            }
            headers.remove(0);
            for row in &mut raw_rows {
                row.remove(0);
            }
        }

        let headers = dedupe_headers(headers);
        let types = self.infer_types(&raw_rows, headers.len());

        let columns: Vec<Column> = headers
            .into_iter()
            .zip(types.iter())
            .map(|(name, dtype)| Column::new(name, *dtype))
            .collect();
        let schema = Schema::new(columns);

        let rows: Vec<Row> = raw_rows
            .iter()
            .map(|raw_row| {
                let values: Vec<Value> = raw_row
                    .iter()
                    .zip(types.iter())
                    .map(|(field, dtype)| self.parse_value(field, dtype))
                    .collect();
                Row::new(values)
            })
            .collect();

        Ok(Table::with_rows(table_name, schema, rows))
    }

    /// Splits the input into records tagged with their starting line number.
    /// A quoted field may span several physical lines. Blank lines come back
    /// as records with no fields.
    fn read_records<R: BufRead>(&self, reader: R) -> Result<Vec<(usize, Vec<RawField>)>, CsvError> {
        let mut records = Vec::new();
        let mut pending: Option<(usize, String)> = None;

        for (line_num, line_result) in reader.lines().enumerate() {
            let mut line = line_result?;
            if line_num == 0 {
                if let Some(stripped) = line.strip_prefix('\u{feff}') {
                    line = stripped.to_string();
                }
            }
            let (start, text) = match pending.take() {
                Some((start, mut text)) => {
                    text.push('\n');
                    text.push_str(&line);
                    (start, text)
                }
                None => {
                    if line.trim().is_empty() {
                        records.push((line_num + 1, Vec::new()));
                        continue;
                    }
                    (line_num + 1, line)
                }
            };

            match self.parse_line(&text) {
                Ok(fields) => records.push((start, fields)),
                Err(_) => pending = Some((start, text)),
            }
        }

        if let Some((line, _)) = pending {
            return Err(CsvError::Parse {
                line,
                message: "Unclosed quote".to_string(),
            });
        }

        Ok(records)
    }

    /// Unquoted fields are trimmed. Quoted fields keep their text as written.
    fn parse_line(&self, line: &str) -> Result<Vec<RawField>, String> {
        let mut fields = Vec::new();
        let mut current = RawField::default();
        let mut in_quotes = false;
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            if in_quotes {
                if c == '"' {
                    // Check for escaped quote
                    if chars.peek() == Some(&'"') {
                        current.text.push('"');
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                } else {
                    current.text.push(c);
                }
            } else if c == '"' && !current.quoted && current.text.trim().is_empty() {
                current.text.clear();
                current.quoted = true;
                in_quotes = true;
            } else if c == self.delimiter {
                fields.push(current.finish());
                current = RawField::default();
            } else if !(current.quoted && c.is_whitespace()) {
                current.text.push(c);
            }
        }

        if in_quotes {
            return Err("Unclosed quote".to_string());
        }

        fields.push(current.finish());
        Ok(fields)
    }

    fn infer_types(&self, rows: &[Vec<RawField>], num_columns: usize) -> Vec<DataType> {
        let mut types = vec![DataType::Null; num_columns];

        for row in rows {
            for (i, field) in row.iter().enumerate().take(num_columns) {
                let inferred = self.infer_single_type(field);
                types[i] = self.merge_types(&types[i], &inferred);
            }
        }

        // All-empty columns are stored as text
        for dtype in &mut types {
            if *dtype == DataType::Null {
                *dtype = DataType::Text;
            }
        }

        types
    }

    fn infer_single_type(&self, field: &RawField) -> DataType {
        if field.is_null() {
            return DataType::Null;
        }
        let value = field.text.as_str();

        if value.parse::<i64>().is_ok() {
            return DataType::Integer;
        }

        if value.parse::<f64>().is_ok() {
            return DataType::Float;
        }

        DataType::Text
    }

    fn merge_types(&self, current: &DataType, new: &DataType) -> DataType {
        match (current, new) {
            (DataType::Null, other) | (other, DataType::Null) => *other,
            (DataType::Integer, DataType::Float) | (DataType::Float, DataType::Integer) => DataType::Float,
            (a, b) if a == b => *a,
            _ => DataType::Text,
        }
    }

    fn parse_value(&self, field: &RawField, dtype: &DataType) -> Value {
        if field.is_null() {
            return Value::Null;
        }
        let value = field.text.as_str();

        match dtype {
            DataType::Integer => value.parse::<i64>().map(Value::Integer).unwrap_or(Value::Null),
            DataType::Float => value.parse::<f64>().map(Value::Float).unwrap_or(Value::Null),
            DataType::Text | DataType::Blob => Value::Text(value.to_string()),
            DataType::Null => Value::Null,
        }
    }
}

/// One field as read from the file, before type inference.
#[derive(Debug, Clone, Default, PartialEq)]
struct RawField {
    text: String,
    quoted: bool,
}

impl RawField {
    fn finish(self) -> Self {
        if self.quoted {
            self
        } else {
            Self {
                text: self.text.trim().to_string(),
                quoted: false,
            }
        }
    }

    /// Only unquoted fields can spell NULL.
    fn is_null(&self) -> bool {
        !self.quoted && is_null_token(&self.text)
    }
}

/// Renames repeated headers `a, a, a` to `a, a.1, a.2`, skipping suffixes
/// that are already taken. SQLite column names ignore case, so matching does too.
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    // Lowercased name -> next suffix to try
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(headers.len());

    for name in headers {
        let key = name.to_lowercase();
        let candidate = match seen.get(&key).copied() {
            Some(mut n) => {
                while seen.contains_key(&format!("{}.{}", key, n)) {
                    n += 1;
                }
                seen.insert(key, n + 1);
                format!("{}.{}", name, n)
            }
            None => {
                seen.insert(key, 1);
                name
            }
        };
        seen.entry(candidate.to_lowercase()).or_insert(1);
        out.push(candidate);
    }

    out
}

fn is_null_token(value: &str) -> bool {
    let value = value.trim();
    value.is_empty()
        || value.eq_ignore_ascii_case("null")
        || value.eq_ignore_ascii_case("na")
        || value.eq_ignore_ascii_case("n/a")
}

/// Serializes a [`Table`] as delimited text. NULL becomes an empty field and
/// blobs are written as lowercase hex.
#[derive(Debug, Clone)]
pub struct CsvWriter {
    delimiter: char,
    index_column: bool,
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvWriter {
    pub fn new() -> Self {
        Self {
            delimiter: ',',
            index_column: false,
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Prepend an unnamed 0-based row number column.
    pub fn with_index_column(mut self, index_column: bool) -> Self {
        self.index_column = index_column;
        self
    }

    pub fn write_table<W: Write>(&self, table: &Table, mut writer: W) -> io::Result<()> {
        let sep = self.delimiter.to_string();

        let mut header: Vec<String> = Vec::with_capacity(table.column_count() + 1);
        if self.index_column {
            header.push(String::new());
        }
        header.extend(table.schema.columns.iter().map(|c| self.escape(&c.name)));
        writeln!(writer, "{}", header.join(&sep))?;

        for (i, row) in table.rows.iter().enumerate() {
            let mut fields: Vec<String> = Vec::with_capacity(row.values.len() + 1);
            if self.index_column {
                fields.push(i.to_string());
            }
            fields.extend(row.values.iter().map(|v| self.format_value(v)));
            writeln!(writer, "{}", fields.join(&sep))?;
        }

        writer.flush()
    }

    pub fn to_bytes(&self, table: &Table) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_table(table, &mut buf)?;
        Ok(buf)
    }

    fn format_value(&self, value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::Integer(i) => i.to_string(),
            // Debug keeps a trailing ".0" so whole floats re-import as floats
            Value::Float(f) => format!("{:?}", f),
            Value::Text(s) if is_null_token(s) => format!("\"{}\"", s),
            Value::Text(s) => self.escape(s),
            Value::Blob(b) => b.iter().map(|byte| format!("{:02x}", byte)).collect(),
        }
    }

    fn escape(&self, s: &str) -> String {
        let needs_quotes = s.contains(self.delimiter)
            || s.contains('"')
            || s.contains('\n')
            || s.contains('\r')
            || s.trim() != s;
        if needs_quotes {
            format!("\"{}\"", s.replace('"', "\"\""))
        } else {
            s.to_string()
        }
    }
}
