use std::fmt::Write as _;

use serde_json::Value;

use crate::completion::{ChatMessage, Prompt};
use crate::introspect::{SchemaSnapshot, TableSnapshot};

pub const SYSTEM_INSTRUCTION: &str =
    "You are a SQL expert. Generate only SQL queries without any explanations or comments.";

const SAMPLE_VALUE_MAX_CHARS: usize = 80;

/// Worked examples over partially-known descriptive values. Table and column
/// names are illustrative; the model is told to use the schema above.
const WORKED_EXAMPLES: &[(&str, &str)] = &[
    (
        "What is the IP address of Camp East?",
        "SELECT REPLACE(REPLACE(address, 'http://', ''), '/', '') AS ip FROM hardware WHERE name LIKE 'Camp East%';",
    ),
    (
        "Show me all cameras in Camp East",
        "SELECT name, channel FROM cameras WHERE hardware LIKE 'Camp East%' ORDER BY channel;",
    ),
    (
        "What is the firmware version of Camp East?",
        "SELECT firmwareversion FROM hardware WHERE name LIKE 'Camp East%';",
    ),
    (
        "Which cameras mention door 109?",
        "SELECT name FROM cameras WHERE name LIKE '%Door 109%';",
    ),
];

/// Builds the full prompt: system message, instruction, then the raw question.
#[must_use]
pub fn build_prompt(question: &str, snapshot: &SchemaSnapshot) -> Prompt {
    Prompt::new(vec![
        ChatMessage::system(SYSTEM_INSTRUCTION),
        ChatMessage::user(build_instruction(snapshot)),
        ChatMessage::user(question.trim()),
    ])
}

#[must_use]
pub fn build_instruction(snapshot: &SchemaSnapshot) -> String {
    let mut instruction = String::from("Given this database schema:\n");
    instruction.push_str(&schema_context(snapshot));
    instruction.push_str(
        "\nConvert the natural language question in the next message to a single SQLite query.\n\
         \nImportant notes:\n\
         - Return ONLY the SQL query, no explanations\n\
         - Use only the tables and columns listed above\n\
         - Names and descriptions are often only partially known; prefer LIKE with '%' wildcards over exact equality\n\
         - Example queries (table names are illustrative):\n",
    );
    for (question, sql) in WORKED_EXAMPLES {
        let _ = writeln!(instruction, "  * \"{question}\" ->\n    {sql}");
    }
    instruction
}

/// Tables in snapshot order, each with typed columns, row count and samples.
#[must_use]
pub fn schema_context(snapshot: &SchemaSnapshot) -> String {
    let mut context = String::from("Database tables and their columns:\n");
    if snapshot.is_empty() {
        context.push_str("\n(no tables)\n");
        return context;
    }

    for table in &snapshot.tables {
        context.push('\n');
        write_table(&mut context, table);
    }
    context
}

fn write_table(context: &mut String, table: &TableSnapshot) {
    let columns = table
        .columns
        .iter()
        .map(|column| match &column.declared_type {
            Some(declared) => format!("{} ({declared})", column.name),
            None => column.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(context, "Table '{}':", table.name);
    let _ = writeln!(context, "Columns: {columns}");
    let _ = writeln!(context, "Row count: {}", table.row_count);

    if table.samples.is_empty() {
        return;
    }
    context.push_str("Sample data:\n");
    for sample in &table.samples {
        let fields = table
            .columns
            .iter()
            .zip(sample)
            .map(|(column, value)| format!("{}: {}", column.name, render_sample_value(value)))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(context, "  - {fields}");
    }
}

fn render_sample_value(value: &Value) -> String {
    let rendered = match value {
        Value::Null => "NULL".to_string(),
        Value::String(text) => text.replace(['\r', '\n'], " "),
        other => other.to_string(),
    };
    if rendered.chars().count() <= SAMPLE_VALUE_MAX_CHARS {
        return rendered;
    }
    let prefix = rendered.chars().take(SAMPLE_VALUE_MAX_CHARS).collect::<String>();
    format!("{prefix}...")
}
