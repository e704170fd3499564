#![allow(dead_code)]

use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use sheetql::config::{AppConfig, ConfigOverrides, resolve_app_config, resolve_runtime_paths};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}-{nanos}"))
}

/// Home, cwd and out directories under `temp`, created on disk.
pub struct TempLayout {
    pub root: PathBuf,
    pub home_dir: PathBuf,
    pub cwd: PathBuf,
    pub out_dir: PathBuf,
}

impl TempLayout {
    pub fn new(prefix: &str) -> Self {
        let root = unique_temp_dir(prefix);
        let layout = Self {
            home_dir: root.join("home"),
            cwd: root.join("cwd"),
            out_dir: root.join("out"),
            root,
        };
        for dir in [&layout.home_dir, &layout.cwd, &layout.out_dir] {
            std::fs::create_dir_all(dir).expect("temp dir should be creatable");
        }
        layout
    }

    pub fn config(&self) -> AppConfig {
        let paths = resolve_runtime_paths(&self.home_dir, &self.cwd, Some(&self.out_dir))
            .expect("runtime paths should resolve");
        resolve_app_config(paths, &ConfigOverrides::default(), None)
            .expect("config should resolve")
    }

    pub fn store_path(&self) -> PathBuf {
        self.out_dir.join("sheetql.sqlite")
    }

    /// Global runtime flags for the binary.
    pub fn runtime_args(&self) -> Vec<String> {
        vec![
            "--home-dir".to_string(),
            self.home_dir.display().to_string(),
            "--cwd".to_string(),
            self.cwd.display().to_string(),
            "--out-dir".to_string(),
            self.out_dir.display().to_string(),
        ]
    }
}

#[derive(Debug, Clone)]
pub enum Cell {
    Text(&'static str),
    Number(f64),
    Bool(bool),
    Blank,
}

pub fn text(value: &'static str) -> Cell {
    Cell::Text(value)
}

pub fn number(value: f64) -> Cell {
    Cell::Number(value)
}

/// Minimal `.xlsx` writer: inline strings, numbers and booleans, no styles.
#[derive(Debug, Default)]
pub struct XlsxFixture {
    sheets: Vec<(String, Vec<Vec<Cell>>)>,
}

impl XlsxFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet(mut self, name: &str, rows: Vec<Vec<Cell>>) -> Self {
        self.sheets.push((name.to_string(), rows));
        self
    }

    pub fn write(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("fixture dir should be creatable");
        }
        let file = std::fs::File::create(path).expect("fixture file should be creatable");
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

        let mut parts = vec![
            ("[Content_Types].xml".to_string(), self.content_types()),
            ("_rels/.rels".to_string(), ROOT_RELS.to_string()),
            ("xl/workbook.xml".to_string(), self.workbook_xml()),
            ("xl/_rels/workbook.xml.rels".to_string(), self.workbook_rels()),
        ];
        for (index, (_, rows)) in self.sheets.iter().enumerate() {
            parts.push((
                format!("xl/worksheets/sheet{}.xml", index + 1),
                worksheet_xml(rows),
            ));
        }

        for (name, body) in parts {
            zip.start_file(name.as_str(), options)
                .expect("zip entry should start");
            zip.write_all(body.as_bytes())
                .expect("zip entry should be writable");
        }
        zip.finish().expect("zip archive should finish");
    }

    fn content_types(&self) -> String {
        let mut overrides = String::new();
        for index in 1..=self.sheets.len() {
            let _ = write!(
                overrides,
                r#"<Override PartName="/xl/worksheets/sheet{index}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
            );
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>{overrides}</Types>"#
        )
    }

    fn workbook_xml(&self) -> String {
        let mut sheets = String::new();
        for (index, (name, _)) in self.sheets.iter().enumerate() {
            let id = index + 1;
            let _ = write!(
                sheets,
                r#"<sheet name="{}" sheetId="{id}" r:id="rId{id}"/>"#,
                escape(name)
            );
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>{sheets}</sheets></workbook>"#
        )
    }

    fn workbook_rels(&self) -> String {
        let mut relationships = String::new();
        for index in 1..=self.sheets.len() {
            let _ = write!(
                relationships,
                r#"<Relationship Id="rId{index}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{index}.xml"/>"#
            );
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{relationships}</Relationships>"#
        )
    }
}

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

fn worksheet_xml(rows: &[Vec<Cell>]) -> String {
    let mut data = String::new();
    for (row_index, row) in rows.iter().enumerate() {
        let row_number = row_index + 1;
        let _ = write!(data, r#"<row r="{row_number}">"#);
        for (col_index, cell) in row.iter().enumerate() {
            let reference = format!("{}{row_number}", column_letters(col_index));
            match cell {
                Cell::Text(value) => {
                    let _ = write!(
                        data,
                        r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        escape(value)
                    );
                }
                Cell::Number(value) => {
                    let _ = write!(data, r#"<c r="{reference}"><v>{value}</v></c>"#);
                }
                Cell::Bool(value) => {
                    let _ = write!(
                        data,
                        r#"<c r="{reference}" t="b"><v>{}</v></c>"#,
                        u8::from(*value)
                    );
                }
                Cell::Blank => {}
            }
        }
        data.push_str("</row>");
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{data}</sheetData></worksheet>"#
    )
}

fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).expect("column letters are ascii")
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// The hardware workbook used across the integration tests.
pub fn hardware_workbook() -> XlsxFixture {
    XlsxFixture::new()
        .sheet(
            "Camp East",
            vec![
                vec![text("Name"), text("Address")],
                vec![text("Camp East (10.101.112.109)"), text("http://10.101.112.109/")],
                vec![text("Camp East Annex"), text("http://10.101.112.110/")],
            ],
        )
        .sheet(
            "Cameras",
            vec![
                vec![text("Name"), text("Hardware"), text("Channel")],
                vec![
                    text("Camp East Classroom Door 109"),
                    text("Camp East (10.101.112.109)"),
                    number(1.0),
                ],
                vec![
                    text("Camp East Gate"),
                    text("Camp East (10.101.112.109)"),
                    number(2.0),
                ],
                vec![text("Unit 5 Lobby"), text("Unit 5 (10.5.0.2)"), number(1.0)],
            ],
        )
}
