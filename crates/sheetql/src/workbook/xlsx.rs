//! Office Open XML (`.xlsx`, `.xlsm`) reader.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

use super::cell::{
    CellValue, is_builtin_date_format, is_date_format_code, reference_to_index,
    serial_to_datetime_text,
};
use super::xml;
use super::{Sheet, SourceError, TabularSource};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const STYLES_PART: &str = "xl/styles.xml";

#[derive(Debug, Error)]
pub enum XlsxError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] ZipError),

    #[error("malformed xml: {0}")]
    Xml(String),

    #[error("missing workbook part `{0}`")]
    MissingPart(String),

    #[error("unresolvable xml reference `&{0};`")]
    BadReference(String),

    #[error("shared string index `{0}` is out of range")]
    SharedStringIndex(String),

    #[error("workbook declares no worksheets")]
    NoSheets,
}

impl XlsxError {
    pub(crate) fn xml(error: impl std::fmt::Display) -> Self {
        Self::Xml(error.to_string())
    }
}

#[derive(Debug, Clone)]
struct SheetEntry {
    name: String,
    part: String,
}

pub struct XlsxReader {
    path: PathBuf,
    archive: ZipArchive<File>,
    sheets: Vec<SheetEntry>,
    shared_strings: Vec<String>,
    date_styles: Vec<bool>,
    is_1904: bool,
}

impl XlsxReader {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        if !path.exists() {
            return Err(SourceError::NotFound {
                path: path.to_path_buf(),
            });
        }

        Self::load(path).map_err(|source| SourceError::Unreadable {
            path: path.to_path_buf(),
            source,
        })
    }

    fn load(path: &Path) -> Result<Self, XlsxError> {
        let mut archive = ZipArchive::new(File::open(path)?)?;
        let relationships = load_relationships(&mut archive)?;
        let (sheets, is_1904) = load_workbook(&mut archive, &relationships)?;
        if sheets.is_empty() {
            return Err(XlsxError::NoSheets);
        }
        let shared_strings = load_shared_strings(&mut archive)?;
        let date_styles = load_date_styles(&mut archive)?;

        Ok(Self {
            path: path.to_path_buf(),
            archive,
            sheets,
            shared_strings,
            date_styles,
            is_1904,
        })
    }

    fn parse_sheet(&mut self, entry: &SheetEntry) -> Result<Sheet, XlsxError> {
        let bytes = read_part(&mut self.archive, &entry.part)?
            .ok_or_else(|| XlsxError::MissingPart(entry.part.clone()))?;
        let cells = self.parse_cells(&bytes)?;
        Ok(assemble_sheet(&entry.name, cells))
    }

    fn parse_cells(&self, bytes: &[u8]) -> Result<Vec<(usize, usize, CellValue)>, XlsxError> {
        let mut reader = xml::reader(bytes);
        let mut cells = Vec::new();

        let mut next_row = 0usize;
        let mut row = 0usize;
        let mut next_col = 0usize;
        let mut cell = PendingCell::default();
        let mut in_value = false;
        let mut in_inline = false;
        let mut in_text = false;
        let mut in_phonetic = false;

        loop {
            match reader.read_event().map_err(XlsxError::xml)? {
                Event::Eof => break,
                Event::Start(event) => match event.local_name().as_ref() {
                    b"row" => {
                        row = match xml::attribute(&event, b"r")? {
                            Some(value) => value
                                .parse::<usize>()
                                .ok()
                                .and_then(|index| index.checked_sub(1))
                                .unwrap_or(next_row),
                            None => next_row,
                        };
                        next_col = 0;
                    }
                    b"c" => {
                        let (cell_row, cell_col) = xml::attribute(&event, b"r")?
                            .and_then(|reference| reference_to_index(&reference))
                            .unwrap_or((row, next_col));
                        next_col = cell_col + 1;
                        cell = PendingCell {
                            row: cell_row,
                            col: cell_col,
                            kind: xml::attribute(&event, b"t")?,
                            style: xml::attribute(&event, b"s")?
                                .and_then(|style| style.parse::<usize>().ok()),
                            value: String::new(),
                        };
                    }
                    b"v" => in_value = true,
                    b"is" => in_inline = true,
                    b"rPh" => in_phonetic = true,
                    b"t" if in_inline && !in_phonetic => in_text = true,
                    _ => {}
                },
                Event::End(event) => match event.local_name().as_ref() {
                    b"row" => next_row = row + 1,
                    b"c" => {
                        let pending = std::mem::take(&mut cell);
                        let value = self.cell_value(&pending)?;
                        if !value.is_null() {
                            cells.push((pending.row, pending.col, value));
                        }
                    }
                    b"v" => in_value = false,
                    b"is" => in_inline = false,
                    b"rPh" => in_phonetic = false,
                    b"t" => in_text = false,
                    _ => {}
                },
                Event::Text(text) if in_value || in_text => xml::push_text(&mut cell.value, &text)?,
                Event::CData(text) if in_value || in_text => {
                    xml::push_cdata(&mut cell.value, &text)?;
                }
                Event::GeneralRef(reference) if in_value || in_text => {
                    xml::push_reference(&mut cell.value, &reference)?;
                }
                _ => {}
            }
        }

        Ok(cells)
    }

    fn cell_value(&self, cell: &PendingCell) -> Result<CellValue, XlsxError> {
        let raw = cell.value.as_str();
        let value = match cell.kind.as_deref() {
            Some("s") => {
                let text = raw
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| self.shared_strings.get(index))
                    .ok_or_else(|| XlsxError::SharedStringIndex(raw.to_string()))?;
                CellValue::Text(text.clone())
            }
            Some("inlineStr" | "str" | "d") => CellValue::Text(raw.to_string()),
            Some("b") => CellValue::Boolean(matches!(raw.trim(), "1" | "true" | "TRUE")),
            Some("e") => CellValue::Empty,
            _ if raw.trim().is_empty() => CellValue::Empty,
            _ => match raw.trim().parse::<f64>() {
                Ok(number) if self.is_date_style(cell.style) => {
                    serial_to_datetime_text(number, self.is_1904)
                        .map_or(CellValue::Number(number), CellValue::Text)
                }
                Ok(number) => CellValue::Number(number),
                Err(_) => CellValue::Text(raw.to_string()),
            },
        };
        Ok(value)
    }

    fn is_date_style(&self, style: Option<usize>) -> bool {
        style
            .and_then(|index| self.date_styles.get(index))
            .copied()
            .unwrap_or(false)
    }
}

impl TabularSource for XlsxReader {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|entry| entry.name.clone()).collect()
    }

    fn read_sheet(&mut self, name: &str) -> Result<Sheet, SourceError> {
        let entry = self
            .sheets
            .iter()
            .find(|entry| entry.name == name)
            .cloned()
            .ok_or_else(|| SourceError::UnknownSheet {
                path: self.path.clone(),
                sheet: name.to_string(),
            })?;

        self.parse_sheet(&entry)
            .map_err(|source| SourceError::Unreadable {
                path: self.path.clone(),
                source,
            })
    }
}

#[derive(Debug, Default)]
struct PendingCell {
    row: usize,
    col: usize,
    kind: Option<String>,
    style: Option<usize>,
    value: String,
}

/// The first row holding a non-empty cell is the header; columns span the
/// leftmost to the rightmost non-empty cell of the sheet.
fn assemble_sheet(name: &str, cells: Vec<(usize, usize, CellValue)>) -> Sheet {
    let mut rows = BTreeMap::<usize, BTreeMap<usize, CellValue>>::new();
    for (row, col, value) in cells {
        rows.entry(row).or_default().insert(col, value);
    }

    let first_col = rows.values().filter_map(|row| row.keys().next()).min().copied();
    let last_col = rows.values().filter_map(|row| row.keys().next_back()).max().copied();
    let (Some(first_col), Some(last_col)) = (first_col, last_col) else {
        return Sheet::new(name, Vec::new(), Vec::new());
    };
    let Some((_, header)) = rows.pop_first() else {
        return Sheet::new(name, Vec::new(), Vec::new());
    };

    let columns = (first_col..=last_col)
        .map(|col| {
            header
                .get(&col)
                .and_then(CellValue::to_text)
                .unwrap_or_else(|| format!("Unnamed: {}", col - first_col))
        })
        .collect::<Vec<_>>();

    let data = rows
        .into_values()
        .map(|mut row| {
            (first_col..=last_col)
                .map(|col| row.remove(&col).unwrap_or(CellValue::Empty))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    Sheet::new(name, columns, data)
}

/// Case-insensitive part lookup; `None` when the archive lacks the part.
fn read_part(archive: &mut ZipArchive<File>, name: &str) -> Result<Option<Vec<u8>>, XlsxError> {
    let wanted = name.replace('\\', "/");
    let Some(actual) = archive
        .file_names()
        .find(|candidate| candidate.eq_ignore_ascii_case(&wanted))
        .map(ToString::to_string)
    else {
        return Ok(None);
    };

    let mut file = match archive.by_name(&actual) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(error) => return Err(error.into()),
    };
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(Some(bytes))
}

fn load_relationships(archive: &mut ZipArchive<File>) -> Result<HashMap<String, String>, XlsxError> {
    let bytes = read_part(archive, WORKBOOK_RELS_PART)?
        .ok_or_else(|| XlsxError::MissingPart(WORKBOOK_RELS_PART.to_string()))?;
    let mut reader = xml::reader(&bytes);
    let mut relationships = HashMap::new();

    loop {
        match reader.read_event().map_err(XlsxError::xml)? {
            Event::Eof => break,
            Event::Start(event) if event.local_name().as_ref() == b"Relationship" => {
                let id = xml::attribute(&event, b"Id")?;
                let target = xml::attribute(&event, b"Target")?;
                let is_worksheet = xml::attribute(&event, b"Type")?
                    .is_none_or(|kind| kind.ends_with("/worksheet"));
                if let (true, Some(id), Some(target)) = (is_worksheet, id, target) {
                    relationships.insert(id, to_part_path(&target));
                }
            }
            _ => {}
        }
    }

    Ok(relationships)
}

fn load_workbook(
    archive: &mut ZipArchive<File>,
    relationships: &HashMap<String, String>,
) -> Result<(Vec<SheetEntry>, bool), XlsxError> {
    let bytes = read_part(archive, WORKBOOK_PART)?
        .ok_or_else(|| XlsxError::MissingPart(WORKBOOK_PART.to_string()))?;
    let mut reader = xml::reader(&bytes);
    let mut sheets = Vec::new();
    let mut is_1904 = false;

    loop {
        match reader.read_event().map_err(XlsxError::xml)? {
            Event::Eof => break,
            Event::Start(event) => match event.local_name().as_ref() {
                b"sheet" => {
                    let name = xml::attribute(&event, b"name")?;
                    let id = xml::attribute(&event, b"id")?;
                    if let Some((name, part)) = name.zip(id.and_then(|id| relationships.get(&id)))
                    {
                        sheets.push(SheetEntry {
                            name,
                            part: part.clone(),
                        });
                    }
                }
                b"workbookPr" => {
                    is_1904 = xml::attribute(&event, b"date1904")?
                        .is_some_and(|value| value == "1" || value.eq_ignore_ascii_case("true"));
                }
                _ => {}
            },
            _ => {}
        }
    }

    Ok((sheets, is_1904))
}

fn load_shared_strings(archive: &mut ZipArchive<File>) -> Result<Vec<String>, XlsxError> {
    let Some(bytes) = read_part(archive, SHARED_STRINGS_PART)? else {
        return Ok(Vec::new());
    };
    let mut reader = xml::reader(&bytes);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event().map_err(XlsxError::xml)? {
            Event::Eof => break,
            Event::Start(event) => match event.local_name().as_ref() {
                b"si" => current.clear(),
                b"rPh" => in_phonetic = true,
                b"t" if !in_phonetic => in_text = true,
                _ => {}
            },
            Event::End(event) => match event.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"rPh" => in_phonetic = false,
                b"t" => in_text = false,
                _ => {}
            },
            Event::Text(text) if in_text => xml::push_text(&mut current, &text)?,
            Event::CData(text) if in_text => xml::push_cdata(&mut current, &text)?,
            Event::GeneralRef(reference) if in_text => {
                xml::push_reference(&mut current, &reference)?;
            }
            _ => {}
        }
    }

    Ok(strings)
}

/// One flag per `cellXfs` entry: whether numbers in that style are dates.
fn load_date_styles(archive: &mut ZipArchive<File>) -> Result<Vec<bool>, XlsxError> {
    let Some(bytes) = read_part(archive, STYLES_PART)? else {
        return Ok(Vec::new());
    };
    let mut reader = xml::reader(&bytes);
    let mut custom_formats = HashMap::<u32, bool>::new();
    let mut style_formats = Vec::<u32>::new();
    let mut in_cell_xfs = false;

    loop {
        match reader.read_event().map_err(XlsxError::xml)? {
            Event::Eof => break,
            Event::Start(event) => match event.local_name().as_ref() {
                b"numFmt" => {
                    let id = xml::attribute(&event, b"numFmtId")?
                        .and_then(|id| id.parse::<u32>().ok());
                    let code = xml::attribute(&event, b"formatCode")?;
                    if let Some((id, code)) = id.zip(code) {
                        custom_formats.insert(id, is_date_format_code(&code));
                    }
                }
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => {
                    let id = xml::attribute(&event, b"numFmtId")?
                        .and_then(|id| id.parse::<u32>().ok())
                        .unwrap_or(0);
                    style_formats.push(id);
                }
                _ => {}
            },
            Event::End(event) if event.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
            _ => {}
        }
    }

    Ok(style_formats
        .into_iter()
        .map(|id| {
            custom_formats
                .get(&id)
                .copied()
                .unwrap_or_else(|| is_builtin_date_format(id))
        })
        .collect())
}

fn to_part_path(target: &str) -> String {
    let target = target.replace('\\', "/");
    if let Some(stripped) = target.strip_prefix('/') {
        stripped.to_string()
    } else if target.starts_with("xl/") {
        target
    } else {
        format!("xl/{target}")
    }
}
