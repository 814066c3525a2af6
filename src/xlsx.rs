//! Row-level reader for OOXML spreadsheets (`.xlsx`).
//!
//! Reads one worksheet straight from the ZIP container with `quick-xml`:
//! shared strings, inline strings and numeric cells are resolved, cell
//! references (`B7`) place values in the right column, and the first row
//! supplies the column headers. Blank rows are skipped.

use std::collections::BTreeMap;
use std::io::Read;

use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

use stock_lookup_core::{RawRecord, RawValue};

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 200 * 1024 * 1024;
/// Maximum rows read from one sheet, header included.
const MAX_ROWS: usize = 1_000_000;

/// Letters in the widest column reference a sheet may use (`XFD`).
const MAX_COLUMN_LETTERS: usize = 3;

const SHARED_STRINGS: &str = "xl/sharedStrings.xml";
const SHEET_PREFIX: &str = "xl/worksheets/sheet";

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("not a valid xlsx archive: {0}")]
    Zip(String),
    #[error("malformed sheet XML: {0}")]
    Xml(String),
    #[error("worksheet {index} not found (workbook has {available})")]
    SheetNotFound { index: usize, available: usize },
    #[error("ZIP entry {0} exceeds size limit")]
    EntryTooLarge(String),
    #[error("worksheet has no header row")]
    NoHeader,
}

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

/// Reads worksheet `sheet` (1-based) into header-keyed rows.
pub fn read_rows(bytes: &[u8], sheet: usize) -> Result<Vec<RawRecord>, SheetError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| SheetError::Zip(e.to_string()))?;

    let shared_strings = read_shared_strings(&mut archive)?;
    let sheet_names = list_worksheet_names(&archive);
    let name = sheet
        .checked_sub(1)
        .and_then(|i| sheet_names.get(i))
        .ok_or(SheetError::SheetNotFound {
            index: sheet,
            available: sheet_names.len(),
        })?
        .clone();

    let xml = read_zip_entry_bounded(&mut archive, &name)?;
    let grid = read_sheet_grid(&xml, &shared_strings)?;
    rows_from_grid(grid)
}

fn read_zip_entry_bounded(archive: &mut Archive<'_>, name: &str) -> Result<Vec<u8>, SheetError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| SheetError::Zip(e.to_string()))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| SheetError::Zip(e.to_string()))?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(SheetError::EntryTooLarge(name.to_string()));
    }
    Ok(out)
}

/// Shared string table; one entry per `<si>`, rich-text runs concatenated
/// and phonetic hints (`<rPh>`) dropped. Workbooks that only use inline
/// strings have no table at all.
fn read_shared_strings(archive: &mut Archive<'_>) -> Result<Vec<String>, SheetError> {
    if archive.index_for_name(SHARED_STRINGS).is_none() {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, SHARED_STRINGS)?;

    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    let mut in_phonetic = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => in_phonetic = true,
                b"t" => in_t = current.is_some() && !in_phonetic,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => {
                strings.push(String::new());
            }
            Ok(Event::Text(te)) if in_t => {
                if let Some(s) = current.as_mut() {
                    let text = te.unescape().map_err(|e| SheetError::Xml(e.to_string()))?;
                    s.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"rPh" => in_phonetic = false,
                b"si" => {
                    if let Some(s) = current.take() {
                        strings.push(s);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(SheetError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

fn list_worksheet_names(archive: &Archive<'_>) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(SHEET_PREFIX) && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(SHEET_PREFIX)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Zero-based column index from a cell reference such as `"AB12"`.
///
/// `None` for references without letters or wider than `XFD`; the caller
/// then places the cell after the previous one.
fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .map(|b| b.to_ascii_uppercase())
        .collect();
    if letters.is_empty() || letters.len() > MAX_COLUMN_LETTERS {
        return None;
    }
    let mut idx = 0usize;
    for b in letters {
        idx = idx * 26 + (b - b'A' + 1) as usize;
    }
    Some(idx - 1)
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(a.value.as_ref()).into_owned())
}

struct CellState {
    column: usize,
    kind: Option<String>,
    text: String,
}

fn finish_cell(cell: CellState, shared_strings: &[String]) -> RawValue {
    let raw = cell.text.trim();
    match cell.kind.as_deref() {
        Some("s") => raw
            .parse::<usize>()
            .ok()
            .and_then(|i| shared_strings.get(i))
            .map(|s| RawValue::Text(s.clone()))
            .unwrap_or(RawValue::Empty),
        Some("inlineStr") | Some("str") => RawValue::Text(raw.to_string()),
        Some("b") => RawValue::Text(if raw == "1" { "TRUE" } else { "FALSE" }.to_string()),
        Some("e") => RawValue::Empty,
        _ if raw.is_empty() => RawValue::Empty,
        _ => raw
            .parse::<f64>()
            .map(RawValue::Number)
            .unwrap_or_else(|_| RawValue::Text(raw.to_string())),
    }
}

/// Sheet contents as rows of `(column index, value)`.
fn read_sheet_grid(
    xml: &[u8],
    shared_strings: &[String],
) -> Result<Vec<BTreeMap<usize, RawValue>>, SheetError> {
    let mut rows = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut row: Option<BTreeMap<usize, RawValue>> = None;
    let mut cell: Option<CellState> = None;
    let mut next_column = 0usize;
    let mut capture = false;

    loop {
        if rows.len() >= MAX_ROWS {
            tracing::warn!(max_rows = MAX_ROWS, "worksheet truncated");
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    row = Some(BTreeMap::new());
                    next_column = 0;
                }
                b"c" => {
                    let column = attribute(&e, b"r")
                        .and_then(|r| column_index(&r))
                        .unwrap_or(next_column);
                    next_column = column + 1;
                    cell = Some(CellState {
                        column,
                        kind: attribute(&e, b"t"),
                        text: String::new(),
                    });
                }
                b"v" | b"t" => capture = cell.is_some(),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"row" => rows.push(BTreeMap::new()),
                b"c" => {
                    next_column = attribute(&e, b"r")
                        .and_then(|r| column_index(&r))
                        .map_or(next_column + 1, |c| c + 1);
                }
                _ => {}
            },
            Ok(Event::Text(te)) if capture => {
                if let Some(c) = cell.as_mut() {
                    let text = te.unescape().map_err(|e| SheetError::Xml(e.to_string()))?;
                    c.text.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => capture = false,
                b"c" => {
                    if let (Some(c), Some(r)) = (cell.take(), row.as_mut()) {
                        let column = c.column;
                        r.insert(column, finish_cell(c, shared_strings));
                    }
                }
                b"row" => {
                    if let Some(r) = row.take() {
                        rows.push(r);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(SheetError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(rows)
}

fn rows_from_grid(grid: Vec<BTreeMap<usize, RawValue>>) -> Result<Vec<RawRecord>, SheetError> {
    let mut grid = grid.into_iter().skip_while(|r| {
        r.values()
            .all(|v| matches!(v, RawValue::Empty) || v.to_text().is_empty())
    });
    let header_row = grid.next().ok_or(SheetError::NoHeader)?;
    let headers: Vec<(usize, String)> = header_row
        .into_iter()
        .map(|(col, v)| (col, v.to_text()))
        .filter(|(_, name)| !name.is_empty())
        .collect();
    if headers.is_empty() {
        return Err(SheetError::NoHeader);
    }

    let mut records = Vec::new();
    for mut cells in grid {
        let mut record = RawRecord::new();
        for (col, name) in &headers {
            record.push(name.clone(), cells.remove(col).unwrap_or(RawValue::Empty));
        }
        if !record.is_blank() {
            records.push(record);
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_xlsx(sheet_xml: &str, shared: Option<&str>) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            let opts = zip::write::SimpleFileOptions::default();
            if let Some(sst) = shared {
                zip.start_file(SHARED_STRINGS, opts).unwrap();
                zip.write_all(sst.as_bytes()).unwrap();
            }
            zip.start_file("xl/worksheets/sheet1.xml", opts).unwrap();
            zip.write_all(sheet_xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    fn sheet(rows: &str) -> String {
        format!(
            "<?xml version=\"1.0\"?><worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>{}</sheetData></worksheet>",
            rows
        )
    }

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A1"), Some(0));
        assert_eq!(column_index("B7"), Some(1));
        assert_eq!(column_index("Z3"), Some(25));
        assert_eq!(column_index("AA10"), Some(26));
        assert_eq!(column_index("ab2"), Some(27));
        assert_eq!(column_index("12"), None);
        assert_eq!(column_index("XFD1"), Some(16_383));
        assert_eq!(column_index("AAAAAAAAAAAAAAAA1"), None);
    }

    #[test]
    fn test_oversized_reference_falls_back_to_position() {
        let xml = sheet(
            "<row r=\"1\"><c r=\"A1\" t=\"inlineStr\"><is><t>code</t></is></c><c r=\"B1\" t=\"inlineStr\"><is><t>qty</t></is></c></row>\
             <row r=\"2\"><c r=\"A2\" t=\"inlineStr\"><is><t>X-1</t></is></c><c r=\"AAAAAAAAAAAAAAAA2\"><v>3</v></c></row>",
        );
        let rows = read_rows(&build_xlsx(&xml, None), 1).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("code"), Some(&RawValue::Text("X-1".into())));
        assert_eq!(rows[0].get("qty"), Some(&RawValue::Number(3.0)));
    }

    #[test]
    fn test_reads_shared_and_numeric_cells() {
        let sst = "<sst><si><t>Материал</t></si><si><t>Наименование</t></si><si><r><t>Стальной </t></r><r><t>болт</t></r></si></sst>";
        let xml = sheet(
            "<row r=\"1\"><c r=\"A1\" t=\"s\"><v>0</v></c><c r=\"B1\" t=\"s\"><v>1</v></c></row>\
             <row r=\"2\"><c r=\"A2\"><v>100234</v></c><c r=\"B2\" t=\"s\"><v>2</v></c></row>",
        );
        let rows = read_rows(&build_xlsx(&xml, Some(sst)), 1).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("материал"), Some(&RawValue::Number(100234.0)));
        assert_eq!(
            rows[0].get("наименование"),
            Some(&RawValue::Text("Стальной болт".into()))
        );
    }

    #[test]
    fn test_inline_strings_and_sparse_cells() {
        let xml = sheet(
            "<row r=\"1\"><c r=\"A1\" t=\"inlineStr\"><is><t>code</t></is></c><c r=\"C1\" t=\"inlineStr\"><is><t>qty</t></is></c></row>\
             <row r=\"2\"><c r=\"C2\"><v>4.5</v></c></row>\
             <row r=\"3\"/>\
             <row r=\"4\"><c r=\"A4\" t=\"inlineStr\"><is><t>X-1</t></is></c></row>",
        );
        let rows = read_rows(&build_xlsx(&xml, None), 1).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("code"), Some(&RawValue::Empty));
        assert_eq!(rows[0].get("qty"), Some(&RawValue::Number(4.5)));
        assert_eq!(rows[1].get("code"), Some(&RawValue::Text("X-1".into())));
        assert_eq!(rows[1].get("qty"), Some(&RawValue::Empty));
    }

    #[test]
    fn test_missing_sheet() {
        let xml = sheet("<row r=\"1\"><c r=\"A1\" t=\"inlineStr\"><is><t>a</t></is></c></row>");
        let err = read_rows(&build_xlsx(&xml, None), 2).unwrap_err();
        assert!(matches!(
            err,
            SheetError::SheetNotFound {
                index: 2,
                available: 1
            }
        ));
    }

    #[test]
    fn test_empty_sheet_has_no_header() {
        let err = read_rows(&build_xlsx(&sheet(""), None), 1).unwrap_err();
        assert!(matches!(err, SheetError::NoHeader));
    }

    #[test]
    fn test_not_a_zip() {
        let err = read_rows(b"not a zip", 1).unwrap_err();
        assert!(matches!(err, SheetError::Zip(_)));
    }
}
