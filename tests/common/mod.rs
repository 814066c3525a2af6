//! Shared fixtures: a minimal `.xlsx` writer and the stock report used by
//! the integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

pub enum Cell {
    Text(&'static str),
    Owned(String),
    Number(f64),
    Blank,
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn column_letter(idx: usize) -> String {
    let mut n = idx + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap()
}

/// Writes a single-sheet workbook with inline strings.
pub fn write_xlsx(path: &Path, rows: &[Vec<Cell>]) {
    let mut sheet = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>",
    );
    for (r, row) in rows.iter().enumerate() {
        sheet.push_str(&format!("<row r=\"{}\">", r + 1));
        for (c, cell) in row.iter().enumerate() {
            let reference = format!("{}{}", column_letter(c), r + 1);
            match cell {
                Cell::Text(s) => sheet.push_str(&format!(
                    "<c r=\"{}\" t=\"inlineStr\"><is><t>{}</t></is></c>",
                    reference,
                    escape(s)
                )),
                Cell::Owned(s) => sheet.push_str(&format!(
                    "<c r=\"{}\" t=\"inlineStr\"><is><t>{}</t></is></c>",
                    reference,
                    escape(s)
                )),
                Cell::Number(n) => {
                    sheet.push_str(&format!("<c r=\"{}\"><v>{}</v></c>", reference, n))
                }
                Cell::Blank => {}
            }
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");

    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let opts = zip::write::SimpleFileOptions::default();
    zip.start_file("[Content_Types].xml", opts).unwrap();
    zip.write_all(b"<?xml version=\"1.0\"?><Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\"/>")
        .unwrap();
    zip.start_file("xl/worksheets/sheet1.xml", opts).unwrap();
    zip.write_all(sheet.as_bytes()).unwrap();
    zip.finish().unwrap();
}

pub fn header() -> Vec<Cell> {
    vec![
        Cell::Text("Материал"),
        Cell::Text("Наименование"),
        Cell::Text("В наличии"),
        Cell::Text("В резерве"),
    ]
}

/// 16 products (15 in stock) plus one summary line without a code.
///
/// - `100234` Болт стальной М8, 25 on hand
/// - `100235` Болт оцинкованный М10, out of stock
/// - `A-77` Гайка шестигранная М8, 12.5 on hand
/// - `200100` Шайба плоская, 7 on hand
/// - `V001`..`V012` Винт самонарезающий, 3 on hand each
pub fn stock_report() -> Vec<Vec<Cell>> {
    let mut rows = vec![
        header(),
        vec![
            Cell::Number(100234.0),
            Cell::Text("Болт стальной М8"),
            Cell::Number(25.0),
            Cell::Number(5.0),
        ],
        vec![
            Cell::Number(100235.0),
            Cell::Text("Болт оцинкованный М10"),
            Cell::Number(0.0),
            Cell::Number(2.0),
        ],
        vec![
            Cell::Text("A-77"),
            Cell::Text("Гайка шестигранная М8"),
            Cell::Number(12.5),
            Cell::Blank,
        ],
        vec![
            Cell::Number(200100.0),
            Cell::Text("Шайба плоская"),
            Cell::Text("7"),
            Cell::Number(1.0),
        ],
    ];
    for i in 1..=12 {
        rows.push(vec![
            Cell::Owned(format!("V{:03}", i)),
            Cell::Owned(format!("Винт самонарезающий {}", i)),
            Cell::Number(3.0),
            Cell::Number(0.0),
        ]);
    }
    rows.push(vec![
        Cell::Blank,
        Cell::Text("Итого"),
        Cell::Number(80.5),
        Cell::Number(8.0),
    ]);
    rows
}

/// Config pointing at `catalog` and binding to `port`.
pub fn config_toml(catalog: &Path, port: u16) -> String {
    format!(
        r#"[catalog]
path = "{}"

[search]
min_token_length = 3
language = "russian"

[pagination]
page_size = 10

[server]
bind = "127.0.0.1:{}"
"#,
        catalog.display(),
        port
    )
}
