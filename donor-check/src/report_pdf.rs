use crate::error::AppError;
use crate::model::Report;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

// A4 in points.
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 72;

const TITLE: &str = "Blood Donation Eligibility Report";
const TITLE_SIZE: i64 = 18;
const BODY_SIZE: i64 = 11;
const LINE_GAP: i64 = 22;

/// Latin-1 is the part of WinAnsi every viewer agrees on; the rest is `?`.
fn win_ansi(line: &str) -> Object {
    let bytes = line
        .chars()
        .map(|ch| match u32::from(ch) {
            code @ (0x20..=0x7e | 0xa0..=0xff) => code as u8,
            _ => b'?',
        })
        .collect();
    Object::String(bytes, StringFormat::Literal)
}

fn text(font: &str, size: i64, x: i64, y: i64, line: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![font.into(), size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![win_ansi(line)]),
        Operation::new("ET", vec![]),
    ]
}

fn fields(report: &Report) -> Vec<(&'static str, String)> {
    vec![
        ("Username", report.username.clone()),
        ("Age", report.age.to_string()),
        ("Weight", format!("{} kg", report.weight)),
        ("Blood group", report.blood_group.clone()),
        ("Gender", report.gender.clone()),
        ("Months since last donation", report.months.to_string()),
        ("Total donations", report.total.to_string()),
        ("Eligibility", report.eligibility.to_string()),
        ("Date", report.date.clone()),
    ]
}

pub fn render(report: &Report) -> Result<Vec<u8>, AppError> {
    // Title is centred using Helvetica-Bold's average glyph width.
    let title_width = TITLE.len() as i64 * TITLE_SIZE * 3 / 5;
    let mut operations = text(
        "F2",
        TITLE_SIZE,
        (PAGE_WIDTH - title_width) / 2,
        PAGE_HEIGHT - MARGIN,
        TITLE,
    );
    let mut y = PAGE_HEIGHT - MARGIN - 2 * LINE_GAP;
    for (label, value) in fields(report) {
        operations.extend(text("F2", BODY_SIZE, MARGIN, y, &format!("{}:", label)));
        operations.extend(text("F1", BODY_SIZE, MARGIN + 170, y, &value));
        y -= LINE_GAP;
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

pub fn path(dir: &Path, user_id: u64) -> PathBuf {
    dir.join(format!("report-{}.pdf", user_id))
}

/// Regenerates the user's report file and returns its contents. The file is
/// replaced atomically so a concurrent download never reads half of it.
pub fn write(dir: &Path, user_id: u64, report: &Report) -> Result<Vec<u8>, AppError> {
    let bytes = render(report)?;
    fs::create_dir_all(dir)?;
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(&bytes)?;
    file.persist(path(dir, user_id)).map_err(|err| err.error)?;
    Ok(bytes)
}
