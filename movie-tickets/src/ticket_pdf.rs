use crate::error::AppError;
use crate::model::Ticket;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

// Layout is given in millimetres from the top-left corner of an A4 page.
const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const POINTS_PER_MM: f32 = 72.0 / 25.4;
const MM_PER_POINT: f32 = 25.4 / 72.0;

type Rgb = (u8, u8, u8);

const BACKGROUND: Rgb = (245, 245, 245);
const HEADER: Rgb = (30, 30, 30);
const SEAT_BOX: Rgb = (220, 20, 60);
const WHITE: Rgb = (255, 255, 255);
const BLACK: Rgb = (0, 0, 0);
const FOOTER: Rgb = (120, 120, 120);

#[derive(Clone, Copy)]
enum Font {
    Regular,
    Bold,
    Italic,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Italic => "F3",
        }
    }

    /// Rough average glyph width as a fraction of the font size.
    fn glyph_width(self) -> f32 {
        match self {
            Font::Bold => 0.58,
            _ => 0.5,
        }
    }
}

// Windows-1252 code points outside Latin-1.
const WIN_ANSI_EXTRAS: [(char, u8); 27] = [
    ('€', 0x80), ('‚', 0x82), ('ƒ', 0x83), ('„', 0x84), ('…', 0x85), ('†', 0x86),
    ('‡', 0x87), ('ˆ', 0x88), ('‰', 0x89), ('Š', 0x8a), ('‹', 0x8b), ('Œ', 0x8c),
    ('Ž', 0x8e), ('‘', 0x91), ('’', 0x92), ('“', 0x93), ('”', 0x94), ('•', 0x95),
    ('–', 0x96), ('—', 0x97), ('˜', 0x98), ('™', 0x99), ('š', 0x9a), ('›', 0x9b),
    ('œ', 0x9c), ('ž', 0x9e), ('Ÿ', 0x9f),
];

/// Encodes `text` for the standard fonts. Characters WinAnsi lacks become `?`.
fn win_ansi(text: &str) -> Object {
    let bytes = text
        .chars()
        .map(|ch| match u32::from(ch) {
            code @ (0x20..=0x7e | 0xa0..=0xff) => code as u8,
            _ => WIN_ANSI_EXTRAS
                .iter()
                .find(|(extra, _)| *extra == ch)
                .map_or(b'?', |(_, byte)| *byte),
        })
        .collect();
    Object::String(bytes, StringFormat::Literal)
}

fn real(value: f32) -> Object {
    Object::Real(value.into())
}

fn pt(mm: f32) -> Object {
    real(mm * POINTS_PER_MM)
}

fn color(rgb: Rgb) -> Vec<Object> {
    let (r, g, b) = rgb;
    vec![
        real(f32::from(r) / 255.0),
        real(f32::from(g) / 255.0),
        real(f32::from(b) / 255.0),
    ]
}

#[derive(Default)]
struct Sheet {
    operations: Vec<Operation>,
}

impl Sheet {
    fn fill_rect(&mut self, rgb: Rgb, x: f32, top: f32, width: f32, height: f32) {
        self.operations.push(Operation::new("rg", color(rgb)));
        self.operations.push(Operation::new(
            "re",
            vec![pt(x), pt(PAGE_HEIGHT - top - height), pt(width), pt(height)],
        ));
        self.operations.push(Operation::new("f", vec![]));
    }

    fn rule(&mut self, x1: f32, x2: f32, y: f32) {
        self.operations.push(Operation::new("RG", color(BLACK)));
        self.operations.push(Operation::new("w", vec![real(0.6)]));
        self.operations
            .push(Operation::new("m", vec![pt(x1), pt(PAGE_HEIGHT - y)]));
        self.operations
            .push(Operation::new("l", vec![pt(x2), pt(PAGE_HEIGHT - y)]));
        self.operations.push(Operation::new("S", vec![]));
    }

    /// Writes `text` vertically centred in a cell of `height` starting at `top`.
    #[allow(clippy::too_many_arguments)]
    fn text(&mut self, font: Font, size: f32, rgb: Rgb, x: f32, top: f32, height: f32, text: &str) {
        let baseline = top + height / 2.0 + size * MM_PER_POINT * 0.35;
        self.operations.push(Operation::new("BT", vec![]));
        self.operations.push(Operation::new("rg", color(rgb)));
        self.operations.push(Operation::new(
            "Tf",
            vec![font.resource().into(), real(size)],
        ));
        self.operations
            .push(Operation::new("Td", vec![pt(x), pt(PAGE_HEIGHT - baseline)]));
        self.operations
            .push(Operation::new("Tj", vec![win_ansi(text)]));
        self.operations.push(Operation::new("ET", vec![]));
    }

    #[allow(clippy::too_many_arguments)]
    fn centered_text(
        &mut self,
        font: Font,
        size: f32,
        rgb: Rgb,
        x: f32,
        top: f32,
        width: f32,
        height: f32,
        text: &str,
    ) {
        let text_width = text_width(font, size, text);
        let left = x + ((width - text_width) / 2.0).max(0.0);
        self.text(font, size, rgb, left, top, height, text);
    }

    fn into_pdf(self) -> Result<Vec<u8>, AppError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut fonts = lopdf::Dictionary::new();
        for (resource, base_font) in [
            ("F1", "Helvetica"),
            ("F2", "Helvetica-Bold"),
            ("F3", "Helvetica-Oblique"),
        ] {
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => base_font,
                "Encoding" => "WinAnsiEncoding",
            });
            fonts.set(resource, font_id);
        }
        let resources_id = doc.add_object(dictionary! { "Font" => fonts });
        let content = Content {
            operations: self.operations,
        };
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
                "MediaBox" => vec![0.into(), 0.into(), pt(PAGE_WIDTH), pt(PAGE_HEIGHT)],
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
}

fn text_width(font: Font, size: f32, text: &str) -> f32 {
    text.chars().count() as f32 * size * font.glyph_width() * MM_PER_POINT
}

/// Splits the seat list into lines that fit the seat box.
fn seat_lines(seats: &[String], width: f32, font: Font, size: f32) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for seat in seats {
        let candidate = if current.is_empty() {
            seat.clone()
        } else {
            format!("{}, {}", current, seat)
        };
        if !current.is_empty() && text_width(font, size, &candidate) > width {
            lines.push(format!("{},", current));
            current = seat.clone();
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

pub fn render(ticket: &Ticket) -> Result<Vec<u8>, AppError> {
    let mut sheet = Sheet::default();
    sheet.fill_rect(BACKGROUND, 0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT);

    sheet.fill_rect(HEADER, 15.0, 20.0, 180.0, 25.0);
    sheet.centered_text(Font::Bold, 22.0, WHITE, 15.0, 26.0, 180.0, 10.0, "MOVIE E-TICKET");

    sheet.text(Font::Bold, 18.0, BLACK, 20.0, 55.0, 10.0, &ticket.movie);
    sheet.rule(20.0, 190.0, 68.0);

    let details = [
        format!("Customer : {}", ticket.username),
        format!("Screen : {}", ticket.screen),
        format!("Show Time : {}", ticket.show_time),
        format!("Payment : {}", ticket.payment),
        format!("Status : {}", ticket.status),
        format!("Amount : Rs. {}", ticket.amount),
        format!("Booked : {}", ticket.booked_at),
    ];
    for (row, line) in details.iter().enumerate() {
        sheet.text(Font::Regular, 14.0, BLACK, 25.0, 75.0 + 10.0 * row as f32, 10.0, line);
    }

    let seats = seat_lines(&ticket.seats, 56.0, Font::Bold, 16.0);
    let box_height = (10.0 * (seats.len() + 1) as f32 + 14.0).max(40.0);
    sheet.fill_rect(SEAT_BOX, 120.0, 75.0, 60.0, box_height);
    for (row, line) in std::iter::once("SEAT".to_owned()).chain(seats).enumerate() {
        let top = 82.0 + 10.0 * row as f32;
        sheet.centered_text(Font::Bold, 16.0, WHITE, 120.0, top, 60.0, 10.0, &line);
    }

    sheet.centered_text(
        Font::Italic,
        11.0,
        FOOTER,
        15.0,
        160.0,
        180.0,
        8.0,
        "Enjoy your movie | Movie Ticket Booking System",
    );
    sheet.into_pdf()
}

pub fn path(dir: &Path, booking_id: u64) -> PathBuf {
    dir.join(format!("ticket-{}.pdf", booking_id))
}

/// Renders the ticket, replaces its file atomically and returns the bytes.
///
/// Always re-rendered: booking ids restart with a fresh store, so an existing
/// file may belong to someone else.
pub fn write(dir: &Path, ticket: &Ticket) -> Result<Vec<u8>, AppError> {
    let bytes = render(ticket)?;
    fs::create_dir_all(dir)?;
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(&bytes)?;
    file.persist(path(dir, ticket.booking_id))
        .map_err(|err| err.error)?;
    Ok(bytes)
}
