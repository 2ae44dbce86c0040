use anyhow::{Result, anyhow};
use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
    Rect, Rgb,
};

use super::table::{Align, Cell, Rgb8, Table, palette};

const PAGE_WIDTH: f32 = 297.0;
const PAGE_HEIGHT: f32 = 210.0;
const MARGIN_X: f32 = 14.0;
const TITLE_Y: f32 = 15.0;
const TABLE_TOP: f32 = 20.0;
const BOTTOM_MARGIN: f32 = 10.0;
const CELL_PADDING: f32 = 1.0;
const LINE_WIDTH_PT: f32 = 0.3;
/// Average Helvetica glyph width relative to the font size.
const GLYPH_WIDTH_EM: f32 = 0.5;
const PT_TO_MM: f32 = 0.352_778;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

/// Renders `table` on landscape A4 pages with the dark register theme.
pub fn render(table: &Table) -> Result<Vec<u8>> {
    let (doc, page, layer) =
        PdfDocument::new(&table.title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| anyhow!("loading Helvetica: {e:?}"))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| anyhow!("loading Helvetica-Bold: {e:?}"))?,
    };

    let row_height = table.font_size * PT_TO_MM + 2.0 * CELL_PADDING + 1.5;

    let mut layer = doc.get_page(page).get_layer(layer);
    paint_background(&layer);
    draw_title(&layer, &fonts, &table.title);
    let mut top = TABLE_TOP;
    draw_header(&layer, &fonts, table, top, row_height);
    top += row_height;

    for row in &table.rows {
        if top + row_height > PAGE_HEIGHT - BOTTOM_MARGIN {
            layer = new_page(&doc);
            top = BOTTOM_MARGIN;
            draw_header(&layer, &fonts, table, top, row_height);
            top += row_height;
        }
        draw_row(&layer, &fonts, table, row, top, row_height);
        top += row_height;
    }

    doc.save_to_bytes()
        .map_err(|e| anyhow!("serializing PDF: {e:?}"))
}

fn new_page(doc: &PdfDocumentReference) -> PdfLayerReference {
    let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let layer = doc.get_page(page).get_layer(layer);
    paint_background(&layer);
    layer
}

fn color(rgb: Rgb8) -> Color {
    Color::Rgb(Rgb::new(
        rgb.0 as f32 / 255.0,
        rgb.1 as f32 / 255.0,
        rgb.2 as f32 / 255.0,
        None,
    ))
}

fn paint_background(layer: &PdfLayerReference) {
    layer.set_fill_color(color(palette::BACKGROUND));
    layer.add_rect(
        Rect::new(Mm(0.0), Mm(0.0), Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT)).with_mode(PaintMode::Fill),
    );
}

fn draw_title(layer: &PdfLayerReference, fonts: &Fonts, title: &str) {
    layer.set_fill_color(color(palette::TEXT));
    layer.use_text(title, 14.0, Mm(MARGIN_X), Mm(PAGE_HEIGHT - TITLE_Y), &fonts.regular);
}

fn draw_header(layer: &PdfLayerReference, fonts: &Fonts, table: &Table, top: f32, height: f32) {
    let mut x = MARGIN_X;
    for column in &table.columns {
        let cell = Cell {
            text: column.header.clone(),
            color: palette::TEXT,
            fill: palette::HEADER_FILL,
            bold: true,
            span: 1,
        };
        draw_cell(layer, fonts, &cell, column.align, table.font_size, x, top, column.width, height);
        x += column.width;
    }
}

fn draw_row(
    layer: &PdfLayerReference,
    fonts: &Fonts,
    table: &Table,
    row: &[Cell],
    top: f32,
    height: f32,
) {
    let mut x = MARGIN_X;
    let mut col = 0;
    for cell in row {
        let span = cell.span.max(1);
        let Some(columns) = table.columns.get(col..(col + span).min(table.columns.len())) else {
            break;
        };
        if columns.is_empty() {
            break;
        }
        let width: f32 = columns.iter().map(|c| c.width).sum();
        draw_cell(layer, fonts, cell, columns[0].align, table.font_size, x, top, width, height);
        x += width;
        col += span;
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_cell(
    layer: &PdfLayerReference,
    fonts: &Fonts,
    cell: &Cell,
    align: Align,
    font_size: f32,
    x: f32,
    top: f32,
    width: f32,
    height: f32,
) {
    // PDF origin is bottom-left
    let y_top = PAGE_HEIGHT - top;
    let y_bottom = y_top - height;

    layer.set_fill_color(color(cell.fill));
    layer.set_outline_color(color(palette::GRID));
    layer.set_outline_thickness(LINE_WIDTH_PT);
    layer.add_rect(
        Rect::new(Mm(x), Mm(y_bottom), Mm(x + width), Mm(y_top)).with_mode(PaintMode::FillStroke),
    );

    let text = fit_text(&cell.text, font_size, width - 2.0 * CELL_PADDING);
    if text.is_empty() {
        return;
    }
    let text_width = estimate_width(&text, font_size);
    let text_x = match align {
        Align::Left => x + CELL_PADDING,
        Align::Center => x + ((width - text_width) / 2.0).max(CELL_PADDING),
    };
    let baseline = y_bottom + (height - font_size * PT_TO_MM) / 2.0 + 0.5;

    let font = if cell.bold { &fonts.bold } else { &fonts.regular };
    layer.set_fill_color(color(cell.color));
    layer.use_text(text, font_size, Mm(text_x), Mm(baseline), font);
}

fn estimate_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * GLYPH_WIDTH_EM * PT_TO_MM
}

/// Truncates `text` so its estimated width fits in `max_width` millimetres.
fn fit_text(text: &str, font_size: f32, max_width: f32) -> String {
    if estimate_width(text, font_size) <= max_width {
        return text.to_string();
    }
    let per_char = font_size * GLYPH_WIDTH_EM * PT_TO_MM;
    let keep = ((max_width / per_char) as usize).saturating_sub(1);
    let mut out: String = text.chars().take(keep).collect();
    if !out.is_empty() {
        out.push('.');
    }
    out
}
