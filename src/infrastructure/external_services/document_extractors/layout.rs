//! Stream-style table detection over positioned text runs.
//!
//! Runs are read from a page's content stream, grouped into rows by baseline,
//! split into cells on horizontal gaps, and any block of consecutive
//! multi-cell rows becomes a table. Only translation and scaling of the text
//! matrix are tracked; skewed or rotated text is placed approximately.

use lopdf::Object;
use lopdf::content::Content;

/// Average glyph advance as a fraction of the font size.
const GLYPH_WIDTH_RATIO: f32 = 0.5;

/// A `TJ` displacement wider than this many glyphs starts a new run.
const TJ_SPLIT_GLYPHS: f32 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub x: f32,
    pub x_end: f32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub y: f32,
    pub cells: Vec<Cell>,
}

/// A detected table as a rectangular grid, header row first.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct LayoutOptions {
    /// Runs whose baselines differ by at most this much share a row.
    pub row_tolerance: f32,
    /// Horizontal gap that separates two cells.
    pub cell_gap: f32,
    /// Cell starts closer than this belong to the same column.
    pub column_tolerance: f32,
    pub min_rows: usize,
    pub min_columns: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            row_tolerance: 2.0,
            cell_gap: 10.0,
            column_tolerance: 15.0,
            min_rows: 2,
            min_columns: 2,
        }
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// Decodes a PDF string operand: UTF-16BE when it carries a BOM or looks
/// like two-byte codes with a zero high byte, Latin-1 otherwise.
pub fn decode_text(bytes: &[u8]) -> String {
    let utf16 = |data: &[u8]| {
        let units: Vec<u16> = data
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    };

    let decoded = if bytes.starts_with(&[0xFE, 0xFF]) {
        utf16(&bytes[2..])
    } else if bytes.len() >= 2
        && bytes.len() % 2 == 0
        && bytes.iter().step_by(2).all(|b| *b == 0)
    {
        utf16(bytes)
    } else {
        bytes.iter().map(|b| *b as char).collect()
    };

    decoded.chars().filter(|c| !c.is_control()).collect()
}

#[derive(Debug, Clone, Copy)]
struct Matrix {
    a: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn translate(self, tx: f32, ty: f32) -> Matrix {
        Matrix {
            e: self.e + tx * self.a,
            f: self.f + ty * self.d,
            ..self
        }
    }
}

struct TextState {
    line: Matrix,
    text: Matrix,
    font_size: f32,
    leading: f32,
    runs: Vec<TextRun>,
}

impl TextState {
    fn new() -> Self {
        Self {
            line: Matrix::IDENTITY,
            text: Matrix::IDENTITY,
            font_size: 10.0,
            leading: 0.0,
            runs: Vec::new(),
        }
    }

    fn glyph_advance(&self) -> f32 {
        self.font_size * GLYPH_WIDTH_RATIO * self.text.a.abs()
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line = self.line.translate(tx, ty);
        self.text = self.line;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    fn show(&mut self, bytes: &[u8]) {
        let text = decode_text(bytes);
        let width = text.chars().count() as f32 * self.glyph_advance();
        if !text.trim().is_empty() {
            self.runs.push(TextRun {
                x: self.text.e,
                y: self.text.f,
                width,
                text,
            });
        }
        self.text.e += width;
    }

    fn show_array(&mut self, items: &[Object]) {
        let mut pending: Option<TextRun> = None;

        for item in items {
            match item {
                Object::String(bytes, _) => {
                    let text = decode_text(bytes);
                    let width = text.chars().count() as f32 * self.glyph_advance();
                    match pending.as_mut() {
                        Some(run) => {
                            run.text.push_str(&text);
                            run.width = self.text.e + width - run.x;
                        }
                        None => {
                            pending = Some(TextRun {
                                x: self.text.e,
                                y: self.text.f,
                                width,
                                text,
                            })
                        }
                    }
                    self.text.e += width;
                }
                other => {
                    if let Some(adjust) = number(other) {
                        // displacement is in thousandths of text space, subtracted
                        let shift = -adjust / 1000.0 * self.font_size * self.text.a.abs();
                        self.text.e += shift;
                        if shift > TJ_SPLIT_GLYPHS * self.glyph_advance() {
                            self.flush(pending.take());
                        } else if shift > 0.5 * self.glyph_advance() {
                            if let Some(run) = pending.as_mut() {
                                run.text.push(' ');
                            }
                        }
                    }
                }
            }
        }

        self.flush(pending);
    }

    fn flush(&mut self, run: Option<TextRun>) {
        if let Some(mut run) = run {
            if !run.text.trim().is_empty() {
                run.text = run.text.trim_end().to_string();
                self.runs.push(run);
            }
        }
    }
}

/// Collects positioned text runs from a decoded content stream.
pub fn text_runs(content: &Content) -> Vec<TextRun> {
    let mut state = TextState::new();

    for operation in &content.operations {
        let operands = &operation.operands;
        let num = |i: usize| operands.get(i).and_then(number);

        match operation.operator.as_str() {
            "BT" => {
                state.line = Matrix::IDENTITY;
                state.text = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(size) = num(1) {
                    state.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = num(0) {
                    state.leading = leading;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    state.move_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    state.leading = -ty;
                    state.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let (Some(a), Some(d), Some(e), Some(f)) = (num(0), num(3), num(4), num(5)) {
                    state.line = Matrix { a, d, e, f };
                    state.text = state.line;
                }
            }
            "T*" => state.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    state.show(bytes);
                }
            }
            "'" => {
                state.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    state.show(bytes);
                }
            }
            "\"" => {
                state.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    state.show(bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    state.show_array(items);
                }
            }
            _ => {}
        }
    }

    state.runs
}

/// Groups runs into rows, top of the page first, and merges touching runs into cells.
pub fn group_rows(runs: &[TextRun], options: &LayoutOptions) -> Vec<Row> {
    let mut sorted: Vec<&TextRun> = runs.iter().collect();
    sorted.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut grouped: Vec<(f32, Vec<&TextRun>)> = Vec::new();
    for run in sorted {
        match grouped.last_mut() {
            Some((y, members)) if (*y - run.y).abs() <= options.row_tolerance => members.push(run),
            _ => grouped.push((run.y, vec![run])),
        }
    }

    grouped
        .into_iter()
        .map(|(y, mut members)| {
            members.sort_by(|a, b| a.x.total_cmp(&b.x));

            let mut cells: Vec<Cell> = Vec::new();
            for run in members {
                match cells.last_mut() {
                    Some(cell) if run.x - cell.x_end <= options.cell_gap => {
                        if run.x > cell.x_end {
                            cell.text.push(' ');
                        }
                        cell.text.push_str(run.text.trim());
                        cell.x_end = cell.x_end.max(run.x + run.width);
                    }
                    _ => cells.push(Cell {
                        x: run.x,
                        x_end: run.x + run.width,
                        text: run.text.trim().to_string(),
                    }),
                }
            }

            Row { y, cells }
        })
        .collect()
}

fn column_anchors(rows: &[Row], tolerance: f32) -> Vec<f32> {
    let mut starts: Vec<f32> = rows
        .iter()
        .flat_map(|row| row.cells.iter().map(|cell| cell.x))
        .collect();
    starts.sort_by(|a, b| a.total_cmp(b));

    let mut anchors: Vec<f32> = Vec::new();
    let mut cluster_end = f32::NEG_INFINITY;
    for x in starts {
        if x - cluster_end > tolerance {
            anchors.push(x);
        }
        cluster_end = x;
    }
    anchors
}

fn align(rows: &[Row], tolerance: f32) -> Table {
    let anchors = column_anchors(rows, tolerance);

    let grid = rows
        .iter()
        .map(|row| {
            let mut line = vec![String::new(); anchors.len()];
            for cell in &row.cells {
                let column = anchors
                    .iter()
                    .rposition(|anchor| *anchor <= cell.x + tolerance)
                    .unwrap_or(0);
                if !line[column].is_empty() {
                    line[column].push(' ');
                }
                line[column].push_str(&cell.text);
            }
            line
        })
        .collect();

    Table { rows: grid }
}

/// Every maximal block of at least `min_rows` consecutive rows that each have
/// at least `min_columns` cells.
pub fn detect_tables(rows: &[Row], options: &LayoutOptions) -> Vec<Table> {
    let mut tables = Vec::new();
    let mut start = None;

    for (i, row) in rows.iter().enumerate() {
        let tabular = row.cells.len() >= options.min_columns;
        match (tabular, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                if i - s >= options.min_rows {
                    tables.push(align(&rows[s..i], options.column_tolerance));
                }
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        if rows.len() - s >= options.min_rows {
            tables.push(align(&rows[s..], options.column_tolerance));
        }
    }

    tables
}

impl Table {
    pub fn column_count(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Whitespace-aligned grid, two spaces between columns.
    pub fn render(&self) -> String {
        let mut widths = vec![0; self.column_count()];
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&widths)
                    .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
                    .collect::<Vec<_>>()
                    .join("  ")
                    .trim_end()
                    .to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
