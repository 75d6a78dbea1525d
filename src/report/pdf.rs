//! PDF backend.
//!
//! A small flow layout over `pdf-writer`: sections are laid out top to
//! bottom on Letter pages, text is word-wrapped with approximate
//! Helvetica metrics, and a new page is started when content reaches the
//! bottom margin. Only the base-14 Helvetica fonts are used, so nothing
//! needs to be embedded.

use super::document::{FindingBlock, ReportDocument, Section, TaskDigest};
use pdf_writer::{Content, Name, Pdf, Rect, Ref, Str, TextStr};
use std::ops::Range;

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 72.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const LINE_SPACING: f32 = 1.35;
const CELL_PADDING: f32 = 6.0;

const BODY_SIZE: f32 = 10.0;
const HEADING_SIZE: f32 = 15.0;
const TITLE_SIZE: f32 = 22.0;
const TABLE_SIZE: f32 = 9.0;

const REGULAR_FONT: Name<'static> = Name(b"F1");
const BOLD_FONT: Name<'static> = Name(b"F2");

#[derive(Debug, Clone, Copy, PartialEq)]
struct Color(f32, f32, f32);

impl Color {
    const BLACK: Color = Color(0.0, 0.0, 0.0);
    const WHITE: Color = Color(0.96, 0.96, 0.96);
    const TITLE: Color = Color(0.102, 0.102, 0.102);
    const HEADING: Color = Color(0.173, 0.243, 0.314);
    const LABEL_FILL: Color = Color(0.91, 0.91, 0.91);
    const BEIGE: Color = Color(0.96, 0.96, 0.86);
    const GRID: Color = Color(0.5, 0.5, 0.5);
    const MUTED: Color = Color(0.4, 0.4, 0.4);

    fn from_rgb((r, g, b): (f32, f32, f32)) -> Self {
        Color(r, g, b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(&self) -> Name<'static> {
        match self {
            Font::Regular => REGULAR_FONT,
            Font::Bold => BOLD_FONT,
        }
    }
}

/// One wrapped line: consecutive pieces of text with their fonts.
type Line = Vec<(Font, String)>;

/// A run of text sharing one font.
#[derive(Debug, Clone)]
struct Run {
    font: Font,
    text: String,
}

impl Run {
    fn regular(text: impl Into<String>) -> Self {
        Self {
            font: Font::Regular,
            text: text.into(),
        }
    }

    fn bold(text: impl Into<String>) -> Self {
        Self {
            font: Font::Bold,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
enum Op {
    Text {
        x: f32,
        y: f32,
        font: Font,
        size: f32,
        color: Color,
        text: String,
    },
    Fill {
        rect: [f32; 4],
        color: Color,
    },
    Stroke {
        rect: [f32; 4],
        color: Color,
        width: f32,
    },
}

#[derive(Debug, Default)]
struct Page {
    ops: Vec<Op>,
}

/// Cell styling for a two-column table.
struct TableStyle {
    /// Fill and text colour of the first row, if it is a header row.
    header: Option<(Color, Color)>,
    /// Fill of the first column of body rows.
    label_fill: Option<Color>,
    body_fill: Option<Color>,
    bold_labels: bool,
}

struct Layout {
    pages: Vec<Page>,
    /// Baseline budget left on the current page, measured from the bottom.
    cursor: f32,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: vec![Page::default()],
            cursor: PAGE_HEIGHT - MARGIN,
        }
    }

    fn page(&mut self) -> &mut Page {
        // `pages` always holds at least one page.
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn page_is_empty(&self) -> bool {
        self.pages.last().map_or(true, |p| p.ops.is_empty())
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.cursor = PAGE_HEIGHT - MARGIN;
    }

    /// Starts a new page unless the current one is still blank.
    fn break_page(&mut self) {
        if !self.page_is_empty() {
            self.new_page();
        }
    }

    fn ensure(&mut self, height: f32) {
        if self.cursor - height < MARGIN && !self.page_is_empty() {
            self.new_page();
        }
    }

    fn space(&mut self, height: f32) {
        self.cursor -= height;
        if self.cursor < MARGIN {
            self.new_page();
        }
    }

    fn push_text(&mut self, x: f32, font: Font, size: f32, color: Color, text: String) {
        let y = self.cursor;
        self.page().ops.push(Op::Text {
            x,
            y,
            font,
            size,
            color,
            text,
        });
    }

    fn title(&mut self, text: &str) {
        let leading = TITLE_SIZE * LINE_SPACING;
        for line in wrap(&[Run::bold(text)], TITLE_SIZE, CONTENT_WIDTH) {
            self.ensure(leading);
            self.cursor -= TITLE_SIZE;
            let width: f32 = line.iter().map(|(font, t)| text_width(t, *font, TITLE_SIZE)).sum();
            let x = MARGIN + (CONTENT_WIDTH - width).max(0.0) / 2.0;
            let joined: String = line.into_iter().map(|(_, t)| t).collect();
            self.push_text(x, Font::Bold, TITLE_SIZE, Color::TITLE, joined);
            self.cursor -= leading - TITLE_SIZE;
        }
        self.space(18.0);
    }

    fn heading(&mut self, text: &str) {
        self.space(6.0);
        // Keep a heading together with at least two body lines.
        self.ensure(HEADING_SIZE * LINE_SPACING + 2.0 * BODY_SIZE * LINE_SPACING);
        self.paragraph(&[Run::bold(text)], HEADING_SIZE, Color::HEADING, 0.0);
        self.space(4.0);
    }

    /// Lays out wrapped text made of mixed-font runs.
    fn paragraph(&mut self, runs: &[Run], size: f32, color: Color, indent: f32) {
        let leading = size * LINE_SPACING;
        for line in wrap(runs, size, CONTENT_WIDTH - indent) {
            self.ensure(leading);
            self.cursor -= size;
            let mut x = MARGIN + indent;
            for (font, text) in line {
                let width = text_width(&text, font, size);
                self.push_text(x, font, size, color, text);
                x += width;
            }
            self.cursor -= leading - size;
        }
    }

    fn body(&mut self, text: &str) {
        for block in text.split('\n') {
            if block.trim().is_empty() {
                continue;
            }
            self.paragraph(&[Run::regular(block.trim())], BODY_SIZE, Color::BLACK, 0.0);
            self.space(4.0);
        }
    }

    fn labeled(&mut self, label: &str, value: &str, indent: f32) {
        self.paragraph(
            &[Run::bold(format!("{} ", label)), Run::regular(value)],
            BODY_SIZE,
            Color::BLACK,
            indent,
        );
        self.space(3.0);
    }

    fn table(&mut self, rows: &[(String, String)], widths: [f32; 2], style: &TableStyle) {
        let leading = TABLE_SIZE * LINE_SPACING;

        for (idx, (left, right)) in rows.iter().enumerate() {
            let is_header = idx == 0 && style.header.is_some();
            let left_font = if is_header || style.bold_labels {
                Font::Bold
            } else {
                Font::Regular
            };
            let right_font = if is_header { Font::Bold } else { Font::Regular };

            let left_lines = wrap(
                &[Run {
                    font: left_font,
                    text: left.clone(),
                }],
                TABLE_SIZE,
                widths[0] - 2.0 * CELL_PADDING,
            );
            let right_lines = wrap(
                &[Run {
                    font: right_font,
                    text: right.clone(),
                }],
                TABLE_SIZE,
                widths[1] - 2.0 * CELL_PADDING,
            );
            let line_count = left_lines.len().max(right_lines.len()).max(1);

            let (left_fill, right_fill, text_color) = match (is_header, style.header) {
                (true, Some((fill, text))) => (Some(fill), Some(fill), text),
                _ => (
                    style.label_fill.or(style.body_fill),
                    style.body_fill,
                    Color::BLACK,
                ),
            };

            let cells = [
                (MARGIN, widths[0], left_fill, left_lines.as_slice()),
                (MARGIN + widths[0], widths[1], right_fill, right_lines.as_slice()),
            ];

            // Move whole rows to a fresh page. Rows taller than a page are
            // split and continued on the following pages.
            if line_count <= table_lines_per_page() {
                self.ensure(line_count as f32 * leading + 2.0 * CELL_PADDING);
            }

            let mut first = 0;
            while first < line_count {
                let fit = ((self.cursor - MARGIN - 2.0 * CELL_PADDING) / leading + 1e-3)
                    .floor()
                    .max(0.0) as usize;
                if fit == 0 {
                    self.new_page();
                    continue;
                }

                let last = (first + fit).min(line_count);
                self.table_row(&cells, first..last, text_color);
                first = last;
                if first < line_count {
                    self.new_page();
                }
            }
        }

        self.space(16.0);
    }

    /// Draws the given line range of a table row as one block of cells.
    fn table_row(
        &mut self,
        cells: &[(f32, f32, Option<Color>, &[Line]); 2],
        range: Range<usize>,
        text_color: Color,
    ) {
        let leading = TABLE_SIZE * LINE_SPACING;
        let row_height = range.len() as f32 * leading + 2.0 * CELL_PADDING;
        let top = self.cursor;
        let bottom = top - row_height;

        for &(x, width, fill, lines) in cells {
            let rect = [x, bottom, width, row_height];
            if let Some(color) = fill {
                self.page().ops.push(Op::Fill { rect, color });
            }
            self.page().ops.push(Op::Stroke {
                rect,
                color: Color::GRID,
                width: 0.5,
            });

            self.cursor = top - CELL_PADDING;
            for line in lines.iter().skip(range.start).take(range.len()) {
                self.cursor -= TABLE_SIZE;
                let mut tx = x + CELL_PADDING;
                for (font, text) in line {
                    let w = text_width(text, *font, TABLE_SIZE);
                    self.push_text(tx, *font, TABLE_SIZE, text_color, text.clone());
                    tx += w;
                }
                self.cursor -= leading - TABLE_SIZE;
            }
        }

        self.cursor = bottom;
    }

    fn findings(&mut self, items: &[FindingBlock]) {
        for finding in items {
            self.ensure(5.0 * BODY_SIZE * LINE_SPACING);
            self.paragraph(
                &[Run::bold(finding.title.as_str())],
                BODY_SIZE + 1.0,
                Color::from_rgb(finding.marker.rgb()),
                0.0,
            );
            self.space(3.0);
            self.labeled("Nivel de Riesgo:", &finding.risk_level.to_string(), 12.0);
            self.labeled("Confianza:", &finding.confidence.to_string(), 12.0);
            if let Some(description) = &finding.description {
                self.labeled("Descripción:", description, 12.0);
            }
            if let Some(evidence) = &finding.evidence {
                self.labeled("Evidencia:", evidence, 12.0);
            }
            self.space(8.0);
        }
    }

    fn task_digests(&mut self, tasks: &[TaskDigest]) {
        for task in tasks {
            self.heading(&format!("Tarea: {}", task.task_name));
            if !task.summary.trim().is_empty() {
                self.body(&task.summary);
            }
            if task.finding_count > 0 {
                self.labeled("Hallazgos encontrados:", &task.finding_count.to_string(), 0.0);
            }
            if let Some(error) = &task.error {
                self.labeled("Análisis no disponible:", error, 0.0);
            }
            self.space(10.0);
        }
    }

    fn section(&mut self, section: &Section) {
        match section {
            Section::Header {
                title,
                task_label,
                generated_at,
                tool,
                target_os,
            } => {
                self.title(title);
                let rows = [
                    ("Tarea:".to_string(), task_label.clone()),
                    ("Fecha:".to_string(), generated_at.clone()),
                    ("Herramienta:".to_string(), tool.clone()),
                    ("Sistema:".to_string(), target_os.clone()),
                ];
                self.table(
                    &rows,
                    [108.0, 288.0],
                    &TableStyle {
                        header: None,
                        label_fill: Some(Color::LABEL_FILL),
                        body_fill: None,
                        bold_labels: true,
                    },
                );
            }
            Section::Summary { text } | Section::GeneralAnalysis { text } => {
                self.heading(section.heading().unwrap_or_default());
                self.body(text);
                self.space(10.0);
            }
            Section::Findings { items } => {
                self.heading(section.heading().unwrap_or_default());
                self.findings(items);
            }
            Section::Recommendations { items } => {
                self.heading(section.heading().unwrap_or_default());
                for (idx, item) in items.iter().enumerate() {
                    self.paragraph(
                        &[Run::bold(format!("{}. ", idx + 1)), Run::regular(item.as_str())],
                        BODY_SIZE,
                        Color::BLACK,
                        0.0,
                    );
                    self.space(4.0);
                }
                self.space(10.0);
            }
            Section::Statistics { rows } => {
                self.heading(section.heading().unwrap_or_default());
                let mut table = vec![("Métrica".to_string(), "Valor".to_string())];
                table.extend(rows.iter().cloned());
                self.table(
                    &table,
                    [216.0, 144.0],
                    &TableStyle {
                        header: Some((Color::HEADING, Color::WHITE)),
                        label_fill: None,
                        body_fill: Some(Color::BEIGE),
                        bold_labels: false,
                    },
                );
            }
            Section::PageBreak => self.break_page(),
            Section::TaskBreakdown { title, tasks } => {
                self.heading(title);
                self.task_digests(tasks);
            }
            Section::LegalFooter { paragraphs } => {
                self.break_page();
                self.heading(section.heading().unwrap_or_default());
                for paragraph in paragraphs {
                    self.body(paragraph);
                    self.space(6.0);
                }
            }
        }
    }
}

/// Renders the document into PDF bytes.
pub fn render_pdf(document: &ReportDocument) -> Vec<u8> {
    let mut layout = Layout::new();
    for section in &document.sections {
        layout.section(section);
    }
    write_pdf(layout.pages, document_title(document))
}

fn document_title(document: &ReportDocument) -> String {
    document
        .sections
        .iter()
        .find_map(|section| match section {
            Section::Header {
                title, task_label, ..
            } => Some(format!("{} - {}", title, task_label)),
            _ => None,
        })
        .unwrap_or_default()
}

fn write_pdf(pages: Vec<Page>, title: String) -> Vec<u8> {
    let catalog_id = Ref::new(1);
    let tree_id = Ref::new(2);
    let regular_id = Ref::new(3);
    let bold_id = Ref::new(4);
    let info_id = Ref::new(5);

    let total = pages.len();
    let page_ids: Vec<(Ref, Ref)> = (0..total as i32)
        .map(|i| (Ref::new(6 + 2 * i), Ref::new(7 + 2 * i)))
        .collect();

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(tree_id);
    pdf.pages(tree_id)
        .kids(page_ids.iter().map(|(page_id, _)| *page_id))
        .count(total as i32);

    for (number, (page, (page_id, content_id))) in pages.into_iter().zip(&page_ids).enumerate() {
        {
            let mut writer = pdf.page(*page_id);
            writer.media_box(Rect::new(0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT));
            writer.parent(tree_id);
            writer.contents(*content_id);
            writer
                .resources()
                .fonts()
                .pair(REGULAR_FONT, regular_id)
                .pair(BOLD_FONT, bold_id);
        }

        let mut content = Content::new();
        for op in &page.ops {
            draw(&mut content, op);
        }

        let footer = format!("Página {} de {}", number + 1, total);
        let width = text_width(&footer, Font::Regular, 8.0);
        draw(
            &mut content,
            &Op::Text {
                x: (PAGE_WIDTH - width) / 2.0,
                y: MARGIN / 2.0,
                font: Font::Regular,
                size: 8.0,
                color: Color::MUTED,
                text: footer,
            },
        );

        pdf.stream(*content_id, &content.finish());
    }

    pdf.type1_font(regular_id)
        .base_font(Name(b"Helvetica"))
        .encoding_predefined(Name(b"WinAnsiEncoding"));
    pdf.type1_font(bold_id)
        .base_font(Name(b"Helvetica-Bold"))
        .encoding_predefined(Name(b"WinAnsiEncoding"));

    pdf.document_info(info_id)
        .title(TextStr(&title))
        .producer(TextStr("AutoForense"));

    pdf.finish()
}

fn draw(content: &mut Content, op: &Op) {
    match op {
        Op::Text {
            x,
            y,
            font,
            size,
            color,
            text,
        } => {
            content.set_fill_rgb(color.0, color.1, color.2);
            content.begin_text();
            content.set_font(font.resource(), *size);
            content.next_line(*x, *y);
            content.show(Str(&encode_win_ansi(text)));
            content.end_text();
        }
        Op::Fill { rect, color } => {
            content.set_fill_rgb(color.0, color.1, color.2);
            content.rect(rect[0], rect[1], rect[2], rect[3]);
            content.fill_nonzero();
        }
        Op::Stroke { rect, color, width } => {
            content.set_stroke_rgb(color.0, color.1, color.2);
            content.set_line_width(*width);
            content.rect(rect[0], rect[1], rect[2], rect[3]);
            content.stroke();
        }
    }
}

/// Greedy word wrap over mixed-font runs.
///
/// Each returned line is a list of `(font, text)` segments.
/// Table lines that fit on an otherwise empty page.
fn table_lines_per_page() -> usize {
    ((PAGE_HEIGHT - 2.0 * MARGIN - 2.0 * CELL_PADDING) / (TABLE_SIZE * LINE_SPACING)) as usize
}

fn wrap(runs: &[Run], size: f32, max_width: f32) -> Vec<Line> {
    let mut lines: Vec<Vec<(Font, String)>> = Vec::new();
    let mut line: Vec<(Font, String)> = Vec::new();
    let mut width = 0.0;

    for run in runs {
        for word in run.text.split_whitespace() {
            for piece in split_long_word(word, run.font, size, max_width) {
                let piece_width = text_width(&piece, run.font, size);
                let space = if line.is_empty() {
                    0.0
                } else {
                    text_width(" ", run.font, size)
                };

                if !line.is_empty() && width + space + piece_width > max_width {
                    lines.push(std::mem::take(&mut line));
                    width = 0.0;
                }

                let (prefix, gap) = if line.is_empty() { ("", 0.0) } else { (" ", space) };
                width += gap + piece_width;

                match line.last_mut() {
                    Some((font, text)) if *font == run.font => {
                        text.push_str(prefix);
                        text.push_str(&piece);
                    }
                    _ => line.push((run.font, format!("{}{}", prefix, piece))),
                }
            }
        }
    }

    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn split_long_word(word: &str, font: Font, size: f32, max_width: f32) -> Vec<String> {
    if text_width(word, font, size) <= max_width {
        return vec![word.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    for c in word.chars() {
        let candidate = text_width(&current, font, size) + char_width(c, font) * size;
        if !current.is_empty() && candidate > max_width {
            pieces.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn text_width(text: &str, font: Font, size: f32) -> f32 {
    text.chars().map(|c| char_width(c, font)).sum::<f32>() * size
}

/// Approximate Helvetica advance width in em units.
fn char_width(c: char, font: Font) -> f32 {
    let width = match c {
        'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '|' | '!' => 0.278,
        ' ' | 'f' | 't' | 'I' | '/' | '(' | ')' | '[' | ']' | '-' => 0.3,
        'r' => 0.333,
        'm' | 'M' | 'W' | '@' => 0.833,
        'w' => 0.722,
        '0'..='9' => 0.556,
        c if c.is_uppercase() => 0.68,
        _ => 0.556,
    };
    match font {
        Font::Regular => width,
        Font::Bold => width * 1.06,
    }
}

/// Encodes text as WinAnsi bytes. Unmappable characters become `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\t' => b' ',
            ' '..='~' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '€' => 0x80,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            _ => b'?',
        })
        .collect()
}
