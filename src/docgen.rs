//! Markdown → Word renderer.
//!
//! A visitor over the pulldown-cmark event stream that emits docx
//! paragraphs, runs, numbered lists, tables and embedded pictures, plus
//! an optional full-page letterhead background (see [`background`]).
//!
//! Remote images are fetched up front (the render itself is synchronous):
//! [`collect_image_urls`] lists what the document wants, the caller
//! resolves them through an [`ImageFetcher`], and a url that failed to
//! fetch renders as a red inline error run instead of aborting the
//! document.

mod background;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use docx_rs::{
    AbstractNumbering, BreakType, Docx, IndentLevel, Level, LevelJc, LevelText, NumberFormat,
    NumberingId, Paragraph, Pic, Run, RunFonts, SpecialIndentType, Start, Style, StyleType, Table,
    TableCell, TableRow,
};
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to assemble document: {0}")]
    Pack(String),
    #[error("background image rejected: {0}")]
    Background(String),
}

pub struct DocRequest {
    pub markdown: String,
    /// Full-page letterhead image (PNG or JPEG), if any.
    pub background: Option<Vec<u8>>,
}

/// url -> fetched bytes; a url absent here renders as an error run.
pub type ImageSet = HashMap<String, Vec<u8>>;

#[async_trait]
pub trait ImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub type SharedImageFetcher = Arc<dyn ImageFetcher + Send + Sync + 'static>;

pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn new_shared(timeout: Duration) -> Result<SharedImageFetcher> {
        Ok(Arc::new(Self::new(timeout)?))
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

fn parse_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options
}

/// First pass: every image url the document references, in order, deduped.
pub fn collect_image_urls(markdown: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for event in Parser::new_ext(markdown, parse_options()) {
        if let Event::Start(Tag::Image { dest_url, .. }) = event {
            let url = dest_url.to_string();
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    urls
}

/// Resolve every referenced image; failures are logged and left out of the
/// set so the renderer can place its inline error text.
pub async fn fetch_images(fetcher: &(dyn ImageFetcher + Sync), markdown: &str) -> ImageSet {
    let mut images = ImageSet::new();
    for url in collect_image_urls(markdown) {
        match fetcher.fetch(&url).await {
            Ok(bytes) => {
                images.insert(url, bytes);
            }
            Err(err) => {
                warn!(%url, %err, "image fetch failed, rendering a placeholder");
            }
        }
    }
    images
}

const BULLET_NUM_ID: usize = 2;
const DECIMAL_NUM_ID: usize = 3;

fn heading_style(level: HeadingLevel) -> String {
    format!("Heading{}", level as usize)
}

/// Styles and numbering definitions every generated document carries.
fn base_docx() -> Docx {
    let mut docx = Docx::new()
        .add_style(
            Style::new("Heading1", StyleType::Paragraph)
                .name("Heading 1")
                .size(36)
                .bold(),
        )
        .add_style(
            Style::new("Heading2", StyleType::Paragraph)
                .name("Heading 2")
                .size(30)
                .bold(),
        )
        .add_style(
            Style::new("Heading3", StyleType::Paragraph)
                .name("Heading 3")
                .size(26)
                .bold(),
        )
        .add_style(
            Style::new("Heading4", StyleType::Paragraph)
                .name("Heading 4")
                .size(24)
                .bold(),
        )
        .add_style(
            Style::new("Heading5", StyleType::Paragraph)
                .name("Heading 5")
                .size(22)
                .bold(),
        )
        .add_style(
            Style::new("Heading6", StyleType::Paragraph)
                .name("Heading 6")
                .size(22)
                .italic(),
        );

    let mut bullets = AbstractNumbering::new(BULLET_NUM_ID);
    let mut decimals = AbstractNumbering::new(DECIMAL_NUM_ID);
    for level in 0..3usize {
        let indent = 720 * (level as i32 + 1);
        bullets = bullets.add_level(
            Level::new(
                level,
                Start::new(1),
                NumberFormat::new("bullet"),
                LevelText::new("•"),
                LevelJc::new("left"),
            )
            .indent(Some(indent), Some(SpecialIndentType::Hanging(360)), None, None),
        );
        decimals = decimals.add_level(
            Level::new(
                level,
                Start::new(1),
                NumberFormat::new("decimal"),
                LevelText::new(format!("%{}.", level + 1)),
                LevelJc::new("left"),
            )
            .indent(Some(indent), Some(SpecialIndentType::Hanging(360)), None, None),
        );
    }
    docx = docx
        .add_abstract_numbering(bullets)
        .add_numbering(docx_rs::Numbering::new(BULLET_NUM_ID, BULLET_NUM_ID))
        .add_abstract_numbering(decimals)
        .add_numbering(docx_rs::Numbering::new(DECIMAL_NUM_ID, DECIMAL_NUM_ID));
    docx
}

pub fn render(req: &DocRequest, images: &ImageSet) -> Result<Vec<u8>, RenderError> {
    let mut docx = base_docx();

    // With a background the page margins are zeroed; body paragraphs get
    // their margins back through indents so text stays off the letterhead
    // edges.
    let mut body_indent = None;
    if let Some(image) = &req.background {
        docx = background::apply(docx, image)?;
        body_indent = Some(background::BODY_INDENT_TWIPS);
    }

    let mut visitor = Visitor::new(images, body_indent);
    for event in Parser::new_ext(&req.markdown, parse_options()) {
        visitor.handle(event);
    }
    for block in visitor.finish() {
        match block {
            Block::Paragraph(p) => docx = docx.add_paragraph(p),
            Block::Table(t) => docx = docx.add_table(t),
        }
    }

    let mut cursor = std::io::Cursor::new(Vec::new());
    docx.build()
        .pack(&mut cursor)
        .map_err(|e| RenderError::Pack(e.to_string()))?;
    Ok(cursor.into_inner())
}

enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bullet,
    Ordered,
}

struct TableState {
    rows: Vec<TableRow>,
    cells: Vec<TableCell>,
    cell_para: Option<Paragraph>,
    columns: usize,
    in_head: bool,
}

struct Visitor<'a> {
    images: &'a ImageSet,
    body_indent: Option<i32>,
    blocks: Vec<Block>,
    para: Option<Paragraph>,
    bold: usize,
    italic: usize,
    strike: usize,
    code_block: bool,
    list_stack: Vec<ListKind>,
    table: Option<TableState>,
    image_url: Option<String>,
}

impl<'a> Visitor<'a> {
    fn new(images: &'a ImageSet, body_indent: Option<i32>) -> Self {
        Self {
            images,
            body_indent,
            blocks: Vec::new(),
            para: None,
            bold: 0,
            italic: 0,
            strike: 0,
            code_block: false,
            list_stack: Vec::new(),
            table: None,
            image_url: None,
        }
    }

    fn base_para(&self) -> Paragraph {
        match self.body_indent {
            Some(indent) => Paragraph::new().indent(Some(indent), None, Some(indent), None),
            None => Paragraph::new(),
        }
    }

    fn flush_para(&mut self) {
        if let Some(para) = self.para.take() {
            self.blocks.push(Block::Paragraph(para));
        }
    }

    fn styled(&self, text: &str) -> Run {
        let mut run = Run::new().add_text(text);
        if self.bold > 0 {
            run = run.bold();
        }
        if self.italic > 0 {
            run = run.italic();
        }
        if self.strike > 0 {
            run = run.strike();
        }
        if self.code_block {
            run = run.fonts(RunFonts::new().ascii("Courier New"));
        }
        run
    }

    fn push_run(&mut self, run: Run) {
        if let Some(table) = self.table.as_mut() {
            let para = table.cell_para.take().unwrap_or_else(Paragraph::new);
            table.cell_para = Some(para.add_run(run));
            return;
        }
        let para = self.para.take().unwrap_or_else(|| self.base_para());
        self.para = Some(para.add_run(run));
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.push_run_text(&text),
            Event::Code(text) => {
                let run = Run::new()
                    .add_text(text.as_ref())
                    .fonts(RunFonts::new().ascii("Courier New"));
                self.push_run(run);
            }
            Event::SoftBreak => self.push_run_text(" "),
            Event::HardBreak => self.push_run(Run::new().add_break(BreakType::TextWrapping)),
            Event::Rule => {
                self.flush_para();
                self.blocks.push(Block::Paragraph(
                    self.base_para().add_run(Run::new().add_text("─".repeat(30))),
                ));
            }
            // raw html and the rest pass through unrendered
            _ => {}
        }
    }

    fn push_run_text(&mut self, text: &str) {
        if self.image_url.is_some() {
            // alt text; the rendered output uses the url instead
            return;
        }
        let run = self.styled(text);
        self.push_run(run);
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            Tag::Paragraph => {
                // a pending paragraph means we are inside an item or
                // quote that already shaped one; keep writing into it
                if self.table.is_none() && self.para.is_none() {
                    self.para = Some(self.base_para());
                }
            }
            Tag::Heading { level, .. } => {
                self.flush_para();
                self.para = Some(self.base_para().style(&heading_style(level)));
            }
            Tag::List(start) => {
                self.flush_para();
                self.list_stack.push(match start {
                    Some(_) => ListKind::Ordered,
                    None => ListKind::Bullet,
                });
            }
            Tag::Item => {
                self.flush_para();
                let depth = self.list_stack.len().saturating_sub(1);
                let numbering = match self.list_stack.last() {
                    Some(ListKind::Ordered) => DECIMAL_NUM_ID,
                    _ => BULLET_NUM_ID,
                };
                self.para = Some(self.base_para().numbering(
                    NumberingId::new(numbering),
                    IndentLevel::new(depth),
                ));
            }
            Tag::Emphasis => self.italic += 1,
            Tag::Strong => self.bold += 1,
            Tag::Strikethrough => self.strike += 1,
            Tag::CodeBlock(_) => {
                self.flush_para();
                self.code_block = true;
                self.para = Some(self.base_para());
            }
            Tag::BlockQuote(..) => {
                self.flush_para();
                let indent = self.body_indent.unwrap_or(0) + 720;
                self.para = Some(Paragraph::new().indent(Some(indent), None, None, None));
            }
            Tag::Image { dest_url, .. } => {
                self.image_url = Some(dest_url.to_string());
            }
            Tag::Table(_) => {
                self.flush_para();
                self.table = Some(TableState {
                    rows: Vec::new(),
                    cells: Vec::new(),
                    cell_para: None,
                    columns: 0,
                    in_head: false,
                });
            }
            Tag::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.in_head = true;
                }
                // header cells render bold
                self.bold += 1;
            }
            Tag::TableRow => {}
            Tag::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    table.cell_para = Some(Paragraph::new());
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item => self.flush_para(),
            TagEnd::List(_) => {
                self.flush_para();
                self.list_stack.pop();
            }
            TagEnd::Emphasis => self.italic = self.italic.saturating_sub(1),
            TagEnd::Strong => self.bold = self.bold.saturating_sub(1),
            TagEnd::Strikethrough => self.strike = self.strike.saturating_sub(1),
            TagEnd::CodeBlock => {
                self.code_block = false;
                self.flush_para();
            }
            TagEnd::Image => {
                if let Some(url) = self.image_url.take() {
                    let run = match self.images.get(&url) {
                        Some(bytes) => Run::new().add_image(Pic::new(bytes)),
                        // failed fetch: visible red error text instead of
                        // aborting the whole document
                        None => Run::new()
                            .add_text(format!("[image unavailable: {url}]"))
                            .color("CC0000"),
                    };
                    self.push_run(run);
                }
            }
            TagEnd::Table => {
                if let Some(mut table) = self.table.take() {
                    let columns = table.columns.max(1);
                    let built = Table::new(std::mem::take(&mut table.rows))
                        .set_grid(vec![9026 / columns; columns]);
                    self.blocks.push(Block::Table(built));
                }
            }
            TagEnd::TableHead | TagEnd::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    let cells = std::mem::take(&mut table.cells);
                    table.columns = table.columns.max(cells.len());
                    table.rows.push(TableRow::new(cells));
                    if table.in_head {
                        table.in_head = false;
                        self.bold = self.bold.saturating_sub(1);
                    }
                }
            }
            TagEnd::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    let para = table.cell_para.take().unwrap_or_else(Paragraph::new);
                    table.cells.push(TableCell::new().add_paragraph(para));
                }
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush_para();
        self.blocks
    }
}
