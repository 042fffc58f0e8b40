//! PDF 渲染器（A4 分页格式）
//!
//! 排版规则：
//! - 每页顶部重复标题和课程信息，底部页码
//! - 身份信息栏和分组标记只出现在试卷第一页
//! - 题目开始前若已越过阈值（y > 250mm）则另起一页；题目内部超出正文区自动换页
//! - 试卷中每题之后画一条浅灰分隔线
//! - 页眉页脚标记为 `/Artifact`，正文回读时跳过

mod font;
mod writer;

pub use writer::{extract_all_text, extract_text, PdfWriter};

use crate::error::RenderError;
use crate::render::content::{
    block_flags, plan_header, plan_questions, Affordance, DocumentFormat, DocumentKind,
    DocumentMeta, DocumentRenderer, HeaderBlock, QuestionBlock, RenderOptions, RenderedDocument,
    CORRECT_ANSWER_LABEL, FALSE_AFFORDANCE, IDENTIFICATION_FIELDS, TRUE_AFFORDANCE,
};
use crate::services::booklet::BookletVariant;
use tracing::debug;
use writer::{Rgb, PAGE_HEIGHT_MM, PAGE_WIDTH_MM};

const MARGIN_X: f64 = 10.0;
const MARGIN_TOP: f64 = 10.0;
/// 正文区底边（超过即自动换页）
const BODY_BOTTOM: f64 = PAGE_HEIGHT_MM - 20.0;
/// 题目开始前的换页阈值
const QUESTION_BREAK_Y: f64 = 250.0;
const FOOTER_Y: f64 = PAGE_HEIGHT_MM - 10.0;
const CONTENT_WIDTH: f64 = PAGE_WIDTH_MM - 2.0 * MARGIN_X;

const TITLE_SIZE: f64 = 14.0;
const META_SIZE: f64 = 10.0;
const BODY_SIZE: f64 = 11.0;
const LINE_HEIGHT: f64 = 6.0;
const ANSWER_LINE_SPACING: f64 = 8.0;

/// PDF 渲染器
#[derive(Debug, Clone, Default)]
pub struct PdfRenderer {
    options: RenderOptions,
}

impl PdfRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }
}

impl DocumentRenderer for PdfRenderer {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn render(
        &self,
        variant: &BookletVariant,
        meta: &DocumentMeta,
        kind: DocumentKind,
    ) -> Result<RenderedDocument, RenderError> {
        let header = plan_header(meta, kind);
        let blocks = plan_questions(variant, kind, &self.options);

        let mut layout = Layout::new(&header, &meta.course_code)?;
        layout.new_page();
        for block in &blocks {
            layout.question(block, kind);
        }
        let pages = layout.writer.page_count();
        let bytes = layout.writer.finish();
        if bytes.is_empty() {
            return Err(RenderError::Pdf("empty output".to_string()));
        }

        debug!(
            "📄 PDF 渲染完成: {} 分组 {}, {} 页, {} 字节",
            kind.artifact_name(),
            variant.group,
            pages,
            bytes.len()
        );

        Ok(RenderedDocument {
            format: DocumentFormat::Pdf,
            kind,
            group: variant.group,
            bytes,
            questions: blocks.iter().map(Into::into).collect(),
            flags: block_flags(&blocks),
        })
    }
}

/// 页面游标
struct Layout<'a> {
    header: &'a HeaderBlock,
    course_code: &'a str,
    writer: PdfWriter,
    y: f64,
}

impl<'a> Layout<'a> {
    fn new(header: &'a HeaderBlock, course_code: &'a str) -> Result<Self, RenderError> {
        Ok(Self {
            header,
            course_code,
            writer: PdfWriter::new(header.title_line.clone())?,
            y: MARGIN_TOP,
        })
    }

    fn new_page(&mut self) {
        self.writer.add_page();
        let page_no = self.writer.page_count();
        self.y = MARGIN_TOP;

        let header = self.header;
        self.writer.begin_artifact();
        self.centered(&header.title_line, TITLE_SIZE, true);
        self.centered(&header.meta_line, META_SIZE, false);
        self.writer.end_artifact();

        if page_no == 1 {
            if header.identification {
                self.identification_box();
            }
            if let Some(marker) = &header.booklet_marker {
                self.writer
                    .text(MARGIN_X, self.y + 5.0, BODY_SIZE, true, Rgb::BLACK, marker);
                self.y += LINE_HEIGHT + 2.0;
            }
        }

        self.writer.begin_artifact();
        self.writer.line(
            MARGIN_X,
            self.y,
            PAGE_WIDTH_MM - MARGIN_X,
            self.y,
            0.4,
            Rgb::BLACK,
        );
        self.y += 4.0;

        let footer = format!("{} - Page {}", self.course_code, page_no);
        let x = (PAGE_WIDTH_MM - self.writer.text_width(&footer, 8.0, false)) / 2.0;
        self.writer.text(x, FOOTER_Y, 8.0, false, Rgb::BLACK, &footer);
        self.writer.end_artifact();
    }

    fn centered(&mut self, text: &str, size: f64, bold: bool) {
        for line in self.writer.wrap(text, CONTENT_WIDTH, size, bold) {
            let x = ((PAGE_WIDTH_MM - self.writer.text_width(&line, size, bold)) / 2.0).max(MARGIN_X);
            self.writer.text(x, self.y + 5.0, size, bold, Rgb::BLACK, &line);
            self.y += LINE_HEIGHT + 1.0;
        }
    }

    /// 2×2 身份信息栏
    fn identification_box(&mut self) {
        let cell_w = CONTENT_WIDTH / 2.0;
        let cell_h = 10.0;
        self.y += 2.0;
        for (idx, label) in IDENTIFICATION_FIELDS.iter().enumerate() {
            let col = (idx % 2) as f64;
            let row = (idx / 2) as f64;
            let x = MARGIN_X + col * cell_w;
            let y = self.y + row * cell_h;
            self.writer.rect(x, y, cell_w, cell_h, None);
            self.writer
                .text(x + 2.0, y + 6.5, META_SIZE, false, Rgb::BLACK, label);
        }
        self.y += 2.0 * cell_h + 4.0;
    }

    fn ensure_space(&mut self, height: f64) {
        if self.y + height > BODY_BOTTOM {
            self.new_page();
        }
    }

    fn paragraph(&mut self, text: &str, x: f64, size: f64, bold: bool, color: Rgb) {
        let width = PAGE_WIDTH_MM - MARGIN_X - x;
        for line in self.writer.wrap(text, width, size, bold) {
            self.ensure_space(LINE_HEIGHT);
            self.writer.text(x, self.y + 4.5, size, bold, color, &line);
            self.y += LINE_HEIGHT;
        }
    }

    fn question(&mut self, block: &QuestionBlock, kind: DocumentKind) {
        if self.y > QUESTION_BREAK_Y {
            self.new_page();
        }

        self.paragraph(&block.heading, MARGIN_X, BODY_SIZE, true, Rgb::BLACK);

        if let Some(answer) = &block.correct_answer {
            let text = format!("{} {}", CORRECT_ANSWER_LABEL, answer);
            self.ensure_space(LINE_HEIGHT + 2.0);
            let width = self.writer.text_width(&text, BODY_SIZE, true) + 4.0;
            self.writer
                .rect(MARGIN_X, self.y + 0.5, width, LINE_HEIGHT, Some(Rgb::HIGHLIGHT));
            self.writer
                .text(MARGIN_X + 2.0, self.y + 5.0, BODY_SIZE, true, Rgb::RED, &text);
            self.y += LINE_HEIGHT + 2.0;
        }

        self.y += 2.0;
        match &block.affordance {
            Affordance::Options(options) => {
                for (key, text) in options {
                    self.ensure_space(LINE_HEIGHT);
                    self.writer.text(
                        MARGIN_X + 5.0,
                        self.y + 4.5,
                        BODY_SIZE,
                        true,
                        Rgb::BLACK,
                        &format!("{})", key),
                    );
                    self.paragraph(text, MARGIN_X + 13.0, BODY_SIZE, false, Rgb::BLACK);
                }
            }
            Affordance::TrueFalse => {
                self.ensure_space(LINE_HEIGHT);
                for (offset, label) in [(5.0, TRUE_AFFORDANCE), (40.0, FALSE_AFFORDANCE)] {
                    self.writer.text(
                        MARGIN_X + offset,
                        self.y + 4.5,
                        BODY_SIZE,
                        false,
                        Rgb::BLACK,
                        label,
                    );
                }
                self.y += LINE_HEIGHT;
            }
            Affordance::AnswerLines(lines) => {
                for _ in 0..*lines {
                    self.ensure_space(ANSWER_LINE_SPACING);
                    self.y += ANSWER_LINE_SPACING;
                    self.writer
                        .dashed_line(MARGIN_X + 5.0, self.y, PAGE_WIDTH_MM - MARGIN_X, Rgb::LIGHT_GRAY);
                }
            }
            Affordance::None => {}
        }

        self.y += 3.0;
        if !kind.is_answer_key() {
            self.writer.line(
                MARGIN_X,
                self.y,
                PAGE_WIDTH_MM - MARGIN_X,
                self.y,
                0.2,
                Rgb::LIGHT_GRAY,
            );
            self.y += 4.0;
        }
    }
}
