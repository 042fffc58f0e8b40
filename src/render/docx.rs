//! Word 渲染器（流式排版，分页交给文字处理软件）

use crate::error::RenderError;
use crate::render::content::{
    block_flags, plan_header, plan_questions, Affordance, DocumentFormat, DocumentKind,
    DocumentMeta, DocumentRenderer, HeaderBlock, QuestionBlock, RenderOptions, RenderedDocument,
    CORRECT_ANSWER_LABEL, FALSE_AFFORDANCE, IDENTIFICATION_FIELDS, TRUE_AFFORDANCE,
};
use crate::services::booklet::BookletVariant;
use docx_rs::{
    AlignmentType, Docx, FieldCharType, Footer, Header, InstrPAGE, InstrText, Paragraph, Run,
    Table, TableCell, TableRow,
};
use regex::Regex;
use std::io::{Cursor, Read};
use tracing::debug;

/// 问答题一行作答线
const ANSWER_LINE: &str =
    "________________________________________________________________________________";

/// Word 渲染器
#[derive(Debug, Clone, Default)]
pub struct DocxRenderer {
    options: RenderOptions,
}

impl DocxRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }
}

impl DocumentRenderer for DocxRenderer {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    fn render(
        &self,
        variant: &BookletVariant,
        meta: &DocumentMeta,
        kind: DocumentKind,
    ) -> Result<RenderedDocument, RenderError> {
        let header = plan_header(meta, kind);
        let blocks = plan_questions(variant, kind, &self.options);

        let mut docx = header_section(Docx::new(), &header, &meta.course_code);
        for block in &blocks {
            docx = question_section(docx, block);
        }

        let mut cursor = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut cursor)
            .map_err(|e| RenderError::Docx(e.to_string()))?;
        let bytes = cursor.into_inner();

        debug!(
            "📝 Word 渲染完成: {} 分组 {}, {} 字节",
            kind.artifact_name(),
            variant.group,
            bytes.len()
        );

        Ok(RenderedDocument {
            format: DocumentFormat::Docx,
            kind,
            group: variant.group,
            bytes,
            questions: blocks.iter().map(Into::into).collect(),
            flags: block_flags(&blocks),
        })
    }
}

fn header_section(docx: Docx, header: &HeaderBlock, course_code: &str) -> Docx {
    let running = Header::new().add_paragraph(
        Paragraph::new()
            .add_run(Run::new().add_text(&header.title_line).size(18))
            .align(AlignmentType::Right),
    );
    // "{课程} - Page N"，N 为 PAGE 域
    let footer = Footer::new().add_paragraph(
        Paragraph::new()
            .add_run(Run::new().add_text(format!("{} - Page ", course_code)).size(16))
            .add_run(Run::new().add_field_char(FieldCharType::Begin, false).size(16))
            .add_run(Run::new().add_instr_text(InstrText::PAGE(InstrPAGE::new())).size(16))
            .add_run(Run::new().add_field_char(FieldCharType::Separate, false).size(16))
            .add_run(Run::new().add_text("1").size(16))
            .add_run(Run::new().add_field_char(FieldCharType::End, false).size(16))
            .align(AlignmentType::Center),
    );

    let mut docx = docx
        .header(running)
        .footer(footer)
        .add_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_text(&header.title_line).bold().size(32))
                .align(AlignmentType::Center),
        )
        .add_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_text(&header.meta_line).bold())
                .align(AlignmentType::Center),
        );

    if header.identification {
        let rows: Vec<TableRow> = IDENTIFICATION_FIELDS
            .chunks(2)
            .map(|pair| {
                TableRow::new(
                    pair.iter()
                        .map(|label| {
                            TableCell::new()
                                .add_paragraph(Paragraph::new().add_run(Run::new().add_text(*label)))
                        })
                        .collect(),
                )
            })
            .collect();
        docx = docx.add_table(Table::new(rows));
    }

    if let Some(marker) = &header.booklet_marker {
        docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(marker).bold()));
    }

    docx.add_paragraph(Paragraph::new())
}

fn question_section(mut docx: Docx, block: &QuestionBlock) -> Docx {
    docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(&block.heading).bold()));

    if let Some(answer) = &block.correct_answer {
        docx = docx.add_paragraph(
            Paragraph::new().add_run(
                Run::new()
                    .add_text(format!("{} {}", CORRECT_ANSWER_LABEL, answer))
                    .bold()
                    .color("C00000")
                    .highlight("yellow"),
            ),
        );
    }

    match &block.affordance {
        Affordance::Options(options) => {
            for (key, text) in options {
                docx = docx.add_paragraph(
                    Paragraph::new()
                        .add_run(Run::new().add_text(format!("{})", key)).bold())
                        .add_run(Run::new().add_text(format!(" {}", text))),
                );
            }
        }
        Affordance::TrueFalse => {
            docx = docx.add_paragraph(
                Paragraph::new()
                    .add_run(Run::new().add_text(TRUE_AFFORDANCE))
                    .add_run(Run::new().add_tab())
                    .add_run(Run::new().add_text(FALSE_AFFORDANCE)),
            );
        }
        Affordance::AnswerLines(lines) => {
            for _ in 0..*lines {
                docx = docx.add_paragraph(
                    Paragraph::new().add_run(Run::new().add_text(ANSWER_LINE).color("A0A0A0")),
                );
            }
        }
        Affordance::None => {}
    }

    docx.add_paragraph(Paragraph::new())
}

/// 回读正文（`word/document.xml`）中的文字，每个元素是一个 `w:t`
pub fn extract_text(docx: &[u8]) -> Result<Vec<String>, RenderError> {
    read_part_text(docx, "word/document.xml")
}

fn read_part(docx: &[u8], name: &str) -> Result<String, RenderError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(docx))
        .map_err(|e| RenderError::Docx(format!("无法读取文档: {}", e)))?;
    let mut xml = String::new();
    archive
        .by_name(name)
        .map_err(|e| RenderError::Docx(format!("缺少 {}: {}", name, e)))?
        .read_to_string(&mut xml)
        .map_err(|e| RenderError::Docx(format!("读取 {} 失败: {}", name, e)))?;
    Ok(xml)
}

fn read_part_text(docx: &[u8], name: &str) -> Result<Vec<String>, RenderError> {
    let xml = read_part(docx, name)?;
    let re = Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>")
        .map_err(|e| RenderError::Docx(format!("正则表达式无效: {}", e)))?;
    Ok(re
        .captures_iter(&xml)
        .map(|c| unescape_xml(&c[1]))
        .collect())
}

fn unescape_xml(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .map(|hex| u32::from_str_radix(hex, 16))
                .or_else(|| entity.strip_prefix('#').map(|dec| dec.parse::<u32>()))
                .and_then(|code| code.ok())
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => out.push(c),
            None => out.push_str(&tail[..=end]),
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    out
}
