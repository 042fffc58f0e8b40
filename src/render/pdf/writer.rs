//! 最小 PDF 写出器
//!
//! 只支持本项目需要的内容：内嵌 DejaVu Sans 文本、直线、矩形。
//! 坐标以毫米为单位、原点在页面左上角，写出时换算为 PDF 用户空间。
//! 内容流不压缩，同样的输入总是得到同样的字节。
//!
//! 页眉页脚用 `/Artifact` 标记包住，回读正文时跳过。

use super::font::{to_unicode_cmap, FontFace, GlyphMap};
use crate::error::RenderError;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt::Write as _;

pub const PAGE_WIDTH_MM: f64 = 210.0;
pub const PAGE_HEIGHT_MM: f64 = 297.0;

const PT_PER_MM: f64 = 72.0 / 25.4;
const PAGE_WIDTH_PT: f64 = PAGE_WIDTH_MM * PT_PER_MM;
const PAGE_HEIGHT_PT: f64 = PAGE_HEIGHT_MM * PT_PER_MM;

/// 字体资源名：常规 / 粗体
const FONT_RESOURCES: [&str; 2] = ["F1", "F2"];
/// 每个字体占用的对象：Type0、CIDFont、FontDescriptor、FontFile2、ToUnicode
const OBJECTS_PER_FONT: usize = 5;
/// 1: Catalog, 2: Pages, 3: Info
const FIRST_FONT_OBJECT: usize = 4;
const FIRST_PAGE_OBJECT: usize = FIRST_FONT_OBJECT + OBJECTS_PER_FONT * FONT_RESOURCES.len();

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f64, pub f64, pub f64);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0.0, 0.0, 0.0);
    pub const RED: Rgb = Rgb(0.85, 0.0, 0.0);
    pub const LIGHT_GRAY: Rgb = Rgb(0.78, 0.78, 0.78);
    pub const HIGHLIGHT: Rgb = Rgb(1.0, 0.95, 0.6);
}

#[derive(Debug, Clone, PartialEq)]
enum Op {
    Text {
        x: f64,
        y: f64,
        size: f64,
        bold: bool,
        color: Rgb,
        text: String,
    },
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        width: f64,
        color: Rgb,
        dashed: bool,
    },
    Rect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        fill: Option<Rgb>,
    },
    BeginArtifact,
    EndArtifact,
}

#[derive(Debug, Default)]
struct Page {
    ops: Vec<Op>,
}

/// PDF 文档构建器
pub struct PdfWriter {
    title: String,
    pages: Vec<Page>,
    fonts: [FontFace; 2],
}

impl PdfWriter {
    pub fn new(title: impl Into<String>) -> Result<Self, RenderError> {
        Ok(Self {
            title: title.into(),
            pages: Vec::new(),
            fonts: [FontFace::regular()?, FontFace::bold()?],
        })
    }

    pub fn add_page(&mut self) {
        self.pages.push(Page::default());
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn push(&mut self, op: Op) {
        if self.pages.is_empty() {
            self.add_page();
        }
        if let Some(page) = self.pages.last_mut() {
            page.ops.push(op);
        }
    }

    fn font(&self, bold: bool) -> &FontFace {
        &self.fonts[usize::from(bold)]
    }

    /// `y` 为文本基线
    pub fn text(&mut self, x: f64, y: f64, size: f64, bold: bool, color: Rgb, text: &str) {
        self.push(Op::Text {
            x,
            y,
            size,
            bold,
            color,
            text: text.to_string(),
        });
    }

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, width: f64, color: Rgb) {
        self.push(Op::Line {
            x1,
            y1,
            x2,
            y2,
            width,
            color,
            dashed: false,
        });
    }

    pub fn dashed_line(&mut self, x1: f64, y: f64, x2: f64, color: Rgb) {
        self.push(Op::Line {
            x1,
            y1: y,
            x2,
            y2: y,
            width: 0.3,
            color,
            dashed: true,
        });
    }

    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: Option<Rgb>) {
        self.push(Op::Rect { x, y, w, h, fill });
    }

    /// 之后的内容属于页眉页脚，直到 [`PdfWriter::end_artifact`]
    pub fn begin_artifact(&mut self) {
        self.push(Op::BeginArtifact);
    }

    pub fn end_artifact(&mut self) {
        self.push(Op::EndArtifact);
    }

    /// 文本宽度（毫米）
    pub fn text_width(&self, text: &str, size: f64, bold: bool) -> f64 {
        self.font(bold).text_units(text) * size / 1000.0 / PT_PER_MM
    }

    /// 按实际字宽折行；保留原文中的换行，放不下的长单词按宽度硬切
    pub fn wrap(&self, text: &str, max_width: f64, size: f64, bold: bool) -> Vec<String> {
        let fits = |s: &str| self.text_width(s, size, bold) <= max_width;

        let mut lines = Vec::new();
        for paragraph in text.split('\n') {
            let mut current = String::new();
            for word in paragraph.split_whitespace() {
                let candidate = if current.is_empty() {
                    word.to_string()
                } else {
                    format!("{} {}", current, word)
                };
                if fits(&candidate) {
                    current = candidate;
                    continue;
                }
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                for c in word.chars() {
                    current.push(c);
                    if !fits(&current) && current.chars().count() > 1 {
                        current.pop();
                        lines.push(std::mem::take(&mut current));
                        current.push(c);
                    }
                }
            }
            lines.push(current);
        }
        lines
    }

    /// 写出完整 PDF
    pub fn finish(self) -> Vec<u8> {
        let mut pages = self.pages;
        if pages.is_empty() {
            pages.push(Page::default());
        }

        let mut used: [GlyphMap; 2] = [GlyphMap::new(), GlyphMap::new()];
        let streams: Vec<Vec<u8>> = pages
            .iter()
            .map(|page| content_stream(&page.ops, &self.fonts, &mut used))
            .collect();

        let mut objects: Vec<Vec<u8>> = Vec::new();
        let kids: Vec<String> = (0..pages.len())
            .map(|i| format!("{} 0 R", FIRST_PAGE_OBJECT + i * 2))
            .collect();
        objects.push(b"<< /Type /Catalog /Pages 2 0 R >>".to_vec());
        objects.push(
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                pages.len()
            )
            .into_bytes(),
        );
        objects.push(
            format!(
                "<< /Title {} /Producer (exam_compose) >>",
                utf16_string(&self.title)
            )
            .into_bytes(),
        );

        for (idx, font) in self.fonts.iter().enumerate() {
            let base = FIRST_FONT_OBJECT + idx * OBJECTS_PER_FONT;
            objects.push(
                format!(
                    "<< /Type /Font /Subtype /Type0 /BaseFont /{} /Encoding /Identity-H \
                     /DescendantFonts [{} 0 R] /ToUnicode {} 0 R >>",
                    font.name(),
                    base + 1,
                    base + 4
                )
                .into_bytes(),
            );
            objects.push(
                format!(
                    "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /{} \
                     /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> \
                     /FontDescriptor {} 0 R /DW 1000 /W {} /CIDToGIDMap /Identity >>",
                    font.name(),
                    base + 2,
                    font.widths(&used[idx])
                )
                .into_bytes(),
            );
            objects.push(font.descriptor(base + 3).into_bytes());
            objects.push(stream_object(
                &format!("/Length1 {}", font.data().len()),
                font.data(),
            ));
            objects.push(stream_object(
                "",
                to_unicode_cmap(FONT_RESOURCES[idx], &used[idx]).as_bytes(),
            ));
        }

        let font_refs: String = FONT_RESOURCES
            .iter()
            .enumerate()
            .map(|(idx, name)| format!("/{} {} 0 R", name, FIRST_FONT_OBJECT + idx * OBJECTS_PER_FONT))
            .collect::<Vec<_>>()
            .join(" ");
        for (i, stream) in streams.iter().enumerate() {
            let content_id = FIRST_PAGE_OBJECT + i * 2 + 1;
            objects.push(
                format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                     /Resources << /Font << {} >> >> /Contents {} 0 R >>",
                    PAGE_WIDTH_PT, PAGE_HEIGHT_PT, font_refs, content_id
                )
                .into_bytes(),
            );
            objects.push(stream_object("", stream));
        }

        let mut out: Vec<u8> = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend(format!("{} 0 obj\n", i + 1).into_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let xref_offset = out.len();
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            let _ = writeln!(xref, "{:010} 00000 n ", offset);
        }
        let _ = write!(
            xref,
            "trailer\n<< /Size {} /Root 1 0 R /Info 3 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        );
        out.extend(xref.into_bytes());
        out
    }
}

fn stream_object(extra: &str, data: &[u8]) -> Vec<u8> {
    let mut obj = if extra.is_empty() {
        format!("<< /Length {} >>\nstream\n", data.len())
    } else {
        format!("<< /Length {} {} >>\nstream\n", data.len(), extra)
    }
    .into_bytes();
    obj.extend_from_slice(data);
    obj.extend_from_slice(b"\nendstream");
    obj
}

/// PDF 文本字符串（UTF-16BE，带 BOM）
fn utf16_string(text: &str) -> String {
    let mut out = String::from("<FEFF");
    for unit in text.encode_utf16() {
        let _ = write!(out, "{:04X}", unit);
    }
    out.push('>');
    out
}

fn pt(mm: f64) -> f64 {
    mm * PT_PER_MM
}

fn flip(y_mm: f64) -> f64 {
    PAGE_HEIGHT_PT - pt(y_mm)
}

fn color_ops(color: Rgb, stroke: bool) -> String {
    let op = if stroke { "RG" } else { "rg" };
    format!("{:.3} {:.3} {:.3} {}", color.0, color.1, color.2, op)
}

fn content_stream(ops: &[Op], fonts: &[FontFace; 2], used: &mut [GlyphMap; 2]) -> Vec<u8> {
    let mut out = String::new();
    for op in ops {
        match op {
            Op::Text {
                x,
                y,
                size,
                bold,
                color,
                text,
            } => {
                let idx = usize::from(*bold);
                let hex = fonts[idx].encode(text, &mut used[idx]);
                let _ = writeln!(
                    out,
                    "BT {} /{} {:.1} Tf {:.2} {:.2} Td <{}> Tj ET",
                    color_ops(*color, false),
                    FONT_RESOURCES[idx],
                    size,
                    pt(*x),
                    flip(*y),
                    hex
                );
            }
            Op::Line {
                x1,
                y1,
                x2,
                y2,
                width,
                color,
                dashed,
            } => {
                let dash = if *dashed { "[1 1] 0 d " } else { "" };
                let _ = writeln!(
                    out,
                    "q {}{} {:.2} w {:.2} {:.2} m {:.2} {:.2} l S Q",
                    dash,
                    color_ops(*color, true),
                    pt(*width),
                    pt(*x1),
                    flip(*y1),
                    pt(*x2),
                    flip(*y2)
                );
            }
            Op::Rect { x, y, w, h, fill } => {
                let paint = match fill {
                    Some(color) => format!("{} ", color_ops(*color, false)),
                    None => String::new(),
                };
                let _ = writeln!(
                    out,
                    "q {}{:.2} {:.2} {:.2} {:.2} re {} Q",
                    paint,
                    pt(*x),
                    flip(*y + *h),
                    pt(*w),
                    pt(*h),
                    if fill.is_some() { "f" } else { "S" }
                );
            }
            Op::BeginArtifact => out.push_str("/Artifact BMC\n"),
            Op::EndArtifact => out.push_str("EMC\n"),
        }
    }
    out.into_bytes()
}

/// 回读正文文字（跳过页眉页脚），每个元素是一次文本输出
///
/// 只认本写出器生成的结构。
pub fn extract_text(pdf: &[u8]) -> Result<Vec<String>, RenderError> {
    read_text_runs(pdf, false)
}

/// 回读全部文字，包括页眉页脚
pub fn extract_all_text(pdf: &[u8]) -> Result<Vec<String>, RenderError> {
    read_text_runs(pdf, true)
}

fn read_text_runs(pdf: &[u8], include_artifacts: bool) -> Result<Vec<String>, RenderError> {
    let content = String::from_utf8_lossy(pdf);
    let regex = |pattern: &str| {
        Regex::new(pattern).map_err(|e| RenderError::Pdf(format!("正则表达式无效: {}", e)))
    };

    let cmap_re = regex(r"(?s)/CMapName /(F\d)-UCS def(.*?)endcmap")?;
    let block_re = regex(r"(?s)beginbfchar(.*?)endbfchar")?;
    let entry_re = regex(r"<([0-9A-F]{4})> <([0-9A-F]+)>")?;

    let mut maps: BTreeMap<String, BTreeMap<u16, String>> = BTreeMap::new();
    for cmap in cmap_re.captures_iter(&content) {
        let map = maps.entry(cmap[1].to_string()).or_default();
        for block in block_re.captures_iter(&cmap[2]) {
            for entry in entry_re.captures_iter(&block[1]) {
                let glyph = u16::from_str_radix(&entry[1], 16)
                    .map_err(|e| RenderError::Pdf(format!("ToUnicode 无效: {}", e)))?;
                map.insert(glyph, decode_utf16_hex(&entry[2])?);
            }
        }
    }

    let start = content
        .find("/Type /Page /Parent")
        .ok_or_else(|| RenderError::Pdf("没有页面".to_string()))?;
    let op_re = regex(
        r"/Artifact BMC|EMC|/(F\d) [\d.]+ Tf [-\d.]+ [-\d.]+ Td <([0-9A-F]*)> Tj",
    )?;

    let mut runs = Vec::new();
    let mut in_artifact = false;
    for op in op_re.captures_iter(&content[start..]) {
        match &op[0] {
            "/Artifact BMC" => in_artifact = true,
            "EMC" => in_artifact = false,
            _ => {
                if in_artifact && !include_artifacts {
                    continue;
                }
                let map = maps
                    .get(&op[1])
                    .ok_or_else(|| RenderError::Pdf(format!("字体 {} 缺少 ToUnicode", &op[1])))?;
                let hex = &op[2];
                let mut text = String::new();
                for i in (0..hex.len()).step_by(4) {
                    let glyph = u16::from_str_radix(&hex[i..(i + 4).min(hex.len())], 16)
                        .map_err(|e| RenderError::Pdf(format!("字形编号无效: {}", e)))?;
                    if let Some(s) = map.get(&glyph) {
                        text.push_str(s);
                    }
                }
                runs.push(text);
            }
        }
    }
    Ok(runs)
}

fn decode_utf16_hex(hex: &str) -> Result<String, RenderError> {
    let units = (0..hex.len())
        .step_by(4)
        .map(|i| u16::from_str_radix(&hex[i..(i + 4).min(hex.len())], 16))
        .collect::<Result<Vec<u16>, _>>()
        .map_err(|e| RenderError::Pdf(format!("ToUnicode 无效: {}", e)))?;
    String::from_utf16(&units).map_err(|e| RenderError::Pdf(format!("ToUnicode 无效: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turkish_text_round_trips() {
        let line = "Türkiye'nin başkenti neresidir? Ağrı İzmir Şişli Ğ (ıİ) \\";
        let mut writer = PdfWriter::new("Sınav").unwrap();
        writer.text(10.0, 20.0, 11.0, false, Rgb::BLACK, line);
        writer.text(10.0, 30.0, 11.0, true, Rgb::RED, "Doğru cevap: Ç");
        let bytes = writer.finish();

        assert_eq!(
            extract_text(&bytes).unwrap(),
            vec![line.to_string(), "Doğru cevap: Ç".to_string()]
        );
        let raw = String::from_utf8_lossy(&bytes);
        assert!(!raw.contains("ba?kenti"));
        assert!(raw.contains("/Subtype /CIDFontType2"));
        assert!(raw.contains("/FontFile2"));
    }

    #[test]
    fn characters_missing_from_font_become_question_marks() {
        let mut writer = PdfWriter::new("Test").unwrap();
        writer.text(10.0, 20.0, 11.0, false, Rgb::BLACK, "a中b");
        assert_eq!(extract_text(&writer.finish()).unwrap(), vec!["a?b"]);
    }

    #[test]
    fn artifacts_are_skipped_when_reading_body_text() {
        let mut writer = PdfWriter::new("Test").unwrap();
        writer.begin_artifact();
        writer.text(10.0, 10.0, 14.0, true, Rgb::BLACK, "Başlık");
        writer.end_artifact();
        writer.text(10.0, 20.0, 11.0, false, Rgb::BLACK, "Gövde");
        let bytes = writer.finish();

        assert_eq!(extract_text(&bytes).unwrap(), vec!["Gövde"]);
        assert_eq!(extract_all_text(&bytes).unwrap(), vec!["Başlık", "Gövde"]);
    }

    #[test]
    fn wraps_by_measured_width() {
        let writer = PdfWriter::new("Test").unwrap();
        let text = "Aşağıdakilerden hangisi bir hücre organeli değildir ve neden böyledir";
        let width = 60.0;
        let lines = writer.wrap(text, width, 11.0, false);

        assert!(lines.len() > 1);
        for line in &lines {
            assert!(writer.text_width(line, 11.0, false) <= width);
        }
        assert_eq!(lines.join(" "), text);
        assert_eq!(writer.wrap("", 100.0, 11.0, false), vec![String::new()]);
    }

    #[test]
    fn long_words_are_split_without_losing_characters() {
        let writer = PdfWriter::new("Test").unwrap();
        let word = "Çekoslovakyalılaştıramadıklarımızdanmışsınız";
        let lines = writer.wrap(word, 20.0, 11.0, false);

        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), word);
        for line in &lines {
            assert!(writer.text_width(line, 11.0, false) <= 20.0);
        }
    }

    #[test]
    fn output_has_valid_skeleton() {
        let mut writer = PdfWriter::new("Test").unwrap();
        writer.add_page();
        writer.text(10.0, 20.0, 11.0, false, Rgb::BLACK, "Hello");
        writer.add_page();
        writer.dashed_line(10.0, 40.0, 100.0, Rgb::LIGHT_GRAY);
        let bytes = writer.finish();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.contains("/Count 2"));
        assert!(text.contains("[1 1] 0 d"));
        assert!(text.trim_end().ends_with("%%EOF"));
        assert_eq!(extract_text(&bytes).unwrap(), vec!["Hello"]);
    }

    #[test]
    fn output_is_deterministic() {
        let build = || {
            let mut writer = PdfWriter::new("Aynı").unwrap();
            writer.text(10.0, 20.0, 11.0, true, Rgb::RED, "Aynı girdi");
            writer.finish()
        };
        assert_eq!(build(), build());
    }
}
