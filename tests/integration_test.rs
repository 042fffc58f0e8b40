use chrono::NaiveDate;
use exam_compose::error::ComposeError;
use exam_compose::models::question::{Complexity, Options, QuestionType};
use exam_compose::render::content::DocumentRenderer;
use exam_compose::render::{
    docx, pdf, verify_rendered_text, ClassicalLines, DocumentMeta, RenderOptions,
};
use exam_compose::services::{generate_variant, BookletVariant};
use exam_compose::{
    build_bundle, BookletGroup, CountMatrix, DocumentKind, DocxRenderer, ExamArchive, ExamCtx,
    FinalizeOutcome, InMemoryArchive, InMemoryPool, PdfRenderer, Question, QuestionId,
    ScorePolicy, SelectionCriteria, Setup,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use regex::Regex;
use std::io::Cursor;

fn question(id: u64, question_type: QuestionType, complexity: Complexity) -> Question {
    let (options, answer) = match question_type {
        QuestionType::MultipleChoice => (
            [("A", "Nucleus"), ("B", "Membrane"), ("C", "Wall"), ("D", "Plastid")]
                .into_iter()
                .collect::<Options>(),
            "B",
        ),
        QuestionType::TrueFalse => (Options::new(), "False"),
        QuestionType::Classical => (Options::new(), ""),
    };
    Question {
        id: QuestionId(id),
        course_code: "BIO101".to_string(),
        topic_area: if id % 2 == 0 { "Cells" } else { "Genetics" }.to_string(),
        complexity,
        question_type,
        score: 5.0 + id as f64,
        base_score: None,
        text: format!("Question {} text", id),
        options,
        correct_answer: answer.to_string(),
        created_by: "ayse".to_string(),
        flags: Vec::new(),
    }
}

/// 5 道 MC/easy、3 道 TF/medium、2 道 CL/hard
fn bio_pool() -> InMemoryPool {
    let mut questions = Vec::new();
    for id in 1..=5 {
        questions.push(question(id, QuestionType::MultipleChoice, Complexity::Easy));
    }
    for id in 6..=8 {
        questions.push(question(id, QuestionType::TrueFalse, Complexity::Medium));
    }
    for id in 9..=10 {
        questions.push(question(id, QuestionType::Classical, Complexity::Hard));
    }
    InMemoryPool::new(questions)
}

fn meta(group: BookletGroup) -> DocumentMeta {
    DocumentMeta {
        title: "Biology Midterm".to_string(),
        course_code: "BIO101".to_string(),
        group,
        generated_on: NaiveDate::from_ymd_opt(2026, 4, 20).unwrap(),
    }
}

fn pdf_texts(bytes: &[u8]) -> Vec<String> {
    pdf::extract_text(bytes).unwrap()
}

fn docx_texts(bytes: &[u8]) -> Vec<String> {
    docx::extract_text(bytes).unwrap()
}

fn squeeze(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn headings(texts: &[String]) -> Vec<String> {
    let numbered = Regex::new(r"^\d+\. ").unwrap();
    texts
        .iter()
        .filter(|t| numbered.is_match(t))
        .cloned()
        .collect()
}

fn answers(texts: &[String]) -> Vec<String> {
    texts
        .iter()
        .filter(|t| t.starts_with("CORRECT ANSWER:"))
        .cloned()
        .collect()
}

fn mixed_variant(group: char, seed: u64) -> BookletVariant {
    let questions = vec![
        question(1, QuestionType::MultipleChoice, Complexity::Easy),
        question(6, QuestionType::TrueFalse, Complexity::Medium),
        question(9, QuestionType::Classical, Complexity::Hard),
        question(2, QuestionType::MultipleChoice, Complexity::Easy),
    ];
    generate_variant(
        &questions,
        BookletGroup::new(group).unwrap(),
        &mut StdRng::seed_from_u64(seed),
    )
}

#[test]
fn wizard_to_bundle_end_to_end() {
    let pool = bio_pool();
    let mut archive = InMemoryArchive::new();
    let mut rng = StdRng::seed_from_u64(2026);

    let ctx = ExamCtx::new("Biology Midterm", "BIO101", 100.0, "ayse")
        .with_policy(ScorePolicy::Equal);
    let criteria = SelectionCriteria::Stratified {
        matrix: CountMatrix::new()
            .with(QuestionType::MultipleChoice, Complexity::Easy, 2)
            .with(QuestionType::TrueFalse, Complexity::Medium, 1)
            .with(QuestionType::Classical, Complexity::Hard, 1),
        topics: Vec::new(),
    };

    let preview = Setup::new(ctx)
        .unwrap()
        .select(&pool, &criteria, &mut rng)
        .unwrap()
        .allocate()
        .unwrap();
    assert!(preview.questions().iter().all(|q| q.score == 25.0));

    let mut finish = match preview.finalize(false) {
        FinalizeOutcome::Finalized(finish) => finish,
        other => panic!("unexpected {:?}", other),
    };
    let exam_id = finish.archive(&mut archive).unwrap();
    assert!(archive.load(exam_id).unwrap().is_final());

    let groups = BookletGroup::first(2).unwrap();
    let report = build_bundle(
        finish.snapshot(),
        &groups,
        RenderOptions::default(),
        NaiveDate::from_ymd_opt(2026, 4, 20).unwrap(),
        &mut rng,
    )
    .unwrap();
    assert_eq!(report.bundle.len(), 8);

    let zip_bytes = report.bundle.to_zip().unwrap();
    let mut zip = zip::ZipArchive::new(Cursor::new(zip_bytes)).unwrap();
    let mut names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "answer_key_A_BIO101.docx",
            "answer_key_A_BIO101.pdf",
            "answer_key_B_BIO101.docx",
            "answer_key_B_BIO101.pdf",
            "exam_A_BIO101.docx",
            "exam_A_BIO101.pdf",
            "exam_B_BIO101.docx",
            "exam_B_BIO101.pdf",
        ]
    );
}

#[test]
fn pdf_and_docx_carry_the_same_content() {
    let variant = mixed_variant('B', 17);
    let meta = meta(variant.group);

    for kind in DocumentKind::ALL {
        let pdf = PdfRenderer::default().render(&variant, &meta, kind).unwrap();
        let docx = DocxRenderer::default().render(&variant, &meta, kind).unwrap();

        assert_eq!(pdf.questions, docx.questions);

        let pdf_texts = pdf_texts(&pdf.bytes);
        let docx_texts = docx_texts(&docx.bytes);
        assert_eq!(headings(&pdf_texts), headings(&docx_texts));
        assert_eq!(headings(&pdf_texts).len(), 4);
        assert_eq!(answers(&pdf_texts), answers(&docx_texts));
    }
}

/// 每段文字都远超一行宽度，并包含土耳其语字母
fn long_turkish_variant(group: char, seed: u64) -> BookletVariant {
    let mut mc = question(1, QuestionType::MultipleChoice, Complexity::Easy);
    mc.text = "Aşağıdakilerden hangisi, hücre zarının seçici geçirgenliğini açıklayan ve \
               ökaryotik hücrelerde madde alışverişini düzenleyen yapısal özelliklerden \
               biri olarak gösterilebilir? Çözümünüzü gerekçesiyle birlikte işaretleyiniz."
        .to_string();
    mc.options = [
        ("A", "Çift katlı fosfolipit tabakası ve bu tabakaya gömülü taşıyıcı proteinler sayesinde yalnızca belirli moleküllerin geçişine izin vermesi"),
        ("B", "Işık enerjisini kimyasal enerjiye dönüştüren pigmentleri içermesi"),
        ("C", "Genetik şifreyi taşıyan DNA moleküllerini çekirdek içinde sıkıca paketlemesi ve bölünme sırasında kromozomlara dönüştürmesi"),
        ("D", "Üzüm şekerinin parçalanmasıyla ATP üretmesi"),
    ]
    .into_iter()
    .collect::<Options>();
    mc.correct_answer = "A".to_string();

    let mut tf = question(6, QuestionType::TrueFalse, Complexity::Medium);
    tf.text = "Mitokondri, kendi DNA'sına sahip olduğu için hücre bölünmesinden bağımsız \
               olarak çoğalabilir ve bu özellik endosimbiyotik kuramın en güçlü \
               kanıtlarından biri olarak kabul edilir; İğdır, Muğla ve Şırnak örneklerinde \
               olduğu gibi bölgesel çalışmalar da bunu doğrular."
        .to_string();

    let mut cl = question(9, QuestionType::Classical, Complexity::Hard);
    cl.text = "Fotosentez ile oksijenli solunum arasındaki ilişkiyi, enerji dönüşümleri ve \
               madde döngüsü açısından karşılaştırarak açıklayınız; görüşlerinizi en az üç \
               örnekle destekleyiniz ve çizdiğiniz şemadaki ğ, ş, ı, ö, ü, ç harflerini \
               okunaklı yazınız."
        .to_string();

    generate_variant(
        &[mc, tf, cl],
        BookletGroup::new(group).unwrap(),
        &mut StdRng::seed_from_u64(seed),
    )
}

#[test]
fn long_turkish_text_reads_back_from_both_formats() {
    for group in ['A', 'B'] {
        let variant = long_turkish_variant(group, 8);
        let meta = meta(variant.group);

        for kind in DocumentKind::ALL {
            let pdf = PdfRenderer::default().render(&variant, &meta, kind).unwrap();
            let docx = DocxRenderer::default().render(&variant, &meta, kind).unwrap();
            let pdf_runs = pdf_texts(&pdf.bytes);
            let docx_runs = docx_texts(&docx.bytes);

            // 长文本在 PDF 中折成多行，Word 中是一整段
            for question in &variant.questions {
                assert!(!pdf_runs.iter().any(|run| run.contains(&question.text)));
            }

            verify_rendered_text(&pdf.questions, &pdf_runs).unwrap();
            verify_rendered_text(&docx.questions, &docx_runs).unwrap();

            let pdf_body = squeeze(&pdf_runs.concat());
            let docx_body = squeeze(&docx_runs.concat());
            for question in &variant.questions {
                assert!(pdf_body.contains(&squeeze(&question.text)));
                assert!(docx_runs.iter().any(|run| run.contains(&question.text)));
                if kind.is_answer_key() {
                    continue;
                }
                for (_, text) in question.options.iter() {
                    assert!(pdf_body.contains(&squeeze(text)));
                    assert!(docx_body.contains(&squeeze(text)));
                }
            }
        }
    }
}

#[test]
fn bundle_checks_rendered_text_for_long_questions() {
    let variant = long_turkish_variant('A', 1);
    let snapshot = exam_compose::ExamSnapshot {
        title: "Biyoloji Ara Sınavı".to_string(),
        course_code: "BIO101".to_string(),
        total_score: 100.0,
        questions: variant.questions,
        created_by: "ayse".to_string(),
        status: exam_compose::ExamStatus::Final,
        archived: false,
        created_at: chrono::Utc::now(),
    };

    let report = build_bundle(
        &snapshot,
        &BookletGroup::first(3).unwrap(),
        RenderOptions::default(),
        NaiveDate::from_ymd_opt(2026, 4, 20).unwrap(),
        &mut StdRng::seed_from_u64(4),
    )
    .unwrap();
    assert_eq!(report.bundle.len(), 12);
    assert_eq!(report.flagged, 0);

    let key = report.bundle.get("answer_key_B_BIO101.pdf").unwrap();
    assert_eq!(answers(&pdf_texts(&key.bytes)).len(), 3);

    let exam = report.bundle.get("exam_C_BIO101.docx").unwrap();
    let runs = docx_texts(&exam.bytes);
    assert!(squeeze(&runs.concat()).contains(&squeeze("Işık enerjisini kimyasal enerjiye")));
}

#[test]
fn answer_key_follows_relabelled_options() {
    let variant = mixed_variant('C', 3);
    let key = PdfRenderer::default()
        .render(&variant, &meta(variant.group), DocumentKind::AnswerKey)
        .unwrap();
    let answers = answers(&pdf_texts(&key.bytes));

    assert_eq!(answers.len(), variant.questions.len());
    for (question, answer) in variant.questions.iter().zip(&answers) {
        let expected = match question.correct_answer.as_str() {
            "" => "-",
            value => value,
        };
        assert_eq!(answer, &format!("CORRECT ANSWER: {}", expected));
        if question.question_type == QuestionType::MultipleChoice {
            assert_eq!(question.correct_option_text(), Some("Membrane"));
        }
    }
}

#[test]
fn classical_lines_only_in_exam_document() {
    let variant = BookletVariant {
        group: BookletGroup::CANONICAL,
        questions: vec![question(9, QuestionType::Classical, Complexity::Hard)],
        flags: Vec::new(),
    };
    let meta = meta(variant.group);
    let options = RenderOptions {
        classical_lines: ClassicalLines::new(5).unwrap(),
    };

    let exam = PdfRenderer::new(options)
        .render(&variant, &meta, DocumentKind::Exam)
        .unwrap();
    let key = PdfRenderer::new(options)
        .render(&variant, &meta, DocumentKind::AnswerKey)
        .unwrap();
    let exam_pdf = String::from_utf8_lossy(&exam.bytes).into_owned();
    let key_pdf = String::from_utf8_lossy(&key.bytes).into_owned();
    assert_eq!(exam_pdf.matches("[1 1] 0 d").count(), 5);
    assert_eq!(key_pdf.matches("[1 1] 0 d").count(), 0);

    let exam = DocxRenderer::new(options)
        .render(&variant, &meta, DocumentKind::Exam)
        .unwrap();
    let key = DocxRenderer::new(options)
        .render(&variant, &meta, DocumentKind::AnswerKey)
        .unwrap();
    let is_line = |t: &String| !t.is_empty() && t.chars().all(|c| c == '_');
    assert_eq!(docx_texts(&exam.bytes).iter().filter(|t| is_line(*t)).count(), 5);
    assert_eq!(docx_texts(&key.bytes).iter().filter(|t| is_line(*t)).count(), 0);
    assert_eq!(exam.questions[0].answer_lines, 5);
    assert_eq!(key.questions[0].answer_lines, 0);
}

#[test]
fn canonical_group_pdf_is_byte_stable() {
    let a = mixed_variant('A', 1);
    let b = mixed_variant('A', 999);
    let meta = meta(BookletGroup::CANONICAL);
    let first = PdfRenderer::default().render(&a, &meta, DocumentKind::Exam).unwrap();
    let second = PdfRenderer::default().render(&b, &meta, DocumentKind::Exam).unwrap();
    assert_eq!(first.bytes, second.bytes);
}

#[test]
fn capacity_shortfall_returns_nothing() {
    let mut questions: Vec<Question> = (1..=4)
        .map(|id| question(id, QuestionType::MultipleChoice, Complexity::Hard))
        .collect();
    questions.push(question(5, QuestionType::MultipleChoice, Complexity::Easy));
    let pool = InMemoryPool::new(questions);

    let setup = Setup::new(ExamCtx::new("Quiz", "BIO101", 100.0, "ayse")).unwrap();
    let criteria = SelectionCriteria::Stratified {
        matrix: CountMatrix::new()
            .with(QuestionType::MultipleChoice, Complexity::Easy, 1)
            .with(QuestionType::MultipleChoice, Complexity::Hard, 6),
        topics: Vec::new(),
    };
    let err = setup
        .select(&pool, &criteria, &mut StdRng::seed_from_u64(1))
        .unwrap_err();
    assert!(matches!(err, ComposeError::Capacity { .. }));
    assert!(err.to_string().contains("MC/hard, requested 6, available 4"));
    assert_eq!(err.shortfall(), Some(2));
}
