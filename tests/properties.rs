use exam_compose::models::question::{Complexity, Options, QuestionType};
use exam_compose::services::allocator::{allocate, SCORE_TOLERANCE};
use exam_compose::services::booklet::relabel_options;
use exam_compose::services::composer::compose_stratified;
use exam_compose::services::generate_variant;
use exam_compose::{BookletGroup, CountMatrix, Question, QuestionId, ScorePolicy};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;

fn question(id: u64, question_type: QuestionType, complexity: Complexity, score: f64) -> Question {
    Question {
        id: QuestionId(id),
        course_code: "MAT101".to_string(),
        topic_area: "Algebra".to_string(),
        complexity,
        question_type,
        score,
        base_score: None,
        text: format!("Q{}", id),
        options: Options::new(),
        correct_answer: String::new(),
        created_by: "ayse".to_string(),
        flags: Vec::new(),
    }
}

fn cell(index: usize) -> (QuestionType, Complexity) {
    (QuestionType::ALL[index / 3], Complexity::ALL[index % 3])
}

proptest! {
    #[test]
    fn stratified_counts_are_exact_and_unique(
        capacities in prop::collection::vec(0usize..6, 9),
        wanted in prop::collection::vec(0usize..6, 9),
        seed in any::<u64>(),
    ) {
        let mut pool = Vec::new();
        let mut next_id = 1;
        for (idx, capacity) in capacities.iter().enumerate() {
            let (question_type, complexity) = cell(idx);
            for _ in 0..*capacity {
                pool.push(question(next_id, question_type, complexity, 10.0));
                next_id += 1;
            }
        }

        let mut matrix = CountMatrix::new();
        for (idx, count) in wanted.iter().enumerate() {
            let (question_type, complexity) = cell(idx);
            // 请求不超过容量
            matrix.set(question_type, complexity, (*count).min(capacities[idx]));
        }
        prop_assume!(matrix.total() > 0);

        let selected = compose_stratified(&pool, &matrix, &mut StdRng::seed_from_u64(seed)).unwrap();
        prop_assert_eq!(selected.len(), matrix.total());

        let ids: HashSet<_> = selected.iter().map(|q| q.id).collect();
        prop_assert_eq!(ids.len(), selected.len());

        for idx in 0..9 {
            let (question_type, complexity) = cell(idx);
            let got = selected
                .iter()
                .filter(|q| q.question_type == question_type && q.complexity == complexity)
                .count();
            prop_assert_eq!(got, matrix.get(question_type, complexity));
        }
    }

    #[test]
    fn equal_and_proportional_totals_stay_within_tolerance(
        bases in prop::collection::vec(0.5f64..50.0, 1..40),
        target_cents in 100u32..100_000,
    ) {
        let target = target_cents as f64 / 100.0;
        let questions: Vec<Question> = bases
            .iter()
            .enumerate()
            .map(|(i, b)| question(i as u64 + 1, QuestionType::Classical, Complexity::Easy, *b))
            .collect();

        for policy in [ScorePolicy::Equal, ScorePolicy::Proportional] {
            let allocation = allocate(&questions, target, policy).unwrap();
            let sum: f64 = allocation.questions.iter().map(|q| q.score).sum();
            prop_assert!((sum - target).abs() <= SCORE_TOLERANCE + 1e-9);
            prop_assert!(allocation.discrepancy().is_none());
            for q in &allocation.questions {
                // 两位小数
                prop_assert!(((q.score * 100.0).round() - q.score * 100.0).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn relabel_preserves_semantic_answer(
        texts in prop::collection::btree_set("[a-z]{1,8}", 2..6),
        answer_idx in 0usize..6,
        seed in any::<u64>(),
    ) {
        let texts: Vec<String> = texts.into_iter().collect();
        let answer_idx = answer_idx % texts.len();
        let mut q = question(1, QuestionType::MultipleChoice, Complexity::Medium, 10.0);
        q.options = texts
            .iter()
            .enumerate()
            .map(|(i, t)| (((b'A' + i as u8) as char).to_string(), t.clone()))
            .collect();
        q.correct_answer = ((b'A' + answer_idx as u8) as char).to_string();

        prop_assert!(relabel_options(&mut q, &mut StdRng::seed_from_u64(seed)));
        prop_assert_eq!(q.options.get(&q.correct_answer), Some(texts[answer_idx].as_str()));
        prop_assert_eq!(q.options.len(), texts.len());
    }

    #[test]
    fn variants_are_permutations_of_the_input(count in 1u64..20, seed in any::<u64>()) {
        let questions: Vec<Question> = (1..=count)
            .map(|i| question(i, QuestionType::TrueFalse, Complexity::Easy, i as f64))
            .collect();
        let variant = generate_variant(&questions, BookletGroup::new('D').unwrap(), &mut StdRng::seed_from_u64(seed));

        let mut ids: Vec<_> = variant.questions.iter().map(|q| q.id).collect();
        ids.sort();
        prop_assert_eq!(ids, questions.iter().map(|q| q.id).collect::<Vec<_>>());
        for q in &variant.questions {
            prop_assert_eq!(q.score, q.id.0 as f64);
        }
    }
}
