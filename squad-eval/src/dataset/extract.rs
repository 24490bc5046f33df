//! Answerable-question extraction shared by every pipeline stage

use super::{QuestionRecord, SquadDataset};

/// Which answerable entries qualify for extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// Every answerable entry, reference attached when one exists
    QuestionsOnly,
    /// Only answerable entries with at least one reference answer
    WithReferences,
}

/// Collect up to `limit` answerable questions in document order.
///
/// Traversal stops as soon as the cap is reached. References are the first
/// listed answer, lower-cased.
pub fn extract_questions(
    dataset: &SquadDataset,
    limit: usize,
    mode: Extraction,
) -> Vec<QuestionRecord> {
    let mut records = Vec::new();
    if limit == 0 {
        return records;
    }

    'articles: for article in &dataset.data {
        for paragraph in &article.paragraphs {
            for qa in &paragraph.qas {
                if qa.is_impossible {
                    continue;
                }

                let reference = qa.answers.first().map(|a| a.text.to_lowercase());
                if mode == Extraction::WithReferences && reference.is_none() {
                    continue;
                }

                records.push(QuestionRecord {
                    id: qa.id.clone(),
                    index: records.len(),
                    question: qa.question.clone(),
                    reference,
                });

                if records.len() >= limit {
                    break 'articles;
                }
            }
        }
    }

    tracing::debug!("Extracted {} questions ({:?})", records.len(), mode);
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Answer, Article, Paragraph, QaEntry};

    fn qa(id: &str, impossible: bool, answers: &[&str]) -> QaEntry {
        QaEntry {
            id: id.to_string(),
            question: format!("question {}", id),
            is_impossible: impossible,
            answers: answers
                .iter()
                .map(|t| Answer { text: t.to_string(), answer_start: None })
                .collect(),
        }
    }

    fn dataset(paragraphs: Vec<Vec<QaEntry>>) -> SquadDataset {
        SquadDataset {
            version: None,
            data: vec![Article {
                title: None,
                paragraphs: paragraphs
                    .into_iter()
                    .map(|qas| Paragraph { context: None, qas })
                    .collect(),
            }],
        }
    }

    #[test]
    fn test_only_answerable_in_order() {
        let ds = dataset(vec![
            vec![qa("a", false, &["Paris"]), qa("b", true, &[])],
            vec![qa("c", false, &["Berlin"])],
        ]);

        let records = extract_questions(&ds, 500, Extraction::QuestionsOnly);
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(records[0].reference.as_deref(), Some("paris"));
        assert_eq!(records[1].index, 1);
    }

    #[test]
    fn test_cap_stops_traversal() {
        let paragraphs = (0..10)
            .map(|p| (0..10).map(|q| qa(&format!("{}-{}", p, q), q % 3 == 0, &["x"])).collect())
            .collect();
        let ds = dataset(paragraphs);

        let records = extract_questions(&ds, 7, Extraction::QuestionsOnly);
        assert_eq!(records.len(), 7);
        assert_eq!(records[0].id, "0-1");
        assert_eq!(records[6].id, "1-1");
        assert!(records.iter().enumerate().all(|(i, r)| r.index == i));
    }

    #[test]
    fn test_fewer_than_cap() {
        let ds = dataset(vec![vec![qa("a", false, &["1"]), qa("b", false, &["2"])]]);
        assert_eq!(extract_questions(&ds, 500, Extraction::QuestionsOnly).len(), 2);
        assert!(extract_questions(&ds, 0, Extraction::QuestionsOnly).is_empty());
    }

    #[test]
    fn test_reference_mode_skips_empty_answer_lists() {
        let ds = dataset(vec![vec![
            qa("a", false, &["One"]),
            qa("b", false, &[]),
            qa("c", false, &["Three", "3"]),
        ]]);

        let all = extract_questions(&ds, 500, Extraction::QuestionsOnly);
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].reference, None);

        let with_refs = extract_questions(&ds, 500, Extraction::WithReferences);
        let ids: Vec<_> = with_refs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(with_refs[1].reference.as_deref(), Some("three"));
    }
}
