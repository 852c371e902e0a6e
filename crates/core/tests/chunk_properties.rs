use proptest::prelude::*;
use focusdigest_core::{ChunkConfig, Chunker, ProgressiveContext};

proptest! {
    #[test]
    fn chunks_rejoin_to_the_original_words(text in document_text(), target in 1usize..40) {
        let chunks = Chunker::new(ChunkConfig::with_target(target)).split("doc", &text);
        let original: Vec<&str> = text.split_whitespace().collect();
        let rejoined: Vec<&str> = chunks
            .iter()
            .flat_map(|chunk| chunk.text.split_whitespace())
            .collect();
        prop_assert_eq!(&rejoined, &original);
        prop_assert_eq!(chunks.len(), original.len().div_ceil(target));
        for (position, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.index, position);
            prop_assert!(chunk.word_count <= target);
        }
    }

    #[test]
    fn overlapping_chunks_cover_every_word_in_order(
        text in document_text(),
        target in 2usize..30,
        overlap in 0usize..10,
    ) {
        let config = ChunkConfig { target_words: target, overlap_words: overlap };
        let chunks = Chunker::new(config).split("doc", &text);
        let original: Vec<&str> = text.split_whitespace().collect();
        let mut covered = 0usize;
        for chunk in &chunks {
            prop_assert!(chunk.word_start <= covered);
            prop_assert!(chunk.word_end > covered);
            let words: Vec<&str> = chunk.text.split_whitespace().collect();
            prop_assert_eq!(&words[..], &original[chunk.word_start..chunk.word_end]);
            covered = chunk.word_end;
        }
        prop_assert_eq!(covered, original.len());
    }

    #[test]
    fn progressive_context_stays_within_budget(
        summaries in prop::collection::vec(summary_text(), 1..25),
        budget in 12usize..200,
    ) {
        let mut context = ProgressiveContext::new(budget);
        for (index, summary) in summaries.iter().enumerate() {
            context.push(index, summary);
            prop_assert!(context.word_count() <= budget);
        }
    }
}

fn document_text() -> impl Strategy<Value = String> {
    prop::collection::vec(("[a-z]{1,8}", prop::sample::select(vec![" ", "\n", "\t", "  "])), 0..200)
        .prop_map(|pairs| {
            pairs
                .into_iter()
                .map(|(word, sep)| format!("{word}{sep}"))
                .collect()
        })
}

fn summary_text() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z]{1,6}", 1..60).prop_map(|words| words.join(" "))
}
