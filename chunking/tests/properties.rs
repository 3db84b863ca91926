use proptest::prelude::*;
use ragflow_chunking::{Chunk, ChunkingConfig, ChunkingStrategy, Document, segment};

/// Rebuild the source by dropping the first `overlap` characters of every
/// chunk after the first.
fn reconstruct(chunks: &[Chunk], overlap: usize) -> String {
    chunks
        .iter()
        .enumerate()
        .flat_map(|(i, chunk)| chunk.content.chars().skip(if i == 0 { 0 } else { overlap }))
        .collect()
}

fn size_and_overlap() -> impl Strategy<Value = (usize, usize)> {
    (1usize..64).prop_flat_map(|size| (Just(size), 0..size))
}

fn config(strategy: ChunkingStrategy, (size, overlap): (usize, usize)) -> ChunkingConfig {
    ChunkingConfig::new(strategy)
        .with_chunk_size(size)
        .with_overlap(overlap)
        .with_preserve_metadata(false)
}

proptest! {
    #[test]
    fn recursive_covers_input(
        text in "[a-zé .,\n]{1,400}",
        bounds in size_and_overlap(),
    ) {
        let doc = Document::new("notes.txt", text.clone());
        let chunks = segment(&doc, &config(ChunkingStrategy::Recursive, bounds)).unwrap();
        prop_assert_eq!(reconstruct(&chunks, bounds.1), text);
    }

    #[test]
    fn fixed_covers_input_without_blank_windows(
        text in "[a-zA-Z0-9é.,;]{1,400}",
        bounds in size_and_overlap(),
        smart in any::<bool>(),
    ) {
        let doc = Document::new("notes.txt", text.clone());
        let config = config(ChunkingStrategy::Fixed, bounds).with_smart_boundaries(smart);
        let chunks = segment(&doc, &config).unwrap();

        for chunk in &chunks {
            prop_assert!(chunk.char_len() <= bounds.0);
        }
        prop_assert_eq!(reconstruct(&chunks, bounds.1), text);
    }

    #[test]
    fn ordinals_are_contiguous(
        text in "(#{0,2} ?[a-z{}():=\n ]{0,30}\n){0,20}",
        bounds in size_and_overlap(),
        strategy in proptest::sample::select(ChunkingStrategy::ALL.to_vec()),
    ) {
        let doc = Document::new("mixed.md", text);
        let chunks = segment(&doc, &config(strategy, bounds)).unwrap();
        let total = chunks.len();

        for (expected, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.index, expected);
            prop_assert_eq!(chunk.total_chunks, total);
            prop_assert!(!chunk.content.is_empty());
            prop_assert_eq!(chunk.strategy, strategy);
        }
    }

    #[test]
    fn content_matches_offsets(
        text in "[a-zé\n {}]{1,200}",
        bounds in size_and_overlap(),
        strategy in proptest::sample::select(ChunkingStrategy::ALL.to_vec()),
    ) {
        let doc = Document::new("snippet.rs", text.clone());
        let chunks = segment(&doc, &config(strategy, bounds)).unwrap();
        let chars: Vec<char> = text.chars().collect();

        for chunk in &chunks {
            let start = chunk.start_offset.unwrap();
            let end = chunk.end_offset.unwrap();
            let expected: String = chars[start..end].iter().collect();
            prop_assert_eq!(&chunk.content, &expected);
        }
    }

    #[test]
    fn overlap_at_or_above_size_is_rejected(size in 1usize..64, extra in 0usize..8) {
        let doc = Document::new("notes.txt", "text");
        let config = ChunkingConfig::default()
            .with_chunk_size(size)
            .with_overlap(size + extra);
        prop_assert!(segment(&doc, &config).is_err());
    }
}
