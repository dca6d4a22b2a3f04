//! End-to-end: JSON scores in, corpus and vocabulary on disk, a fitted
//! n-gram model, a generated melody, and a MIDI file out.

use std::fs;
use std::path::{Path, PathBuf};

use midly::{MidiMessage, Smf, TrackEventKind};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;
use tunestep::{
    decode, events_to_midi, split_songs, CorpusBuilder, Error, GenerationParams, GeneratorState,
    MelodyGenerator, NgramPredictor, RenderOptions, Score, Token, Vocabulary, Windows,
    DEFAULT_STEP,
};

const SEQUENCE_LENGTH: usize = 8;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(format!("{}.json", name))
}

fn load_score(name: &str) -> Score {
    let json = fs::read_to_string(fixture(name))
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", name, e));
    Score::from_json(&json).unwrap_or_else(|e| panic!("Fixture {} is not a score: {}", name, e))
}

fn build_corpus() -> CorpusBuilder {
    let mut builder = CorpusBuilder::new(DEFAULT_STEP, SEQUENCE_LENGTH);
    for name in ["frere_jacques", "triplets", "ode_to_joy"] {
        builder.add_score(name, &load_score(name));
    }
    builder
}

#[test]
fn corpus_skips_unquantizable_scores() {
    let report = build_corpus().finish();

    assert_eq!(report.songs, 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].name, "triplets");
    assert!(matches!(
        report.skipped[0].error,
        Error::InvalidDuration { .. }
    ));

    // 8 + 68 + 8 + 64 + 8
    assert_eq!(report.tokens.len(), 156);
    let songs = split_songs(&report.tokens);
    assert_eq!(songs.len(), 2);
    assert_eq!(songs[0].len(), 68);
    assert_eq!(songs[1].len(), 64);
}

#[test]
fn songs_decode_back_to_their_scores() {
    let report = build_corpus().finish();
    let songs = split_songs(&report.tokens);

    for (song, name) in songs.iter().zip(["frere_jacques", "ode_to_joy"]) {
        let events = decode(song, DEFAULT_STEP).unwrap();
        assert_eq!(events, load_score(name).events, "{}", name);
    }
}

#[test]
fn vocabulary_persists_and_maps_the_corpus() -> tunestep::Result<()> {
    let (report, vocab) = build_corpus().finish_with_vocabulary()?;
    let symbols: Vec<String> = vocab.iter().map(|(_, t)| t.to_string()).collect();
    assert_eq!(symbols, vec!["/", "60", "-", "62", "64", "65", "67", "r"]);

    let dir = TempDir::new()?;
    let path = dir.path().join("mapping.json");
    vocab.save(&path)?;
    let loaded = Vocabulary::load(&path)?;

    let ids = vocab.encode_stream(&report.tokens)?;
    assert_eq!(loaded.encode_stream(&report.tokens)?, ids);
    assert_eq!(loaded.decode_ids(&ids)?, report.tokens);
    Ok(())
}

#[test]
fn windows_cover_the_id_stream() -> tunestep::Result<()> {
    let (report, vocab) = build_corpus().finish_with_vocabulary()?;
    let ids = vocab.encode_stream(&report.tokens)?;
    let windows = Windows::new(&ids, SEQUENCE_LENGTH);

    assert_eq!(windows.len(), 148);
    let first = windows.iter().next().expect("at least one window");
    assert!(first.context.iter().all(|&id| id == vocab.encode(&Token::Separator).unwrap()));
    assert_eq!(vocab.decode(first.target)?, Token::Pitch(60));

    let one_hot = first.one_hot(vocab.len())?;
    assert_eq!(one_hot.len(), SEQUENCE_LENGTH * vocab.len());
    assert_eq!(one_hot.iter().sum::<f32>(), SEQUENCE_LENGTH as f32);
    Ok(())
}

#[test]
fn generate_and_render() -> tunestep::Result<()> {
    let (report, vocab) = build_corpus().finish_with_vocabulary()?;
    let ids = vocab.encode_stream(&report.tokens)?;
    let model = NgramPredictor::fit(&ids, vocab.len(), 4)?;

    let generator = MelodyGenerator::new(&model, &vocab, SEQUENCE_LENGTH);
    let params = GenerationParams {
        num_steps: 200,
        max_context_length: SEQUENCE_LENGTH,
        temperature: 0.8,
    };

    let result = generator.generate("64 - - -", params, &mut StdRng::seed_from_u64(5))?;
    assert!(result.melody.starts_with(&[Token::Pitch(64), Token::Continuation]));
    assert!(!result.melody.contains(&Token::Separator));
    assert!(matches!(
        result.state,
        GeneratorState::DoneByLimit | GeneratorState::DoneByTerminator
    ));
    assert!(result.steps <= 200);

    let again = generator.generate("64 - - -", params, &mut StdRng::seed_from_u64(5))?;
    assert_eq!(again, result);

    let events = result.events(DEFAULT_STEP)?;
    let total: f64 = events.iter().map(|e| e.duration).sum();
    assert_eq!(total, result.melody.len() as f64 * DEFAULT_STEP);

    let midi = events_to_midi(&events, &RenderOptions::default());
    let smf = Smf::parse(&midi).expect("rendered MIDI should parse");
    let note_ons = smf.tracks[1]
        .iter()
        .filter(|e| {
            matches!(
                e.kind,
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { vel, .. },
                    ..
                } if vel.as_int() > 0
            )
        })
        .count();
    assert_eq!(note_ons, events.iter().filter(|e| !e.is_rest()).count());
    Ok(())
}

#[test]
fn model_persists() -> tunestep::Result<()> {
    let (report, vocab) = build_corpus().finish_with_vocabulary()?;
    let ids = vocab.encode_stream(&report.tokens)?;
    let model = NgramPredictor::fit(&ids, vocab.len(), 3)?;

    let dir = TempDir::new()?;
    let path = dir.path().join("ngram.json");
    model.save(&path)?;
    assert_eq!(NgramPredictor::load(&path)?, model);
    Ok(())
}
