//! CLI command implementations

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};
use tuneconf::{ConfigSources, GenerationConfig, TuneConfig};
use tunestep::{
    decode_str, events_to_midi, parse_stream, stream_to_string, CorpusBuilder, Error,
    GenerationParams, MelodyGenerator, NgramPredictor, RenderOptions, Score, Vocabulary, Windows,
};
use walkdir::WalkDir;

/// Files under `dir` with the given extension, sorted by file name.
fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

fn song_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn builder(config: &TuneConfig) -> CorpusBuilder {
    CorpusBuilder::new(config.encoding.time_step, config.encoding.sequence_length)
        .with_accepted_durations(config.encoding.acceptable_durations.clone())
}

fn load_vocabulary(config: &TuneConfig) -> Result<Vocabulary> {
    let path = &config.paths.vocab_file;
    Vocabulary::load(path)
        .with_context(|| format!("Failed to load vocabulary from {}", path.display()))
}

/// The corpus stream mapped to ids.
fn load_corpus_ids(config: &TuneConfig, vocab: &Vocabulary) -> Result<Vec<u32>> {
    let path = &config.paths.corpus_file;
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus {}", path.display()))?;
    let tokens = parse_stream(&text)
        .with_context(|| format!("Failed to parse corpus {}", path.display()))?;
    vocab
        .encode_stream(&tokens)
        .context("Corpus does not match the vocabulary")
}

/// Encode scores and write one token file per kept song.
pub fn encode(config: &TuneConfig, scores_dir: &Path) -> Result<()> {
    let out_dir = &config.paths.dataset_dir;
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut builder = builder(config);
    let mut written = 0;
    let mut claimed: HashMap<String, PathBuf> = HashMap::new();

    for path in files_with_extension(scores_dir, "json")? {
        let name = song_name(&path);
        if let Some(first) = claimed.insert(name.clone(), path.clone()) {
            bail!(
                "{} and {} would both be written to {}.txt; rename one of them",
                first.display(),
                path.display(),
                out_dir.join(&name).display()
            );
        }
        let score = match fs::read_to_string(&path)
            .map_err(Error::from)
            .and_then(|json| Score::from_json(&json))
        {
            Ok(score) => score,
            Err(error) => {
                builder.record_skip(name, error);
                continue;
            }
        };

        if let Some(tokens) = builder.add_score(name.as_str(), &score) {
            let out = out_dir.join(format!("{name}.txt"));
            fs::write(&out, stream_to_string(tokens))
                .with_context(|| format!("Failed to write {}", out.display()))?;
            debug!(path = %out.display(), "wrote encoded song");
            written += 1;
        }
    }

    let report = builder.finish();
    for skipped in &report.skipped {
        println!("skipped {}: {}", skipped.name, skipped.error);
    }
    println!(
        "encoded {} songs into {} ({} skipped)",
        written,
        out_dir.display(),
        report.skipped.len()
    );
    Ok(())
}

/// Join the encoded songs into the corpus file and write the vocabulary.
pub fn corpus(config: &TuneConfig) -> Result<()> {
    let mut builder = builder(config);

    for path in files_with_extension(&config.paths.dataset_dir, "txt")? {
        let name = song_name(&path);
        match fs::read_to_string(&path)
            .map_err(Error::from)
            .and_then(|text| parse_stream(&text))
        {
            Ok(tokens) => {
                builder.add_encoded(name, tokens);
            }
            Err(error) => builder.record_skip(name, error),
        }
    }

    let (report, vocab) = builder
        .finish_with_vocabulary()
        .with_context(|| format!("No usable songs in {}", config.paths.dataset_dir.display()))?;

    let corpus_file = &config.paths.corpus_file;
    fs::write(corpus_file, report.to_text())
        .with_context(|| format!("Failed to write corpus {}", corpus_file.display()))?;
    vocab
        .save(&config.paths.vocab_file)
        .with_context(|| {
            format!(
                "Failed to write vocabulary {}",
                config.paths.vocab_file.display()
            )
        })?;

    println!(
        "corpus: {} songs, {} tokens, {} symbols ({} skipped)",
        report.songs,
        report.tokens.len(),
        vocab.len(),
        report.skipped.len()
    );
    Ok(())
}

/// Print the window count and the first `limit` pairs.
pub fn windows(config: &TuneConfig, limit: usize) -> Result<()> {
    let vocab = load_vocabulary(config)?;
    let ids = load_corpus_ids(config, &vocab)?;
    let windows = Windows::new(&ids, config.encoding.sequence_length);

    println!(
        "{} training pairs (sequence length {}, vocabulary {})",
        windows.len(),
        windows.sequence_length(),
        vocab.len()
    );
    for (offset, pair) in windows.iter().take(limit).enumerate() {
        let context = stream_to_string(&vocab.decode_ids(pair.context)?);
        let target = vocab.decode(pair.target)?;
        println!("{offset}\t{context} -> {target}");
    }
    Ok(())
}

pub fn fit(config: &TuneConfig, order: Option<usize>) -> Result<()> {
    let order = order.unwrap_or(config.generation.ngram_order);
    if order == 0 {
        bail!("n-gram order must be at least 1");
    }

    let vocab = load_vocabulary(config)?;
    let ids = load_corpus_ids(config, &vocab)?;
    let model = NgramPredictor::fit(&ids, vocab.len(), order)?;

    let path = &config.paths.model_file;
    model
        .save(path)
        .with_context(|| format!("Failed to write model {}", path.display()))?;
    println!("fitted order-{} model on {} ids -> {}", order, ids.len(), path.display());
    Ok(())
}

pub fn generate(
    config: &TuneConfig,
    generation: &GenerationConfig,
    seed: &str,
    midi: Option<&Path>,
) -> Result<()> {
    let vocab = load_vocabulary(config)?;
    let path = &config.paths.model_file;
    let model = NgramPredictor::load(path)
        .with_context(|| format!("Failed to load model from {}", path.display()))?;
    if model.vocab_size() != vocab.len() {
        bail!(
            "model was fitted on {} symbols but the vocabulary has {}; rerun `tunestep fit`",
            model.vocab_size(),
            vocab.len()
        );
    }

    let mut rng = match generation.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let generator = MelodyGenerator::new(&model, &vocab, config.encoding.sequence_length);
    let params = GenerationParams {
        num_steps: generation.num_steps,
        max_context_length: generation.max_context_length,
        temperature: generation.temperature,
    };
    let result = generator
        .generate(seed, params, &mut rng)
        .context("Generation failed")?;

    info!(state = ?result.state, steps = result.steps, "generated melody");
    println!("{}", result.to_text());

    if let Some(out) = midi {
        let events = result.events(config.encoding.time_step)?;
        write_midi(out, &events, generation.tempo_bpm)?;
    }
    Ok(())
}

pub fn render(config: &TuneConfig, tokens_file: &Path, out: &Path, tempo_bpm: f64) -> Result<()> {
    let text = fs::read_to_string(tokens_file)
        .with_context(|| format!("Failed to read {}", tokens_file.display()))?;
    let events = decode_str(&text, config.encoding.time_step)
        .with_context(|| format!("Failed to decode {}", tokens_file.display()))?;
    write_midi(out, &events, tempo_bpm)
}

fn write_midi(out: &Path, events: &[tunestep::Event], tempo_bpm: f64) -> Result<()> {
    let options = RenderOptions {
        tempo_bpm,
        ..RenderOptions::default()
    };
    fs::write(out, events_to_midi(events, &options))
        .with_context(|| format!("Failed to write {}", out.display()))?;
    println!("wrote {} events to {}", events.len(), out.display());
    Ok(())
}

pub fn show_config(config: &TuneConfig, sources: &ConfigSources) -> Result<()> {
    for file in &sources.files {
        println!("# loaded {}", file.display());
    }
    for var in &sources.env_overrides {
        println!("# override {}", var);
    }
    print!("{}", config.to_toml()?);
    Ok(())
}
