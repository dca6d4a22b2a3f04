//! Seeded autoregressive melody generation.
//!
//! The seed is padded on the left with `sequence_length` separators, the
//! same cushion every song in the training corpus starts behind, so even a
//! one-note seed gives the predictor a full, familiar context. Each step
//! trims the context to `max_context_length`, asks the predictor for a
//! distribution, samples with temperature, and appends the result. A
//! sampled separator means the melody is finished.
//!
//! ```text
//!  Seeded ──step──▶ Generating ──step──▶ Generating ...
//!     │                 │
//!     ├─────────────────┼──▶ DoneByLimit       num_steps tokens sampled
//!     │                 ├──▶ DoneByTerminator  separator sampled
//!     └─────────────────┴──▶ DoneByCancel      cancel flag raised
//! ```
//!
//! Sessions own their context and melody buffers; the vocabulary and the
//! predictor are shared read-only, so independent seeds can be generated on
//! separate threads without locking.

use std::sync::atomic::{AtomicBool, Ordering};

use rand::Rng;
use tracing::{debug, trace};

use crate::event::Event;
use crate::predictor::Predictor;
use crate::sampler::sample_with_temperature;
use crate::timeseries::{decode, parse_stream, stream_to_string};
use crate::token::Token;
use crate::vocab::Vocabulary;
use crate::{Error, Result, DEFAULT_SEQUENCE_LENGTH};

/// Knobs for one generation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Upper bound on sampled tokens.
    pub num_steps: usize,
    /// Most recent ids handed to the predictor, at most the training
    /// sequence length.
    pub max_context_length: usize,
    pub temperature: f64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            num_steps: 500,
            max_context_length: DEFAULT_SEQUENCE_LENGTH,
            temperature: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// Context built, nothing sampled yet.
    Seeded,
    Generating,
    DoneByLimit,
    DoneByTerminator,
    DoneByCancel,
}

impl GeneratorState {
    pub fn is_done(self) -> bool {
        matches!(
            self,
            GeneratorState::DoneByLimit
                | GeneratorState::DoneByTerminator
                | GeneratorState::DoneByCancel
        )
    }
}

/// The seed melody extended with everything sampled before stopping.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub melody: Vec<Token>,
    pub state: GeneratorState,
    /// Tokens sampled, including a final separator if one ended the run.
    pub steps: usize,
}

impl GenerationResult {
    pub fn to_text(&self) -> String {
        stream_to_string(&self.melody)
    }

    /// Decode the melody into timed events.
    pub fn events(&self, step: f64) -> Result<Vec<Event>> {
        decode(&self.melody, step)
    }
}

/// Binds a predictor to the vocabulary it was trained against.
#[derive(Debug)]
pub struct MelodyGenerator<'a, P: ?Sized> {
    predictor: &'a P,
    vocab: &'a Vocabulary,
    sequence_length: usize,
}

impl<'a, P> MelodyGenerator<'a, P>
where
    P: Predictor + ?Sized,
{
    /// `sequence_length` is the window length used when training, which is
    /// also the amount of start padding.
    pub fn new(predictor: &'a P, vocab: &'a Vocabulary, sequence_length: usize) -> Self {
        Self {
            predictor,
            vocab,
            sequence_length,
        }
    }

    /// Parse the seed and build the padded context.
    pub fn start(&self, seed: &str, params: GenerationParams) -> Result<GenerationSession<'a, P>> {
        if !(params.temperature > 0.0) {
            return Err(Error::InvalidTemperature(params.temperature));
        }
        if params.max_context_length == 0 || params.max_context_length > self.sequence_length {
            return Err(Error::InvalidContextLength {
                max_context_length: params.max_context_length,
                sequence_length: self.sequence_length,
            });
        }

        let melody = parse_stream(seed)?;
        let pad = self.vocab.encode(&Token::Separator)?;

        let mut context = Vec::with_capacity(self.sequence_length + melody.len() + 1);
        context.resize(self.sequence_length, pad);
        for token in &melody {
            context.push(self.vocab.encode(token)?);
        }

        debug!(
            seed_tokens = melody.len(),
            num_steps = params.num_steps,
            temperature = params.temperature,
            "seeded generation"
        );

        Ok(GenerationSession {
            predictor: self.predictor,
            vocab: self.vocab,
            params,
            context,
            melody,
            steps: 0,
            state: GeneratorState::Seeded,
        })
    }

    /// Generate until the step limit or a terminator.
    pub fn generate<R>(&self, seed: &str, params: GenerationParams, rng: &mut R) -> Result<GenerationResult>
    where
        R: Rng + ?Sized,
    {
        self.start(seed, params)?.run(rng, None)
    }

    /// Like [`generate`](Self::generate), also stopping once `cancel` is
    /// raised. The flag is checked before every step.
    pub fn generate_cancellable<R>(
        &self,
        seed: &str,
        params: GenerationParams,
        rng: &mut R,
        cancel: &AtomicBool,
    ) -> Result<GenerationResult>
    where
        R: Rng + ?Sized,
    {
        self.start(seed, params)?.run(rng, Some(cancel))
    }
}

/// One in-flight generation: its private context, melody, and state.
#[derive(Debug)]
pub struct GenerationSession<'a, P: ?Sized> {
    predictor: &'a P,
    vocab: &'a Vocabulary,
    params: GenerationParams,
    context: Vec<u32>,
    melody: Vec<Token>,
    steps: usize,
    state: GeneratorState,
}

impl<P> GenerationSession<'_, P>
where
    P: Predictor + ?Sized,
{
    pub fn state(&self) -> GeneratorState {
        self.state
    }

    pub fn melody(&self) -> &[Token] {
        &self.melody
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Sample one token. Does nothing once the session is done.
    pub fn step<R>(&mut self, rng: &mut R) -> Result<GeneratorState>
    where
        R: Rng + ?Sized,
    {
        if self.state.is_done() {
            return Ok(self.state);
        }
        if self.steps >= self.params.num_steps {
            self.state = GeneratorState::DoneByLimit;
            return Ok(self.state);
        }
        self.state = GeneratorState::Generating;

        let overflow = self
            .context
            .len()
            .saturating_sub(self.params.max_context_length);
        self.context.drain(..overflow);

        let probabilities = self.predictor.predict(&self.context)?;
        if probabilities.len() != self.vocab.len() {
            return Err(Error::InvalidDistribution(format!(
                "predictor returned {} probabilities for a vocabulary of {}",
                probabilities.len(),
                self.vocab.len()
            )));
        }

        let id = sample_with_temperature(&probabilities, self.params.temperature, rng)? as u32;
        self.context.push(id);
        self.steps += 1;

        let token = self.vocab.decode(id)?;
        trace!(step = self.steps, %token, "sampled token");

        if token == Token::Separator {
            self.state = GeneratorState::DoneByTerminator;
            return Ok(self.state);
        }

        self.melody.push(token);
        if self.steps >= self.params.num_steps {
            self.state = GeneratorState::DoneByLimit;
        }
        Ok(self.state)
    }

    /// Stop early, keeping what has been generated.
    pub fn cancel(&mut self) {
        if !self.state.is_done() {
            self.state = GeneratorState::DoneByCancel;
        }
    }

    /// Step until a terminal state.
    pub fn run<R>(mut self, rng: &mut R, cancel: Option<&AtomicBool>) -> Result<GenerationResult>
    where
        R: Rng + ?Sized,
    {
        while !self.state.is_done() {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                self.cancel();
                break;
            }
            self.step(rng)?;
        }
        Ok(self.finish())
    }

    pub fn finish(self) -> GenerationResult {
        debug!(
            state = ?self.state,
            steps = self.steps,
            melody_tokens = self.melody.len(),
            "generation finished"
        );
        GenerationResult {
            melody: self.melody,
            state: self.state,
            steps: self.steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::NgramPredictor;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    // ids: "/"=0 "60"=1 "-"=2 "62"=3 "r"=4
    fn vocab() -> Vocabulary {
        Vocabulary::from_tokens(vec![
            Token::Separator,
            Token::Pitch(60),
            Token::Continuation,
            Token::Pitch(62),
            Token::Rest,
        ])
        .unwrap()
    }

    fn one_hot(id: usize) -> Vec<f64> {
        let mut p = vec![0.0; 5];
        p[id] = 1.0;
        p
    }

    fn params(num_steps: usize) -> GenerationParams {
        GenerationParams {
            num_steps,
            max_context_length: 8,
            temperature: 1.0,
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn zero_steps_returns_seed_untouched() {
        let vocab = vocab();
        let predictor = |_: &[u32]| -> Vec<f64> { panic!("predictor must not be called") };
        let generator = MelodyGenerator::new(&predictor, &vocab, 8);

        let result = generator.generate("60 - 62", params(0), &mut rng()).unwrap();
        let symbols: Vec<String> = result.melody.iter().map(Token::to_string).collect();
        assert_eq!(symbols, vec!["60", "-", "62"]);
        assert_eq!(result.state, GeneratorState::DoneByLimit);
        assert_eq!(result.steps, 0);
    }

    #[test]
    fn stops_after_exactly_num_steps() {
        let vocab = vocab();
        let predictor = |_: &[u32]| one_hot(2);
        let generator = MelodyGenerator::new(&predictor, &vocab, 8);

        let result = generator.generate("62", params(5), &mut rng()).unwrap();
        assert_eq!(result.to_text(), "62 - - - - -");
        assert_eq!(result.state, GeneratorState::DoneByLimit);
        assert_eq!(result.steps, 5);
    }

    #[test]
    fn separator_ends_generation_and_is_dropped() {
        let vocab = vocab();
        let calls = AtomicUsize::new(0);
        let predictor = |_: &[u32]| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 3 {
                one_hot(4)
            } else {
                one_hot(0)
            }
        };
        let generator = MelodyGenerator::new(&predictor, &vocab, 8);

        let result = generator.generate("60", params(100), &mut rng()).unwrap();
        assert_eq!(result.to_text(), "60 r r r");
        assert_eq!(result.state, GeneratorState::DoneByTerminator);
        assert_eq!(result.steps, 4);
        assert!(!result.melody.contains(&Token::Separator));
    }

    #[test]
    fn context_is_padded_and_trimmed() {
        let vocab = vocab();
        let seen: Mutex<Vec<Vec<u32>>> = Mutex::new(Vec::new());
        let predictor = |context: &[u32]| {
            seen.lock().unwrap().push(context.to_vec());
            one_hot(3)
        };
        let generator = MelodyGenerator::new(&predictor, &vocab, 6);
        let params = GenerationParams {
            num_steps: 3,
            max_context_length: 4,
            temperature: 0.5,
        };

        let result = generator.generate("60 -", params, &mut rng()).unwrap();
        assert_eq!(result.to_text(), "60 - 62 62 62");

        let seen = seen.into_inner().unwrap();
        assert_eq!(
            seen,
            vec![vec![0, 0, 1, 2], vec![0, 1, 2, 3], vec![1, 2, 3, 3]]
        );
    }

    #[test]
    fn empty_seed_starts_from_padding() {
        let vocab = vocab();
        let first: Mutex<Option<Vec<u32>>> = Mutex::new(None);
        let predictor = |context: &[u32]| {
            first.lock().unwrap().get_or_insert_with(|| context.to_vec());
            one_hot(1)
        };
        let generator = MelodyGenerator::new(&predictor, &vocab, 3);
        let params = GenerationParams {
            num_steps: 2,
            max_context_length: 3,
            temperature: 1.0,
        };

        let result = generator.generate("", params, &mut rng()).unwrap();
        assert_eq!(result.to_text(), "60 60");
        assert_eq!(first.into_inner().unwrap(), Some(vec![0, 0, 0]));
    }

    #[test]
    fn step_by_step_states() {
        let vocab = vocab();
        let predictor = |_: &[u32]| one_hot(1);
        let generator = MelodyGenerator::new(&predictor, &vocab, 8);
        let mut rng = rng();

        let mut session = generator.start("r", params(2)).unwrap();
        assert_eq!(session.state(), GeneratorState::Seeded);
        assert_eq!(session.step(&mut rng).unwrap(), GeneratorState::Generating);
        assert_eq!(session.step(&mut rng).unwrap(), GeneratorState::DoneByLimit);
        assert_eq!(session.step(&mut rng).unwrap(), GeneratorState::DoneByLimit);
        assert_eq!(session.steps(), 2);
        assert_eq!(session.melody(), &[Token::Rest, Token::Pitch(60), Token::Pitch(60)]);
    }

    #[test]
    fn cancel_flag_stops_between_steps() {
        let vocab = vocab();
        let cancel = AtomicBool::new(false);
        let calls = AtomicUsize::new(0);
        let predictor = |_: &[u32]| {
            if calls.fetch_add(1, Ordering::SeqCst) == 1 {
                cancel.store(true, Ordering::SeqCst);
            }
            one_hot(3)
        };
        let generator = MelodyGenerator::new(&predictor, &vocab, 8);

        let result = generator
            .generate_cancellable("60", params(50), &mut rng(), &cancel)
            .unwrap();
        assert_eq!(result.state, GeneratorState::DoneByCancel);
        assert_eq!(result.to_text(), "60 62 62");
        assert_eq!(result.steps, 2);
    }

    #[test]
    fn raised_flag_before_start() {
        let vocab = vocab();
        let predictor = |_: &[u32]| one_hot(3);
        let generator = MelodyGenerator::new(&predictor, &vocab, 8);
        let cancel = AtomicBool::new(true);

        let result = generator
            .generate_cancellable("60", params(50), &mut rng(), &cancel)
            .unwrap();
        assert_eq!(result.state, GeneratorState::DoneByCancel);
        assert_eq!(result.steps, 0);
    }

    #[test]
    fn seed_errors() {
        let vocab = vocab();
        let predictor = |_: &[u32]| one_hot(1);
        let generator = MelodyGenerator::new(&predictor, &vocab, 8);

        assert!(matches!(
            generator.generate("60 64", params(1), &mut rng()),
            Err(Error::UnknownToken(s)) if s == "64"
        ));
        assert!(matches!(
            generator.generate("60 la", params(1), &mut rng()),
            Err(Error::InvalidToken(_))
        ));
    }

    #[test]
    fn parameter_errors() {
        let vocab = vocab();
        let predictor = |_: &[u32]| one_hot(1);
        let generator = MelodyGenerator::new(&predictor, &vocab, 8);

        let cold = GenerationParams {
            temperature: 0.0,
            ..params(1)
        };
        assert!(matches!(
            generator.start("60", cold),
            Err(Error::InvalidTemperature(_))
        ));

        for max_context_length in [0, 9] {
            let p = GenerationParams {
                max_context_length,
                ..params(1)
            };
            assert!(matches!(
                generator.start("60", p),
                Err(Error::InvalidContextLength { .. })
            ));
        }
    }

    #[test]
    fn wrong_sized_distribution_is_rejected() {
        let vocab = vocab();
        let predictor = |_: &[u32]| vec![0.5, 0.5];
        let generator = MelodyGenerator::new(&predictor, &vocab, 8);
        assert!(matches!(
            generator.generate("60", params(1), &mut rng()),
            Err(Error::InvalidDistribution(_))
        ));
    }

    struct Offline;

    impl Predictor for Offline {
        fn predict(&self, _context: &[u32]) -> Result<Vec<f64>> {
            Err(Error::InvalidDistribution("model offline".to_string()))
        }
    }

    #[test]
    fn predictor_errors_surface() {
        let vocab = vocab();
        let generator = MelodyGenerator::new(&Offline, &vocab, 8);
        assert!(generator.generate("60", params(1), &mut rng()).is_err());
    }

    #[test]
    fn dyn_predictor() {
        let vocab = vocab();
        let boxed: Box<dyn Predictor> = Box::new(|_: &[u32]| one_hot(4));
        let generator = MelodyGenerator::new(boxed.as_ref(), &vocab, 8);
        let result = generator.generate("60", params(1), &mut rng()).unwrap();
        assert_eq!(result.to_text(), "60 r");
    }

    #[test]
    fn result_decodes_to_events() {
        let vocab = vocab();
        let predictor = |_: &[u32]| one_hot(2);
        let generator = MelodyGenerator::new(&predictor, &vocab, 8);
        let result = generator.generate("60", params(3), &mut rng()).unwrap();
        assert_eq!(result.events(0.25).unwrap(), vec![Event::note(60, 1.0)]);
    }

    #[test]
    fn concurrent_sessions_share_vocab_and_model() {
        let vocab = vocab();
        let ids: Vec<u32> = [0, 0, 1, 2, 3, 2, 4, 1, 2, 2, 3, 0, 0]
            .iter()
            .cycle()
            .take(130)
            .copied()
            .collect();
        let model = NgramPredictor::fit(&ids, vocab.len(), 3).unwrap();
        let generator = MelodyGenerator::new(&model, &vocab, 8);

        let sequential: Vec<GenerationResult> = (0..4)
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                generator.generate("60", params(40), &mut rng).unwrap()
            })
            .collect();

        let parallel: Vec<GenerationResult> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|seed| {
                    let generator = &generator;
                    scope.spawn(move || {
                        let mut rng = StdRng::seed_from_u64(seed);
                        generator.generate("60", params(40), &mut rng).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(sequential, parallel);
    }
}
