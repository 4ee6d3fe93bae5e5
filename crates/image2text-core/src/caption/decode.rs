//! Autoregressive token search: greedy decoding and beam search.
//!
//! The search is model-agnostic. A [`TokenScorer`] supplies next-token logits
//! for a batch of partial sequences; this module applies temperature and
//! n-gram repetition bans and picks the continuation.

use crate::error::PipelineError;
use crate::math::log_softmax;
use crate::types::GenerationParams;

/// Supplies next-token logits for partial sequences.
pub trait TokenScorer {
    /// One logit row (vocabulary sized) per input sequence, for the token
    /// following the last one.
    fn next_token_logits(&self, sequences: &[Vec<i64>]) -> Result<Vec<Vec<f32>>, PipelineError>;
}

/// Start and end tokens for a search.
#[derive(Debug, Clone, Copy)]
pub struct SpecialTokens {
    pub bos: i64,
    pub eos: i64,
}

/// Run the search and return the generated tokens, without BOS or EOS.
///
/// `params.max_length` bounds the whole sequence including BOS, so at most
/// `max_length - 1` tokens are produced.
pub fn generate(
    scorer: &dyn TokenScorer,
    tokens: SpecialTokens,
    params: &GenerationParams,
) -> Result<Vec<i64>, PipelineError> {
    if params.max_length <= 1 {
        return Ok(vec![]);
    }
    let sequence = if params.num_beams <= 1 {
        greedy(scorer, tokens, params)?
    } else {
        beam_search(scorer, tokens, params)?
    };
    Ok(strip_special(sequence, tokens))
}

fn greedy(
    scorer: &dyn TokenScorer,
    tokens: SpecialTokens,
    params: &GenerationParams,
) -> Result<Vec<i64>, PipelineError> {
    let mut sequence = vec![tokens.bos];
    while sequence.len() < params.max_length {
        let logits = first_row(scorer.next_token_logits(std::slice::from_ref(&sequence))?)?;
        let scores = step_scores(&sequence, logits, params);
        let Some(next) = argmax(&scores) else { break };
        sequence.push(next as i64);
        if next as i64 == tokens.eos {
            break;
        }
    }
    Ok(sequence)
}

#[derive(Debug, Clone)]
struct Hypothesis {
    tokens: Vec<i64>,
    log_prob: f32,
}

impl Hypothesis {
    fn normalized(&self, length_penalty: f32) -> f32 {
        self.log_prob / (self.tokens.len() as f32).powf(length_penalty)
    }
}

fn beam_search(
    scorer: &dyn TokenScorer,
    tokens: SpecialTokens,
    params: &GenerationParams,
) -> Result<Vec<i64>, PipelineError> {
    let num_beams = params.num_beams;
    let mut beams = vec![Hypothesis {
        tokens: vec![tokens.bos],
        log_prob: 0.0,
    }];
    let mut finished: Vec<(f32, Hypothesis)> = Vec::new();

    while beams[0].tokens.len() < params.max_length {
        let sequences: Vec<Vec<i64>> = beams.iter().map(|b| b.tokens.clone()).collect();
        let rows = scorer.next_token_logits(&sequences)?;
        if rows.len() != beams.len() {
            return Err(PipelineError::Model {
                message: format!("Scorer returned {} rows for {} beams", rows.len(), beams.len()),
            });
        }

        // (beam, token, cumulative log-prob), best 2 * num_beams per beam.
        let mut candidates: Vec<(usize, usize, f32)> = Vec::new();
        for (b, (beam, logits)) in beams.iter().zip(rows).enumerate() {
            let scores = step_scores(&beam.tokens, logits, params);
            let mut ranked: Vec<(usize, f32)> = scores
                .into_iter()
                .enumerate()
                .filter(|(_, s)| s.is_finite())
                .collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
            ranked.truncate(2 * num_beams);
            candidates.extend(ranked.into_iter().map(|(t, s)| (b, t, beam.log_prob + s)));
        }
        candidates.sort_by(|a, b| b.2.total_cmp(&a.2));

        let mut next = Vec::with_capacity(num_beams);
        for (rank, (b, token, log_prob)) in candidates.into_iter().enumerate() {
            let mut hyp_tokens = beams[b].tokens.clone();
            hyp_tokens.push(token as i64);
            let hypothesis = Hypothesis {
                tokens: hyp_tokens,
                log_prob,
            };
            if token as i64 == tokens.eos {
                if rank < num_beams {
                    add_finished(&mut finished, hypothesis, params);
                }
            } else {
                next.push(hypothesis);
            }
            if next.len() == num_beams {
                break;
            }
        }

        if next.is_empty() || search_done(&finished, &next, params) {
            beams = next;
            break;
        }
        beams = next;
    }

    for hypothesis in beams {
        add_finished(&mut finished, hypothesis, params);
    }
    finished
        .into_iter()
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, h)| h.tokens)
        .ok_or_else(|| PipelineError::Model {
            message: "Beam search produced no hypotheses".to_string(),
        })
}

/// Keep the `num_beams` best finished hypotheses by normalized score.
fn add_finished(
    finished: &mut Vec<(f32, Hypothesis)>,
    hypothesis: Hypothesis,
    params: &GenerationParams,
) {
    finished.push((hypothesis.normalized(params.length_penalty), hypothesis));
    finished.sort_by(|a, b| b.0.total_cmp(&a.0));
    finished.truncate(params.num_beams);
}

fn search_done(
    finished: &[(f32, Hypothesis)],
    running: &[Hypothesis],
    params: &GenerationParams,
) -> bool {
    if finished.len() < params.num_beams {
        return false;
    }
    if params.early_stopping {
        return true;
    }
    // Log-probs only decrease, so a running beam's current normalized score
    // bounds what it can still reach at this length.
    let worst_kept = finished.last().map(|f| f.0).unwrap_or(f32::NEG_INFINITY);
    running
        .iter()
        .map(|h| h.normalized(params.length_penalty))
        .fold(f32::NEG_INFINITY, f32::max)
        <= worst_kept
}

/// Log-probabilities for the next token after temperature and n-gram bans.
fn step_scores(sequence: &[i64], mut logits: Vec<f32>, params: &GenerationParams) -> Vec<f32> {
    if params.temperature > 0.0 && (params.temperature - 1.0).abs() > f32::EPSILON {
        for l in logits.iter_mut() {
            *l /= params.temperature;
        }
    }
    for banned in banned_tokens(sequence, params.no_repeat_ngram_size) {
        if let Some(l) = usize::try_from(banned).ok().and_then(|i| logits.get_mut(i)) {
            *l = f32::NEG_INFINITY;
        }
    }
    log_softmax(&logits)
}

/// Tokens that would complete an n-gram already present in `sequence`.
fn banned_tokens(sequence: &[i64], n: usize) -> Vec<i64> {
    if n == 0 || sequence.len() + 1 < n {
        return vec![];
    }
    let prefix = &sequence[sequence.len() + 1 - n..];
    sequence
        .windows(n)
        .filter(|w| &w[..n - 1] == prefix)
        .map(|w| w[n - 1])
        .collect()
}

fn argmax(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_finite())
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}

fn first_row(rows: Vec<Vec<f32>>) -> Result<Vec<f32>, PipelineError> {
    rows.into_iter().next().ok_or_else(|| PipelineError::Model {
        message: "Scorer returned no logits".to_string(),
    })
}

fn strip_special(mut sequence: Vec<i64>, tokens: SpecialTokens) -> Vec<i64> {
    if sequence.first() == Some(&tokens.bos) {
        sequence.remove(0);
    }
    if sequence.last() == Some(&tokens.eos) {
        sequence.pop();
    }
    sequence
}
