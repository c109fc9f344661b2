//! Multi-objective genetic search over strategy parameters.
//!
//! Each individual is eight real-valued genes (indicator periods and
//! thresholds). Fitness is the pair (weighted normalized return, weighted
//! normalized profitable-trade percentage), normalized against the running
//! min/max of every evaluation so far. Each generation selects parents with
//! NSGA-II, varies them, and the offspring replace the population outright; a
//! hall of fame keeps the best individual seen.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use std::cmp::Ordering;

use super::backtest::{run_once, BacktestConfig, Fitness};
use super::error::PivotraderError;
use super::journal::Journal;
use super::ohlcv::OhlcvBar;
use super::strategy::StrategyParams;

pub const GENE_COUNT: usize = 8;

/// Inclusive initialization ranges, in gene order.
pub const GENE_RANGES: [(i64, i64); GENE_COUNT] = [
    (5, 30),   // fast_ema_period
    (13, 60),  // slow_ema_period
    (5, 20),   // stoch_period
    (5, 20),   // rsi_period
    (70, 100), // stoch_overbought
    (0, 30),   // stoch_oversold
    (50, 100), // rsi_overbought
    (0, 50),   // rsi_oversold
];

/// The first four genes are periods and may not drop below 1.
const PERIOD_GENES: usize = 4;

const BLEND_ALPHA: f64 = 0.5;
const MUTATION_SIGMA: f64 = 1.0;
const MUTATION_GENE_PROB: f64 = 0.2;

pub type Genome = [f64; GENE_COUNT];

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub population: usize,
    pub generations: usize,
    pub crossover_prob: f64,
    pub mutation_prob: f64,
    pub return_weight: f64,
    pub win_rate_weight: f64,
    pub seed: u64,
    pub parallel: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            population: 10,
            generations: 10,
            crossover_prob: 0.8,
            mutation_prob: 0.2,
            return_weight: 0.7,
            win_rate_weight: 0.3,
            seed: 42,
            parallel: true,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), PivotraderError> {
        if self.population < 2 {
            return Err(PivotraderError::invalid(
                "search",
                "population",
                "must be at least 2",
            ));
        }
        for (key, value) in [
            ("crossover_prob", self.crossover_prob),
            ("mutation_prob", self.mutation_prob),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PivotraderError::invalid(
                    "search",
                    key,
                    format!("must be within [0, 1], got {}", value),
                ));
            }
        }
        for (key, value) in [
            ("return_weight", self.return_weight),
            ("win_rate_weight", self.win_rate_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PivotraderError::invalid(
                    "search",
                    key,
                    format!("must be non-negative, got {}", value),
                ));
            }
        }
        Ok(())
    }
}

/// `(value - min) / (max - min)`, or 0 when the range is empty.
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if max > min {
        (value - min) / (max - min)
    } else {
        0.0
    }
}

/// Running min/max over every fitness observed during one search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitnessNormalizer {
    returns: Option<(f64, f64)>,
    percentages: Option<(f64, f64)>,
}

impl FitnessNormalizer {
    /// Widen the ranges with `fitness`, then normalize it against them.
    pub fn observe(&mut self, fitness: Fitness) -> (f64, f64) {
        let widen = |range: &mut Option<(f64, f64)>, v: f64| {
            let (lo, hi) = range.get_or_insert((v, v));
            *lo = lo.min(v);
            *hi = hi.max(v);
            (*lo, *hi)
        };
        let (rmin, rmax) = widen(&mut self.returns, fitness.total_return);
        let (pmin, pmax) = widen(&mut self.percentages, fitness.profitable_trade_percentage);
        (
            normalize(fitness.total_return, rmin, rmax),
            normalize(fitness.profitable_trade_percentage, pmin, pmax),
        )
    }

    pub fn return_range(&self) -> Option<(f64, f64)> {
        self.returns
    }

    pub fn percentage_range(&self) -> Option<(f64, f64)> {
        self.percentages
    }
}

pub fn random_genome<R: Rng>(rng: &mut R) -> Genome {
    let mut genome = [0.0; GENE_COUNT];
    for (gene, &(lo, hi)) in genome.iter_mut().zip(GENE_RANGES.iter()) {
        *gene = rng.gen_range(lo..=hi) as f64;
    }
    genome
}

/// Truncate every gene toward zero; periods floor at 1, thresholds at 0.
pub fn clamp_genome(genome: &mut Genome) {
    for (idx, gene) in genome.iter_mut().enumerate() {
        let floor = if idx < PERIOD_GENES { 1.0 } else { 0.0 };
        *gene = gene.trunc().max(floor);
    }
}

/// Parameters for a clamped genome; genes not searched come from `base`.
pub fn decode(genome: &Genome, base: &StrategyParams) -> StrategyParams {
    let mut g = *genome;
    clamp_genome(&mut g);
    StrategyParams {
        fast_ema_period: g[0] as usize,
        slow_ema_period: g[1] as usize,
        stoch_period: g[2] as usize,
        rsi_period: g[3] as usize,
        stoch_overbought: g[4],
        stoch_oversold: g[5],
        rsi_overbought: g[6],
        rsi_oversold: g[7],
        ..base.clone()
    }
}

/// Per-gene blend: both children move along the segment between the parents
/// by a random factor in `[-alpha, 1 + alpha]`.
pub fn blend_crossover<R: Rng>(a: &mut Genome, b: &mut Genome, alpha: f64, rng: &mut R) {
    for (x1, x2) in a.iter_mut().zip(b.iter_mut()) {
        let gamma = (1.0 + 2.0 * alpha) * rng.r#gen::<f64>() - alpha;
        let (old1, old2) = (*x1, *x2);
        *x1 = (1.0 - gamma) * old1 + gamma * old2;
        *x2 = gamma * old1 + (1.0 - gamma) * old2;
    }
}

/// Add `N(0, sigma)` noise to each gene with probability `gene_prob`.
pub fn gaussian_mutation<R: Rng>(
    genome: &mut Genome,
    sigma: f64,
    gene_prob: f64,
    rng: &mut R,
) -> Result<(), PivotraderError> {
    let noise = Normal::new(0.0, sigma)
        .map_err(|e| PivotraderError::invalid("search", "mutation_sigma", e.to_string()))?;
    for gene in genome.iter_mut() {
        if rng.r#gen::<f64>() < gene_prob {
            *gene += noise.sample(rng);
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    pub genome: Genome,
    pub raw: Fitness,
    /// Weighted normalized objectives; `None` until evaluated.
    pub score: Option<[f64; 2]>,
}

impl Individual {
    pub fn new(genome: Genome) -> Self {
        Individual {
            genome,
            raw: Fitness::ZERO,
            score: None,
        }
    }

    pub fn score(&self) -> [f64; 2] {
        self.score.unwrap_or_default()
    }

    fn invalidate(&mut self) {
        self.score = None;
    }
}

/// Lexicographic comparison of weighted objectives.
fn compare_scores(a: &[f64; 2], b: &[f64; 2]) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

fn dominates(a: &[f64; 2], b: &[f64; 2]) -> bool {
    a.iter().zip(b).all(|(x, y)| x >= y) && a.iter().zip(b).any(|(x, y)| x > y)
}

/// Indices grouped into Pareto fronts, best front first (maximization).
pub fn non_dominated_fronts(scores: &[[f64; 2]]) -> Vec<Vec<usize>> {
    let n = scores.len();
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut domination_count = vec![0usize; n];
    let mut fronts: Vec<Vec<usize>> = vec![Vec::new()];

    for p in 0..n {
        for q in 0..n {
            if p == q {
                continue;
            }
            if dominates(&scores[p], &scores[q]) {
                dominated_by[p].push(q);
            } else if dominates(&scores[q], &scores[p]) {
                domination_count[p] += 1;
            }
        }
        if domination_count[p] == 0 {
            fronts[0].push(p);
        }
    }

    let mut current = 0;
    while !fronts[current].is_empty() {
        let mut next = Vec::new();
        for &p in &fronts[current] {
            for &q in &dominated_by[p] {
                domination_count[q] -= 1;
                if domination_count[q] == 0 {
                    next.push(q);
                }
            }
        }
        current += 1;
        fronts.push(next);
    }
    fronts.pop();
    fronts
}

/// Crowding distance of each member of `front`, aligned with `front`.
pub fn crowding_distance(front: &[usize], scores: &[[f64; 2]]) -> Vec<f64> {
    let mut distance = vec![0.0; front.len()];
    if front.len() <= 2 {
        return vec![f64::INFINITY; front.len()];
    }
    for objective in 0..2 {
        let mut order: Vec<usize> = (0..front.len()).collect();
        order.sort_by(|&a, &b| {
            scores[front[a]][objective]
                .partial_cmp(&scores[front[b]][objective])
                .unwrap_or(Ordering::Equal)
        });
        let first = order[0];
        let last = order[order.len() - 1];
        distance[first] = f64::INFINITY;
        distance[last] = f64::INFINITY;

        let span = scores[front[last]][objective] - scores[front[first]][objective];
        if span <= 0.0 {
            continue;
        }
        for w in order.windows(3) {
            let (prev, mid, next) = (w[0], w[1], w[2]);
            distance[mid] += (scores[front[next]][objective] - scores[front[prev]][objective]) / span;
        }
    }
    distance
}

/// NSGA-II survivor selection: whole fronts first, the split front by
/// descending crowding distance.
pub fn select_nsga2(pool: Vec<Individual>, k: usize) -> Vec<Individual> {
    let scores: Vec<[f64; 2]> = pool.iter().map(Individual::score).collect();
    let mut chosen: Vec<usize> = Vec::with_capacity(k);

    for front in non_dominated_fronts(&scores) {
        if chosen.len() + front.len() <= k {
            chosen.extend(front);
            continue;
        }
        let distance = crowding_distance(&front, &scores);
        let mut ranked: Vec<(usize, f64)> = front.into_iter().zip(distance).collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        let remaining = k - chosen.len();
        chosen.extend(ranked.into_iter().take(remaining).map(|(idx, _)| idx));
        break;
    }

    let mut slots: Vec<Option<Individual>> = pool.into_iter().map(Some).collect();
    chosen
        .into_iter()
        .filter_map(|idx| slots.get_mut(idx).and_then(Option::take))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationStats {
    pub generation: usize,
    pub evaluations: usize,
    pub avg: [f64; 2],
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl GenerationStats {
    fn collect(generation: usize, evaluations: usize, population: &[Individual]) -> Self {
        let scores: Vec<[f64; 2]> = population.iter().map(Individual::score).collect();
        let n = scores.len().max(1) as f64;
        let avg = [
            scores.iter().map(|s| s[0]).sum::<f64>() / n,
            scores.iter().map(|s| s[1]).sum::<f64>() / n,
        ];
        let min = scores
            .iter()
            .copied()
            .min_by(compare_scores)
            .unwrap_or_default();
        let max = scores
            .iter()
            .copied()
            .max_by(compare_scores)
            .unwrap_or_default();
        GenerationStats {
            generation,
            evaluations,
            avg,
            min,
            max,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub best: Individual,
    pub best_params: StrategyParams,
    pub history: Vec<GenerationStats>,
    pub evaluations: usize,
}

pub struct Optimizer<'a> {
    bars: &'a [OhlcvBar],
    base: StrategyParams,
    backtest: BacktestConfig,
    config: SearchConfig,
}

impl<'a> Optimizer<'a> {
    pub fn new(
        bars: &'a [OhlcvBar],
        base: StrategyParams,
        backtest: BacktestConfig,
        config: SearchConfig,
    ) -> Self {
        Optimizer {
            bars,
            base,
            backtest,
            config,
        }
    }

    pub fn run(&self) -> Result<SearchResult, PivotraderError> {
        self.config.validate()?;
        if self.bars.is_empty() {
            return Err(PivotraderError::NoData {
                source_name: "bar series".to_string(),
            });
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut normalizer = FitnessNormalizer::default();
        let mut population: Vec<Individual> = (0..self.config.population)
            .map(|_| Individual::new(random_genome(&mut rng)))
            .collect();

        let mut evaluations = self.evaluate(&mut population, &mut normalizer)?;
        let mut hall_of_fame: Option<Individual> = None;
        update_hall_of_fame(&mut hall_of_fame, &population);

        let mut history = vec![GenerationStats::collect(0, evaluations, &population)];
        log_generation(&history[0]);

        for generation in 1..=self.config.generations {
            let (offspring, evaluated) =
                self.next_generation(population, &mut rng, &mut normalizer)?;
            evaluations += evaluated;
            update_hall_of_fame(&mut hall_of_fame, &offspring);
            population = offspring;

            let stats = GenerationStats::collect(generation, evaluated, &population);
            log_generation(&stats);
            history.push(stats);
        }

        let best = hall_of_fame.ok_or_else(|| PivotraderError::NoData {
            source_name: "search population".to_string(),
        })?;
        let best_params = decode(&best.genome, &self.base);
        tracing::info!(
            total_return = best.raw.total_return,
            profitable_pct = best.raw.profitable_trade_percentage,
            evaluations,
            "search finished"
        );

        Ok(SearchResult {
            best,
            best_params,
            history,
            evaluations,
        })
    }

    /// Select parents, vary them and evaluate the changed children. The
    /// returned offspring replace `population`.
    fn next_generation(
        &self,
        population: Vec<Individual>,
        rng: &mut StdRng,
        normalizer: &mut FitnessNormalizer,
    ) -> Result<(Vec<Individual>, usize), PivotraderError> {
        let parents = select_nsga2(population, self.config.population);
        let mut offspring = self.vary(parents, rng)?;
        let evaluated = self.evaluate(&mut offspring, normalizer)?;
        Ok((offspring, evaluated))
    }

    /// Blend consecutive pairs, then mutate. Children left untouched keep
    /// their scores.
    fn vary(
        &self,
        mut offspring: Vec<Individual>,
        rng: &mut StdRng,
    ) -> Result<Vec<Individual>, PivotraderError> {
        for i in (1..offspring.len()).step_by(2) {
            if rng.r#gen::<f64>() < self.config.crossover_prob {
                let (left, right) = offspring.split_at_mut(i);
                let a = &mut left[i - 1];
                let b = &mut right[0];
                blend_crossover(&mut a.genome, &mut b.genome, BLEND_ALPHA, rng);
                a.invalidate();
                b.invalidate();
            }
        }

        for child in offspring.iter_mut() {
            if rng.r#gen::<f64>() < self.config.mutation_prob {
                gaussian_mutation(&mut child.genome, MUTATION_SIGMA, MUTATION_GENE_PROB, rng)?;
                child.invalidate();
            }
        }
        Ok(offspring)
    }

    /// Backtest every unevaluated individual, then normalize in population
    /// order. Returns the number of backtests run.
    fn evaluate(
        &self,
        population: &mut [Individual],
        normalizer: &mut FitnessNormalizer,
    ) -> Result<usize, PivotraderError> {
        let pending: Vec<usize> = population
            .iter()
            .enumerate()
            .filter(|(_, ind)| ind.score.is_none())
            .map(|(idx, _)| idx)
            .collect();

        for &idx in &pending {
            clamp_genome(&mut population[idx].genome);
        }

        let params: Vec<StrategyParams> = pending
            .iter()
            .map(|&idx| decode(&population[idx].genome, &self.base))
            .collect();

        let journal = Journal::silent();
        let outcomes: Vec<Fitness> = if self.config.parallel {
            params
                .par_iter()
                .map(|p| run_once(self.bars, p, &self.backtest, &journal).map(|o| o.fitness()))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            params
                .iter()
                .map(|p| run_once(self.bars, p, &self.backtest, &journal).map(|o| o.fitness()))
                .collect::<Result<Vec<_>, _>>()?
        };

        for (&idx, fitness) in pending.iter().zip(outcomes) {
            let (ret, pct) = normalizer.observe(fitness);
            let individual = &mut population[idx];
            individual.raw = fitness;
            individual.score = Some([
                ret * self.config.return_weight,
                pct * self.config.win_rate_weight,
            ]);
        }
        Ok(pending.len())
    }
}

fn update_hall_of_fame(hall_of_fame: &mut Option<Individual>, candidates: &[Individual]) {
    for candidate in candidates {
        let better = match hall_of_fame {
            Some(best) => compare_scores(&candidate.score(), &best.score()) == Ordering::Greater,
            None => true,
        };
        if better {
            *hall_of_fame = Some(candidate.clone());
        }
    }
}

fn log_generation(stats: &GenerationStats) {
    tracing::info!(
        generation = stats.generation,
        evals = stats.evaluations,
        avg = ?stats.avg,
        min = ?stats.min,
        max = ?stats.max,
        "generation complete"
    );
}
