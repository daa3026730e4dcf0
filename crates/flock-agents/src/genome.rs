//! Flock genome — the evolvable parameters of every force rule.
//!
//! A genome holds one chromosome per force rule. All agents of a
//! generation steer with the same genome, so a genome is scored by how
//! the whole flock does. Genomes are immutable values: crossover and
//! mutation always build a new one.

use flock_core::error::{FlockError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Parameters of one inverse-power force rule.
///
/// The rule pulls (or pushes) with magnitude `constant / dist^exponent`
/// for bodies closer than `distance`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Chromosome {
    /// Force scale.
    pub constant: f64,
    /// Distance falloff.
    pub exponent: f64,
    /// Cutoff beyond which the rule contributes nothing.
    pub distance: f64,
}

impl Chromosome {
    pub fn new(constant: f64, exponent: f64, distance: f64) -> Self {
        Self {
            constant,
            exponent,
            distance,
        }
    }
}

/// Parameters of the path-following rule.
///
/// `base.distance` doubles as the leader-detection radius used by the
/// token scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathChromosome {
    pub base: Chromosome,
    /// Number of upcoming waypoints pulled toward.
    pub steps: f64,
    /// Probability of keeping a pathfinding token into the next tick.
    pub carryover: f64,
    /// Half-angle of the leader-detection cone, in degrees.
    pub view: f64,
}

impl PathChromosome {
    pub fn new(base: Chromosome, steps: f64, carryover: f64, view: f64) -> Self {
        Self {
            base,
            steps,
            carryover,
            view,
        }
    }

    /// Waypoint count actually followed. Always at least one.
    pub fn step_count(&self) -> usize {
        if self.steps.is_finite() && self.steps >= 1.0 {
            self.steps.round() as usize
        } else {
            1
        }
    }
}

/// The force rules a genome parameterizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForceRule {
    Alignment,
    Cohesion,
    Repulsion,
    Obstacle,
    Boundary,
    Reward,
    PathFollow,
}

impl ForceRule {
    pub const ALL: [ForceRule; 7] = [
        ForceRule::Alignment,
        ForceRule::Cohesion,
        ForceRule::Repulsion,
        ForceRule::Obstacle,
        ForceRule::Boundary,
        ForceRule::Reward,
        ForceRule::PathFollow,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ForceRule::Alignment => "alignment",
            ForceRule::Cohesion => "cohesion",
            ForceRule::Repulsion => "repulsion",
            ForceRule::Obstacle => "obstacle",
            ForceRule::Boundary => "boundary",
            ForceRule::Reward => "reward",
            ForceRule::PathFollow => "path_follow",
        }
    }
}

/// One complete set of force-rule parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    pub alignment: Chromosome,
    pub cohesion: Chromosome,
    pub repulsion: Chromosome,
    pub obstacle: Chromosome,
    pub boundary: Chromosome,
    pub reward: Chromosome,
    pub pathfind: PathChromosome,
}

/// Sampling interval for one gene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneRange {
    pub min: f64,
    pub max: f64,
}

impl GeneRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        rng.random_range(self.min..self.max)
    }

    /// Position of `value` in the range, 0 at `min` and 1 at `max`.
    /// Values outside the range map outside `[0, 1]`.
    pub fn normalize(&self, value: f64) -> f64 {
        (value - self.min) / (self.max - self.min)
    }
}

/// Initial ranges for every gene kind, plus the mutation scale.
///
/// The mutation range of a gene is the midpoint of its initial range
/// times `mutation_scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneRanges {
    pub constant: GeneRange,
    pub exponent: GeneRange,
    pub distance: GeneRange,
    pub steps: GeneRange,
    pub carryover: GeneRange,
    pub view: GeneRange,
    pub mutation_scale: f64,
}

impl Default for GeneRanges {
    fn default() -> Self {
        Self {
            constant: GeneRange::new(1.0, 150.0),
            exponent: GeneRange::new(0.5, 4.0),
            distance: GeneRange::new(1.0, 40.0),
            steps: GeneRange::new(1.0, 8.0),
            carryover: GeneRange::new(0.0, 1.0),
            view: GeneRange::new(10.0, 180.0),
            mutation_scale: 0.5,
        }
    }
}

/// Which gene a scalar field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneKind {
    Constant,
    Exponent,
    Distance,
    Steps,
    Carryover,
    View,
}

impl GeneRanges {
    pub fn range(&self, kind: GeneKind) -> &GeneRange {
        match kind {
            GeneKind::Constant => &self.constant,
            GeneKind::Exponent => &self.exponent,
            GeneKind::Distance => &self.distance,
            GeneKind::Steps => &self.steps,
            GeneKind::Carryover => &self.carryover,
            GeneKind::View => &self.view,
        }
    }

    /// Largest mutation delta for a gene of this kind (before the engine's
    /// global mutation rate is applied).
    pub fn mutation_range(&self, kind: GeneKind) -> f64 {
        let r = self.range(kind);
        (r.min + r.max) / 2.0 * self.mutation_scale
    }

    /// Reject empty, inverted or non-finite ranges.
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("constant", &self.constant),
            ("exponent", &self.exponent),
            ("distance", &self.distance),
            ("steps", &self.steps),
            ("carryover", &self.carryover),
            ("view", &self.view),
        ];
        for (name, r) in named {
            if !r.min.is_finite() || !r.max.is_finite() || r.min >= r.max {
                return Err(FlockError::invalid_value(
                    format!("genes.{}", name),
                    format!("[{}, {}]", r.min, r.max),
                    "range must be finite with min < max",
                ));
            }
        }
        if !(self.mutation_scale.is_finite() && self.mutation_scale >= 0.0) {
            return Err(FlockError::invalid_value(
                "genes.mutation_scale",
                self.mutation_scale,
                "must be a non-negative number",
            ));
        }
        Ok(())
    }
}

impl Chromosome {
    fn build(mut f: impl FnMut(GeneKind) -> f64) -> Self {
        Self {
            constant: f(GeneKind::Constant),
            exponent: f(GeneKind::Exponent),
            distance: f(GeneKind::Distance),
        }
    }

    fn combine(&self, other: &Chromosome, f: &mut impl FnMut(GeneKind, f64, f64) -> f64) -> Self {
        Self {
            constant: f(GeneKind::Constant, self.constant, other.constant),
            exponent: f(GeneKind::Exponent, self.exponent, other.exponent),
            distance: f(GeneKind::Distance, self.distance, other.distance),
        }
    }

    fn genes(&self) -> [(GeneKind, f64); 3] {
        [
            (GeneKind::Constant, self.constant),
            (GeneKind::Exponent, self.exponent),
            (GeneKind::Distance, self.distance),
        ]
    }
}

impl Genome {
    /// Sample every gene uniformly from its initial range.
    pub fn random<R: Rng + ?Sized>(ranges: &GeneRanges, rng: &mut R) -> Self {
        let mut sample = |kind: GeneKind| ranges.range(kind).sample(rng);
        let alignment = Chromosome::build(&mut sample);
        let cohesion = Chromosome::build(&mut sample);
        let repulsion = Chromosome::build(&mut sample);
        let obstacle = Chromosome::build(&mut sample);
        let boundary = Chromosome::build(&mut sample);
        let reward = Chromosome::build(&mut sample);
        let base = Chromosome::build(&mut sample);
        let pathfind = PathChromosome::new(
            base,
            sample(GeneKind::Steps),
            sample(GeneKind::Carryover),
            sample(GeneKind::View),
        );
        Self {
            alignment,
            cohesion,
            repulsion,
            obstacle,
            boundary,
            reward,
            pathfind,
        }
    }

    /// Build a genome field by field from two parents.
    ///
    /// `f` receives the gene kind and the matching value from each parent.
    /// Fields are visited in a fixed order so seeded callers stay
    /// reproducible.
    pub fn combine(&self, other: &Genome, mut f: impl FnMut(GeneKind, f64, f64) -> f64) -> Genome {
        let alignment = self.alignment.combine(&other.alignment, &mut f);
        let cohesion = self.cohesion.combine(&other.cohesion, &mut f);
        let repulsion = self.repulsion.combine(&other.repulsion, &mut f);
        let obstacle = self.obstacle.combine(&other.obstacle, &mut f);
        let boundary = self.boundary.combine(&other.boundary, &mut f);
        let reward = self.reward.combine(&other.reward, &mut f);
        let base = self.pathfind.base.combine(&other.pathfind.base, &mut f);
        let pathfind = PathChromosome::new(
            base,
            f(GeneKind::Steps, self.pathfind.steps, other.pathfind.steps),
            f(GeneKind::Carryover, self.pathfind.carryover, other.pathfind.carryover),
            f(GeneKind::View, self.pathfind.view, other.pathfind.view),
        );
        Genome {
            alignment,
            cohesion,
            repulsion,
            obstacle,
            boundary,
            reward,
            pathfind,
        }
    }

    /// Every scalar gene with its kind, in the order `combine` visits them.
    pub fn genes(&self) -> Vec<(GeneKind, f64)> {
        let mut out = Vec::with_capacity(24);
        for rule in ForceRule::ALL {
            out.extend(self.chromosome(rule).genes());
        }
        out.push((GeneKind::Steps, self.pathfind.steps));
        out.push((GeneKind::Carryover, self.pathfind.carryover));
        out.push((GeneKind::View, self.pathfind.view));
        out
    }

    /// The chromosome for `rule`. For path following this is the base
    /// inverse-law part.
    pub fn chromosome(&self, rule: ForceRule) -> &Chromosome {
        match rule {
            ForceRule::Alignment => &self.alignment,
            ForceRule::Cohesion => &self.cohesion,
            ForceRule::Repulsion => &self.repulsion,
            ForceRule::Obstacle => &self.obstacle,
            ForceRule::Boundary => &self.boundary,
            ForceRule::Reward => &self.reward,
            ForceRule::PathFollow => &self.pathfind.base,
        }
    }

    /// Euclidean distance between two genomes in parameter space.
    /// Each gene is normalized by its initial range first.
    pub fn distance(&self, other: &Genome, ranges: &GeneRanges) -> f64 {
        let sum_sq: f64 = self
            .genes()
            .iter()
            .zip(other.genes().iter())
            .map(|((kind, a), (_, b))| {
                let r = ranges.range(*kind);
                (r.normalize(*a) - r.normalize(*b)).powi(2)
            })
            .sum();
        sum_sq.sqrt()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn random_genome_within_ranges() {
        let ranges = GeneRanges::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let g = Genome::random(&ranges, &mut rng);
            for (kind, value) in g.genes() {
                let r = ranges.range(kind);
                assert!(value >= r.min && value < r.max, "{:?} = {}", kind, value);
            }
        }
    }

    #[test]
    fn genes_cover_every_field() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let g = Genome::random(&GeneRanges::default(), &mut rng);
        // Seven chromosomes of three genes plus three path-only genes.
        assert_eq!(g.genes().len(), 24);
    }

    #[test]
    fn mutation_range_is_half_midpoint() {
        let ranges = GeneRanges::default();
        assert!((ranges.mutation_range(GeneKind::Carryover) - 0.25).abs() < 1e-12);
        assert!((ranges.mutation_range(GeneKind::View) - 47.5).abs() < 1e-12);
    }

    #[test]
    fn distance_is_zero_for_same_genome() {
        let ranges = GeneRanges::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let a = Genome::random(&ranges, &mut rng);
        let b = Genome::random(&ranges, &mut rng);
        assert!(a.distance(&a, &ranges) < 1e-12);
        assert!(a.distance(&b, &ranges) > 0.0);
        assert!((a.distance(&b, &ranges) - b.distance(&a, &ranges)).abs() < 1e-12);
    }

    #[test]
    fn step_count_never_zero() {
        let base = Chromosome::new(10.0, 1.0, 5.0);
        assert_eq!(PathChromosome::new(base, -2.0, 0.5, 45.0).step_count(), 1);
        assert_eq!(PathChromosome::new(base, 3.4, 0.5, 45.0).step_count(), 3);
    }

    #[test]
    fn degenerate_range_rejected() {
        let mut ranges = GeneRanges::default();
        ranges.view = GeneRange::new(5.0, 5.0);
        assert!(ranges.validate().is_err());
        assert!(GeneRanges::default().validate().is_ok());
    }

    #[test]
    fn genome_json_names_rules() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let g = Genome::random(&GeneRanges::default(), &mut rng);
        let json = g.to_json().unwrap();
        assert!(json.contains("\"pathfind\""));
        assert!(json.contains("\"carryover\""));
        assert!(Genome::from_json("{\"alignment\": 1}").is_err());
    }
}
