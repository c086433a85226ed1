//! Genotype database with lazy canonical interning.
//!
//! A genotype is keyed by its amino-acid sequence, one character per locus of
//! the configured schema. The first request for a sequence validates it,
//! precomputes its daily fitness and per-drug EC50^n, applies any configured
//! overrides, updates the per-drug minimum-EC50 cache and assigns the next
//! dense id; later requests return the same id. Genotypes are pinned for the
//! whole simulation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::drug::DrugType;
use crate::model::error::{Result, SimError};
use crate::model::random::Random;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlleleInfo {
    pub value: char,
    #[serde(default = "default_fitness")]
    pub daily_fitness_multiplier: f64,
    /// Per-drug EC50 multipliers relative to the drug's base EC50. Missing
    /// entries mean no effect.
    #[serde(default)]
    pub ec50_multipliers: HashMap<usize, f64>,
}

fn default_fitness() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocusInfo {
    pub alleles: Vec<AlleleInfo>,
}

/// The allele schema: one entry per locus, in sequence order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PfGenotypeInfo {
    pub loci: Vec<LocusInfo>,
}

impl PfGenotypeInfo {
    #[must_use]
    pub fn sequence_length(&self) -> usize {
        self.loci.len()
    }

    pub fn allele_index(&self, locus: usize, value: char) -> Result<usize> {
        self.loci[locus]
            .alleles
            .iter()
            .position(|a| a.value == value)
            .ok_or_else(|| {
                SimError::genotype(format!("invalid character '{value}' at locus {locus}"))
            })
    }

    /// Decode a sequence into allele indexes, validating length and alphabet.
    pub fn decode(&self, aa_sequence: &str) -> Result<Vec<usize>> {
        let chars: Vec<char> = aa_sequence.chars().collect();
        if chars.len() != self.loci.len() {
            return Err(SimError::genotype(format!(
                "sequence '{aa_sequence}' has length {}, schema expects {}",
                chars.len(),
                self.loci.len()
            )));
        }
        chars
            .iter()
            .enumerate()
            .map(|(locus, &c)| self.allele_index(locus, c))
            .collect()
    }

    #[must_use]
    pub fn encode(&self, alleles: &[usize]) -> String {
        alleles
            .iter()
            .enumerate()
            .map(|(locus, &a)| self.loci[locus].alleles[a].value)
            .collect()
    }
}

/// EC50 override matched against the full sequence; `.` is a wildcard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ec50Override {
    pub pattern: String,
    pub drug_id: usize,
    pub ec50: f64,
}

impl Ec50Override {
    #[must_use]
    fn matches(&self, aa_sequence: &str) -> bool {
        self.pattern.len() == aa_sequence.len()
            && self
                .pattern
                .chars()
                .zip(aa_sequence.chars())
                .all(|(p, c)| p == '.' || p == c)
    }
}

#[derive(Debug, Clone)]
pub struct Genotype {
    pub id: usize,
    pub aa_sequence: String,
    pub alleles: Vec<usize>,
    pub daily_fitness: f64,
    /// EC50 raised to each drug's hill slope, indexed by drug id.
    pub ec50_power_n: Vec<f64>,
}

pub struct GenotypeDb {
    schema: PfGenotypeInfo,
    overrides: Vec<Ec50Override>,
    drug_db: Vec<DrugType>,
    genotypes: Vec<Genotype>,
    sequence_to_id: HashMap<String, usize>,
    /// Allele-hash -> genotype id, for O(L) lookup by allele structure.
    hash_to_id: HashMap<usize, usize>,
    weights: Vec<usize>,
    /// Minimum EC50^n per drug over every interned genotype.
    min_ec50_power_n: Vec<f64>,
}

impl GenotypeDb {
    #[must_use]
    pub fn new(schema: PfGenotypeInfo, overrides: Vec<Ec50Override>, drug_db: Vec<DrugType>) -> Self {
        // weight[i] = product of allele counts of all later loci, so that
        // sum(weight[i] * allele[i]) is unique per valid tuple.
        let mut weights = vec![1usize; schema.loci.len()];
        for i in (0..schema.loci.len().saturating_sub(1)).rev() {
            weights[i] = weights[i + 1] * schema.loci[i + 1].alleles.len();
        }
        let drug_count = drug_db.len();
        Self {
            schema,
            overrides,
            drug_db,
            genotypes: Vec::new(),
            sequence_to_id: HashMap::new(),
            hash_to_id: HashMap::new(),
            weights,
            min_ec50_power_n: vec![f64::INFINITY; drug_count],
        }
    }

    #[must_use]
    pub fn schema(&self) -> &PfGenotypeInfo {
        &self.schema
    }

    #[must_use]
    pub fn weights(&self) -> &[usize] {
        &self.weights
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.genotypes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.genotypes.is_empty()
    }

    #[must_use]
    pub fn genotype(&self, id: usize) -> &Genotype {
        &self.genotypes[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Genotype> {
        self.genotypes.iter()
    }

    #[must_use]
    fn allele_hash(&self, alleles: &[usize]) -> usize {
        alleles
            .iter()
            .zip(self.weights.iter())
            .map(|(a, w)| a * w)
            .sum()
    }

    /// Canonical interning entry point: same sequence, same id, forever.
    pub fn get(&mut self, aa_sequence: &str) -> Result<usize> {
        if let Some(&id) = self.sequence_to_id.get(aa_sequence) {
            return Ok(id);
        }
        let alleles = self.schema.decode(aa_sequence)?;
        Ok(self.intern(aa_sequence.to_string(), alleles))
    }

    /// O(L) lookup by allele structure; unseen tuples are interned lazily.
    pub fn get_by_alleles(&mut self, alleles: &[usize]) -> Result<usize> {
        if alleles.len() != self.schema.loci.len() {
            return Err(SimError::genotype(format!(
                "allele vector has length {}, schema expects {}",
                alleles.len(),
                self.schema.loci.len()
            )));
        }
        for (locus, &a) in alleles.iter().enumerate() {
            if a >= self.schema.loci[locus].alleles.len() {
                return Err(SimError::genotype(format!(
                    "allele index {a} out of range at locus {locus}"
                )));
            }
        }
        if let Some(&id) = self.hash_to_id.get(&self.allele_hash(alleles)) {
            return Ok(id);
        }
        let sequence = self.schema.encode(alleles);
        Ok(self.intern(sequence, alleles.to_vec()))
    }

    fn intern(&mut self, aa_sequence: String, alleles: Vec<usize>) -> usize {
        let daily_fitness: f64 = alleles
            .iter()
            .enumerate()
            .map(|(locus, &a)| self.schema.loci[locus].alleles[a].daily_fitness_multiplier)
            .product();

        let mut ec50_power_n = Vec::with_capacity(self.drug_db.len());
        for (drug_id, drug) in self.drug_db.iter().enumerate() {
            let mut ec50 = drug.base_ec50;
            for (locus, &a) in alleles.iter().enumerate() {
                if let Some(multiplier) =
                    self.schema.loci[locus].alleles[a].ec50_multipliers.get(&drug_id)
                {
                    ec50 *= multiplier;
                }
            }
            for override_entry in &self.overrides {
                if override_entry.drug_id == drug_id && override_entry.matches(&aa_sequence) {
                    ec50 = override_entry.ec50;
                }
            }
            ec50_power_n.push(ec50.powf(drug.n));
        }

        for (drug_id, value) in ec50_power_n.iter().enumerate() {
            if *value < self.min_ec50_power_n[drug_id] {
                self.min_ec50_power_n[drug_id] = *value;
            }
        }

        let id = self.genotypes.len();
        let hash = self.allele_hash(&alleles);
        tracing::debug!(id, sequence = %aa_sequence, "interned genotype");
        self.sequence_to_id.insert(aa_sequence.clone(), id);
        self.hash_to_id.insert(hash, id);
        self.genotypes.push(Genotype {
            id,
            aa_sequence,
            alleles,
            daily_fitness,
            ec50_power_n,
        });
        id
    }

    #[must_use]
    pub fn min_ec50_power_n(&self, drug_id: usize) -> f64 {
        self.min_ec50_power_n[drug_id]
    }

    /// Switch one locus of `id` to a specific allele value.
    pub fn switch_allele(&mut self, id: usize, locus: usize, value: char) -> Result<usize> {
        if locus >= self.schema.loci.len() {
            return Err(SimError::genotype(format!("locus {locus} out of range")));
        }
        let allele = self.schema.allele_index(locus, value)?;
        let mut alleles = self.genotypes[id].alleles.clone();
        alleles[locus] = allele;
        self.get_by_alleles(&alleles)
    }

    /// Per-locus Bernoulli mutation masked by a '1'/'0' string. Returns the
    /// resulting genotype id and the number of mutations applied.
    pub fn mutate_by_mask(
        &mut self,
        id: usize,
        mask: &str,
        probability: f64,
        random: &mut Random,
    ) -> Result<(usize, u32)> {
        let mut alleles = self.genotypes[id].alleles.clone();
        let mut mutations = 0u32;
        for (locus, allowed) in mask.chars().enumerate().take(alleles.len()) {
            if allowed != '1' {
                continue;
            }
            let allele_count = self.schema.loci[locus].alleles.len();
            if allele_count < 2 {
                continue;
            }
            if random.random_bool(probability) {
                // Draw a different allele uniformly.
                let mut next = random.random_uniform(allele_count - 1);
                if next >= alleles[locus] {
                    next += 1;
                }
                alleles[locus] = next;
                mutations += 1;
            }
        }
        if mutations == 0 {
            return Ok((id, 0));
        }
        let mutant = self.get_by_alleles(&alleles)?;
        Ok((mutant, mutations))
    }

    /// Free recombination: each locus drawn uniformly from either parent.
    pub fn recombine(&mut self, a: usize, b: usize, random: &mut Random) -> Result<usize> {
        if a == b {
            return Ok(a);
        }
        let alleles: Vec<usize> = (0..self.schema.loci.len())
            .map(|locus| {
                if random.random_bool(0.5) {
                    self.genotypes[a].alleles[locus]
                } else {
                    self.genotypes[b].alleles[locus]
                }
            })
            .collect();
        self.get_by_alleles(&alleles)
    }
}
