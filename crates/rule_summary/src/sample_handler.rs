use crate::conf::{SamplingConfig, SELECTIVITY_PROBES};
use crate::error::Result;
use crate::lattice::is_sub_rule;
use crate::rules::Rule;
use crate::sample::TableSample;
use crate::table::Table;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::borrow::Cow;

/// Pool of samples under a total row budget.
#[derive(Debug, Clone)]
pub struct SampleHandler {
    capacity: usize,
    sample_size: usize,
    min_sample_size: usize,
    samples: Vec<TableSample>,
    rng: StdRng,
}

impl SampleHandler {
    /// Fresh samples draw `max(sample_size, min_sample_size)` rows.
    pub fn new(capacity: usize, sample_size: usize, min_sample_size: usize, seed: u64) -> Self {
        Self {
            capacity,
            sample_size: sample_size.max(min_sample_size),
            min_sample_size,
            samples: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_config(config: &SamplingConfig) -> Self {
        Self::new(
            config.capacity,
            config.sample_size,
            config.min_sample_size,
            config.seed,
        )
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn min_sample_size(&self) -> usize {
        self.min_sample_size
    }

    pub fn samples(&self) -> &[TableSample] {
        &self.samples
    }

    /// Rows held across all pooled samples.
    pub fn current_rows(&self) -> usize {
        self.samples.iter().map(TableSample::len).sum()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// A sample for the tuples covered by `filter`, in order of preference:
    /// a pooled sample with the same filter, a narrowed copy of a broader
    /// pooled sample expected to keep more than `min_sample_size` rows, or a
    /// fresh sample of `sample_size` rows when the budget allows. `Ok(None)`
    /// means the budget is exhausted and the caller has to evaluate exactly.
    pub fn get_sample_for_rule(
        &mut self,
        table: &Table,
        filter: &Rule,
    ) -> Result<Option<Cow<'_, TableSample>>> {
        table.check_rule(filter)?;
        if let Some(i) = self.samples.iter().position(|s| s.filter() == filter) {
            debug!("reusing pooled sample for {filter}");
            return Ok(Some(Cow::Borrowed(&self.samples[i])));
        }

        let broader: Vec<usize> = self
            .samples
            .iter()
            .enumerate()
            .filter(|(_, s)| is_sub_rule(s.filter(), filter))
            .map(|(i, _)| i)
            .collect();
        let mut best: Option<(usize, usize)> = None;
        for i in broader {
            let estimate = self.estimate_narrowed_rows(i, filter);
            if best.map_or(true, |(_, e)| estimate > e) {
                best = Some((i, estimate));
            }
        }
        if let Some((i, estimate)) = best.filter(|(_, e)| *e > self.min_sample_size) {
            let derived = self.samples[i].create_filtered(filter)?;
            debug!(
                "narrowed sample for {} to {filter}: ~{estimate} rows expected, {} kept",
                self.samples[i].filter(),
                derived.len()
            );
            if self.current_rows().saturating_add(derived.len()) <= self.capacity {
                self.samples.push(derived);
                return Ok(self.samples.last().map(Cow::Borrowed));
            }
            return Ok(Some(Cow::Owned(derived)));
        }

        if self.current_rows().saturating_add(self.sample_size) < self.capacity {
            let sample = TableSample::create(table, filter, self.sample_size, &mut self.rng)?;
            info!(
                "new sample for {filter}: {} of {} tuples",
                sample.len(),
                sample.total_count()
            );
            self.samples.push(sample);
            return Ok(self.samples.last().map(Cow::Borrowed));
        }
        info!("sample budget exhausted for {filter}");
        Ok(None)
    }

    /// Extrapolated count of rows of sample `index` that `filter` keeps,
    /// from a fixed number of random probes.
    fn estimate_narrowed_rows(&mut self, index: usize, filter: &Rule) -> usize {
        let sample = &self.samples[index];
        if sample.is_empty() {
            return 0;
        }
        let hits = (0..SELECTIVITY_PROBES)
            .filter(|_| {
                let row = self.rng.random_range(0..sample.len());
                sample.covers(filter, sample.tuple(row))
            })
            .count();
        hits * sample.len() / SELECTIVITY_PROBES
    }
}
