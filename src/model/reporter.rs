//! Reporter sinks consuming data-collector snapshots.
//!
//! Reporters are passive: the orchestrator pushes one before-run snapshot,
//! monthly aggregates and one after-run summary. Write failures are logged
//! and never take down the simulation.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::model::simulation::Simulation;

pub trait Reporter {
    fn before_run(&mut self, sim: &Simulation);
    fn begin_time_step(&mut self, _sim: &Simulation) {}
    fn monthly_report(&mut self, sim: &Simulation);
    fn after_run(&mut self, sim: &Simulation);
}

/// Tracing-based progress reporter.
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn before_run(&mut self, sim: &Simulation) {
        tracing::info!(
            locations = sim.locations.len(),
            population = sim.population.len(),
            seed = sim.random.seed(),
            "simulation starting"
        );
    }

    fn monthly_report(&mut self, sim: &Simulation) {
        let prevalence: Vec<f64> = (0..sim.locations.len())
            .map(|loc| sim.mdc.blood_slide_prevalence(loc))
            .collect();
        tracing::info!(
            day = sim.scheduler.current_time(),
            date = %sim.scheduler.calendar_date(),
            ?prevalence,
            treatments = sim.mdc.monthly_treatments_by_location.iter().sum::<u64>(),
            clinical = sim.mdc.monthly_clinical_episodes_by_location.iter().sum::<u64>(),
            "monthly summary"
        );
    }

    fn after_run(&mut self, sim: &Simulation) {
        tracing::info!(
            days = sim.scheduler.current_time(),
            genotypes = sim.genotype_db.len(),
            cumulative_treatments = sim.mdc.cumulative_treatments_by_location.iter().sum::<u64>(),
            cumulative_clinical = sim
                .mdc
                .cumulative_clinical_episodes_by_location
                .iter()
                .sum::<u64>(),
            "simulation finished"
        );
    }
}

const TSV_SEP: &str = "\t";

/// Flat-file reporter: one TSV row per month plus an end-of-run summary.
pub struct MonthlyTsvReporter {
    output_dir: PathBuf,
    monthly: Option<BufWriter<File>>,
}

impl MonthlyTsvReporter {
    #[must_use]
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            monthly: None,
        }
    }

    fn open_monthly(&mut self, sim: &Simulation) {
        if let Err(e) = std::fs::create_dir_all(&self.output_dir) {
            tracing::warn!(error = %e, "cannot create report directory");
            return;
        }
        let path = self.output_dir.join("monthly_data.tsv");
        match File::create(&path) {
            Ok(file) => {
                let mut writer = BufWriter::new(file);
                let mut header = vec!["day".to_string(), "date".to_string()];
                for loc in 0..sim.locations.len() {
                    header.push(format!("pfpr_{loc}"));
                    header.push(format!("eir_{loc}"));
                    header.push(format!("treatments_{loc}"));
                    header.push(format!("clinical_{loc}"));
                    header.push(format!("tf_{loc}"));
                }
                header.push("mutation_events".to_string());
                let _ = writeln!(writer, "{}", header.join(TSV_SEP));
                self.monthly = Some(writer);
            }
            Err(e) => tracing::warn!(error = %e, path = %path.display(), "cannot open report file"),
        }
    }

    fn write_summary(&self, sim: &Simulation) {
        let path = self.output_dir.join("summary.tsv");
        let write = || -> std::io::Result<()> {
            let mut writer = BufWriter::new(File::create(&path)?);
            writeln!(
                writer,
                "location{TSV_SEP}cumulative_treatments{TSV_SEP}cumulative_clinical{TSV_SEP}cumulative_tf{TSV_SEP}deaths{TSV_SEP}malaria_deaths"
            )?;
            for loc in 0..sim.locations.len() {
                writeln!(
                    writer,
                    "{loc}{TSV_SEP}{}{TSV_SEP}{}{TSV_SEP}{}{TSV_SEP}{}{TSV_SEP}{}",
                    sim.mdc.cumulative_treatments_by_location[loc],
                    sim.mdc.cumulative_clinical_episodes_by_location[loc],
                    sim.mdc.cumulative_treatment_failures_by_location[loc],
                    sim.mdc.cumulative_deaths_by_location[loc],
                    sim.mdc.cumulative_malaria_deaths_by_location[loc],
                )?;
            }
            Ok(())
        };
        if let Err(e) = write() {
            tracing::warn!(error = %e, "cannot write summary report");
        }
    }

    fn write_genotype_db(&self, sim: &Simulation) {
        let path = self.output_dir.join("genotype_db.tsv");
        let write = || -> std::io::Result<()> {
            let mut writer = BufWriter::new(File::create(&path)?);
            writeln!(writer, "id{TSV_SEP}aa_sequence{TSV_SEP}daily_fitness")?;
            for genotype in sim.genotype_db.iter() {
                writeln!(
                    writer,
                    "{}{TSV_SEP}{}{TSV_SEP}{}",
                    genotype.id, genotype.aa_sequence, genotype.daily_fitness
                )?;
            }
            Ok(())
        };
        if let Err(e) = write() {
            tracing::warn!(error = %e, "cannot write genotype report");
        }
    }
}

impl Reporter for MonthlyTsvReporter {
    fn before_run(&mut self, sim: &Simulation) {
        self.open_monthly(sim);
        // One JSON snapshot of the run parameters next to the TSV output.
        let info = serde_json::json!({
            "seed": sim.random.seed(),
            "starting_date": sim.scheduler.starting_date(),
            "total_days": sim.scheduler.total_time(),
            "locations": sim.locations.len(),
            "population": sim.population.len(),
            "therapies": sim.config.therapy_parameters.therapy_db.len(),
            "drugs": sim.config.drug_parameters.drug_db.len(),
        });
        let path = self.output_dir.join("run_info.json");
        if let Err(e) = std::fs::write(&path, format!("{info:#}")) {
            tracing::warn!(error = %e, "cannot write run info");
        }
    }

    fn monthly_report(&mut self, sim: &Simulation) {
        let Some(writer) = self.monthly.as_mut() else {
            return;
        };
        let mut row = vec![
            sim.scheduler.current_time().to_string(),
            sim.scheduler.calendar_date().to_string(),
        ];
        for loc in 0..sim.locations.len() {
            row.push(format!("{:.4}", sim.mdc.blood_slide_prevalence(loc)));
            row.push(format!("{:.4}", sim.mdc.monthly_eir(loc)));
            row.push(sim.mdc.monthly_treatments_by_location[loc].to_string());
            row.push(sim.mdc.monthly_clinical_episodes_by_location[loc].to_string());
            row.push(sim.mdc.monthly_treatment_failures_by_location[loc].to_string());
        }
        row.push(sim.mdc.monthly_mutation_events.to_string());
        if let Err(e) = writeln!(writer, "{}", row.join(TSV_SEP)) {
            tracing::warn!(error = %e, "monthly report write failed");
        }
    }

    fn after_run(&mut self, sim: &Simulation) {
        if let Some(writer) = self.monthly.as_mut() {
            let _ = writer.flush();
        }
        self.write_summary(sim);
        self.write_genotype_db(sim);
    }
}
