//! Model data collector: running tallies for prevalence, incidence and
//! treatment outcomes.
//!
//! Daily counters reset at begin-time-step; treatment-failure ratios run over
//! a 60-day ring buffer per therapy; prevalence is a monthly population scan.
//! Nothing accumulates before `start_collect_day`.

const TF_WINDOW_DAYS: usize = 60;

#[derive(Debug, Clone)]
pub struct ModelDataCollector {
    number_of_locations: usize,
    number_of_age_classes: usize,
    number_of_therapies: usize,
    start_collect_day: i32,

    // Monthly prevalence snapshot
    pub blood_slide_numerator_by_location: Vec<f64>,
    pub blood_slide_denominator_by_location: Vec<f64>,
    pub blood_slide_numerator_by_location_age_class: Vec<Vec<f64>>,
    pub blood_slide_denominator_by_location_age_class: Vec<Vec<f64>>,
    pub genotype_carriers: Vec<u64>,

    // Monthly counters
    pub monthly_treatments_by_location: Vec<u64>,
    pub monthly_treatment_failures_by_location: Vec<u64>,
    pub monthly_clinical_episodes_by_location: Vec<u64>,
    pub monthly_clinical_episodes_by_location_age_class: Vec<Vec<u64>>,
    pub monthly_mutation_events: u64,
    pub monthly_infectious_bites_by_location: Vec<u64>,
    pub monthly_person_days_by_location: Vec<u64>,
    pub monthly_births_by_location: Vec<u64>,
    pub monthly_deaths_by_location: Vec<u64>,
    pub monthly_malaria_deaths_by_location: Vec<u64>,

    // Cumulative counters
    pub cumulative_treatments_by_location: Vec<u64>,
    pub cumulative_treatment_failures_by_location: Vec<u64>,
    pub cumulative_clinical_episodes_by_location: Vec<u64>,
    pub cumulative_mutation_events: u64,
    pub cumulative_deaths_by_location: Vec<u64>,
    pub cumulative_malaria_deaths_by_location: Vec<u64>,
    pub cumulative_treatments_by_therapy: Vec<u64>,
    pub cumulative_treatment_failures_by_therapy: Vec<u64>,

    // 60-day treatment-failure window per therapy
    today_treatments_by_therapy: Vec<u64>,
    today_treatment_failures_by_therapy: Vec<u64>,
    window_treatments: Vec<Vec<u64>>,
    window_treatment_failures: Vec<Vec<u64>>,

    // Daily EIR numerator
    pub today_infectious_bites_by_location: Vec<u64>,
}

impl ModelDataCollector {
    #[must_use]
    pub fn new(
        number_of_locations: usize,
        number_of_age_classes: usize,
        number_of_therapies: usize,
        start_collect_day: i32,
    ) -> Self {
        Self {
            number_of_locations,
            number_of_age_classes,
            number_of_therapies,
            start_collect_day,
            blood_slide_numerator_by_location: vec![0.0; number_of_locations],
            blood_slide_denominator_by_location: vec![0.0; number_of_locations],
            blood_slide_numerator_by_location_age_class: vec![
                vec![0.0; number_of_age_classes];
                number_of_locations
            ],
            blood_slide_denominator_by_location_age_class: vec![
                vec![0.0; number_of_age_classes];
                number_of_locations
            ],
            genotype_carriers: Vec::new(),
            monthly_treatments_by_location: vec![0; number_of_locations],
            monthly_treatment_failures_by_location: vec![0; number_of_locations],
            monthly_clinical_episodes_by_location: vec![0; number_of_locations],
            monthly_clinical_episodes_by_location_age_class: vec![
                vec![0; number_of_age_classes];
                number_of_locations
            ],
            monthly_mutation_events: 0,
            monthly_infectious_bites_by_location: vec![0; number_of_locations],
            monthly_person_days_by_location: vec![0; number_of_locations],
            monthly_births_by_location: vec![0; number_of_locations],
            monthly_deaths_by_location: vec![0; number_of_locations],
            monthly_malaria_deaths_by_location: vec![0; number_of_locations],
            cumulative_treatments_by_location: vec![0; number_of_locations],
            cumulative_treatment_failures_by_location: vec![0; number_of_locations],
            cumulative_clinical_episodes_by_location: vec![0; number_of_locations],
            cumulative_mutation_events: 0,
            cumulative_deaths_by_location: vec![0; number_of_locations],
            cumulative_malaria_deaths_by_location: vec![0; number_of_locations],
            cumulative_treatments_by_therapy: vec![0; number_of_therapies],
            cumulative_treatment_failures_by_therapy: vec![0; number_of_therapies],
            today_treatments_by_therapy: vec![0; number_of_therapies],
            today_treatment_failures_by_therapy: vec![0; number_of_therapies],
            window_treatments: vec![vec![0; number_of_therapies]; TF_WINDOW_DAYS],
            window_treatment_failures: vec![vec![0; number_of_therapies]; TF_WINDOW_DAYS],
            today_infectious_bites_by_location: vec![0; number_of_locations],
        }
    }

    #[must_use]
    pub fn is_collecting(&self, current_time: i32) -> bool {
        current_time >= self.start_collect_day
    }

    #[must_use]
    pub fn number_of_locations(&self) -> usize {
        self.number_of_locations
    }

    #[must_use]
    pub fn number_of_age_classes(&self) -> usize {
        self.number_of_age_classes
    }

    pub fn begin_time_step(&mut self) {
        self.today_infectious_bites_by_location.fill(0);
        self.today_treatments_by_therapy.fill(0);
        self.today_treatment_failures_by_therapy.fill(0);
    }

    /// Roll today's treatment counters into the 60-day window.
    pub fn end_of_time_step(&mut self, current_time: i32) {
        let slot = (current_time.max(0) as usize) % TF_WINDOW_DAYS;
        self.window_treatments[slot] = self.today_treatments_by_therapy.clone();
        self.window_treatment_failures[slot] = self.today_treatment_failures_by_therapy.clone();
        for (loc, bites) in self.today_infectious_bites_by_location.iter().enumerate() {
            self.monthly_infectious_bites_by_location[loc] += bites;
        }
    }

    pub fn record_person_days(&mut self, location: usize, days: u64) {
        self.monthly_person_days_by_location[location] += days;
    }

    pub fn record_1_treatment(&mut self, current_time: i32, location: usize, therapy_id: usize) {
        if !self.is_collecting(current_time) {
            return;
        }
        self.monthly_treatments_by_location[location] += 1;
        self.cumulative_treatments_by_location[location] += 1;
        self.cumulative_treatments_by_therapy[therapy_id] += 1;
        self.today_treatments_by_therapy[therapy_id] += 1;
    }

    pub fn record_1_treatment_failure(
        &mut self,
        current_time: i32,
        location: usize,
        therapy_id: usize,
    ) {
        if !self.is_collecting(current_time) {
            return;
        }
        self.monthly_treatment_failures_by_location[location] += 1;
        self.cumulative_treatment_failures_by_location[location] += 1;
        self.cumulative_treatment_failures_by_therapy[therapy_id] += 1;
        self.today_treatment_failures_by_therapy[therapy_id] += 1;
    }

    pub fn record_1_clinical_episode(
        &mut self,
        current_time: i32,
        location: usize,
        age_class: usize,
    ) {
        if !self.is_collecting(current_time) {
            return;
        }
        self.monthly_clinical_episodes_by_location[location] += 1;
        self.monthly_clinical_episodes_by_location_age_class[location][age_class] += 1;
        self.cumulative_clinical_episodes_by_location[location] += 1;
    }

    pub fn record_mutation_events(&mut self, current_time: i32, count: u64) {
        if !self.is_collecting(current_time) || count == 0 {
            return;
        }
        self.monthly_mutation_events += count;
        self.cumulative_mutation_events += count;
    }

    pub fn record_1_infectious_bite(&mut self, current_time: i32, location: usize) {
        if !self.is_collecting(current_time) {
            return;
        }
        self.today_infectious_bites_by_location[location] += 1;
    }

    pub fn record_1_birth(&mut self, location: usize) {
        self.monthly_births_by_location[location] += 1;
    }

    pub fn record_1_death(&mut self, location: usize) {
        self.monthly_deaths_by_location[location] += 1;
        self.cumulative_deaths_by_location[location] += 1;
    }

    pub fn record_1_malaria_death(&mut self, location: usize) {
        self.monthly_malaria_deaths_by_location[location] += 1;
        self.cumulative_malaria_deaths_by_location[location] += 1;
    }

    /// Treatment-failure ratio of a therapy over the last 60 days.
    #[must_use]
    pub fn current_tf_by_therapy(&self, therapy_id: usize) -> f64 {
        let treatments: u64 = self.window_treatments.iter().map(|d| d[therapy_id]).sum();
        let failures: u64 = self
            .window_treatment_failures
            .iter()
            .map(|d| d[therapy_id])
            .sum();
        if treatments == 0 {
            return 0.0;
        }
        failures as f64 / treatments as f64
    }

    /// Reset the prevalence scan before a monthly snapshot.
    pub fn begin_monthly_snapshot(&mut self, genotype_count: usize) {
        self.blood_slide_numerator_by_location.fill(0.0);
        self.blood_slide_denominator_by_location.fill(0.0);
        for row in &mut self.blood_slide_numerator_by_location_age_class {
            row.fill(0.0);
        }
        for row in &mut self.blood_slide_denominator_by_location_age_class {
            row.fill(0.0);
        }
        self.genotype_carriers = vec![0; genotype_count];
    }

    pub fn record_blood_slide(
        &mut self,
        location: usize,
        age_class: usize,
        slide_positive: bool,
    ) {
        self.blood_slide_denominator_by_location[location] += 1.0;
        self.blood_slide_denominator_by_location_age_class[location][age_class] += 1.0;
        if slide_positive {
            self.blood_slide_numerator_by_location[location] += 1.0;
            self.blood_slide_numerator_by_location_age_class[location][age_class] += 1.0;
        }
    }

    pub fn record_genotype_carrier(&mut self, genotype_id: usize) {
        if genotype_id < self.genotype_carriers.len() {
            self.genotype_carriers[genotype_id] += 1;
        }
    }

    #[must_use]
    pub fn blood_slide_prevalence(&self, location: usize) -> f64 {
        let denominator = self.blood_slide_denominator_by_location[location];
        if denominator == 0.0 {
            return 0.0;
        }
        self.blood_slide_numerator_by_location[location] / denominator
    }

    /// Infectious bites per person over the collected month.
    #[must_use]
    pub fn monthly_eir(&self, location: usize) -> f64 {
        let person_days = self.monthly_person_days_by_location[location];
        if person_days == 0 {
            return 0.0;
        }
        self.monthly_infectious_bites_by_location[location] as f64 * 30.0 / person_days as f64
    }

    /// Clear monthly counters after the reporters consumed them.
    pub fn monthly_reset(&mut self) {
        self.monthly_treatments_by_location.fill(0);
        self.monthly_treatment_failures_by_location.fill(0);
        self.monthly_clinical_episodes_by_location.fill(0);
        for row in &mut self.monthly_clinical_episodes_by_location_age_class {
            row.fill(0);
        }
        self.monthly_mutation_events = 0;
        self.monthly_infectious_bites_by_location.fill(0);
        self.monthly_person_days_by_location.fill(0);
        self.monthly_births_by_location.fill(0);
        self.monthly_deaths_by_location.fill(0);
        self.monthly_malaria_deaths_by_location.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tf_window_ratio() {
        let mut mdc = ModelDataCollector::new(1, 2, 2, 0);
        for day in 0..10 {
            mdc.begin_time_step();
            mdc.record_1_treatment(day, 0, 1);
            if day % 2 == 0 {
                mdc.record_1_treatment_failure(day, 0, 1);
            }
            mdc.end_of_time_step(day);
        }
        assert!((mdc.current_tf_by_therapy(1) - 0.5).abs() < 1e-9);
        assert_eq!(mdc.current_tf_by_therapy(0), 0.0);
    }

    #[test]
    fn test_tf_window_forgets_old_days() {
        let mut mdc = ModelDataCollector::new(1, 2, 1, 0);
        mdc.begin_time_step();
        mdc.record_1_treatment(0, 0, 0);
        mdc.record_1_treatment_failure(0, 0, 0);
        mdc.end_of_time_step(0);
        // 60 empty days later the failure has rolled out of the window.
        for day in 1..=60 {
            mdc.begin_time_step();
            mdc.end_of_time_step(day);
        }
        assert_eq!(mdc.current_tf_by_therapy(0), 0.0);
    }

    #[test]
    fn test_collection_gated_by_start_day() {
        let mut mdc = ModelDataCollector::new(1, 2, 1, 100);
        mdc.begin_time_step();
        mdc.record_1_treatment(5, 0, 0);
        assert_eq!(mdc.cumulative_treatments_by_location[0], 0);
        mdc.record_1_treatment(100, 0, 0);
        assert_eq!(mdc.cumulative_treatments_by_location[0], 1);
    }

    #[test]
    fn test_prevalence_snapshot() {
        let mut mdc = ModelDataCollector::new(2, 2, 1, 0);
        mdc.begin_monthly_snapshot(3);
        mdc.record_blood_slide(0, 0, true);
        mdc.record_blood_slide(0, 1, false);
        mdc.record_blood_slide(1, 0, false);
        mdc.record_genotype_carrier(2);
        assert!((mdc.blood_slide_prevalence(0) - 0.5).abs() < 1e-9);
        assert_eq!(mdc.blood_slide_prevalence(1), 0.0);
        assert_eq!(mdc.genotype_carriers, vec![0, 0, 1]);
    }

    #[test]
    fn test_monthly_reset_keeps_cumulative() {
        let mut mdc = ModelDataCollector::new(1, 2, 1, 0);
        mdc.begin_time_step();
        mdc.record_1_treatment(0, 0, 0);
        mdc.record_1_clinical_episode(0, 0, 1);
        mdc.end_of_time_step(0);
        mdc.monthly_reset();
        assert_eq!(mdc.monthly_treatments_by_location[0], 0);
        assert_eq!(mdc.cumulative_treatments_by_location[0], 1);
        assert_eq!(mdc.cumulative_clinical_episodes_by_location[0], 1);
    }
}
