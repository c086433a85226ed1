//! Person-level events: aging, within-host progression, treatment and travel.

use crate::model::error::Result;
use crate::model::events::EventContext;
use crate::model::parasite::ParasiteUpdateFn;
use crate::model::person::{HostState, Person};
use crate::model::therapy::Therapy;
use crate::model::time;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonEventKind {
    Birthday,
    SwitchImmuneComponent,
    MoveParasiteToBlood {
        genotype_id: usize,
    },
    MatureGametocyte {
        parasite_id: u32,
    },
    ProgressToClinical {
        parasite_id: u32,
    },
    EndClinical {
        parasite_id: u32,
    },
    EndClinicalByNoTreatment {
        parasite_id: u32,
    },
    TestTreatmentFailure {
        parasite_id: u32,
        therapy_id: usize,
    },
    /// A later component of a multi-course regimen.
    ReceiveTherapy {
        therapy_id: usize,
        parasite_id: Option<u32>,
    },
    ReceiveMdaTherapy {
        therapy_id: usize,
    },
    UpdateWhenDrugIsPresent {
        parasite_id: Option<u32>,
    },
    UpdateEveryKDays,
    CirculateToTargetLocation {
        target_location: usize,
    },
    ReturnToResidence,
    ReportTreatmentFailureDeath {
        therapy_id: usize,
    },
}

impl PersonEventKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            PersonEventKind::Birthday => "BirthdayEvent",
            PersonEventKind::SwitchImmuneComponent => "SwitchImmuneComponentEvent",
            PersonEventKind::MoveParasiteToBlood { .. } => "MoveParasiteToBloodEvent",
            PersonEventKind::MatureGametocyte { .. } => "MatureGametocyteEvent",
            PersonEventKind::ProgressToClinical { .. } => "ProgressToClinicalEvent",
            PersonEventKind::EndClinical { .. } => "EndClinicalEvent",
            PersonEventKind::EndClinicalByNoTreatment { .. } => "EndClinicalByNoTreatmentEvent",
            PersonEventKind::TestTreatmentFailure { .. } => "TestTreatmentFailureEvent",
            PersonEventKind::ReceiveTherapy { .. } => "ReceiveTherapyEvent",
            PersonEventKind::ReceiveMdaTherapy { .. } => "ReceiveMdaTherapyEvent",
            PersonEventKind::UpdateWhenDrugIsPresent { .. } => "UpdateWhenDrugIsPresentEvent",
            PersonEventKind::UpdateEveryKDays => "UpdateEveryKDaysEvent",
            PersonEventKind::CirculateToTargetLocation { .. } => {
                "CirculateToTargetLocationNextDayEvent"
            }
            PersonEventKind::ReturnToResidence => "ReturnToResidenceEvent",
            PersonEventKind::ReportTreatmentFailureDeath { .. } => {
                "ReportTreatmentFailureDeathEvent"
            }
        }
    }
}

pub fn execute_person_event(
    kind: PersonEventKind,
    person: &mut Person,
    ctx: &mut EventContext,
) -> Result<()> {
    if person.host_state == HostState::Dead {
        return Ok(());
    }
    match kind {
        PersonEventKind::Birthday => execute_birthday(person, ctx),
        PersonEventKind::SwitchImmuneComponent => {
            person.immune_system.switch_to_non_infant();
            Ok(())
        }
        PersonEventKind::MoveParasiteToBlood { genotype_id } => {
            execute_move_parasite_to_blood(person, genotype_id, ctx)
        }
        PersonEventKind::MatureGametocyte { parasite_id } => {
            person.update(ctx.current_time, ctx.config, ctx.genotype_db);
            if let Some(parasite) = person.parasites.get_mut(parasite_id) {
                parasite.gametocyte_level = 1.0;
            }
            Ok(())
        }
        PersonEventKind::ProgressToClinical { parasite_id } => {
            execute_progress_to_clinical(person, parasite_id, ctx)
        }
        PersonEventKind::EndClinical { parasite_id } => execute_end_clinical(person, parasite_id, ctx),
        PersonEventKind::EndClinicalByNoTreatment { parasite_id } => {
            execute_end_clinical_by_no_treatment(person, parasite_id, ctx)
        }
        PersonEventKind::TestTreatmentFailure {
            parasite_id,
            therapy_id,
        } => {
            person.update(ctx.current_time, ctx.config, ctx.genotype_db);
            let levels = &ctx.config.parasite_parameters.parasite_density_levels;
            let still_detectable = person
                .parasites
                .get(parasite_id)
                .is_some_and(|p| p.is_detectable(levels));
            if still_detectable {
                ctx.mdc
                    .record_1_treatment_failure(ctx.current_time, person.location, therapy_id);
            }
            Ok(())
        }
        PersonEventKind::ReceiveTherapy {
            therapy_id,
            parasite_id,
        } => {
            person.update(ctx.current_time, ctx.config, ctx.genotype_db);
            receive_therapy(person, therapy_id, parasite_id, true, ctx)?;
            schedule_update_by_drug_event(person, parasite_id, ctx);
            Ok(())
        }
        PersonEventKind::ReceiveMdaTherapy { therapy_id } => {
            person.update(ctx.current_time, ctx.config, ctx.genotype_db);
            receive_therapy(person, therapy_id, None, false, ctx)?;
            ctx.mdc
                .record_1_treatment(ctx.current_time, person.location, therapy_id);
            schedule_update_by_drug_event(person, None, ctx);
            Ok(())
        }
        PersonEventKind::UpdateWhenDrugIsPresent { parasite_id } => {
            person.update(ctx.current_time, ctx.config, ctx.genotype_db);
            if person.drugs_in_blood.is_empty() {
                // Drugs cleared; the caused clone falls back to immune
                // clearance.
                if let Some(id) = parasite_id {
                    if let Some(parasite) = person.parasites.get_mut(id) {
                        if parasite.update_fn == ParasiteUpdateFn::DrugEffect {
                            parasite.update_fn = ParasiteUpdateFn::ImmunityClearance;
                        }
                    }
                }
            } else {
                person.schedule_event(
                    ctx.current_time + 1,
                    PersonEventKind::UpdateWhenDrugIsPresent { parasite_id },
                    ctx.current_time,
                    ctx.end_time,
                );
            }
            Ok(())
        }
        PersonEventKind::UpdateEveryKDays => {
            person.update(ctx.current_time, ctx.config, ctx.genotype_db);
            let k = ctx.config.epidemiological_parameters.update_frequency;
            person.schedule_event(
                ctx.current_time + k,
                PersonEventKind::UpdateEveryKDays,
                ctx.current_time,
                ctx.end_time,
            );
            Ok(())
        }
        PersonEventKind::CirculateToTargetLocation { target_location } => {
            person.location = target_location;
            if !person.has_return_to_residence_event() {
                let settings = &ctx.config.movement_settings;
                let stay = ctx
                    .random
                    .random_gamma(settings.length_of_stay_shape, settings.length_of_stay_scale)
                    .round() as i32;
                let stay = stay.clamp(1, settings.max_length_of_stay);
                person.schedule_event(
                    ctx.current_time + stay,
                    PersonEventKind::ReturnToResidence,
                    ctx.current_time,
                    ctx.end_time,
                );
            }
            Ok(())
        }
        PersonEventKind::ReturnToResidence => {
            person.location = person.residence_location;
            Ok(())
        }
        PersonEventKind::ReportTreatmentFailureDeath { therapy_id } => {
            ctx.mdc
                .record_1_treatment_failure(ctx.current_time, person.location, therapy_id);
            ctx.mdc.record_1_malaria_death(person.location);
            ctx.mdc.record_1_death(person.location);
            person.die();
            Ok(())
        }
    }
}

fn execute_birthday(person: &mut Person, ctx: &mut EventContext) -> Result<()> {
    person.increase_age_by_one_year(ctx.config);
    person.update_relative_biting_rate(ctx.current_time, ctx.config);
    let next = ctx.current_time + time::days_to_next_year(ctx.calendar_date);
    person.schedule_event(
        next,
        PersonEventKind::Birthday,
        ctx.current_time,
        ctx.end_time,
    );
    Ok(())
}

fn execute_move_parasite_to_blood(
    person: &mut Person,
    genotype_id: usize,
    ctx: &mut EventContext,
) -> Result<()> {
    person.update(ctx.current_time, ctx.config, ctx.genotype_db);
    let levels = &ctx.config.parasite_parameters.parasite_density_levels;
    let parasite_id = person
        .parasites
        .add(genotype_id, levels.log_parasite_density_from_liver);
    person.liver_parasite_genotype = None;

    if matches!(
        person.host_state,
        HostState::Susceptible | HostState::Exposed
    ) {
        person.host_state = HostState::Asymptomatic;
    }
    person.immune_system.increase = true;

    let epi = &ctx.config.epidemiological_parameters;
    let gametocyte_delay = if person.is_under_five() {
        epi.days_mature_gametocyte_under_five
    } else {
        epi.days_mature_gametocyte_over_five
    };
    person.schedule_event(
        ctx.current_time + gametocyte_delay,
        PersonEventKind::MatureGametocyte { parasite_id },
        ctx.current_time,
        ctx.end_time,
    );

    let p = ctx.random.random_flat(0.0, 1.0);
    if p <= person.clinical_progression_probability(ctx.config) {
        if let Some(parasite) = person.parasites.get_mut(parasite_id) {
            parasite.update_fn = ParasiteUpdateFn::Progress;
        }
        let days_to_clinical = if person.is_under_five() {
            epi.days_to_clinical_under_five
        } else {
            epi.days_to_clinical_over_five
        };
        person.schedule_event(
            ctx.current_time + days_to_clinical,
            PersonEventKind::ProgressToClinical { parasite_id },
            ctx.current_time,
            ctx.end_time,
        );
    } else if let Some(parasite) = person.parasites.get_mut(parasite_id) {
        parasite.update_fn = ParasiteUpdateFn::ImmunityClearance;
    }
    Ok(())
}

fn execute_progress_to_clinical(
    person: &mut Person,
    parasite_id: u32,
    ctx: &mut EventContext,
) -> Result<()> {
    person.update(ctx.current_time, ctx.config, ctx.genotype_db);
    if !person.parasites.contains(parasite_id) {
        // The clone cleared before symptoms developed.
        return Ok(());
    }
    if person.host_state == HostState::Clinical {
        // Already clinical from another clone; this episode is absorbed.
        return Ok(());
    }

    let levels = &ctx.config.parasite_parameters.parasite_density_levels;
    if let Some(parasite) = person.parasites.get_mut(parasite_id) {
        parasite.last_update_log10_parasite_density = levels.log_parasite_density_clinical;
    }
    person.host_state = HostState::Clinical;
    person.immune_system.increase = true;
    person.cancel_all_other_progress_to_clinical_events(parasite_id);
    ctx.mdc
        .record_1_clinical_episode(ctx.current_time, person.location, person.age_class);

    let p_treatment = ctx
        .coverage
        .p_treatment(person.location, person.is_under_five());
    if ctx.random.random_flat(0.0, 1.0) <= p_treatment {
        apply_therapy(person, parasite_id, ctx)
    } else {
        handle_no_treatment(person, parasite_id, ctx)
    }
}

fn apply_therapy(person: &mut Person, parasite_id: u32, ctx: &mut EventContext) -> Result<()> {
    let therapy_id = ctx
        .strategies
        .get_therapy(person.location, ctx.admin, ctx.random)?;
    receive_therapy(person, therapy_id, Some(parasite_id), false, ctx)?;
    ctx.mdc
        .record_1_treatment(ctx.current_time, person.location, therapy_id);
    schedule_update_by_drug_event(person, Some(parasite_id), ctx);

    let epi = &ctx.config.epidemiological_parameters;
    person.schedule_event(
        ctx.current_time + epi.tf_testing_day,
        PersonEventKind::TestTreatmentFailure {
            parasite_id,
            therapy_id,
        },
        ctx.current_time,
        ctx.end_time,
    );
    schedule_end_clinical(person, parasite_id, ctx);

    if person.will_progress_to_death_when_receive_treatment(ctx.random, ctx.config) {
        person.schedule_event(
            ctx.current_time + epi.tf_testing_day,
            PersonEventKind::ReportTreatmentFailureDeath { therapy_id },
            ctx.current_time,
            ctx.end_time,
        );
    }
    Ok(())
}

fn handle_no_treatment(person: &mut Person, parasite_id: u32, ctx: &mut EventContext) -> Result<()> {
    if person.will_progress_to_death_when_receive_no_treatment(ctx.random, ctx.config) {
        ctx.mdc.record_1_malaria_death(person.location);
        ctx.mdc.record_1_death(person.location);
        person.die();
        return Ok(());
    }
    let end = clinical_duration(ctx);
    person.schedule_event(
        ctx.current_time + end,
        PersonEventKind::EndClinicalByNoTreatment { parasite_id },
        ctx.current_time,
        ctx.end_time,
    );
    Ok(())
}

/// Clinical episodes last 5 to 14 days, normal(7, 2) clamped.
fn clinical_duration(ctx: &mut EventContext) -> i32 {
    (ctx.random.random_normal(7.0, 2.0).round() as i32).clamp(5, 14)
}

fn schedule_end_clinical(person: &mut Person, parasite_id: u32, ctx: &mut EventContext) {
    let end = clinical_duration(ctx);
    person.schedule_event(
        ctx.current_time + end,
        PersonEventKind::EndClinical { parasite_id },
        ctx.current_time,
        ctx.end_time,
    );
}

fn schedule_update_by_drug_event(
    person: &mut Person,
    parasite_id: Option<u32>,
    ctx: &mut EventContext,
) {
    if !person
        .events
        .has_where(|k| matches!(k, PersonEventKind::UpdateWhenDrugIsPresent { .. }))
    {
        person.schedule_event(
            ctx.current_time + 1,
            PersonEventKind::UpdateWhenDrugIsPresent { parasite_id },
            ctx.current_time,
            ctx.end_time,
        );
    }
}

fn execute_end_clinical(person: &mut Person, _parasite_id: u32, ctx: &mut EventContext) -> Result<()> {
    person.update(ctx.current_time, ctx.config, ctx.genotype_db);
    if person.host_state != HostState::Clinical {
        return Ok(());
    }
    if person.parasites.is_empty() {
        person.change_state_when_no_parasite_in_blood();
    } else {
        person.host_state = HostState::Asymptomatic;
    }
    Ok(())
}

fn execute_end_clinical_by_no_treatment(
    person: &mut Person,
    parasite_id: u32,
    ctx: &mut EventContext,
) -> Result<()> {
    person.update(ctx.current_time, ctx.config, ctx.genotype_db);
    determine_relapse_or_not(person, parasite_id, ctx);
    if person.parasites.is_empty() {
        person.change_state_when_no_parasite_in_blood();
    } else if person.host_state == HostState::Clinical {
        person.host_state = HostState::Asymptomatic;
    }
    Ok(())
}

/// An untreated episode either relapses back toward clinical or hands the
/// clone to immune clearance.
fn determine_relapse_or_not(person: &mut Person, parasite_id: u32, ctx: &mut EventContext) {
    if !person.parasites.contains(parasite_id) {
        return;
    }
    let epi = &ctx.config.epidemiological_parameters;
    let levels = &ctx.config.parasite_parameters.parasite_density_levels;
    let p = ctx.random.random_flat(0.0, 1.0);
    if p <= epi.p_relapse {
        if let Some(parasite) = person.parasites.get_mut(parasite_id) {
            parasite.update_fn = ParasiteUpdateFn::Progress;
            parasite.last_update_log10_parasite_density = levels.log_parasite_density_asymptomatic;
        }
        let duration = ctx
            .random
            .random_normal(f64::from(epi.relapse_duration), 15.0)
            .round() as i32;
        let duration = duration.clamp(epi.relapse_duration - 15, epi.relapse_duration + 15);
        person.schedule_event(
            ctx.current_time + duration.max(1),
            PersonEventKind::ProgressToClinical { parasite_id },
            ctx.current_time,
            ctx.end_time,
        );
    } else if let Some(parasite) = person.parasites.get_mut(parasite_id) {
        if parasite.last_update_log10_parasite_density > levels.log_parasite_density_asymptomatic {
            parasite.last_update_log10_parasite_density = levels.log_parasite_density_asymptomatic;
        }
        parasite.update_fn = ParasiteUpdateFn::ImmunityClearance;
    }
}

/// Hand the person every drug of a therapy; multi-course regimens recurse via
/// scheduled `ReceiveTherapy` components.
pub fn receive_therapy(
    person: &mut Person,
    therapy_id: usize,
    clinical_caused_parasite: Option<u32>,
    is_part_of_mac_therapy: bool,
    ctx: &mut EventContext,
) -> Result<()> {
    let therapy = &ctx.config.therapy_parameters.therapy_db[therapy_id];
    match therapy {
        Therapy::SingleCourse {
            drug_ids,
            dosing_days,
            pr_completed_days,
        } => {
            let dosing_days = if pr_completed_days.is_some() {
                therapy.complied_dosing_days(ctx.random)?
            } else {
                complied_fixed_dosing_days(*dosing_days, ctx)
            };
            for drug_id in drug_ids.clone() {
                person.add_drug_to_blood(
                    drug_id,
                    dosing_days,
                    is_part_of_mac_therapy,
                    ctx.current_time,
                    ctx.config,
                    ctx.random,
                );
            }
        }
        Therapy::MultiCourse {
            therapy_ids,
            start_at_days,
        } => {
            person.starting_drug_values_for_mac.clear();
            for (component, start_day) in therapy_ids.clone().into_iter().zip(start_at_days.clone())
            {
                if start_day == 1 {
                    receive_therapy(person, component, clinical_caused_parasite, true, ctx)?;
                } else {
                    person.schedule_event(
                        ctx.current_time + start_day - 1,
                        PersonEventKind::ReceiveTherapy {
                            therapy_id: component,
                            parasite_id: clinical_caused_parasite,
                        },
                        ctx.current_time,
                        ctx.end_time,
                    );
                }
            }
        }
    }
    person.last_therapy_id = Some(therapy_id);
    Ok(())
}

/// Fixed-dosing compliance draw: non-compliers stop between the minimum and
/// the prescribed day.
fn complied_fixed_dosing_days(dosing_days: i32, ctx: &mut EventContext) -> i32 {
    let epi = &ctx.config.epidemiological_parameters;
    if epi.p_compliance >= 1.0 {
        return dosing_days;
    }
    let p = ctx.random.random_flat(0.0, 1.0);
    if p <= epi.p_compliance {
        return dosing_days;
    }
    let a = f64::from(epi.min_dosing_days - dosing_days) / (1.0 - epi.p_compliance);
    (a * p + f64::from(epi.min_dosing_days) - a).ceil() as i32
}
