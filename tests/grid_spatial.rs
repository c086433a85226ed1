//! Grid-based spatial initialisation from ASC rasters.

mod common;

use std::io::Write;
use std::path::Path;

use malsim_lib::model::config::{GridBasedSettings, SpatialSettings};
use malsim_lib::{Config, Simulation};

fn write_raster(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    write!(
        file,
        "ncols 3\nnrows 2\nxllcorner 100.0\nyllcorner 10.0\ncellsize 0.05\nNODATA_value -9999\n{body}"
    )
    .unwrap();
    path.to_string_lossy().into_owned()
}

fn grid_config(dir: &Path) -> Config {
    let population = write_raster(dir, "population.asc", "100 200 -9999\n300 -9999 400\n");
    let beta = write_raster(dir, "beta.asc", "0.1 0.2 -9999\n0.3 -9999 0.4\n");
    let under_5 = write_raster(dir, "under5.asc", "0.6 0.6 -9999\n0.6 -9999 0.6\n");
    let over_5 = write_raster(dir, "over5.asc", "0.5 0.5 -9999\n0.5 -9999 0.5\n");
    let district = write_raster(dir, "district.asc", "1 1 -9999\n2 -9999 2\n");

    let mut config = Config::default();
    config.genotype_parameters.pf_genotype_info = common::two_locus_schema();
    config.genotype_parameters.mutation_mask = "11".to_string();
    config.spatial_settings = SpatialSettings::GridBased(GridBasedSettings {
        cell_size_km: 5.0,
        population_raster: population,
        beta_raster: beta,
        p_treatment_under_5_raster: under_5,
        p_treatment_over_5_raster: over_5,
        district_raster: Some(district),
        travel_raster: None,
        ecoclimatic_raster: None,
    });
    config
}

#[test]
fn test_grid_mode_builds_locations_from_rasters() {
    let dir = tempfile::tempdir().unwrap();
    let sim = Simulation::new(grid_config(dir.path())).unwrap();

    // Four data cells survive the NODATA mask.
    assert_eq!(sim.locations.len(), 4);
    assert_eq!(sim.population.len(), 100 + 200 + 300 + 400);
    assert!((sim.locations[0].beta - 0.1).abs() < 1e-9);
    assert!((sim.locations[3].beta - 0.4).abs() < 1e-9);
    assert_eq!(sim.locations[3].row, 1);
    assert_eq!(sim.locations[3].col, 2);

    let district = sim.admin.district().expect("district level configured");
    assert_eq!(district.unit_count(), 2);
    assert_eq!(district.unit_of(0), 1);
    assert_eq!(district.unit_of(3), 2);
    assert_eq!(district.locations_in(1), &[0, 1]);
}

#[test]
fn test_mismatched_nodata_mask_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = grid_config(dir.path());
    // A beta raster whose mask disagrees with the population raster.
    let bad_beta = write_raster(dir.path(), "bad_beta.asc", "0.1 0.2 0.9\n0.3 -9999 0.4\n");
    if let SpatialSettings::GridBased(s) = &mut config.spatial_settings {
        s.beta_raster = bad_beta;
    }
    let result = Simulation::new(config);
    assert!(matches!(
        result,
        Err(malsim_lib::SimError::Raster(_))
    ));
}

#[test]
fn test_missing_raster_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = grid_config(dir.path());
    if let SpatialSettings::GridBased(s) = &mut config.spatial_settings {
        s.population_raster = dir.path().join("nope.asc").to_string_lossy().into_owned();
    }
    assert!(Simulation::new(config).is_err());
}
