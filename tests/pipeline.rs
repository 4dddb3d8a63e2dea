//! Plan a whole night from a config file, as the binary does.

use std::path::PathBuf;

use approx::assert_abs_diff_eq;

use uvplan::{
    config::ObservationConfig,
    observability::{ObservabilityService, StarData},
    ranges::find,
    time::{TimeConverter, TimeRef},
    uv::{compute_uv_points, UVCoverage, UVCoverageInput, UVCoverageService, HA_EPSILON},
    CancelToken,
};

fn demo_config() -> ObservationConfig {
    let file = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/vlti_uts.toml");
    ObservationConfig::load(&file).unwrap()
}

fn plan(
    config: &ObservationConfig,
    time_ref: TimeRef,
    token: &CancelToken,
) -> (TimeConverter, Vec<(StarData, Option<UVCoverage>)>) {
    let (year, month, day) = config.date.unwrap();
    let time = TimeConverter::define_date(config.site.clone(), year, month, day).unwrap();
    let observability = ObservabilityService::new(&time, config.constraints).unwrap();
    let results = config
        .targets
        .iter()
        .map(|target| {
            let (star, _) = observability.star_data(target).unwrap();
            let service = UVCoverageService::prepare(UVCoverageInput {
                time: &time,
                star: &star,
                baselines: &config.baselines,
                spectral_mode: config.spectral_mode.as_ref(),
                sampling_period_s: config.sampling_period_s,
                acquisition_time_s: config.acquisition_time_s,
                uv_max_m: config.uv_max_m,
                time_ref,
                compute_support: config.compute_support,
            })
            .unwrap();
            let coverage = service.compute(None, token);
            (star, coverage)
        })
        .collect();
    (time, results)
}

#[test]
fn test_samples_are_observable_and_at_night() {
    let config = demo_config();
    let (time, results) = plan(&config, TimeRef::Utc, &CancelToken::new());
    assert_eq!(results.len(), 3);

    let acquisition = config.acquisition_time_s / 3600.0;
    let mut total_samples = 0;
    for (star, coverage) in &results {
        let coverage = coverage.as_ref().unwrap();
        assert_eq!(coverage.uv_m.dim(), (6, coverage.num_samples()));
        total_samples += coverage.num_samples();
        if coverage.num_samples() == 0 {
            assert!(coverage.diagnostics().warnings().count() > 0);
            continue;
        }

        let ranges = star.observable_ha.as_ref().unwrap();
        for (&ha, date) in coverage.ha.iter().zip(&coverage.dates) {
            let window = find(ranges, ha, HA_EPSILON).unwrap();
            assert_eq!(find(ranges, ha + acquisition, HA_EPSILON), Some(window));

            let jd = time.convert_ha_to_jd(ha, star.precessed_ra);
            assert!(star.night_jd.iter().any(|n| n.contains(jd, 1e-4)));
            assert_abs_diff_eq!(date.to_jde_utc_days(), jd, epsilon = 1e-7);
        }
        assert!(coverage.dates.windows(2).all(|w| w[0] < w[1]));
    }
    assert!(total_samples > 0);

    // eta Car transits near local midnight in March.
    let (eta_car, coverage) = &results[1];
    assert_eq!(eta_car.name, "eta Car");
    assert!(coverage.as_ref().unwrap().num_samples() > 20);
}

#[test]
fn test_lst_dates_follow_local_sidereal_time() {
    let config = demo_config();
    let (time, results) = plan(&config, TimeRef::Lst, &CancelToken::new());
    for (star, coverage) in &results {
        let coverage = coverage.as_ref().unwrap();
        for (&ha, date) in coverage.ha.iter().zip(&coverage.dates) {
            let (_, _, _, hh, mm, ss, ns) = date.to_gregorian_utc();
            let clock =
                f64::from(hh) + f64::from(mm) / 60.0 + (f64::from(ss) + f64::from(ns) * 1e-9) / 3600.0;
            let lst = time.lst_hours(time.convert_ha_to_jd(ha, star.precessed_ra));
            let diff = (clock - lst + 12.0).rem_euclid(24.0) - 12.0;
            assert!(diff.abs() < 1e-3, "{}: HA {ha} clock {clock} LST {lst}", star.name);
        }
    }
}

#[test]
fn test_cancelled_plan_has_no_coverage() {
    let config = demo_config();
    let token = CancelToken::new();
    token.cancel();
    let (_, results) = plan(&config, TimeRef::Utc, &token);
    assert!(results.iter().all(|(_, coverage)| coverage.is_none()));
}

#[test]
fn test_snapshot_matches_coverage() {
    let config = demo_config();
    let (_, results) = plan(&config, TimeRef::Utc, &CancelToken::new());
    let (star, coverage) = &results[1];
    let coverage = coverage.as_ref().unwrap();
    let i_ha = coverage.num_samples() / 2;
    let points = compute_uv_points(coverage.ha[i_ha], star, &config.baselines).unwrap();
    for (i_bl, point) in points.iter().enumerate() {
        let uv = coverage.baseline_uv(i_bl)[i_ha];
        assert_abs_diff_eq!(point.u, uv.u, epsilon = 1e-9);
        assert_abs_diff_eq!(point.v, uv.v, epsilon = 1e-9);
    }
}
