use std::{
    io::{BufWriter, Write},
    path::PathBuf,
    thread::scope,
};

use clap::{AppSettings, Parser};
use crossbeam_channel::bounded;
use hifitime::Epoch;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use itertools::Itertools;
use log::{debug, info};

use uvplan::{
    config::{parse_date, ObservationConfig},
    diagnostics::Diagnostics,
    error::ConfigError,
    observability::{ObservabilityService, StarData},
    ranges::total_length,
    time::{AlmanacEvent, EventKind, TimeConverter, TimeRef},
    uv::{UVCoverage, UVCoverageInput, UVCoverageService},
    CancelToken, UvPlanError,
};

#[derive(Parser)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_long_args = true)]
struct Args {
    /// The observation description (TOML).
    config: PathBuf,

    /// The night to plan, as YYYY-MM-DD. Overrides the date in the config.
    #[clap(short, long)]
    date: Option<String>,

    /// Report sample dates on a local sidereal clock rather than UTC.
    #[clap(long)]
    lst: bool,

    /// Don't compute the rise-to-set uv tracks.
    #[clap(long)]
    no_support: bool,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    verbosity: u8,

    /// Disable progress bars.
    #[clap(long)]
    no_progress_bars: bool,
}

fn main() {
    let args = Args::parse();
    setup_logging(args.verbosity);

    if let Err(e) = try_main(args) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn try_main(args: Args) -> Result<(), UvPlanError> {
    let config = ObservationConfig::load(&args.config)?;
    let (year, month, day) = match args.date.as_deref() {
        Some(date) => parse_date(date)?,
        None => config.date.ok_or(ConfigError::MissingDate)?,
    };
    let time_ref = if args.lst {
        TimeRef::Lst
    } else {
        config.time_ref
    };

    let time = TimeConverter::define_date(config.site.clone(), year, month, day)?;
    info!(
        "Night of {year:04}-{month:02}-{day:02} at {}: {} stations, {} baselines, {} targets",
        config.site.name,
        config.stations.len(),
        config.baselines.len(),
        config.targets.len()
    );
    debug!(
        "Local midnight JD {:.6}, LST0 JD {:.6}",
        time.jd_midnight(),
        time.jd_lst0()
    );

    let observability = ObservabilityService::new(&time, config.constraints)?;
    for event in tonight(&time, &observability.almanac().sun) {
        info!("{:<24} {}", event_name(event), format_date(&time, event.jd, TimeRef::Utc));
    }

    let token = CancelToken::new();
    let (tx, rx) = bounded(5);
    let progress = ProgressBar::with_draw_target(
        Some(config.targets.len() as _),
        if args.no_progress_bars {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stdout()
        },
    )
    .with_style(
        ProgressStyle::default_bar()
            .template("{msg:17}: [{wide_bar:.blue}] {pos:2}/{len:2} targets ({elapsed_precise}<{eta_precise})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    )
    .with_position(0)
    .with_message("Computing");
    progress.tick();

    let (producer_result, consumer_result) = scope(|s| {
        let producer = s.spawn(|| {
            // Moving the sender in closes the channel when the producer is
            // done.
            let tx = tx;
            for target in config.targets.iter() {
                if token.is_cancelled() {
                    break;
                }
                let (star, diagnostics) = match observability.star_data(target) {
                    Ok(r) => r,
                    Err(e) => {
                        token.cancel();
                        return Err(UvPlanError::from(e));
                    }
                };
                let service = match UVCoverageService::prepare(UVCoverageInput {
                    time: &time,
                    star: &star,
                    baselines: &config.baselines,
                    spectral_mode: config.spectral_mode.as_ref(),
                    sampling_period_s: config.sampling_period_s,
                    acquisition_time_s: config.acquisition_time_s,
                    uv_max_m: config.uv_max_m,
                    time_ref,
                    compute_support: config.compute_support && !args.no_support,
                }) {
                    Ok(s) => s,
                    Err(e) => {
                        token.cancel();
                        return Err(UvPlanError::from(e));
                    }
                };
                let coverage = match service.compute(None, &token) {
                    Some(c) => c,
                    None => break,
                };
                progress.inc(1);
                if tx.send((star, diagnostics, coverage)).is_err() {
                    break;
                }
            }
            Ok(())
        });

        let consumer = s.spawn(|| {
            let stdout = std::io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            for (star, diagnostics, coverage) in rx.iter() {
                if let Err(e) = report(&mut out, &time, &star, &diagnostics, &coverage) {
                    token.cancel();
                    return Err(e);
                }
            }
            out.flush()
        });

        let producer_result = match producer.join() {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        };
        let consumer_result = match consumer.join() {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        };
        (producer_result, consumer_result)
    });
    progress.abandon_with_message("Finished");

    producer_result?;
    consumer_result?;
    Ok(())
}

/// Sun events of the night around local midnight.
fn tonight<'a>(
    time: &'a TimeConverter,
    events: &'a [AlmanacEvent],
) -> impl Iterator<Item = &'a AlmanacEvent> {
    let midnight = time.jd_midnight();
    events
        .iter()
        .filter(move |e| (e.jd - midnight).abs() <= 0.5)
}

fn event_name(event: &AlmanacEvent) -> String {
    match event.kind {
        EventKind::SunSet(twilight) => format!("Sun set ({twilight:?})"),
        EventKind::SunRise(twilight) => format!("Sun rise ({twilight:?})"),
        EventKind::MoonRise => "Moon rise".to_string(),
        EventKind::MoonSet => "Moon set".to_string(),
    }
}

fn format_date(time: &TimeConverter, jd: f64, time_ref: TimeRef) -> String {
    format_epoch(time.calendar_date(jd, time_ref), time_ref)
}

fn format_epoch(epoch: Epoch, time_ref: TimeRef) -> String {
    let (y, m, d, hh, mm, ss, ns) = epoch.to_gregorian_utc();
    let clock = match time_ref {
        TimeRef::Utc => "UTC",
        TimeRef::Lst => "LST",
    };
    format!(
        "{y:04}-{m:02}-{d:02} {hh:02}:{mm:02}:{ss:02}.{:03} {clock}",
        ns / 1_000_000
    )
}

fn report<W: Write>(
    out: &mut W,
    time: &TimeConverter,
    star: &StarData,
    diagnostics: &Diagnostics,
    coverage: &UVCoverage,
) -> std::io::Result<()> {
    writeln!(
        out,
        "{}: RA {:.4} h, dec {:+.4} deg (precessed)",
        star.name, star.precessed_ra, star.precessed_dec
    )?;
    writeln!(
        out,
        "  transit:          {}",
        format_date(time, star.transit_jd, coverage.time_ref)
    )?;
    match &star.observable_ha {
        Some(ranges) => writeln!(
            out,
            "  observable HA:    {} ({:.2} h)",
            ranges
                .iter()
                .map(|r| format!("[{:+.3}, {:+.3}]", r.min, r.max))
                .join(" "),
            total_length(ranges)
        )?,
        None => writeln!(out, "  observable HA:    none")?,
    }
    writeln!(out, "  moon illumination: {:.2}", star.max_moon_illum)?;
    writeln!(
        out,
        "  {} samples on {} baselines; uv max {:.1} m, {:.4e} rad^-1 in {} ({:.3} um)",
        coverage.num_samples(),
        coverage.baselines.len(),
        coverage.uv_max_m,
        coverage.uv_max,
        coverage.spectral_mode.name,
        coverage.spectral_mode.wavelength_central * 1e6
    )?;
    if let (Some(first), Some(last)) = (coverage.dates.first(), coverage.dates.last()) {
        writeln!(
            out,
            "  first sample:     {}",
            format_epoch(*first, coverage.time_ref)
        )?;
        writeln!(
            out,
            "  last sample:      {}",
            format_epoch(*last, coverage.time_ref)
        )?;
    }
    for d in diagnostics.iter().chain(coverage.diagnostics().iter()) {
        writeln!(out, "  {d}")?;
    }
    Ok(())
}

fn setup_logging(verbosity: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        2 => builder.filter_level(log::LevelFilter::Trace),
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
            builder.format(|buf, record| {
                let timestamp = buf.timestamp();
                let level = record.level();
                let target = record.target();
                let line = record.line().unwrap_or(0);
                let message = record.args();

                writeln!(buf, "[{timestamp} {level} {target}:{line}] {message}")
            })
        }
    };
    builder.init();
}
