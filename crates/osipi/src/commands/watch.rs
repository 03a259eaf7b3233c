//! `osipi watch`: poll a stream and print a line per change.
//!
//! Change detection is the subscription manager's job: every poll is an
//! ordinary stream read, and the registered callback records which points
//! reported a change. Only those points are printed.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::try_join_all;

use osipi_core::{CoreError, Point, StreamArgs, StreamKind, WebApi};

use super::points::{interpolated_query, plot_query, recorded_query};
use super::util::{self, PointValue};
use crate::cli::{GlobalOpts, OutputFormat, StreamArg, WatchArgs};
use crate::error::CliError;
use crate::output;

type Changed = Arc<Mutex<HashSet<String>>>;

impl From<StreamArg> for StreamKind {
    fn from(arg: StreamArg) -> Self {
        match arg {
            StreamArg::Current => Self::Current,
            StreamArg::End => Self::End,
            StreamArg::Recorded => Self::Recorded,
            StreamArg::RecordedAt => Self::RecordedAtTime,
            StreamArg::Interpolated => Self::Interpolated,
            StreamArg::InterpolatedAt => Self::InterpolatedAtTimes,
            StreamArg::Plot => Self::Plot,
        }
    }
}

/// Callback that records the web id of every point it is fired for.
fn recorder(changed: &Changed) -> impl Fn(&Point) + Send + Sync + 'static {
    let changed = Arc::clone(changed);
    move |point: &Point| {
        changed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(point.web_id().to_owned());
    }
}

/// One read of `stream` for every point.
async fn poll(
    points: &[Arc<Point>],
    stream: StreamKind,
    args: &WatchArgs,
) -> Result<Vec<PointValue>, CliError> {
    let recorded = &recorded_query(&args.window, None);
    let interpolated = &interpolated_query(&args.window, args.interval.as_deref());
    let plot = &plot_query(&args.window, None);

    let reads = points.iter().map(|point| async move {
        let values = match stream {
            StreamKind::Current => vec![point.current(None).await?],
            StreamKind::End => vec![point.end().await?],
            StreamKind::RecordedAtTime => {
                let mut values = Vec::with_capacity(args.at.len());
                for time in &args.at {
                    values.push(point.recorded_at_time(time).await?);
                }
                values
            }
            StreamKind::InterpolatedAtTimes => {
                point.interpolated_at_times(args.at.as_slice()).await?
            }
            StreamKind::Recorded => point.recorded(recorded).await?,
            StreamKind::Interpolated => point.interpolated(interpolated).await?,
            StreamKind::Plot => point.plot(plot).await?,
        };
        Ok::<_, CoreError>(PointValue::many(point, values))
    });

    Ok(try_join_all(reads).await?.into_iter().flatten().collect())
}

fn event_line(record: &PointValue, global: &GlobalOpts, color: bool) -> String {
    match global.output {
        OutputFormat::Table => {
            let v = &record.value;
            let units = v.units_abbreviation().unwrap_or_default();
            format!(
                "{}  {}  {} {}  {}",
                output::paint_dim(&util::format_timestamp(v), color),
                output::paint_name(&record.point, color),
                v.payload(),
                units,
                output::paint_quality(v.good(), color),
            )
        }
        OutputFormat::Plain => util::value_line(record),
        // One JSON document per line for structured formats.
        _ => output::render_json_compact(record),
    }
}

/// Print the latest value of every point the callback fired for.
fn print_changes(
    records: &[PointValue],
    points: &[Arc<Point>],
    fired: &HashSet<String>,
    global: &GlobalOpts,
    color: bool,
) {
    for point in points.iter().filter(|p| fired.contains(p.web_id())) {
        if let Some(latest) = records.iter().rev().find(|r| r.point == point.name()) {
            output::print_output(&event_line(latest, global, color), global.quiet);
        }
    }
}

pub async fn handle(api: &WebApi, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let every = humantime::parse_duration(&args.every).map_err(|e| CliError::Validation {
        field: "every".into(),
        reason: e.to_string(),
    })?;
    let stream = StreamKind::from(args.stream);
    let keyed = matches!(
        stream,
        StreamKind::RecordedAtTime | StreamKind::InterpolatedAtTimes
    );
    if keyed && args.at.is_empty() {
        return Err(CliError::Validation {
            field: "at".into(),
            reason: format!("the {stream} stream needs at least one --at timestamp"),
        });
    }

    let points = util::resolve_points(api, &args.select).await?;
    let color = output::should_color(&global.color);
    let changed = Changed::default();

    let mut registered = 0;
    if keyed {
        for time in &args.at {
            registered += api
                .subscribe(&points, stream, recorder(&changed), StreamArgs::at(time))
                .len();
        }
    } else {
        registered += api
            .subscribe(&points, stream, recorder(&changed), StreamArgs::default())
            .len();
    }
    tracing::info!(%stream, points = points.len(), registered, ?every, "watching");
    if !global.quiet {
        eprintln!(
            "Watching {stream} on {} point(s) every {}. Ctrl-C to stop.",
            points.len(),
            humantime::format_duration(every)
        );
    }

    let mut polls: u32 = 0;
    loop {
        match poll(&points, stream, &args).await {
            Ok(records) => {
                let fired =
                    std::mem::take(&mut *changed.lock().unwrap_or_else(PoisonError::into_inner));
                print_changes(&records, &points, &fired, global, color);
            }
            // A failing first poll means the watch was never going to work.
            Err(err) if polls == 0 => {
                api.unsubscribe(&points, stream);
                return Err(err);
            }
            Err(err) => tracing::warn!(error = %err, "poll failed; retrying"),
        }

        polls += 1;
        if args.times.is_some_and(|n| polls >= n) {
            break;
        }
        tokio::select! {
            () = tokio::time::sleep(every) => {}
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let removed = api.unsubscribe(&points, stream);
    tracing::debug!(removed, polls, "watch finished");
    Ok(())
}
