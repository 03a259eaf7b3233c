//! `osipi points`: search, stream reads and writes.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::try_join_all;
use tabled::Tabled;

use osipi_core::{
    CoreError, InterpolatedQuery, PlotQuery, Point, RecordedQuery, UpdateOption, Value, WebApi,
};

use super::util::{self, PointValue};
use crate::cli::{GlobalOpts, PointsArgs, PointsCommand, UpdateOptionArg, WindowArgs};
use crate::error::CliError;
use crate::output;

// ── Rows ─────────────────────────────────────────────────────────────

#[derive(Tabled)]
struct PointRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    datatype: String,
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "Units")]
    units: String,
    #[tabled(rename = "Descriptor")]
    descriptor: String,
    #[tabled(rename = "WebId")]
    web_id: String,
}

fn point_row(point: &Arc<Point>) -> PointRow {
    PointRow {
        name: point.name().to_owned(),
        datatype: point.datatype().to_string(),
        class: point.point_class().unwrap_or_default().to_owned(),
        units: point.engineering_units().unwrap_or_default().to_owned(),
        descriptor: point.descriptor().unwrap_or_default().to_owned(),
        web_id: point.web_id().to_owned(),
    }
}

impl From<UpdateOptionArg> for UpdateOption {
    fn from(arg: UpdateOptionArg) -> Self {
        match arg {
            UpdateOptionArg::Replace => Self::Replace,
            UpdateOptionArg::Insert => Self::Insert,
            UpdateOptionArg::NoReplace => Self::NoReplace,
            UpdateOptionArg::ReplaceOnly => Self::ReplaceOnly,
            UpdateOptionArg::InsertNoCompression => Self::InsertNoCompression,
            UpdateOptionArg::Remove => Self::Remove,
        }
    }
}

// ── Query builders ───────────────────────────────────────────────────

pub fn recorded_query(window: &WindowArgs, max_count: Option<u32>) -> RecordedQuery {
    RecordedQuery {
        start_time: window.start.clone(),
        end_time: window.end.clone(),
        max_count,
        ..RecordedQuery::default()
    }
}

pub fn interpolated_query(window: &WindowArgs, interval: Option<&str>) -> InterpolatedQuery {
    InterpolatedQuery {
        start_time: window.start.clone(),
        end_time: window.end.clone(),
        interval: interval.map(String::from),
        ..InterpolatedQuery::default()
    }
}

pub fn plot_query(window: &WindowArgs, intervals: Option<u32>) -> PlotQuery {
    PlotQuery {
        start_time: window.start.clone(),
        end_time: window.end.clone(),
        intervals,
    }
}

// ── Reads ────────────────────────────────────────────────────────────

/// Issue `read` against every point concurrently and tag the results.
async fn read_each<F, Fut>(points: &[Arc<Point>], read: F) -> Result<Vec<PointValue>, CliError>
where
    F: Fn(Arc<Point>) -> Fut,
    Fut: Future<Output = Result<Vec<Value>, CoreError>>,
{
    let reads = points.iter().map(|point| {
        let pending = read(Arc::clone(point));
        async move { pending.await.map(|values| PointValue::many(point, values)) }
    });
    let batches = try_join_all(reads).await?;
    Ok(batches.into_iter().flatten().collect())
}

fn print_values(records: &[PointValue], global: &GlobalOpts) {
    let out = output::render_list(&global.output, records, util::value_row, util::value_line);
    output::print_output(&out, global.quiet);
}

// ── Handler ──────────────────────────────────────────────────────────

pub async fn handle(api: &WebApi, args: PointsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        PointsCommand::List(select) => {
            let points = util::resolve_points(api, &select).await?;
            let out = output::render_list(&global.output, &points, point_row, |p| {
                p.name().to_owned()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        PointsCommand::Current { select, time } => {
            let points = util::resolve_points(api, &select).await?;
            let time = time.as_deref();
            let records = read_each(&points, |p| async move {
                p.current(time).await.map(|v| vec![v])
            })
            .await?;
            print_values(&records, global);
            Ok(())
        }

        PointsCommand::End { select } => {
            let points = util::resolve_points(api, &select).await?;
            let records =
                read_each(&points, |p| async move { p.end().await.map(|v| vec![v]) }).await?;
            print_values(&records, global);
            Ok(())
        }

        PointsCommand::Recorded {
            select,
            window,
            max_count,
        } => {
            let points = util::resolve_points(api, &select).await?;
            let query = &recorded_query(&window, max_count);
            let records = read_each(&points, |p| async move { p.recorded(query).await }).await?;
            print_values(&records, global);
            Ok(())
        }

        PointsCommand::RecordedAt { select, time } => {
            let points = util::resolve_points(api, &select).await?;
            let time = time.as_str();
            let records = read_each(&points, |p| async move {
                p.recorded_at_time(time).await.map(|v| vec![v])
            })
            .await?;
            print_values(&records, global);
            Ok(())
        }

        PointsCommand::Interpolated {
            select,
            window,
            interval,
        } => {
            let points = util::resolve_points(api, &select).await?;
            let query = &interpolated_query(&window, interval.as_deref());
            let records =
                read_each(&points, |p| async move { p.interpolated(query).await }).await?;
            print_values(&records, global);
            Ok(())
        }

        PointsCommand::InterpolatedAt { select, times } => {
            let points = util::resolve_points(api, &select).await?;
            let times = times.as_slice();
            let records = read_each(&points, |p| async move {
                p.interpolated_at_times(times).await
            })
            .await?;
            print_values(&records, global);
            Ok(())
        }

        PointsCommand::Plot {
            select,
            window,
            intervals,
        } => {
            let points = util::resolve_points(api, &select).await?;
            let query = &plot_query(&window, intervals);
            let records = read_each(&points, |p| async move { p.plot(query).await }).await?;
            print_values(&records, global);
            Ok(())
        }

        PointsCommand::Write {
            select,
            value,
            time,
            update_option,
        } => {
            let points = util::resolve_points(api, &select).await?;
            let [point] = points.as_slice() else {
                return Err(CliError::Validation {
                    field: "query".into(),
                    reason: format!(
                        "'{}' matched {} points; a write needs exactly one",
                        select.query,
                        points.len()
                    ),
                });
            };

            let payload = util::parse_write_value(&value);
            let option = UpdateOption::from(update_option);
            let prompt = format!("Write {payload} to {} at {time} ({option})?", point.name());
            if !util::confirm(&prompt, "points write", global.yes)? {
                return Ok(());
            }

            point.update_value(&time, payload, option).await?;
            if !global.quiet {
                eprintln!("✓ Wrote {value} to {} at {time}", point.name());
            }
            Ok(())
        }
    }
}
