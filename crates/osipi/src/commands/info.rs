//! `osipi info`: the service root and its links.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Serialize;

use osipi_core::{Materialized, WebApi};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct RootInfo<'a> {
    url: &'a str,
    links: BTreeMap<&'a str, &'a str>,
}

fn detail(info: &RootInfo<'_>) -> String {
    let mut out = format!("PI Web API  {}\n", info.url);
    let width = info.links.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
    for (name, url) in &info.links {
        let _ = write!(out, "\n  {name:<width$}  {url}");
    }
    out
}

pub fn handle(api: &WebApi, global: &GlobalOpts) -> Result<(), CliError> {
    let info = RootInfo {
        url: api.url().as_str(),
        links: api.links().iter().map(|(n, u)| (n, u.as_str())).collect(),
    };
    let out = output::render_single(&global.output, &info, detail, |_| api.to_string());
    output::print_output(&out, global.quiet);
    Ok(())
}
