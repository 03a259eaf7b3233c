//! `osipi search`: raw indexed-search hits.

use serde_json::Value as Json;
use tabled::Tabled;

use osipi_core::WebApi;

use crate::cli::{GlobalOpts, SearchArgs};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct HitRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    item_type: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "WebId")]
    web_id: String,
}

fn field(hit: &Json, name: &str) -> String {
    hit.get(name)
        .and_then(Json::as_str)
        .unwrap_or_default()
        .to_owned()
}

fn hit_row(hit: &Json) -> HitRow {
    HitRow {
        name: field(hit, "Name"),
        item_type: field(hit, "ItemType"),
        description: field(hit, "Description"),
        web_id: field(hit, "WebId"),
    }
}

pub async fn handle(api: &WebApi, args: SearchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let results = api.search(&args.query, args.count).await?;
    let out = output::render_list(&global.output, &results.items, hit_row, |h| field(h, "Name"));
    output::print_output(&out, global.quiet);
    if !global.quiet {
        eprintln!("{} of {} hit(s)", results.items.len(), results.total_hits);
    }
    Ok(())
}
