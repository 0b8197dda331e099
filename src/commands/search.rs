use crate::Context;
use crate::cli::SearchArgs;
use crate::commands::load_services;
use crate::ui;
use anyhow::Result;
use colored::Colorize;
use launchkit::Service;
use searchkit::FieldMatch;

pub async fn run(ctx: &Context, args: SearchArgs) -> Result<()> {
    let client = ctx.client()?;
    let services = load_services(ctx, &client).await?;
    let hits = client.search(&services, &args.pattern);

    if hits.is_empty() {
        ui::info(&format!("No services match '{}'", args.pattern));
        return Ok(());
    }

    ui::header(&format!("Matches for '{}' ({})", args.pattern, hits.len()));
    for hit in hits.iter().take(args.limit) {
        print_hit(hit.item, &hit.matched);
    }
    if hits.len() > args.limit {
        ui::dim(&format!("... and {} more", hits.len() - args.limit));
    }
    Ok(())
}

/// Text of the field a match was scored against.
pub fn matched_text<'a>(service: &'a Service, matched: &FieldMatch) -> &'a str {
    match matched.field {
        "displayName" => &service.display_name,
        "description" => service.description.as_deref().unwrap_or_default(),
        _ => &service.label,
    }
}

pub fn print_hit(service: &Service, matched: &FieldMatch) {
    let score = format!("{:>7.1}", matched.score).dimmed();
    if matched.field == "label" {
        println!(
            "  {} {}  {}",
            score,
            ui::highlight(&service.label, &matched.indices),
            ui::status(service.status)
        );
    } else {
        println!("  {} {}  {}", score, service.label, ui::status(service.status));
        ui::dim(&format!(
            "{}: {}",
            matched.field,
            ui::highlight(matched_text(service, matched), &matched.indices)
        ));
    }
}
