//! Interactive refresh loop.
//!
//! Reads one command per line from stdin while timers drive refreshes:
//! Enter refreshes, `/pattern` filters, `/` clears the filter,
//! `i <label>` shows detail, `q` quits.

use crate::Context;
use crate::cli::WatchArgs;
use crate::commands::info;
use crate::commands::list::print_table;
use crate::ui;
use anyhow::Result;
use chrono::Local;
use colored::Colorize;
use launchkit::{Client, Service, ServiceDetail};
use snapshot::{
    MergeOutcome, MetadataCache, OfflineReconciler, RefreshScheduler, Tick, Transition, merge,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Refresh,
    Filter(Option<String>),
    Info(String),
    Quit,
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() || line == "r" {
        return Input::Refresh;
    }
    if line == "q" || line == "quit" {
        return Input::Quit;
    }
    if let Some(pattern) = line.strip_prefix('/') {
        let pattern = pattern.trim();
        return Input::Filter((!pattern.is_empty()).then(|| pattern.to_string()));
    }
    if let Some(label) = line.strip_prefix("i ") {
        return Input::Info(label.trim().to_string());
    }
    Input::Unknown(line.to_string())
}

/// Ids whose entry is not the same `Arc` as before, including removed ones.
fn replaced_ids(old: &[Arc<Service>], merged: &[Arc<Service>]) -> Vec<String> {
    let previous: HashMap<&str, &Arc<Service>> = old.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut ids: Vec<String> = merged
        .iter()
        .filter(|s| {
            previous
                .get(s.id.as_str())
                .is_none_or(|prev| !Arc::ptr_eq(prev, s))
        })
        .map(|s| s.id.clone())
        .collect();
    let current: HashSet<&str> = merged.iter().map(|s| s.id.as_str()).collect();
    ids.extend(
        old.iter()
            .filter(|s| !current.contains(s.id.as_str()))
            .map(|s| s.id.clone()),
    );
    ids
}

struct Session<'a> {
    client: &'a Client,
    reconciler: OfflineReconciler,
    cache: MetadataCache<ServiceDetail>,
    services: Vec<Arc<Service>>,
    filter: Option<String>,
}

impl Session<'_> {
    async fn refresh(&mut self) {
        let client = self.client;
        match self.reconciler.refresh(|| client.discover()).await {
            Ok(outcome) => {
                match outcome.transition {
                    Transition::WentOffline => {
                        ui::warn("launchd unreachable, showing last known services");
                    }
                    Transition::CameOnline => ui::success("Back online"),
                    Transition::None => {}
                }
                match merge(&self.services, outcome.services) {
                    MergeOutcome::Unchanged => {
                        log::debug!("Refresh: no changes");
                    }
                    MergeOutcome::Replaced(merged) => {
                        for id in replaced_ids(&self.services, &merged) {
                            self.cache.remove(&id);
                        }
                        self.services = merged;
                        self.render(outcome.stale);
                    }
                }
            }
            Err(e) => ui::error(&format!("Refresh failed: {e}")),
        }
    }

    fn render(&self, stale: bool) {
        let state = if stale || self.reconciler.is_offline() {
            "offline".red().to_string()
        } else {
            "online".green().to_string()
        };
        ui::header(&format!(
            "{} services at {}",
            self.services.len(),
            Local::now().format("%H:%M:%S")
        ));
        ui::kv("State", &state);
        if let Some(at) = self.reconciler.state().last_success_at {
            ui::kv("Last success", &at.with_timezone(&Local).format("%H:%M:%S").to_string());
        }

        match &self.filter {
            Some(pattern) => {
                ui::kv("Filter", pattern);
                let hits = self.client.search(&self.services, pattern);
                print_table(hits.iter().map(|hit| &**hit.item), false);
            }
            None => print_table(self.services.iter().map(|s| &**s), false),
        }
        ui::dim("Enter: refresh  /pattern: filter  i <label>: detail  q: quit");
    }

    async fn show_info(&self, label: &str) {
        let Some(service) = self.services.iter().find(|s| s.label == label) else {
            ui::warn(&format!("No service with label '{label}'"));
            return;
        };
        match info::fetch_cached(self.client, &self.cache, service).await {
            Ok(detail) => info::print_detail(self.client, service, &detail),
            Err(e) => ui::error(&format!("Could not fetch detail: {e}")),
        }
    }
}

pub async fn run(ctx: &Context, args: WatchArgs) -> Result<()> {
    let client = ctx.client()?;
    let auto_refresh = ctx.config.refresh.enabled && !args.no_auto_refresh;

    let (mut scheduler, mut ticks) =
        RefreshScheduler::new(ctx.config.refresh_interval(), ctx.config.reconnect_interval());
    let activity = scheduler.activity();

    let mut session = Session {
        client: &client,
        reconciler: OfflineReconciler::new(ctx.config.offline.failure_threshold),
        cache: MetadataCache::new(ctx.config.cache.capacity),
        services: Vec::new(),
        filter: args.filter,
    };

    session.refresh().await;
    if session.services.is_empty() {
        session.render(false);
    }
    scheduler.reconfigure(auto_refresh, session.reconciler.is_offline());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            tick = ticks.recv() => match tick {
                Some(Tick::Refresh) => session.refresh().await,
                Some(Tick::Reconnect) => {
                    log::info!("Trying to reconnect");
                    session.refresh().await;
                }
                None => break,
            },
            line = lines.next_line() => {
                activity.touch();
                let Some(line) = line? else { break };
                match parse_input(&line) {
                    Input::Quit => break,
                    Input::Refresh => session.refresh().await,
                    Input::Filter(pattern) => {
                        session.filter = pattern;
                        session.render(session.reconciler.is_offline());
                    }
                    Input::Info(label) => session.show_info(&label).await,
                    Input::Unknown(text) => ui::warn(&format!("Unknown command: {text}")),
                }
            }
        }
        scheduler.reconfigure(auto_refresh, session.reconciler.is_offline());
    }

    Ok(())
}
