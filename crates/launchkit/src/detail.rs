//! Lazy per-service detail.

use crate::action::{LAUNCHCTL, service_target};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::exec::Executor;
use crate::parser::{parse_number, parse_print};
use crate::types::{Domain, Inferred, Service, ServiceDetail, ServiceType};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Plist keys read from `plutil -convert json` output.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PlistJson {
    program: Option<String>,
    #[serde(default)]
    program_arguments: Vec<String>,
    run_at_load: Option<bool>,
    /// Either a bool or a dictionary of conditions
    keep_alive: Option<serde_json::Value>,
    service_description: Option<String>,
}

/// Fetch detail for one service.
///
/// The print step must succeed; reading the plist is best-effort.
pub async fn fetch_detail(ctx: &Context, exec: &Executor, service: &Service) -> Result<ServiceDetail> {
    if service.kind.value == ServiceType::Extension {
        return Ok(extension_detail(service));
    }

    let version = ctx.os_version(exec).await;
    let args = match version {
        Some(v) if !v.supports_print() => vec!["list".to_string(), service.label.clone()],
        _ => vec!["print".to_string(), service_target(ctx, service)],
    };
    let spec = exec.spec(LAUNCHCTL, args);
    let output = exec.exec_with_retry(&spec).await?;
    if !output.success() {
        return Err(Error::Other(format!(
            "{} exited {}: {}",
            spec.display(),
            output.exit_code,
            output.error_text()
        )));
    }

    let mut detail = detail_from_properties(parse_print(&output.stdout));
    if detail.file_path.is_none() {
        detail.file_path = service.file_path.clone();
    }
    if let Some(path) = detail.file_path.clone() {
        apply_plist(exec, &path, &mut detail).await;
    }
    Ok(detail)
}

/// Map normalized print keys onto detail fields.
pub fn detail_from_properties(properties: BTreeMap<String, String>) -> ServiceDetail {
    let number = |key: &str| {
        properties
            .get(key)
            .and_then(|v| parse_number(v.split_whitespace().next().unwrap_or_default()).ok())
            .flatten()
    };
    let text = |key: &str| {
        properties
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    // The two exit keys are kept distinct in the map; code is preferred
    let exit_status = number("last_exit_code").or_else(|| number("last_exit_status"));

    ServiceDetail {
        pid: number("pid").and_then(|p| u32::try_from(p).ok()),
        exit_status: exit_status.and_then(|s| i32::try_from(s).ok()),
        state: text("state"),
        file_path: text("path").map(PathBuf::from),
        program: text("program"),
        arguments: Vec::new(),
        description: None,
        run_at_load: None,
        keep_alive: None,
        kind: text("type")
            .and_then(|t| ServiceType::from_name(&t))
            .map(Inferred::confirmed),
        domain: text("domain")
            .and_then(|d| parse_domain(&d))
            .map(Inferred::confirmed),
        properties,
    }
}

/// Accepts `gui/501 [100005]`, `system` and `com.apple.xpc.launchd.domain.system`.
fn parse_domain(value: &str) -> Option<Domain> {
    let head = value.split_whitespace().next()?;
    if let Some(domain) = Domain::from_target(head) {
        return Some(domain);
    }
    let lower = head.to_lowercase();
    if lower.contains("domain.system") {
        Some(Domain::System)
    } else if lower.contains("domain.gui") {
        Some(Domain::Gui)
    } else if lower.contains("domain.user") {
        Some(Domain::User)
    } else {
        None
    }
}

async fn apply_plist(exec: &Executor, path: &Path, detail: &mut ServiceDetail) {
    let spec = exec.spec(
        "plutil",
        [
            "-convert".to_string(),
            "json".to_string(),
            "-o".to_string(),
            "-".to_string(),
            path.display().to_string(),
        ],
    );
    let output = match exec.exec_once(&spec).await {
        Ok(output) if output.success() => output,
        Ok(output) => {
            log::debug!("plutil failed for {}: {}", path.display(), output.error_text());
            return;
        }
        Err(e) => {
            log::debug!("plutil unavailable: {}", e);
            return;
        }
    };
    match serde_json::from_str::<PlistJson>(&output.stdout) {
        Ok(plist) => merge_plist(detail, plist),
        Err(e) => log::debug!("Unreadable plist JSON for {}: {}", path.display(), e),
    }
}

fn merge_plist(detail: &mut ServiceDetail, plist: PlistJson) {
    if detail.program.is_none() {
        detail.program = plist
            .program
            .or_else(|| plist.program_arguments.first().cloned());
    }
    detail.arguments = plist.program_arguments;
    detail.run_at_load = plist.run_at_load;
    detail.keep_alive = plist.keep_alive.map(|v| match v {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Object(conditions) => !conditions.is_empty(),
        _ => false,
    });
    if plist.service_description.is_some() {
        detail.description = plist.service_description;
    }
}

fn extension_detail(service: &Service) -> ServiceDetail {
    let mut properties = BTreeMap::new();
    if let Some(team) = &service.team_id {
        properties.insert("team_id".to_string(), team.clone());
    }
    if let Some(version) = &service.version {
        properties.insert("version".to_string(), version.clone());
    }
    ServiceDetail {
        state: service.extension_state.clone(),
        kind: Some(Inferred::confirmed(ServiceType::Extension)),
        domain: Some(Inferred::confirmed(Domain::System)),
        properties,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{OsVersion, SessionEnvironment};
    use crate::testing::{Reply, ScriptedRunner};
    use crate::types::{Protection, ServiceStatus};
    use std::sync::Arc;

    const MODERN_PRINT: &str = "gui/501/com.example.agent = {\n\
        \tactive count = 1\n\
        \tpath = /Users/tester/Library/LaunchAgents/com.example.agent.plist\n\
        \ttype = LaunchAgent\n\
        \tstate = running\n\
        \tprogram = /usr/local/bin/agent\n\
        \targuments = {\n\
        \t\t/usr/local/bin/agent\n\
        \t\t--serve\n\
        \t}\n\
        \tdomain = gui/501 [100008]\n\
        \tpid = 4242\n\
        \tlast exit code = (never exited)\n\
        }\n";

    const LEGACY_LIST: &str = "{\n\
        \t\"Label\" = \"com.example.agent\";\n\
        \t\"LastExitStatus\" = 256;\n\
        \t\"PID\" = 77;\n\
        \t\"Program\" = \"/usr/local/bin/agent\";\n\
        \t\"ProgramArguments\" = (\n\
        \t\t\"/usr/local/bin/agent\";\n\
        \t);\n\
        };\n";

    fn agent() -> Service {
        Service {
            id: "gui/com.example.agent".to_string(),
            label: "com.example.agent".to_string(),
            display_name: "agent".to_string(),
            kind: Inferred::provisional(ServiceType::Agent),
            domain: Inferred::provisional(Domain::Gui),
            status: ServiceStatus::Running,
            protection: Protection::Normal,
            pid: Some(4242),
            exit_status: None,
            enabled: true,
            is_vendor_owned: false,
            requires_root: false,
            file_path: None,
            description: None,
            last_error: None,
            team_id: None,
            version: None,
            extension_state: None,
            categories: None,
        }
    }

    fn ctx(version: OsVersion) -> Context {
        Context::new(501, false, PathBuf::from("/Users/tester"), SessionEnvironment::default())
            .with_os_version(Some(version))
    }

    #[test]
    fn test_properties_mapping() {
        let detail = detail_from_properties(parse_print(MODERN_PRINT));
        assert_eq!(detail.pid, Some(4242));
        assert_eq!(detail.exit_status, None);
        assert_eq!(detail.state.as_deref(), Some("running"));
        assert_eq!(detail.program.as_deref(), Some("/usr/local/bin/agent"));
        assert_eq!(detail.kind, Some(Inferred::confirmed(ServiceType::Agent)));
        assert_eq!(detail.domain, Some(Inferred::confirmed(Domain::Gui)));
        assert!(!detail.properties.contains_key("arguments"));
    }

    #[test]
    fn test_parse_domain_forms() {
        assert_eq!(parse_domain("system"), Some(Domain::System));
        assert_eq!(parse_domain("gui/501 [100008]"), Some(Domain::Gui));
        assert_eq!(
            parse_domain("com.apple.xpc.launchd.domain.user.501"),
            Some(Domain::User)
        );
        assert_eq!(parse_domain("pid/77"), None);
    }

    #[tokio::test]
    async fn test_fetch_modern_with_plist() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("launchctl print gui/501/com.example.agent", [Reply::ok(MODERN_PRINT)]);
        runner.on(
            "plutil",
            [Reply::ok(
                r#"{"Label":"com.example.agent","ProgramArguments":["/usr/local/bin/agent","--serve"],"RunAtLoad":true,"KeepAlive":{"SuccessfulExit":false},"ServiceDescription":"Example sync agent"}"#,
            )],
        );
        let ctx = ctx(OsVersion::new(14, 0, 0));
        let exec = ctx.executor(runner.clone());

        let service = agent();
        let detail = fetch_detail(&ctx, &exec, &service).await.unwrap();
        assert_eq!(detail.arguments, vec!["/usr/local/bin/agent", "--serve"]);
        assert_eq!(detail.run_at_load, Some(true));
        assert_eq!(detail.keep_alive, Some(true));
        assert_eq!(detail.description.as_deref(), Some("Example sync agent"));

        let refined = service.refine(&detail);
        assert!(refined.kind.is_confirmed());
        assert!(refined.domain.is_confirmed());
        assert_eq!(refined.description.as_deref(), Some("Example sync agent"));
        // The input service is untouched
        assert!(!service.kind.is_confirmed());
    }

    #[tokio::test]
    async fn test_fetch_legacy_list() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("launchctl list com.example.agent", [Reply::ok(LEGACY_LIST)]);
        let ctx = ctx(OsVersion::new(10, 9, 5));
        let exec = ctx.executor(runner.clone());

        let detail = fetch_detail(&ctx, &exec, &agent()).await.unwrap();
        assert_eq!(detail.pid, Some(77));
        assert_eq!(detail.exit_status, Some(256));
        assert_eq!(detail.program.as_deref(), Some("/usr/local/bin/agent"));
        assert_eq!(runner.command_lines(), vec!["launchctl list com.example.agent"]);
    }

    #[tokio::test]
    async fn test_plist_failure_is_not_fatal() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("launchctl print", [Reply::ok(MODERN_PRINT)]);
        runner.on("plutil", [Reply::fail(1, "invalid file")]);
        let ctx = ctx(OsVersion::new(14, 0, 0));
        let exec = ctx.executor(runner.clone());

        let detail = fetch_detail(&ctx, &exec, &agent()).await.unwrap();
        assert!(detail.arguments.is_empty());
        assert_eq!(detail.pid, Some(4242));
    }

    #[tokio::test]
    async fn test_print_failure_is_error() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on(
            "launchctl print",
            [Reply::fail(113, "Could not find service \"com.example.agent\" in domain for user gui: 501")],
        );
        let ctx = ctx(OsVersion::new(14, 0, 0));
        let exec = ctx.executor(runner.clone());
        assert!(fetch_detail(&ctx, &exec, &agent()).await.is_err());
    }

    #[tokio::test]
    async fn test_extension_detail_runs_nothing() {
        let runner = Arc::new(ScriptedRunner::new());
        let ctx = ctx(OsVersion::new(14, 0, 0));
        let exec = ctx.executor(runner.clone());
        let mut ext = agent();
        ext.kind = Inferred::confirmed(ServiceType::Extension);
        ext.extension_state = Some("activated enabled".to_string());
        ext.team_id = Some("ABCDE12345".to_string());

        let detail = fetch_detail(&ctx, &exec, &ext).await.unwrap();
        assert_eq!(detail.state.as_deref(), Some("activated enabled"));
        assert_eq!(detail.properties["team_id"], "ABCDE12345");
        assert!(runner.calls().is_empty());
    }
}
