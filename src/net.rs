//! The admin HTTP surface: the readiness probe and the bulk-ingest
//! dispatcher.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::collections::HashMap;
use std::process::Command;
use std::sync::Arc;

use quasar_core::meta::MetaCache;

#[derive(Clone)]
pub struct AdminState {
	pub cache: Arc<MetaCache>,
	pub http: reqwest::Client,
}

pub fn router(state: AdminState) -> Router {
	Router::new()
		.route("/status", get(status))
		.route("/download", get(download))
		.with_state(state)
}

#[derive(Debug, Deserialize)]
struct StatusParams {
	daemon: Option<String>,
	returnjson: Option<String>,
}

// `GET /status?daemon=status[&returnjson]`
async fn status(Query(params): Query<StatusParams>) -> impl IntoResponse {
	match params.daemon.as_deref() {
		Some("status") | None => {
			if params.returnjson.is_some() {
				(
					StatusCode::OK,
					serde_json::json!([{"name": "metad", "status": "running"}]).to_string(),
				)
			} else {
				(StatusCode::OK, "status=running".to_string())
			}
		}
		Some(other) => (StatusCode::BAD_REQUEST, format!("unknown daemon `{other}`")),
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadParams {
	url: String,
	port: u16,
	path: String,
	local_path: String,
	#[serde(rename = "spaceID")]
	space_id: i32,
}

// `GET /download?url=…&port=…&path=…&localPath=…&spaceID=…`
//
// Stages SST files per partition through the configured HDFS client,
// then posts one download command per storage host.
async fn download(
	State(state): State<AdminState>,
	Query(params): Query<DownloadParams>,
) -> impl IntoResponse {
	let Ok(hadoop_home) = std::env::var("HADOOP_HOME") else {
		warn!("HADOOP_HOME is not set, refusing the ingest request");
		return (StatusCode::NOT_FOUND, "HADOOP_HOME is not set".to_string());
	};
	// The staging directory must list cleanly before any dispatch
	let source = format!("hdfs://{}:{}{}", params.url, params.port, params.path);
	let listing = Command::new(format!("{hadoop_home}/bin/hdfs"))
		.args(["dfs", "-ls", &source])
		.output();
	match listing {
		Ok(output) if output.status.success() => {}
		Ok(output) => {
			warn!("hdfs listing of {source} failed: {}", String::from_utf8_lossy(&output.stderr));
			return (StatusCode::NOT_FOUND, format!("cannot list {source}"));
		}
		Err(e) => {
			warn!("hdfs client failed to launch: {e}");
			return (StatusCode::NOT_FOUND, "hdfs client failed to launch".to_string());
		}
	}

	// One download command per host owning partitions of the space
	let snapshot = state.cache.load();
	let Ok(info) = snapshot.space(params.space_id) else {
		return (StatusCode::NOT_FOUND, format!("space {} not found", params.space_id));
	};
	let mut per_host: HashMap<String, Vec<i32>> = HashMap::new();
	for (part, hosts) in &info.parts {
		for host in hosts {
			per_host.entry(host.clone()).or_default().push(*part);
		}
	}
	for (host, mut parts) in per_host {
		parts.sort();
		let parts_arg =
			parts.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(",");
		let target = format!(
			"http://{host}/download?url={}&port={}&path={}&parts={}&local={}",
			params.url, params.port, params.path, parts_arg, params.local_path
		);
		debug!("dispatching ingest command to {host}");
		if let Err(e) = state.http.post(&target).send().await {
			warn!("ingest dispatch to {host} failed: {e}");
			return (StatusCode::NOT_FOUND, format!("dispatch to {host} failed"));
		}
	}
	(StatusCode::OK, "SSTFile dispatched".to_string())
}
