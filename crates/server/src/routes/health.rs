//! `/api/health`: liveness, uptime and memory usage.

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use crate::handler::AppState;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Serialize)]
pub struct HealthOutput {
    pub status: &'static str,
    pub version: &'static str,
    /// e.g. `"42 seconds"`
    pub uptime: String,
    pub memory: MemoryReport,
    pub endpoints: Endpoints,
}

/// Values are rounded megabytes, e.g. `"12 MB"`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryReport {
    /// Resident memory of the process.
    pub heap_used: String,
    /// Virtual memory of the process.
    pub heap_total: String,
    /// Bytes held by the page cache.
    pub external: String,
}

#[derive(Debug, Serialize)]
pub struct Endpoints {
    pub proxy: &'static str,
    pub cache: &'static str,
    pub compress: &'static str,
    pub extensions: &'static str,
    pub health: &'static str,
}

const ENDPOINTS: Endpoints = Endpoints {
    proxy: "/api/proxy?url=<target>&ext=<extensions>",
    cache: "/api/cache?action=status|clear|delete&key=<key>",
    compress: "/api/compress?type=html|css|js&data=<data>",
    extensions: "/api/extensions?ext=adblock,tracking,privacy,malware,security&html=<html>",
    health: "/api/health",
};

fn megabytes(bytes: u64) -> String {
    format!("{} MB", (bytes as f64 / BYTES_PER_MB).round() as u64)
}

/// Resident and virtual memory of this process in bytes.
fn process_memory() -> (u64, u64) {
    let pid = Pid::from(std::process::id() as usize);
    let mut system = System::new();
    system.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), false, ProcessRefreshKind::new().with_memory());
    system
        .process(pid)
        .map_or((0, 0), |process| (process.memory(), process.virtual_memory()))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthOutput> {
    let (resident, virtual_memory) = process_memory();

    Json(HealthOutput {
        status: "online",
        version: env!("CARGO_PKG_VERSION"),
        uptime: format!("{} seconds", state.started_at.elapsed().as_secs()),
        memory: MemoryReport {
            heap_used: megabytes(resident),
            heap_total: megabytes(virtual_memory),
            external: megabytes(state.cache().approximate_bytes() as u64),
        },
        endpoints: ENDPOINTS,
    })
}
