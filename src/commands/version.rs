use std::env;

use crate::{app_info::AppInfo, jobs::job_registry::JobRegistry};

pub fn print_version_info(app: AppInfo, job_registry: &JobRegistry) {
    let git_hash = option_env!("GIT_HASH").unwrap_or("unknown");
    let build_timestamp = option_env!("BUILD_TIMESTAMP").unwrap_or("unknown");

    println!("📦 {} v{}", app.name, app.version);
    println!("📝 {}", app.description);
    println!("🔗 {git_hash} built {build_timestamp}");
    println!("💻 {}/{}", env::consts::OS, env::consts::ARCH);

    let mut job_names: Vec<_> = job_registry.job_names().copied().collect();
    job_names.sort_unstable();
    println!("🔧 Jobs: {}", job_names.join(", "));
}
