//! Process-wide configuration, built once in `main` and handed down by
//! value/`Arc` — replacing the prototype's global settings singleton
//! (spec.md REDESIGN FLAGS: "Singletons (settings, global HTTP-client
//! patching)").

use std::path::PathBuf;

use vibecore_core::AllowedDirectory;

/// Immutable, process-wide settings. Mirrors the teacher's
/// `AgentConfig`/`SessionConfig` split, trimmed to what this engine's
/// components actually read.
#[derive(Debug, Clone)]
pub struct Config {
    /// `{base_dir}/projects/{...}/{session_id}.jsonl` (spec.md §6.1, §6.4).
    pub base_dir: PathBuf,
    pub project_path: PathBuf,
    pub allowed_directories: Vec<AllowedDirectory>,
    pub model: String,
    pub max_turns: u32,
}

impl Config {
    pub fn load(project_path: PathBuf, model: String) -> anyhow::Result<Self> {
        let base_dir = default_base_dir()?;
        let allowed_directories = vec![AllowedDirectory::resolve(&project_path)?];

        Ok(Self {
            base_dir,
            project_path,
            allowed_directories,
            model,
            max_turns: vibecore_core::Agent::DEFAULT_MAX_TURNS,
        })
    }
}

fn default_base_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("could not determine home directory"))?;
    Ok(home.join(".vibecore"))
}
