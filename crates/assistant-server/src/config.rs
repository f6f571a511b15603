//! Server Configuration

use std::path::PathBuf;

/// Settings read from the environment at startup
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Model used for every collaborator
    pub model: String,
    
    /// Tool-use budget of the reasoning loop
    pub max_iterations: usize,
    
    /// Durable checkpoint directory; in-memory when unset
    pub checkpoint_dir: Option<PathBuf>,
    
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            model: "llama3.2".into(),
            max_iterations: 10,
            checkpoint_dir: None,
            bind_addr: "0.0.0.0:3000".into(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        
        Self {
            model: std::env::var("AGENT_MODEL").unwrap_or(defaults.model),
            max_iterations: std::env::var("AGENT_MAX_ITERATIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_iterations),
            checkpoint_dir: std::env::var("CHECKPOINT_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
        }
    }
}
