//! Startup configuration (spec.md §6, SPEC_FULL.md ambient stack):
//! environment-variable-driven knobs, in the same spirit as the
//! teacher's `main.rs` choosing a display backend/resolution from the
//! environment rather than a config file.

use std::env;

/// Default array-arena size on 64-bit platforms (spec.md §6 `SHM_SIZE`).
pub const DEFAULT_SHM_SIZE: u64 = 1 << 40;

#[derive(Debug, Clone)]
pub struct Config {
    pub shm_size: u64,
    pub tile_width: u32,
    pub tile_height: u32,
    pub worker_count: usize,
    pub bind_address: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            shm_size: DEFAULT_SHM_SIZE,
            tile_width: 64,
            tile_height: 64,
            worker_count: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            bind_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl Config {
    /// Reads overrides from the environment, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            shm_size: env_u64("SHM_SIZE").unwrap_or(defaults.shm_size),
            tile_width: env_u32("RHR_TILE_WIDTH").unwrap_or(defaults.tile_width),
            tile_height: env_u32("RHR_TILE_HEIGHT").unwrap_or(defaults.tile_height),
            worker_count: env_u32("RHR_WORKER_COUNT").map(|v| v as usize).unwrap_or(defaults.worker_count),
            bind_address: env::var("RHR_BIND_ADDRESS").unwrap_or(defaults.bind_address),
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.shm_size, DEFAULT_SHM_SIZE);
        assert!(cfg.tile_width > 0 && cfg.tile_height > 0);
        assert!(cfg.worker_count >= 1);
    }

    #[test]
    fn from_env_falls_back_on_missing_or_garbage_values() {
        std::env::remove_var("SHM_SIZE");
        std::env::set_var("RHR_TILE_WIDTH", "not-a-number");
        let cfg = Config::from_env();
        assert_eq!(cfg.shm_size, DEFAULT_SHM_SIZE);
        assert_eq!(cfg.tile_width, Config::default().tile_width);
        std::env::remove_var("RHR_TILE_WIDTH");
    }
}
