use std::fs;
use std::path::PathBuf;

use garden_weather::{
    ContextStore, GardenPaths, GitRepository, ResilienceConfig, ResilienceManager,
    WeatherContext,
};
use tempfile::TempDir;

/// A garden rooted in its own temp directory
pub struct TestGarden {
    _temp: TempDir,
    pub paths: GardenPaths,
}

impl TestGarden {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let paths = GardenPaths::new(temp.path());
        Self { _temp: temp, paths }
    }

    pub fn store(&self) -> ContextStore {
        ContextStore::new(self.paths.clone())
    }

    pub fn manager(
        &self,
        config: ResilienceConfig,
        git: impl GitRepository + 'static,
    ) -> ResilienceManager {
        ResilienceManager::new(self.paths.clone(), config, Box::new(git))
    }

    /// Save a document whose focus area is `area`
    pub fn save_focus(&self, area: &str) -> WeatherContext {
        self.store()
            .update(|ctx| ctx.current_focus.area = area.to_string())
            .unwrap()
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        fs::read(self.paths.context_file()).unwrap()
    }

    pub fn corrupt_canonical(&self) {
        fs::create_dir_all(self.paths.garden_dir()).unwrap();
        fs::write(self.paths.context_file(), b"{\"version\": \"1.0.0\", \"sess").unwrap();
    }

    pub fn write_companion(&self, contents: &str) -> PathBuf {
        let path = self.paths.companion_file();
        fs::write(&path, contents).unwrap();
        path
    }
}

pub fn strategies(names: &[&str]) -> ResilienceConfig {
    ResilienceConfig {
        recovery_strategies: names.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}
