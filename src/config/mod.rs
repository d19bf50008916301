// Configuration management module
// TOML settings on disk plus interactive prompts for editing them and for the API key

pub mod interactive;
pub mod settings;

#[cfg(test)]
mod tests;

pub use interactive::{prompt_api_key, run_interactive_config, show_config};
pub use settings::{
    AssistantConfig, AudioConfig, Config, ConfigError, KnowledgeBaseConfig, OpenAiConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".karrybot"))
        .or({
            #[cfg(windows)]
            {
                dirs::data_dir().map(|data| data.join("karrybot"))
            }
            #[cfg(not(windows))]
            {
                None
            }
        })
        .ok_or(ConfigError::DirectoryError)
}
